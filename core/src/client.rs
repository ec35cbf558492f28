//! Authenticated session against a Seahub server.
//!
//! # Design
//! A `SeafileClient` is only ever handed out in the authenticated state: the
//! token is either supplied by the caller or fetched exactly once while
//! connecting, and never changes afterwards. There is no refresh path; an
//! expired token shows up as an HTTP error on the next call.
//!
//! Connecting returns a `Result`. A command-line caller that wants to abort
//! when authentication fails does so on `Err`.

use std::fmt;

use tracing::info;

use crate::config::ClientConfig;
use crate::dispatch::Dispatcher;
use crate::error::{ApiError, Result};
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::repo::Repos;
use crate::request::RequestOptions;
use crate::transport::{Transport, UreqTransport};
use crate::types::TokenResponse;
use crate::util::{encode_pairs, url_join};

/// Length of every token Seahub issues.
pub const AUTH_TOKEN_LEN: usize = 40;

const AUTH_TOKEN_PATH: &str = "/api2/auth-token/";

pub struct SeafileClient<T = UreqTransport> {
    username: Option<String>,
    dispatcher: Dispatcher<T>,
}

impl SeafileClient<UreqTransport> {
    /// Connect over HTTP(S), fetching a token if the config carries none.
    pub fn connect(config: ClientConfig) -> Result<Self> {
        let transport = UreqTransport::new(config.verify_ssl, config.timeout);
        Self::with_transport(config, transport)
    }
}

impl<T: Transport> SeafileClient<T> {
    pub fn with_transport(config: ClientConfig, transport: T) -> Result<Self> {
        config.validate()?;
        let ClientConfig {
            server,
            username,
            password,
            token,
            ..
        } = config;

        let token = match token {
            Some(token) => {
                check_token(&token)?;
                token
            }
            None => fetch_token(
                &transport,
                &server,
                username.as_deref().unwrap_or_default(),
                password.as_deref().unwrap_or_default(),
            )?,
        };

        Ok(Self {
            username,
            dispatcher: Dispatcher::new(server, token, transport),
        })
    }

    pub fn server(&self) -> &str {
        self.dispatcher.server()
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn token(&self) -> &str {
        self.dispatcher.token()
    }

    pub fn dispatcher(&self) -> &Dispatcher<T> {
        &self.dispatcher
    }

    /// `Ok(None)` means the request did not complete; the transport failure
    /// has been logged.
    pub fn request(
        &self,
        method: HttpMethod,
        path: &str,
        options: RequestOptions,
    ) -> Result<Option<HttpResponse>> {
        self.dispatcher.dispatch(method, path, &options)
    }

    /// Like [`Self::request`], but a transport failure is an error.
    pub fn try_request(
        &self,
        method: HttpMethod,
        path: &str,
        options: RequestOptions,
    ) -> Result<HttpResponse> {
        self.dispatcher.try_dispatch(method, path, &options)
    }

    pub fn get(&self, path: &str, options: RequestOptions) -> Result<Option<HttpResponse>> {
        self.request(HttpMethod::Get, path, options)
    }

    pub fn post(&self, path: &str, options: RequestOptions) -> Result<Option<HttpResponse>> {
        self.request(HttpMethod::Post, path, options)
    }

    pub fn put(&self, path: &str, options: RequestOptions) -> Result<Option<HttpResponse>> {
        self.request(HttpMethod::Put, path, options)
    }

    pub fn delete(&self, path: &str, options: RequestOptions) -> Result<Option<HttpResponse>> {
        self.request(HttpMethod::Delete, path, options)
    }

    pub fn try_get(&self, path: &str, options: RequestOptions) -> Result<HttpResponse> {
        self.try_request(HttpMethod::Get, path, options)
    }

    pub fn try_post(&self, path: &str, options: RequestOptions) -> Result<HttpResponse> {
        self.try_request(HttpMethod::Post, path, options)
    }

    pub fn try_put(&self, path: &str, options: RequestOptions) -> Result<HttpResponse> {
        self.try_request(HttpMethod::Put, path, options)
    }

    pub fn try_delete(&self, path: &str, options: RequestOptions) -> Result<HttpResponse> {
        self.try_request(HttpMethod::Delete, path, options)
    }

    /// `GET /api2/ping/`.
    pub fn ping(&self) -> Result<bool> {
        self.pong("/api2/ping/")
    }

    /// `GET /api2/auth/ping/`; only answers `pong` to a valid token.
    pub fn auth_ping(&self) -> Result<bool> {
        self.pong("/api2/auth/ping/")
    }

    fn pong(&self, path: &str) -> Result<bool> {
        let response = self.try_request(HttpMethod::Get, path, RequestOptions::new())?;
        let reply: String = response.json()?;
        Ok(reply == "pong")
    }

    pub fn repos(&self) -> Repos<'_, T> {
        Repos::new(self)
    }
}

impl<T> fmt::Display for SeafileClient<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SeafileClient[server={}, user={}]",
            self.dispatcher.server(),
            self.username.as_deref().unwrap_or("")
        )
    }
}

impl<T> fmt::Debug for SeafileClient<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Exchange username/password for a token at `POST /api2/auth-token/`.
///
/// A 400 carrying `non_field_errors` means the credentials were wrong and is
/// reported as [`ApiError::Authentication`].
pub fn fetch_token<T: Transport>(
    transport: &T,
    server: &str,
    username: &str,
    password: &str,
) -> Result<String> {
    let form = vec![
        ("username".to_string(), username.to_string()),
        ("password".to_string(), password.to_string()),
    ];
    let request = HttpRequest {
        method: HttpMethod::Post,
        url: url_join(server, AUTH_TOKEN_PATH),
        headers: vec![(
            "Content-Type".to_string(),
            "application/x-www-form-urlencoded".to_string(),
        )],
        body: Some(encode_pairs(&form).into_bytes()),
    };
    let response = transport.execute(&request)?;

    if response.status != 200 {
        let body = String::from_utf8_lossy(&response.body).into_owned();
        if response.status == 400 && has_non_field_errors(&response) {
            return Err(ApiError::Authentication {
                status: response.status,
                body,
            });
        }
        return Err(ApiError::Http {
            status: response.status,
            message: body,
        });
    }

    let TokenResponse { token } = response.json()?;
    check_token(&token)?;
    info!(server, username, "acquired auth token");
    Ok(token)
}

fn has_non_field_errors(response: &HttpResponse) -> bool {
    response
        .json::<serde_json::Value>()
        .map(|v| v.get("non_field_errors").is_some())
        .unwrap_or(false)
}

fn check_token(token: &str) -> Result<()> {
    let len = token.chars().count();
    if len != AUTH_TOKEN_LEN {
        return Err(ApiError::InvalidToken(len));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::tests::FakeTransport;

    const TOKEN: &str = "0123456789abcdef0123456789abcdef01234567";

    fn config() -> ClientConfig {
        ClientConfig::new("https://cloud.example.com").credentials("me@example.com", "secret")
    }

    fn token_body() -> String {
        format!(r#"{{"token":"{TOKEN}"}}"#)
    }

    #[test]
    fn connect_fetches_token_once() {
        let body = token_body();
        let transport = FakeTransport::with_responses(vec![(200, body.as_str())]);
        let client = SeafileClient::with_transport(config(), &transport).unwrap();

        assert_eq!(client.token(), TOKEN);
        let requests = transport.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, HttpMethod::Post);
        assert_eq!(requests[0].url, "https://cloud.example.com/api2/auth-token/");
        assert_eq!(
            requests[0].body.as_deref(),
            Some(&b"username=me%40example.com&password=secret"[..])
        );
        assert!(requests[0].header("authorization").is_none());
    }

    #[test]
    fn supplied_token_skips_auth_request() {
        let transport = FakeTransport::default();
        let config = ClientConfig::new("https://cloud.example.com").token(TOKEN);
        let client = SeafileClient::with_transport(config, &transport).unwrap();
        assert_eq!(client.token(), TOKEN);
        assert!(transport.requests.lock().unwrap().is_empty());
    }

    #[test]
    fn short_token_fails_construction() {
        let transport = FakeTransport::with_responses(vec![(200, r#"{"token":"short"}"#)]);
        let err = SeafileClient::with_transport(config(), &transport).unwrap_err();
        assert!(matches!(err, ApiError::InvalidToken(5)));
    }

    #[test]
    fn missing_token_field_fails_construction() {
        let transport = FakeTransport::with_responses(vec![(200, "{}")]);
        let err = SeafileClient::with_transport(config(), &transport).unwrap_err();
        assert!(matches!(err, ApiError::InvalidToken(0)));
    }

    #[test]
    fn malformed_json_fails_construction() {
        let transport = FakeTransport::with_responses(vec![(200, "<html>oops</html>")]);
        let err = SeafileClient::with_transport(config(), &transport).unwrap_err();
        assert!(matches!(err, ApiError::DeserializationError(_)));
    }

    #[test]
    fn bad_credentials_are_authentication_error() {
        let transport = FakeTransport::with_responses(vec![(
            400,
            r#"{"non_field_errors":["Unable to login with provided credentials."]}"#,
        )]);
        let err = SeafileClient::with_transport(config(), &transport).unwrap_err();
        assert!(matches!(err, ApiError::Authentication { status: 400, .. }));
        assert!(err.is_http());
    }

    #[test]
    fn other_400_is_plain_http_error() {
        let transport =
            FakeTransport::with_responses(vec![(400, r#"{"username":["This field is required."]}"#)]);
        let err = SeafileClient::with_transport(config(), &transport).unwrap_err();
        assert!(matches!(err, ApiError::Http { status: 400, .. }));
    }

    #[test]
    fn server_error_is_http_error() {
        let transport = FakeTransport::with_responses(vec![(502, "bad gateway")]);
        let err = SeafileClient::with_transport(config(), &transport).unwrap_err();
        assert!(matches!(err, ApiError::Http { status: 502, .. }));
    }

    #[test]
    fn unreachable_server_fails_construction() {
        let transport = FakeTransport::default();
        let err = SeafileClient::with_transport(config(), &transport).unwrap_err();
        assert!(matches!(err, ApiError::Transport(_)));
    }

    #[test]
    fn supplied_token_of_wrong_length_is_rejected() {
        let config = ClientConfig::new("https://cloud.example.com").token("abc");
        let err = SeafileClient::with_transport(config, FakeTransport::default()).unwrap_err();
        assert!(matches!(err, ApiError::InvalidToken(3)));
    }

    #[test]
    fn verb_methods_route_through_dispatch() {
        let body = token_body();
        let transport =
            FakeTransport::with_responses(vec![(200, body.as_str()), (200, "[]"), (201, "\"ok\""), (200, "")]);
        let client = SeafileClient::with_transport(config(), &transport).unwrap();

        client.get("/api2/repos/", RequestOptions::new()).unwrap();
        client
            .post("api2/repos/r1/dir/", RequestOptions::new().expected(201))
            .unwrap();
        client.delete("/api2/repos/r1/", RequestOptions::new()).unwrap();

        let requests = transport.requests.lock().unwrap();
        let seen: Vec<_> = requests[1..]
            .iter()
            .map(|r| (r.method, r.url.as_str()))
            .collect();
        assert_eq!(
            seen,
            vec![
                (HttpMethod::Get, "https://cloud.example.com/api2/repos/"),
                (HttpMethod::Post, "https://cloud.example.com/api2/repos/r1/dir/"),
                (HttpMethod::Delete, "https://cloud.example.com/api2/repos/r1/"),
            ]
        );
        assert_eq!(
            requests[1].header("Authorization"),
            Some(format!("Token {TOKEN}").as_str())
        );
    }

    #[test]
    fn get_after_connection_loss_is_absent() {
        let body = token_body();
        let transport = FakeTransport::with_responses(vec![(200, body.as_str())]);
        let client = SeafileClient::with_transport(config(), &transport).unwrap();
        let result = client.get("/api2/repos/", RequestOptions::new()).unwrap();
        assert!(result.is_none());

        let err = client
            .try_delete("/api2/repos/r1/", RequestOptions::new())
            .unwrap_err();
        assert!(matches!(err, ApiError::Transport(_)));
    }

    #[test]
    fn ping_reads_pong() {
        let transport = FakeTransport::with_responses(vec![(200, "\"pong\"")]);
        let config = ClientConfig::new("https://cloud.example.com").token(TOKEN);
        let client = SeafileClient::with_transport(config, &transport).unwrap();
        assert!(client.ping().unwrap());
        assert_eq!(
            transport.last_request().url,
            "https://cloud.example.com/api2/ping/"
        );
    }

    #[test]
    fn display_names_server_and_user() {
        let body = token_body();
        let transport = FakeTransport::with_responses(vec![(200, body.as_str())]);
        let client = SeafileClient::with_transport(config(), &transport).unwrap();
        assert_eq!(
            client.to_string(),
            "SeafileClient[server=https://cloud.example.com, user=me@example.com]"
        );
    }
}
