//! The single choke point every verb method passes through.
//!
//! # Design
//! A dispatch runs four stages in order:
//! 1. `prepare`: resolve the URL, attach the query, inject
//!    `Authorization: Token <token>`, encode the body;
//! 2. body transforms (the non-ASCII upload filename rewrite);
//! 3. transmit through the [`Transport`];
//! 4. validate the status against the caller's [`crate::Expected`] set.
//!
//! A transport failure either reaches the caller as `ApiError::Transport`
//! (`try_dispatch`) or is logged and becomes `Ok(None)` (`dispatch`).

use tracing::{debug, warn};

use crate::error::{ApiError, Result};
use crate::http::{find_header, HttpMethod, HttpRequest, HttpResponse};
use crate::multipart::rewrite_extended_filename;
use crate::request::{Expected, RequestOptions};
use crate::transport::Transport;
use crate::util::{encode_pairs, is_absolute_url, is_ascii, url_join, with_query};

/// Name of the multipart field whose filename gets rewritten.
const UPLOAD_FIELD: &str = "file";

/// Sends authenticated requests against one server and checks their status.
#[derive(Debug)]
pub struct Dispatcher<T> {
    server: String,
    token: String,
    transport: T,
}

impl<T> Dispatcher<T> {
    pub fn server(&self) -> &str {
        &self.server
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }
}

impl<T: Transport> Dispatcher<T> {
    pub fn new(server: impl Into<String>, token: impl Into<String>, transport: T) -> Self {
        Self {
            server: server.into(),
            token: token.into(),
            transport,
        }
    }

    /// Absolute URLs pass through unchanged; anything else is joined onto
    /// the server address.
    pub fn resolve(&self, url: &str) -> String {
        if is_absolute_url(url) {
            url.to_string()
        } else {
            url_join(&self.server, url)
        }
    }

    /// Build the request exactly as it will go on the wire.
    pub fn prepare(&self, method: HttpMethod, url: &str, options: &RequestOptions) -> HttpRequest {
        let url = with_query(&self.resolve(url), &options.query);

        let mut headers = options.headers.clone();
        if find_header(&headers, "Authorization").is_none() {
            headers.push(("Authorization".to_string(), format!("Token {}", self.token)));
        }

        let body = if let Some(form) = &options.multipart {
            set_content_type(&mut headers, form.content_type());
            Some(form.to_bytes())
        } else if !options.form.is_empty() {
            set_content_type(&mut headers, "application/x-www-form-urlencoded".to_string());
            Some(encode_pairs(&options.form).into_bytes())
        } else {
            None
        };

        let mut request = HttpRequest {
            method,
            url,
            headers,
            body,
        };
        apply_body_transforms(&mut request, options);
        request
    }

    /// One round trip. Transport failures are returned as errors.
    pub fn try_dispatch(
        &self,
        method: HttpMethod,
        url: &str,
        options: &RequestOptions,
    ) -> Result<HttpResponse> {
        let request = self.prepare(method, url, options);
        debug!(method = %request.method, url = %request.url, "dispatching request");
        let response = self.transport.execute(&request)?;
        check_status(response, &options.expected)
    }

    /// One round trip. A transport failure is logged and yields `Ok(None)`;
    /// an unexpected status is always an error.
    pub fn dispatch(
        &self,
        method: HttpMethod,
        url: &str,
        options: &RequestOptions,
    ) -> Result<Option<HttpResponse>> {
        match self.try_dispatch(method, url, options) {
            Ok(response) => Ok(Some(response)),
            Err(ApiError::Transport(reason)) => {
                warn!(%method, url, %reason, "request did not complete");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

fn set_content_type(headers: &mut Vec<(String, String)>, value: String) {
    if find_header(headers, "Content-Type").is_none() {
        headers.push(("Content-Type".to_string(), value));
    }
}

/// Pre-send rewrites of the serialized body.
fn apply_body_transforms(request: &mut HttpRequest, options: &RequestOptions) {
    let Some(form) = &options.multipart else {
        return;
    };
    let Some(filename) = form
        .part(UPLOAD_FIELD)
        .and_then(|part| part.filename.as_deref())
    else {
        return;
    };
    if is_ascii(filename) {
        return;
    }
    if let Some(body) = request.body.as_mut() {
        if rewrite_extended_filename(body, filename) {
            debug!(filename, "rewrote extended filename parameter");
        }
    }
}

/// Map a status outside `expected` to `ApiError::Http`.
pub fn check_status(response: HttpResponse, expected: &Expected) -> Result<HttpResponse> {
    if expected.contains(response.status) {
        return Ok(response);
    }
    Err(ApiError::Http {
        status: response.status,
        message: format!("Expected {}, but get {}", expected.describe(), response.status),
    })
}
