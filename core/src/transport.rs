//! The I/O seam: something that turns an [`HttpRequest`] into an
//! [`HttpResponse`].
//!
//! # Design
//! Request construction stays deterministic and network free; only a
//! `Transport` touches the wire. [`UreqTransport`] is the blocking default.
//! Tests plug in an in-memory transport instead.

use std::io::Read;
use std::time::Duration;

use ureq::tls::TlsConfig;
use ureq::{Agent, RequestBuilder};

use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub trait Transport {
    /// Execute one round trip. Any response, whatever its status, is `Ok`;
    /// `Err` means no response was received.
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, ApiError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, ApiError> {
        (**self).execute(request)
    }
}

/// Blocking transport backed by a `ureq` agent.
///
/// Status codes are never turned into errors here; status validation belongs
/// to the dispatcher.
#[derive(Clone)]
pub struct UreqTransport {
    agent: Agent,
}

impl UreqTransport {
    pub fn new(verify_ssl: bool, timeout: Duration) -> Self {
        let tls = TlsConfig::builder()
            .disable_verification(!verify_ssl)
            .build();
        let agent = Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(timeout))
            .tls_config(tls)
            .build()
            .new_agent();
        Self { agent }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new(true, DEFAULT_TIMEOUT)
    }
}

impl Transport for UreqTransport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, ApiError> {
        let url = request.url.as_str();
        let body = request.body.as_deref();

        let result = match request.method {
            HttpMethod::Get => apply_headers(self.agent.get(url), request).call(),
            HttpMethod::Delete => match body {
                Some(bytes) => apply_headers(self.agent.delete(url), request)
                    .force_send_body()
                    .send(bytes),
                None => apply_headers(self.agent.delete(url), request).call(),
            },
            HttpMethod::Post => match body {
                Some(bytes) => apply_headers(self.agent.post(url), request).send(bytes),
                None => apply_headers(self.agent.post(url), request).send_empty(),
            },
            HttpMethod::Put => match body {
                Some(bytes) => apply_headers(self.agent.put(url), request).send(bytes),
                None => apply_headers(self.agent.put(url), request).send_empty(),
            },
        };
        let response = result.map_err(|e| ApiError::Transport(e.to_string()))?;

        let (parts, body) = response.into_parts();
        let headers = parts
            .headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();

        let mut bytes = Vec::new();
        body.into_reader()
            .read_to_end(&mut bytes)
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        Ok(HttpResponse {
            status: parts.status.as_u16(),
            headers,
            body: bytes,
        })
    }
}

fn apply_headers<B>(mut builder: RequestBuilder<B>, request: &HttpRequest) -> RequestBuilder<B> {
    for (name, value) in &request.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
}
