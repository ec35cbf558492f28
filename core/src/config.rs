//! Connection parameters for a [`crate::SeafileClient`].

use std::env;
use std::fmt;
use std::time::Duration;

use url::Url;

use crate::error::{ApiError, Result};
use crate::transport::DEFAULT_TIMEOUT;

#[derive(Clone)]
pub struct ClientConfig {
    pub server: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Pre-issued token. When set, no token request is made.
    pub token: Option<String>,
    pub verify_ssl: bool,
    pub timeout: Duration,
}

impl ClientConfig {
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            username: None,
            password: None,
            token: None,
            verify_ssl: true,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn verify_ssl(mut self, verify: bool) -> Self {
        self.verify_ssl = verify;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Read `SEAFILE_SERVER`, `SEAFILE_USERNAME`, `SEAFILE_PASSWORD`,
    /// `SEAFILE_TOKEN` and `SEAFILE_VERIFY_SSL`.
    pub fn from_env() -> Result<Self> {
        let server = env::var("SEAFILE_SERVER")
            .map_err(|_| ApiError::Config("SEAFILE_SERVER is not set".to_string()))?;
        let verify_ssl = match env::var("SEAFILE_VERIFY_SSL") {
            Ok(raw) => parse_bool(&raw)?,
            Err(_) => true,
        };
        let config = Self {
            server,
            username: env::var("SEAFILE_USERNAME").ok(),
            password: env::var("SEAFILE_PASSWORD").ok(),
            token: env::var("SEAFILE_TOKEN").ok(),
            verify_ssl,
            timeout: DEFAULT_TIMEOUT,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let url = Url::parse(&self.server)
            .map_err(|e| ApiError::Config(format!("invalid server address {:?}: {e}", self.server)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ApiError::Config(format!(
                "server address must be http or https, got {}",
                url.scheme()
            )));
        }
        if self.token.is_none() && (self.username.is_none() || self.password.is_none()) {
            return Err(ApiError::Config(
                "username and password are required when no token is supplied".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_bool(raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ApiError::Config(format!("invalid boolean {other:?}"))),
    }
}

// Hand-written so secrets never end up in logs.
impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("server", &self.server)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("token", &self.token.as_ref().map(|_| "***"))
            .field("verify_ssl", &self.verify_ssl)
            .field("timeout", &self.timeout)
            .finish()
    }
}
