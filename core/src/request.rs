//! Per-call options accepted by the verb methods of [`crate::SeafileClient`].

use crate::multipart::Multipart;

/// Status codes a call treats as success. Never empty; defaults to `{200}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expected(Vec<u16>);

impl Expected {
    pub fn contains(&self, status: u16) -> bool {
        self.0.contains(&status)
    }

    pub fn codes(&self) -> &[u16] {
        &self.0
    }

    /// `"200"`, `"200 or 201"`, ...
    pub fn describe(&self) -> String {
        self.0
            .iter()
            .map(u16::to_string)
            .collect::<Vec<_>>()
            .join(" or ")
    }

    fn from_codes(codes: &[u16]) -> Self {
        if codes.is_empty() {
            return Self::default();
        }
        Self(codes.to_vec())
    }
}

impl Default for Expected {
    fn default() -> Self {
        Self(vec![200])
    }
}

impl From<u16> for Expected {
    fn from(code: u16) -> Self {
        Self(vec![code])
    }
}

impl<const N: usize> From<[u16; N]> for Expected {
    fn from(codes: [u16; N]) -> Self {
        Self::from_codes(&codes)
    }
}

impl From<&[u16]> for Expected {
    fn from(codes: &[u16]) -> Self {
        Self::from_codes(codes)
    }
}

impl From<Vec<u16>> for Expected {
    fn from(codes: Vec<u16>) -> Self {
        Self::from_codes(&codes)
    }
}

/// Headers, query, body and expected statuses for one request.
///
/// A multipart body takes precedence over form pairs when both are set.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub headers: Vec<(String, String)>,
    pub query: Vec<(String, String)>,
    pub form: Vec<(String, String)>,
    pub multipart: Option<Multipart>,
    pub expected: Expected,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    pub fn form(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.form.push((name.into(), value.into()));
        self
    }

    pub fn multipart(mut self, form: Multipart) -> Self {
        self.multipart = Some(form);
        self
    }

    pub fn expected(mut self, expected: impl Into<Expected>) -> Self {
        self.expected = expected.into();
        self
    }
}
