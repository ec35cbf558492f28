//! `multipart/form-data` bodies and the filename rewrite applied before send.
//!
//! # Design
//! Non-ASCII filenames are first serialized in the RFC 5987 extended form
//! (`filename*=utf-8''r%C3%A9sum%C3%A9.txt`), the way common HTTP clients do.
//! Seahub's upload parser ignores that parameter, so the dispatcher runs
//! [`rewrite_extended_filename`] over the finished body and turns it into a
//! quoted literal `filename="résumé.txt"` carrying raw UTF-8 bytes.

use std::sync::LazyLock;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use regex::bytes::{NoExpand, Regex};
use uuid::Uuid;

use crate::util::is_ascii;

/// RFC 5987 `attr-char` set: everything else is percent-encoded.
const ATTR_CHAR: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'!')
    .remove(b'#')
    .remove(b'$')
    .remove(b'&')
    .remove(b'+')
    .remove(b'-')
    .remove(b'.')
    .remove(b'^')
    .remove(b'_')
    .remove(b'`')
    .remove(b'|')
    .remove(b'~');

// Byte-wise `.` stops at `\n`, so the match runs to the end of the header line and
// swallows its `\r`.
static EXTENDED_FILENAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?-u)filename\*=.*").expect("filename pattern is valid"));

/// One field of a multipart form: plain text or a named file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    pub name: String,
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

/// A `multipart/form-data` body with a fixed boundary.
#[derive(Debug, Clone)]
pub struct Multipart {
    boundary: String,
    parts: Vec<Part>,
}

impl Default for Multipart {
    fn default() -> Self {
        Self::new()
    }
}

impl Multipart {
    pub fn new() -> Self {
        Self::with_boundary(Uuid::new_v4().simple().to_string())
    }

    pub fn with_boundary(boundary: impl Into<String>) -> Self {
        Self {
            boundary: boundary.into(),
            parts: Vec::new(),
        }
    }

    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parts.push(Part {
            name: name.into(),
            filename: None,
            content_type: None,
            data: value.into().into_bytes(),
        });
        self
    }

    pub fn file(
        mut self,
        name: impl Into<String>,
        filename: impl Into<String>,
        data: impl Into<Vec<u8>>,
    ) -> Self {
        self.parts.push(Part {
            name: name.into(),
            filename: Some(filename.into()),
            content_type: Some("application/octet-stream".to_string()),
            data: data.into(),
        });
        self
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    /// First part called `name`.
    pub fn part(&self, name: &str) -> Option<&Part> {
        self.parts.iter().find(|p| p.name == name)
    }

    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut body = Vec::new();
        for part in &self.parts {
            body.extend_from_slice(format!("--{}\r\n", self.boundary).as_bytes());
            body.extend_from_slice(content_disposition(part).as_bytes());
            body.extend_from_slice(b"\r\n");
            if let Some(content_type) = &part.content_type {
                body.extend_from_slice(format!("Content-Type: {content_type}\r\n").as_bytes());
            }
            body.extend_from_slice(b"\r\n");
            body.extend_from_slice(&part.data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        body
    }
}

fn content_disposition(part: &Part) -> String {
    let mut header = format!("Content-Disposition: form-data; name=\"{}\"", quote(&part.name));
    match &part.filename {
        Some(filename) if is_ascii(filename) => {
            header.push_str(&format!("; filename=\"{}\"", quote(filename)));
        }
        Some(filename) => {
            header.push_str(&format!(
                "; filename*=utf-8''{}",
                utf8_percent_encode(filename, ATTR_CHAR)
            ));
        }
        None => {}
    }
    header
}

fn quote(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Replace the first `filename*=...` parameter in `body` with a quoted
/// literal UTF-8 filename. Returns whether a replacement happened.
pub fn rewrite_extended_filename(body: &mut Vec<u8>, filename: &str) -> bool {
    if !EXTENDED_FILENAME.is_match(&body[..]) {
        return false;
    }
    let mut replacement = Vec::with_capacity(filename.len() + 12);
    replacement.extend_from_slice(b"filename=\"");
    replacement.extend_from_slice(filename.as_bytes());
    replacement.extend_from_slice(b"\"\r");
    let rewritten = EXTENDED_FILENAME
        .replacen(&body[..], 1, NoExpand(&replacement[..]))
        .into_owned();
    *body = rewritten;
    true
}
