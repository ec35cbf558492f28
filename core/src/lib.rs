//! Blocking client for the Seafile (Seahub) `api2` HTTP API.
//!
//! # Overview
//! [`SeafileClient`] owns the server address and an auth token, and exposes
//! `get`/`post`/`put`/`delete`. Every call goes through one [`Dispatcher`],
//! which resolves the URL, injects `Authorization: Token <token>`, rewrites
//! non-ASCII upload filenames into a form Seahub accepts, and validates the
//! response status against the caller's [`Expected`] set.
//!
//! # Design
//! - Requests are built as plain data ([`HttpRequest`]) and executed by a
//!   [`Transport`]; [`UreqTransport`] is the blocking default.
//! - `get`/`post`/`put`/`delete` return `Ok(None)` when the request never
//!   completed; `try_request` returns the transport error instead.
//! - [`Repos`], [`Repo`], [`SeafDir`] and [`SeafFile`] borrow the client and
//!   only use its public request methods.

pub mod client;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod files;
pub mod http;
pub mod multipart;
pub mod repo;
pub mod request;
pub mod transport;
pub mod types;
pub mod util;

pub use client::{fetch_token, SeafileClient, AUTH_TOKEN_LEN};
pub use config::ClientConfig;
pub use dispatch::Dispatcher;
pub use error::{ApiError, Result};
pub use files::{SeafDir, SeafFile};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use multipart::Multipart;
pub use repo::{Repo, Repos};
pub use request::{Expected, RequestOptions};
pub use transport::{Transport, UreqTransport, DEFAULT_TIMEOUT};
pub use types::{DirEntry, EntryType, FileDetail, RepoInfo};
