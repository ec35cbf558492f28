//! Files and directories inside a library.

use crate::client::SeafileClient;
use crate::error::Result;
use crate::http::HttpMethod;
use crate::request::RequestOptions;
use crate::transport::Transport;
use crate::types::{DirEntry, EntryType};
use crate::util::join_path;

/// A file inside a library, addressed by its absolute path.
pub struct SeafFile<'a, T> {
    client: &'a SeafileClient<T>,
    repo_id: String,
    path: String,
    id: String,
    size: u64,
}

impl<'a, T: Transport> SeafFile<'a, T> {
    pub fn new(
        client: &'a SeafileClient<T>,
        repo_id: impl Into<String>,
        path: impl Into<String>,
        id: impl Into<String>,
        size: u64,
    ) -> Self {
        Self {
            client,
            repo_id: repo_id.into(),
            path: path.into(),
            id: id.into(),
            size,
        }
    }

    pub fn repo_id(&self) -> &str {
        &self.repo_id
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    /// Download the file: fetch a one-time download link, then GET it.
    pub fn get_content(&self) -> Result<Vec<u8>> {
        let link: String = self
            .client
            .try_request(
                HttpMethod::Get,
                &format!("/api2/repos/{}/file/", self.repo_id),
                RequestOptions::new().query("p", &self.path),
            )?
            .json()?;
        let response = self
            .client
            .try_request(HttpMethod::Get, &link, RequestOptions::new())?;
        Ok(response.body)
    }

    pub fn delete(self) -> Result<()> {
        self.client.try_request(
            HttpMethod::Delete,
            &format!("/api2/repos/{}/file/", self.repo_id),
            RequestOptions::new().query("p", &self.path),
        )?;
        Ok(())
    }
}

/// A directory listing, loaded when the directory was looked up.
pub struct SeafDir<'a, T> {
    client: &'a SeafileClient<T>,
    repo_id: String,
    path: String,
    id: String,
    entries: Vec<DirEntry>,
}

impl<'a, T: Transport> SeafDir<'a, T> {
    pub fn new(
        client: &'a SeafileClient<T>,
        repo_id: impl Into<String>,
        path: impl Into<String>,
        id: impl Into<String>,
        entries: Vec<DirEntry>,
    ) -> Self {
        Self {
            client,
            repo_id: repo_id.into(),
            path: path.into(),
            id: id.into(),
            entries,
        }
    }

    pub fn repo_id(&self) -> &str {
        &self.repo_id
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Entries as listed when this directory was loaded.
    pub fn ls(&self) -> &[DirEntry] {
        &self.entries
    }

    pub fn files(&self) -> impl Iterator<Item = SeafFile<'a, T>> + '_ {
        self.entries
            .iter()
            .filter(|e| e.entry_type == EntryType::File)
            .map(|e| {
                SeafFile::new(
                    self.client,
                    self.repo_id.as_str(),
                    join_path(&self.path, &e.name),
                    e.id.as_str(),
                    e.size.unwrap_or(0),
                )
            })
    }

    /// Sub-directories. Their own entries are not loaded.
    pub fn dirs(&self) -> impl Iterator<Item = SeafDir<'a, T>> + '_ {
        self.entries
            .iter()
            .filter(|e| e.entry_type == EntryType::Dir)
            .map(|e| {
                SeafDir::new(
                    self.client,
                    self.repo_id.as_str(),
                    join_path(&self.path, &e.name),
                    e.id.as_str(),
                    Vec::new(),
                )
            })
    }
}
