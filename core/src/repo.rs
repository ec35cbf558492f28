//! Libraries ("repos") and the lookups inside them.
//!
//! Wrappers borrow the [`SeafileClient`] and go through its verb methods, so
//! they see exactly what any other caller of the dispatcher sees.

use crate::client::SeafileClient;
use crate::error::{ApiError, Result};
use crate::files::{SeafDir, SeafFile};
use crate::http::{HttpMethod, HttpResponse};
use crate::multipart::Multipart;
use crate::request::RequestOptions;
use crate::transport::Transport;
use crate::types::{CreateRepoResponse, DirEntry, FileDetail, RepoInfo};
use crate::util::join_path;

/// Entry point for library-level operations: `client.repos()`.
pub struct Repos<'a, T> {
    client: &'a SeafileClient<T>,
}

impl<'a, T: Transport> Repos<'a, T> {
    pub fn new(client: &'a SeafileClient<T>) -> Self {
        Self { client }
    }

    /// All libraries visible to the user, optionally filtered by type
    /// (`mine`, `shared`, `group`, ...).
    pub fn list_repos(&self, repo_type: Option<&str>) -> Result<Vec<Repo<'a, T>>> {
        let mut options = RequestOptions::new();
        if let Some(repo_type) = repo_type {
            options = options.query("type", repo_type);
        }
        let infos: Vec<RepoInfo> = self
            .client
            .try_request(HttpMethod::Get, "/api2/repos/", options)?
            .json()?;
        Ok(infos
            .into_iter()
            .map(|info| Repo::from_info(self.client, info))
            .collect())
    }

    pub fn get_repo(&self, repo_id: &str) -> Result<Repo<'a, T>> {
        let response = lookup(
            self.client,
            &format!("/api2/repos/{repo_id}/"),
            RequestOptions::new(),
            "The requested library does not exist",
        )?;
        Ok(Repo::from_info(self.client, response.json()?))
    }

    /// Create a library, encrypted when `password` is given.
    pub fn create_repo(&self, name: &str, password: Option<&str>) -> Result<Repo<'a, T>> {
        let mut options = RequestOptions::new().form("name", name);
        if let Some(password) = password {
            options = options.form("passwd", password);
        }
        let created: CreateRepoResponse = self
            .client
            .try_request(HttpMethod::Post, "/api2/repos/", options)?
            .json()?;
        self.get_repo(&created.repo_id)
    }
}

/// A single library.
pub struct Repo<'a, T> {
    client: &'a SeafileClient<T>,
    info: RepoInfo,
}

impl<'a, T: Transport> Repo<'a, T> {
    pub fn from_info(client: &'a SeafileClient<T>, info: RepoInfo) -> Self {
        Self { client, info }
    }

    pub fn id(&self) -> &str {
        &self.info.id
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn info(&self) -> &RepoInfo {
        &self.info
    }

    pub fn client(&self) -> &'a SeafileClient<T> {
        self.client
    }

    pub fn get_file(&self, path: &str) -> Result<SeafFile<'a, T>> {
        check_path(path)?;
        let response = lookup(
            self.client,
            &format!("/api2/repos/{}/file/detail/", self.id()),
            RequestOptions::new().query("p", path),
            "The requested file does not exist",
        )?;
        let detail: FileDetail = response.json()?;
        Ok(SeafFile::new(self.client, self.id(), path, detail.id, detail.size))
    }

    /// The directory at `path`; its id comes from the `oid` response header.
    pub fn get_dir(&self, path: &str) -> Result<SeafDir<'a, T>> {
        check_path(path)?;
        let response = lookup(
            self.client,
            &format!("/api2/repos/{}/dir/", self.id()),
            RequestOptions::new().query("p", path),
            "The requested dir does not exist",
        )?;
        let dir_id = response
            .header("oid")
            .ok_or_else(|| {
                ApiError::DeserializationError("dir listing without oid header".to_string())
            })?
            .to_string();
        let entries: Vec<DirEntry> = response.json()?;
        Ok(SeafDir::new(self.client, self.id(), path, dir_id, entries))
    }

    pub fn create_dir(&self, path: &str) -> Result<SeafDir<'a, T>> {
        check_path(path)?;
        self.client.try_request(
            HttpMethod::Post,
            &format!("/api2/repos/{}/dir/", self.id()),
            RequestOptions::new()
                .query("p", path)
                .form("operation", "mkdir")
                .expected(201),
        )?;
        self.get_dir(path)
    }

    /// Upload `data` as `parent_dir/filename`.
    ///
    /// Asks for an upload link first, then posts a multipart form to it.
    /// Non-ASCII filenames are rewritten by the dispatcher before sending.
    pub fn upload_file(
        &self,
        parent_dir: &str,
        filename: &str,
        data: impl Into<Vec<u8>>,
    ) -> Result<SeafFile<'a, T>> {
        check_path(parent_dir)?;
        let link: String = self
            .client
            .try_request(
                HttpMethod::Get,
                &format!("/api2/repos/{}/upload-link/", self.id()),
                RequestOptions::new().query("p", parent_dir),
            )?
            .json()?;

        let form = Multipart::new()
            .text("parent_dir", parent_dir)
            .file("file", filename, data);
        self.client
            .try_request(HttpMethod::Post, &link, RequestOptions::new().multipart(form))?;

        self.get_file(&join_path(parent_dir, filename))
    }

    /// Remove the library. Only its owner may do this.
    ///
    /// `Ok(false)` means the request never completed.
    pub fn delete(self) -> Result<bool> {
        let response = self
            .client
            .delete(&format!("/api2/repos/{}/", self.id()), RequestOptions::new())?;
        Ok(response.is_some())
    }
}

/// GET for a single resource. Only a 404 becomes `NotFound`; a transport
/// failure stays `ApiError::Transport`.
pub(crate) fn lookup<T: Transport>(
    client: &SeafileClient<T>,
    path: &str,
    options: RequestOptions,
    not_found: &str,
) -> Result<HttpResponse> {
    match client.try_get(path, options) {
        Err(e) if e.status() == Some(404) => Err(ApiError::NotFound(not_found.to_string())),
        other => other,
    }
}

pub(crate) fn check_path(path: &str) -> Result<()> {
    if !path.starts_with('/') {
        return Err(ApiError::InvalidPath(path.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::dispatch::tests::FakeTransport;

    const TOKEN: &str = "0123456789abcdef0123456789abcdef01234567";

    fn client(transport: &FakeTransport) -> SeafileClient<&FakeTransport> {
        let config = ClientConfig::new("https://cloud.example.com").token(TOKEN);
        SeafileClient::with_transport(config, transport).unwrap()
    }

    const REPO_JSON: &str = r#"{"id":"r1","name":"Docs","owner":"me@example.com","size":3}"#;

    #[test]
    fn list_repos_with_type_filter() {
        let transport = FakeTransport::with_responses(vec![(
            200,
            r#"[{"id":"r1","name":"Docs"},{"id":"r2","name":"Photos"}]"#,
        )]);
        let client = client(&transport);
        let repos = client.repos().list_repos(Some("mine")).unwrap();
        let names: Vec<_> = repos.iter().map(|r| r.name()).collect();
        assert_eq!(names, vec!["Docs", "Photos"]);
        assert_eq!(
            transport.last_request().url,
            "https://cloud.example.com/api2/repos/?type=mine"
        );
    }

    #[test]
    fn get_repo_not_found() {
        let transport = FakeTransport::with_responses(vec![(404, "")]);
        let client = client(&transport);
        let err = client.repos().get_repo("missing").err().unwrap();
        assert!(matches!(err, ApiError::NotFound(ref m) if m.contains("library")));
    }

    #[test]
    fn get_repo_without_response_is_transport_error() {
        let transport = FakeTransport::default();
        let client = client(&transport);
        let err = client.repos().get_repo("r1").err().unwrap();
        assert!(matches!(err, ApiError::Transport(_)));
    }

    #[test]
    fn get_repo_server_error_propagates() {
        let transport = FakeTransport::with_responses(vec![(500, "boom")]);
        let client = client(&transport);
        let err = client.repos().get_repo("r1").err().unwrap();
        assert!(matches!(err, ApiError::Http { status: 500, .. }));
    }

    #[test]
    fn create_repo_then_fetches_it() {
        let transport = FakeTransport::with_responses(vec![
            (200, r#"{"repo_id":"r1","repo_name":"Docs"}"#),
            (200, REPO_JSON),
        ]);
        let client = client(&transport);
        let repo = client.repos().create_repo("Docs", Some("pw")).unwrap();
        assert_eq!(repo.id(), "r1");
        assert_eq!(repo.info().owner, "me@example.com");

        let requests = transport.requests.lock().unwrap();
        assert_eq!(requests[0].method, HttpMethod::Post);
        assert_eq!(requests[0].body.as_deref(), Some(&b"name=Docs&passwd=pw"[..]));
        assert_eq!(requests[1].url, "https://cloud.example.com/api2/repos/r1/");
    }

    #[test]
    fn get_file_requires_absolute_path() {
        let transport = FakeTransport::default();
        let client = client(&transport);
        let repo = Repo::from_info(&client, serde_json::from_str(REPO_JSON).unwrap());
        let err = repo.get_file("notes.txt").err().unwrap();
        assert!(matches!(err, ApiError::InvalidPath(_)));
        assert!(transport.requests.lock().unwrap().is_empty());
    }

    #[test]
    fn get_file_reads_detail() {
        let transport =
            FakeTransport::with_responses(vec![(200, r#"{"id":"f1","name":"a.txt","size":5}"#)]);
        let client = client(&transport);
        let repo = Repo::from_info(&client, serde_json::from_str(REPO_JSON).unwrap());
        let file = repo.get_file("/docs/a.txt").unwrap();
        assert_eq!(file.id(), "f1");
        assert_eq!(file.size(), 5);
        assert_eq!(file.name(), "a.txt");
        assert_eq!(
            transport.last_request().url,
            "https://cloud.example.com/api2/repos/r1/file/detail/?p=%2Fdocs%2Fa.txt"
        );
    }

    #[test]
    fn get_dir_uses_oid_header() {
        let transport = FakeTransport::default();
        transport.push(HttpResponse {
            status: 200,
            headers: vec![("oid".to_string(), "d42".to_string())],
            body: br#"[{"type":"file","id":"f1","name":"a.txt","size":1}]"#.to_vec(),
        });
        let client = client(&transport);
        let repo = Repo::from_info(&client, serde_json::from_str(REPO_JSON).unwrap());
        let dir = repo.get_dir("/").unwrap();
        assert_eq!(dir.id(), "d42");
        assert_eq!(dir.ls().len(), 1);
    }

    #[test]
    fn get_dir_without_oid_is_rejected() {
        let transport = FakeTransport::with_responses(vec![(200, "[]")]);
        let client = client(&transport);
        let repo = Repo::from_info(&client, serde_json::from_str(REPO_JSON).unwrap());
        let err = repo.get_dir("/").err().unwrap();
        assert!(matches!(err, ApiError::DeserializationError(_)));
    }

    #[test]
    fn upload_posts_multipart_to_link() {
        let transport = FakeTransport::with_responses(vec![
            (200, r#""https://upload.example.com/upload-api/tok""#),
            (200, "f1"),
            (200, r#"{"id":"f1","name":"résumé.txt","size":2}"#),
        ]);
        let client = client(&transport);
        let repo = Repo::from_info(&client, serde_json::from_str(REPO_JSON).unwrap());
        let file = repo.upload_file("/", "résumé.txt", b"hi".to_vec()).unwrap();
        assert_eq!(file.path(), "/résumé.txt");

        let requests = transport.requests.lock().unwrap();
        assert_eq!(
            requests[0].url,
            "https://cloud.example.com/api2/repos/r1/upload-link/?p=%2F"
        );
        assert_eq!(requests[1].url, "https://upload.example.com/upload-api/tok");
        let body = String::from_utf8(requests[1].body.clone().unwrap()).unwrap();
        assert!(body.contains("name=\"file\"; filename=\"résumé.txt\"\r\n"));
        assert!(!body.contains("filename*="));
    }

    #[test]
    fn delete_reports_completion() {
        let transport = FakeTransport::with_responses(vec![(200, "\"success\"")]);
        let client = client(&transport);
        let repo = Repo::from_info(&client, serde_json::from_str(REPO_JSON).unwrap());
        assert!(repo.delete().unwrap());
        assert_eq!(transport.last_request().method, HttpMethod::Delete);

        let repo = Repo::from_info(&client, serde_json::from_str(REPO_JSON).unwrap());
        assert!(!repo.delete().unwrap());
    }
}
