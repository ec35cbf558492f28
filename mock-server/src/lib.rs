use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::{error, info};
use uuid::Uuid;

pub const TEST_USERNAME: &str = "alice@example.com";
pub const TEST_PASSWORD: &str = "secret";
pub const TEST_TOKEN: &str = "0123456789abcdef0123456789abcdef01234567";

/// Credentials the fake server accepts and the token it hands out.
#[derive(Clone, Debug)]
pub struct MockConfig {
    pub username: String,
    pub password: String,
    pub token: String,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            username: TEST_USERNAME.to_string(),
            password: TEST_PASSWORD.to_string(),
            token: TEST_TOKEN.to_string(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RepoJson {
    pub id: String,
    pub name: String,
    pub owner: String,
    pub size: u64,
    pub encrypted: bool,
    #[serde(rename = "type")]
    pub repo_type: String,
}

#[derive(Clone, Debug)]
pub struct StoredFile {
    pub id: String,
    pub data: Vec<u8>,
}

#[derive(Clone, Debug)]
pub struct MockRepo {
    pub info: RepoJson,
    /// Directory path -> directory id. `/` always exists.
    pub dirs: BTreeMap<String, String>,
    pub files: BTreeMap<String, StoredFile>,
}

impl MockRepo {
    fn new(name: &str, owner: &str, encrypted: bool) -> Self {
        let mut dirs = BTreeMap::new();
        dirs.insert("/".to_string(), new_id());
        Self {
            info: RepoJson {
                id: Uuid::new_v4().to_string(),
                name: name.to_string(),
                owner: owner.to_string(),
                size: 0,
                encrypted,
                repo_type: "repo".to_string(),
            },
            dirs,
            files: BTreeMap::new(),
        }
    }

    fn info(&self) -> RepoJson {
        let mut info = self.info.clone();
        info.size = self.files.values().map(|f| f.data.len() as u64).sum();
        info
    }

    fn entries(&self, dir: &str) -> Vec<Value> {
        let dirs = self
            .dirs
            .iter()
            .filter(|(path, _)| path.as_str() != "/" && parent_of(path) == dir)
            .map(|(path, id)| json!({"type": "dir", "id": id, "name": base_name(path), "mtime": 0}));
        let files = self
            .files
            .iter()
            .filter(|(path, _)| parent_of(path) == dir)
            .map(|(path, file)| {
                json!({
                    "type": "file",
                    "id": file.id,
                    "name": base_name(path),
                    "size": file.data.len(),
                    "mtime": 0,
                })
            });
        dirs.chain(files).collect()
    }
}

pub struct AppState {
    config: MockConfig,
    repos: RwLock<HashMap<String, MockRepo>>,
}

pub type Db = Arc<AppState>;

type Failure = (StatusCode, Json<Value>);

pub fn app() -> Router {
    app_with(MockConfig::default())
}

pub fn app_with(config: MockConfig) -> Router {
    let db: Db = Arc::new(AppState {
        config,
        repos: RwLock::new(HashMap::new()),
    });
    Router::new()
        .route("/api2/auth-token/", post(auth_token))
        .route("/api2/ping/", get(ping))
        .route("/api2/auth/ping/", get(auth_ping))
        .route("/api2/repos/", get(list_repos).post(create_repo))
        .route("/api2/repos/{id}/", get(get_repo).delete(delete_repo))
        .route("/api2/repos/{id}/dir/", get(list_dir).post(make_dir))
        .route("/api2/repos/{id}/file/", get(download_link).delete(delete_file))
        .route("/api2/repos/{id}/file/detail/", get(file_detail))
        .route("/api2/repos/{id}/upload-link/", get(upload_link))
        .route("/upload-api/{id}", post(upload))
        .route("/seafhttp/files/{file_id}", get(download))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

pub async fn run_with(listener: TcpListener, config: MockConfig) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with(config)).await
}

#[derive(Deserialize)]
struct PathQuery {
    p: Option<String>,
}

impl PathQuery {
    fn path(&self) -> String {
        normalize(self.p.as_deref().unwrap_or("/"))
    }
}

async fn auth_token(State(db): State<Db>, Form(form): Form<HashMap<String, String>>) -> Response {
    match (form.get("username"), form.get("password")) {
        (Some(username), Some(password))
            if *username == db.config.username && *password == db.config.password =>
        {
            info!(%username, "issued token");
            Json(json!({ "token": db.config.token })).into_response()
        }
        (Some(_), Some(_)) => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "non_field_errors": ["Unable to login with provided credentials."] })),
        )
            .into_response(),
        _ => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "username": ["This field is required."] })),
        )
            .into_response(),
    }
}

async fn ping() -> Json<&'static str> {
    Json("pong")
}

async fn auth_ping(State(db): State<Db>, headers: HeaderMap) -> Result<Json<&'static str>, Failure> {
    authorize(&db, &headers)?;
    Ok(Json("pong"))
}

async fn list_repos(State(db): State<Db>, headers: HeaderMap) -> Result<Json<Vec<RepoJson>>, Failure> {
    authorize(&db, &headers)?;
    let repos = db.repos.read().await;
    let mut infos: Vec<RepoJson> = repos.values().map(MockRepo::info).collect();
    infos.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(Json(infos))
}

async fn create_repo(
    State(db): State<Db>,
    headers: HeaderMap,
    Form(form): Form<HashMap<String, String>>,
) -> Result<Json<Value>, Failure> {
    authorize(&db, &headers)?;
    let name = form
        .get("name")
        .filter(|n| !n.is_empty())
        .ok_or_else(|| failure(StatusCode::BAD_REQUEST, "Library name is required."))?;
    let repo = MockRepo::new(name, &db.config.username, form.contains_key("passwd"));
    let id = repo.info.id.clone();
    db.repos.write().await.insert(id.clone(), repo);
    Ok(Json(json!({ "repo_id": id, "repo_name": name })))
}

async fn get_repo(
    State(db): State<Db>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<RepoJson>, Failure> {
    authorize(&db, &headers)?;
    let repos = db.repos.read().await;
    let repo = repos.get(&id).ok_or_else(repo_not_found)?;
    Ok(Json(repo.info()))
}

async fn delete_repo(
    State(db): State<Db>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<&'static str>, Failure> {
    authorize(&db, &headers)?;
    db.repos
        .write()
        .await
        .remove(&id)
        .map(|_| Json("success"))
        .ok_or_else(repo_not_found)
}

async fn list_dir(
    State(db): State<Db>,
    Path(id): Path<String>,
    Query(query): Query<PathQuery>,
    headers: HeaderMap,
) -> Result<Response, Failure> {
    authorize(&db, &headers)?;
    let path = query.path();
    let repos = db.repos.read().await;
    let repo = repos.get(&id).ok_or_else(repo_not_found)?;
    let dir_id = repo
        .dirs
        .get(&path)
        .cloned()
        .ok_or_else(|| failure(StatusCode::NOT_FOUND, &format!("Folder {path} not found.")))?;
    Ok(([("oid", dir_id)], Json(repo.entries(&path))).into_response())
}

async fn make_dir(
    State(db): State<Db>,
    Path(id): Path<String>,
    Query(query): Query<PathQuery>,
    headers: HeaderMap,
    Form(form): Form<HashMap<String, String>>,
) -> Result<(StatusCode, Json<&'static str>), Failure> {
    authorize(&db, &headers)?;
    if form.get("operation").map(String::as_str) != Some("mkdir") {
        return Err(failure(StatusCode::BAD_REQUEST, "operation invalid."));
    }
    let path = query.path();
    let mut repos = db.repos.write().await;
    let repo = repos.get_mut(&id).ok_or_else(repo_not_found)?;
    if !repo.dirs.contains_key(parent_of(&path)) {
        return Err(failure(StatusCode::BAD_REQUEST, "Parent dir doesn't exist."));
    }
    repo.dirs.entry(path).or_insert_with(new_id);
    Ok((StatusCode::CREATED, Json("success")))
}

async fn file_detail(
    State(db): State<Db>,
    Path(id): Path<String>,
    Query(query): Query<PathQuery>,
    headers: HeaderMap,
) -> Result<Json<Value>, Failure> {
    authorize(&db, &headers)?;
    let path = query.path();
    let repos = db.repos.read().await;
    let repo = repos.get(&id).ok_or_else(repo_not_found)?;
    let file = repo.files.get(&path).ok_or_else(file_not_found)?;
    Ok(Json(json!({
        "type": "file",
        "id": file.id,
        "name": base_name(&path),
        "size": file.data.len(),
        "mtime": 0,
    })))
}

async fn download_link(
    State(db): State<Db>,
    Path(id): Path<String>,
    Query(query): Query<PathQuery>,
    headers: HeaderMap,
) -> Result<Json<String>, Failure> {
    authorize(&db, &headers)?;
    let path = query.path();
    let repos = db.repos.read().await;
    let repo = repos.get(&id).ok_or_else(repo_not_found)?;
    let file = repo.files.get(&path).ok_or_else(file_not_found)?;
    Ok(Json(format!("http://{}/seafhttp/files/{}", host(&headers), file.id)))
}

async fn delete_file(
    State(db): State<Db>,
    Path(id): Path<String>,
    Query(query): Query<PathQuery>,
    headers: HeaderMap,
) -> Result<Json<&'static str>, Failure> {
    authorize(&db, &headers)?;
    let path = query.path();
    let mut repos = db.repos.write().await;
    let repo = repos.get_mut(&id).ok_or_else(repo_not_found)?;
    repo.files.remove(&path).ok_or_else(file_not_found)?;
    Ok(Json("success"))
}

async fn upload_link(
    State(db): State<Db>,
    Path(id): Path<String>,
    Query(query): Query<PathQuery>,
    headers: HeaderMap,
) -> Result<Json<String>, Failure> {
    authorize(&db, &headers)?;
    let path = query.path();
    let repos = db.repos.read().await;
    let repo = repos.get(&id).ok_or_else(repo_not_found)?;
    if !repo.dirs.contains_key(&path) {
        return Err(failure(StatusCode::NOT_FOUND, &format!("Folder {path} not found.")));
    }
    Ok(Json(format!("http://{}/upload-api/{id}", host(&headers))))
}

/// Accepts only a literal `filename="..."` on the `file` part, like Seahub's
/// upload handler; an RFC 5987 `filename*=` parameter is rejected.
async fn upload(
    State(db): State<Db>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<String, Failure> {
    let boundary = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split_once("boundary="))
        .map(|(_, b)| b.trim_matches('"').to_string())
        .ok_or_else(|| failure(StatusCode::BAD_REQUEST, "Invalid multipart body."))?;
    let parts = parse_multipart(&body, &boundary);

    let parent_dir = parts
        .iter()
        .find(|p| p.name == "parent_dir")
        .map(|p| normalize(&String::from_utf8_lossy(&p.data)))
        .ok_or_else(|| failure(StatusCode::BAD_REQUEST, "Invalid URL."))?;
    let file = parts
        .iter()
        .find(|p| p.name == "file")
        .ok_or_else(|| failure(StatusCode::BAD_REQUEST, "No file uploaded."))?;
    let Some(filename) = file.filename.clone() else {
        if file.extended_filename {
            error!("upload rejected: only an extended filename* parameter was sent");
        }
        return Err(failure(StatusCode::BAD_REQUEST, "Invalid filename."));
    };

    let mut repos = db.repos.write().await;
    let repo = repos.get_mut(&id).ok_or_else(repo_not_found)?;
    if !repo.dirs.contains_key(&parent_dir) {
        return Err(failure(StatusCode::BAD_REQUEST, "Parent dir doesn't exist."));
    }
    let file_id = new_id();
    repo.files.insert(
        join(&parent_dir, &filename),
        StoredFile {
            id: file_id.clone(),
            data: file.data.clone(),
        },
    );
    info!(repo = %id, %parent_dir, %filename, "stored upload");
    Ok(file_id)
}

async fn download(State(db): State<Db>, Path(file_id): Path<String>) -> Result<Vec<u8>, Failure> {
    let repos = db.repos.read().await;
    repos
        .values()
        .flat_map(|repo| repo.files.values())
        .find(|file| file.id == file_id)
        .map(|file| file.data.clone())
        .ok_or_else(file_not_found)
}

fn authorize(db: &AppState, headers: &HeaderMap) -> Result<(), Failure> {
    let expected = format!("Token {}", db.config.token);
    match headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        Some(value) if value == expected => Ok(()),
        _ => Err((
            StatusCode::UNAUTHORIZED,
            Json(json!({ "detail": "Invalid token" })),
        )),
    }
}

fn failure(status: StatusCode, message: &str) -> Failure {
    (status, Json(json!({ "error_msg": message })))
}

fn repo_not_found() -> Failure {
    failure(StatusCode::NOT_FOUND, "Library not found.")
}

fn file_not_found() -> Failure {
    failure(StatusCode::NOT_FOUND, "File not found.")
}

fn host(headers: &HeaderMap) -> &str {
    headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost")
}

fn new_id() -> String {
    Uuid::new_v4().simple().to_string()
}

fn normalize(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}

fn parent_of(path: &str) -> &str {
    match path.rsplit_once('/') {
        Some(("", _)) | None => "/",
        Some((parent, _)) => parent,
    }
}

fn base_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

fn join(dir: &str, name: &str) -> String {
    format!("{}/{}", dir.trim_end_matches('/'), name)
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct FormPart {
    pub name: String,
    pub filename: Option<String>,
    pub extended_filename: bool,
    pub data: Vec<u8>,
}

/// Minimal `multipart/form-data` reader: enough for the client's own bodies.
pub fn parse_multipart(body: &[u8], boundary: &str) -> Vec<FormPart> {
    let delimiter = format!("--{boundary}");
    let mut parts = Vec::new();
    for chunk in split_bytes(body, delimiter.as_bytes()).into_iter().skip(1) {
        if chunk.starts_with(b"--") {
            break;
        }
        let chunk = chunk.strip_prefix(b"\r\n").unwrap_or(chunk);
        let Some(split) = find_bytes(chunk, b"\r\n\r\n") else {
            continue;
        };
        let head = String::from_utf8_lossy(&chunk[..split]);
        let data = &chunk[split + 4..];
        let data = data.strip_suffix(b"\r\n").unwrap_or(data);

        let mut part = FormPart {
            data: data.to_vec(),
            ..FormPart::default()
        };
        for line in head.lines() {
            let Some((name, value)) = line.split_once(':') else {
                continue;
            };
            if !name.trim().eq_ignore_ascii_case("content-disposition") {
                continue;
            }
            for param in value.split(';').map(str::trim) {
                if let Some(v) = param.strip_prefix("name=") {
                    part.name = unquote(v);
                } else if let Some(v) = param.strip_prefix("filename=") {
                    part.filename = Some(unquote(v));
                } else if param.starts_with("filename*=") {
                    part.extended_filename = true;
                }
            }
        }
        parts.push(part);
    }
    parts
}

fn unquote(value: &str) -> String {
    value.trim().trim_matches('"').replace("\\\"", "\"")
}

fn find_bytes(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn split_bytes<'a>(mut haystack: &'a [u8], delimiter: &[u8]) -> Vec<&'a [u8]> {
    let mut pieces = Vec::new();
    while let Some(at) = find_bytes(haystack, delimiter) {
        pieces.push(&haystack[..at]);
        haystack = &haystack[at + delimiter.len()..];
    }
    pieces.push(haystack);
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_literal_filename() {
        let body = b"--b\r\nContent-Disposition: form-data; name=\"parent_dir\"\r\n\r\n/\r\n\
--b\r\nContent-Disposition: form-data; name=\"file\"; filename=\"r\xc3\xa9sum\xc3\xa9.txt\"\r\n\
Content-Type: application/octet-stream\r\n\r\nhi\r\n--b--\r\n";
        let parts = parse_multipart(body, "b");
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].name, "parent_dir");
        assert_eq!(parts[0].data, b"/");
        assert_eq!(parts[1].filename.as_deref(), Some("résumé.txt"));
        assert_eq!(parts[1].data, b"hi");
    }

    #[test]
    fn flags_extended_filename() {
        let body = b"--b\r\nContent-Disposition: form-data; name=\"file\"; filename*=utf-8''r%C3%A9.txt\r\n\r\nx\r\n--b--\r\n";
        let parts = parse_multipart(body, "b");
        assert_eq!(parts.len(), 1);
        assert!(parts[0].filename.is_none());
        assert!(parts[0].extended_filename);
    }

    #[test]
    fn path_helpers() {
        assert_eq!(normalize("/docs/"), "/docs");
        assert_eq!(normalize("/"), "/");
        assert_eq!(parent_of("/a.txt"), "/");
        assert_eq!(parent_of("/docs/a.txt"), "/docs");
        assert_eq!(base_name("/docs/a.txt"), "a.txt");
        assert_eq!(join("/", "a.txt"), "/a.txt");
    }

    #[test]
    fn new_repo_has_root_dir() {
        let repo = MockRepo::new("Docs", TEST_USERNAME, false);
        assert!(repo.dirs.contains_key("/"));
        assert!(repo.entries("/").is_empty());
        assert_eq!(repo.info().size, 0);
    }
}
