//! Wire DTOs of the Seahub `api2` endpoints.
//!
//! Only the fields the resource wrappers read are declared; serde ignores the
//! rest, so server upgrades that add fields do not break parsing.

use serde::{Deserialize, Serialize};

/// Body of a successful `POST /api2/auth-token/`.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub token: String,
}

/// A library as returned by `GET /api2/repos/` and `GET /api2/repos/<id>/`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RepoInfo {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub desc: String,
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub mtime: i64,
    #[serde(default)]
    pub encrypted: bool,
    #[serde(default)]
    pub permission: Option<String>,
}

/// Body of `POST /api2/repos/`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateRepoResponse {
    pub repo_id: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    File,
    Dir,
}

/// One item of a directory listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DirEntry {
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub mtime: Option<i64>,
}

/// Body of `GET /api2/repos/<id>/file/detail/`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileDetail {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub size: u64,
    #[serde(default)]
    pub mtime: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repo_info_ignores_unknown_fields() {
        let repo: RepoInfo = serde_json::from_str(
            r#"{"id":"r1","name":"Docs","size":12,"type":"repo","virtual":false,"encrypted":false}"#,
        )
        .unwrap();
        assert_eq!(repo.id, "r1");
        assert_eq!(repo.size, 12);
        assert_eq!(repo.desc, "");
    }

    #[test]
    fn dir_entry_type_field() {
        let entries: Vec<DirEntry> = serde_json::from_str(
            r#"[{"type":"dir","id":"d1","name":"sub","mtime":1},
                {"type":"file","id":"f1","name":"a.txt","size":3,"mtime":2}]"#,
        )
        .unwrap();
        assert_eq!(entries[0].entry_type, EntryType::Dir);
        assert_eq!(entries[0].size, None);
        assert_eq!(entries[1].entry_type, EntryType::File);
        assert_eq!(entries[1].size, Some(3));
    }

    #[test]
    fn token_defaults_to_empty() {
        let resp: TokenResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(resp.token, "");
    }
}
