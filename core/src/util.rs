//! Small string helpers shared by the dispatcher and the resource wrappers.

use url::form_urlencoded;

/// Join a server address and an API path with exactly one `/` between them.
///
/// The path's own trailing slash is preserved, so `"/api2/repos/"` and
/// `"/api2/repos/abc"` keep the shape the server routes on.
pub fn url_join(server: &str, path: &str) -> String {
    let base = server.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    if path.is_empty() {
        return format!("{base}/");
    }
    format!("{base}/{path}")
}

pub fn is_absolute_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// Whether every character of `s` is in the ASCII range.
pub fn is_ascii(s: &str) -> bool {
    s.chars().all(|c| c.is_ascii())
}

/// `application/x-www-form-urlencoded` serialization of key/value pairs.
pub fn encode_pairs(pairs: &[(String, String)]) -> String {
    form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .finish()
}

/// Append encoded query pairs to `url`, respecting a query it already has.
pub fn with_query(url: &str, pairs: &[(String, String)]) -> String {
    if pairs.is_empty() {
        return url.to_string();
    }
    let sep = if url.contains('?') { '&' } else { '?' };
    format!("{url}{sep}{}", encode_pairs(pairs))
}

/// Join a repo directory and an entry name: `("/", "a")` gives `"/a"`.
pub fn join_path(dir: &str, name: &str) -> String {
    format!("{}/{}", dir.trim_end_matches('/'), name.trim_start_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_relative_path() {
        assert_eq!(
            url_join("https://example.com", "/api2/repos/"),
            "https://example.com/api2/repos/"
        );
    }

    #[test]
    fn join_collapses_duplicate_slashes() {
        assert_eq!(
            url_join("https://example.com/", "/api2/repos/"),
            "https://example.com/api2/repos/"
        );
        assert_eq!(
            url_join("https://example.com//", "api2/ping/"),
            "https://example.com/api2/ping/"
        );
    }

    #[test]
    fn join_keeps_server_path_prefix() {
        assert_eq!(
            url_join("https://example.com/seafile", "/api2/repos/abc"),
            "https://example.com/seafile/api2/repos/abc"
        );
    }

    #[test]
    fn join_empty_path() {
        assert_eq!(url_join("https://example.com", ""), "https://example.com/");
    }

    #[test]
    fn absolute_url_detection() {
        assert!(is_absolute_url("https://example.com/x"));
        assert!(is_absolute_url("http://localhost:8000/"));
        assert!(!is_absolute_url("/api2/repos/"));
        assert!(!is_absolute_url("httpbin/api"));
    }

    #[test]
    fn ascii_predicate() {
        assert!(is_ascii("report-2024.txt"));
        assert!(is_ascii(""));
        assert!(!is_ascii("résumé.txt"));
        assert!(!is_ascii("文件.txt"));
    }

    #[test]
    fn query_is_form_encoded() {
        let pairs = vec![("p".to_string(), "/docs/a b.md".to_string())];
        assert_eq!(
            with_query("https://h/api2/repos/x/dir/", &pairs),
            "https://h/api2/repos/x/dir/?p=%2Fdocs%2Fa+b.md"
        );
    }

    #[test]
    fn query_appends_to_existing() {
        let pairs = vec![("ret-json".to_string(), "1".to_string())];
        assert_eq!(with_query("https://h/u?a=1", &pairs), "https://h/u?a=1&ret-json=1");
        assert_eq!(with_query("https://h/u", &[]), "https://h/u");
    }

    #[test]
    fn repo_path_join() {
        assert_eq!(join_path("/", "a.txt"), "/a.txt");
        assert_eq!(join_path("/docs/", "a.txt"), "/docs/a.txt");
        assert_eq!(join_path("/docs", "/a.txt"), "/docs/a.txt");
    }
}
