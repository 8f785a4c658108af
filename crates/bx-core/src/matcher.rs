//! Page URL matching
//!
//! Matching is plain substring containment against three views of the page
//! URL. It is intentionally loose: `a.com` also matches `data.com/` and
//! `https://x.com/?ref=a.com`. Unparsable URLs never match.

use url::Url;

use crate::types::{BlockList, BlockPattern};

/// Check a single page URL against a single stored pattern.
pub fn is_url_blocked(url: &str, pattern: &str) -> bool {
    let parsed = match Url::parse(url) {
        Ok(parsed) => parsed,
        Err(_) => return false,
    };

    let host = parsed.host_str().unwrap_or("");
    let path = parsed.path();

    let full_path = format!("{}{}", host, path);
    if full_path.contains(pattern) {
        return true;
    }

    let clean_host = host.strip_prefix("www.").unwrap_or(host);
    let clean_full_path = format!("{}{}", clean_host, path);
    if clean_full_path.contains(pattern) {
        return true;
    }

    url.contains(pattern)
}

/// Return the first pattern in list order that blocks `url`.
pub fn find_match<'a>(url: &str, list: &'a BlockList) -> Option<&'a BlockPattern> {
    let hit = list.iter().find(|p| is_url_blocked(url, p.as_str()));
    match hit {
        Some(pattern) => log::debug!("{} blocked by pattern {}", url, pattern),
        None => log::debug!("{} not blocked ({} patterns)", url, list.len()),
    }
    hit
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_match() {
        assert!(is_url_blocked("https://example.com/", "example.com"));
        assert!(is_url_blocked("https://sub.example.com/x", "example.com"));
        assert!(!is_url_blocked("https://example.org/", "example.com"));
    }

    #[test]
    fn test_www_stripped() {
        assert!(is_url_blocked("https://www.example.com/path/x", "example.com/path"));
        assert!(is_url_blocked("https://www.example.com/", "example.com/"));
    }

    #[test]
    fn test_www_pattern_needs_www_url() {
        assert!(is_url_blocked("https://www.youtube.com/", "www.youtube.com"));
        assert!(!is_url_blocked("https://youtube.com/", "www.youtube.com"));
    }

    #[test]
    fn test_raw_url_containment() {
        // query strings only show up in the raw URL
        assert!(is_url_blocked("https://other.org/?next=a.com", "a.com"));
    }

    #[test]
    fn test_path_pattern() {
        assert!(is_url_blocked("https://reddit.com/r/all/top", "reddit.com/r/all"));
        assert!(!is_url_blocked("https://reddit.com/r/rust", "reddit.com/r/all"));
    }

    #[test]
    fn test_unparsable_url_is_allowed() {
        assert!(!is_url_blocked("not a url", "not"));
        assert!(!is_url_blocked("", ""));
        assert!(!is_url_blocked("://example.com", "example.com"));
    }

    #[test]
    fn test_find_match_in_order() {
        let list = BlockList::from_stored(vec!["b.com".into(), "a.com/x".into(), "a.com".into()]);
        let hit = find_match("https://a.com/x/y", &list).unwrap();
        assert_eq!(hit.as_str(), "a.com/x");
        assert!(find_match("https://c.com/", &list).is_none());
    }
}
