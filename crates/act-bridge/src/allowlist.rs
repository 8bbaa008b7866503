//! Origin allowlist for navigation commands.
//!
//! A pure predicate over URLs. The set is seeded from configuration at
//! startup and union-extended by the authenticating extension; it never
//! shrinks within a process lifetime. Loopback hosts are always allowed by
//! the predicate itself and are not part of the configured set (the
//! extension carries its own loopback seeds).

use std::sync::RwLock;

use url::Url;

/// Hosts navigation may always target, independent of configuration.
const LOOPBACK_HOSTS: &[&str] = &["localhost", "127.0.0.1", "[::1]", "::1"];

/// Grow-only set of origin specs with a subdomain-aware match predicate.
pub struct OriginAllowlist {
    origins: RwLock<Vec<String>>,
}

impl OriginAllowlist {
    /// Seed the allowlist from configuration.
    pub fn new(seed: Vec<String>) -> Self {
        let mut origins = Vec::new();
        for entry in seed {
            push_unique(&mut origins, entry);
        }
        Self {
            origins: RwLock::new(origins),
        }
    }

    /// Union-merge additional origins (handshake extension). Duplicates are
    /// collapsed; existing entries are never removed.
    pub fn extend(&self, additions: &[String]) {
        let mut origins = self.origins.write().expect("allowlist lock poisoned");
        for entry in additions {
            push_unique(&mut origins, entry.clone());
        }
    }

    /// Current configured + extended entries, in insertion order. This is
    /// the set echoed to the peer in `auth_result.allowedOrigins`.
    pub fn origins(&self) -> Vec<String> {
        self.origins.read().expect("allowlist lock poisoned").clone()
    }

    /// Whether a navigation target is permitted.
    ///
    /// Unparseable URLs are refused (fail closed). `file:` URLs are always
    /// allowed. Otherwise the URL's host must equal an entry's host or be a
    /// subdomain of it.
    pub fn is_allowed(&self, raw: &str) -> bool {
        let parsed = match Url::parse(raw.trim()) {
            Ok(u) => u,
            Err(_) => {
                tracing::warn!(url = raw, "navigation refused: unparseable URL");
                return false;
            }
        };

        if parsed.scheme() == "file" {
            return true;
        }

        let host = match parsed.host_str() {
            Some(h) => h.to_ascii_lowercase(),
            None => {
                tracing::warn!(url = raw, "navigation refused: URL has no host");
                return false;
            }
        };

        if LOOPBACK_HOSTS.contains(&host.as_str()) {
            return true;
        }

        let origins = self.origins.read().expect("allowlist lock poisoned");
        for entry in origins.iter() {
            if let Some(entry_host) = entry_host(entry) {
                if host == entry_host || host.ends_with(&format!(".{entry_host}")) {
                    return true;
                }
            }
        }

        tracing::warn!(url = raw, host = %host, "navigation refused: host not in allowlist");
        false
    }
}

fn push_unique(origins: &mut Vec<String>, entry: String) {
    let entry = entry.trim().to_string();
    if entry.is_empty() || origins.contains(&entry) {
        return;
    }
    origins.push(entry);
}

/// Extract the host of an allowlist entry, defaulting the scheme to
/// `https://` when the entry carries none. Entries that still fail to parse
/// match nothing.
fn entry_host(entry: &str) -> Option<String> {
    let candidate = if entry.contains("://") {
        entry.to_string()
    } else {
        format!("https://{entry}")
    };
    Url::parse(&candidate)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_ascii_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn allowlist(entries: &[&str]) -> OriginAllowlist {
        OriginAllowlist::new(entries.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn loopback_is_always_allowed() {
        let list = allowlist(&[]);
        assert!(list.is_allowed("http://localhost:3000/app"));
        assert!(list.is_allowed("http://127.0.0.1:8080/"));
        assert!(list.is_allowed("http://[::1]:9000/"));
    }

    #[test]
    fn file_urls_are_allowed() {
        let list = allowlist(&[]);
        assert!(list.is_allowed("file:///home/user/page.html"));
    }

    #[test]
    fn unlisted_hosts_are_refused() {
        let list = allowlist(&["localhost"]);
        assert!(!list.is_allowed("https://evil.example/"));
        assert!(!list.is_allowed("https://example.com/page"));
    }

    #[test]
    fn exact_host_match() {
        let list = allowlist(&["example.com"]);
        assert!(list.is_allowed("https://example.com/page?q=1"));
        assert!(list.is_allowed("http://example.com/"));
    }

    #[test]
    fn subdomains_match() {
        let list = allowlist(&["example.com"]);
        assert!(list.is_allowed("https://app.example.com/"));
        assert!(list.is_allowed("https://a.b.example.com/"));
        // A host that merely ends with the string is not a subdomain.
        assert!(!list.is_allowed("https://notexample.com/"));
    }

    #[test]
    fn entries_may_carry_a_scheme() {
        let list = allowlist(&["https://staging.example.com"]);
        assert!(list.is_allowed("https://staging.example.com/login"));
        assert!(list.is_allowed("https://api.staging.example.com/"));
        assert!(!list.is_allowed("https://example.com/"));
    }

    #[test]
    fn host_matching_is_case_insensitive() {
        let list = allowlist(&["Example.COM"]);
        assert!(list.is_allowed("https://EXAMPLE.com/"));
    }

    #[test]
    fn unparseable_urls_are_refused() {
        let list = allowlist(&["example.com"]);
        assert!(!list.is_allowed("not a url"));
        assert!(!list.is_allowed(""));
        assert!(!list.is_allowed("://missing"));
    }

    #[test]
    fn extend_unions_without_duplicates() {
        let list = allowlist(&["example.com"]);
        list.extend(&["example.com".into(), "other.org".into()]);
        list.extend(&["other.org".into()]);
        assert_eq!(list.origins(), vec!["example.com", "other.org"]);
        assert!(list.is_allowed("https://other.org/"));
    }

    #[test]
    fn the_set_never_shrinks() {
        let list = allowlist(&["example.com"]);
        list.extend(&["added.net".into()]);
        assert!(list.is_allowed("https://example.com/"));
        assert!(list.is_allowed("https://added.net/"));
        assert_eq!(list.origins().len(), 2);
    }

    #[test]
    fn empty_seed_reports_empty_origins() {
        let list = allowlist(&[]);
        assert!(list.origins().is_empty());
    }
}
