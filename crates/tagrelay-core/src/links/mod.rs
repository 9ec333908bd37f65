//! Affiliate link pipeline: extract → resolve → rewrite → splice.

use std::ops::Range;

use crate::config::Config;

pub mod extract;
pub mod pipeline;
pub mod resolve;
pub mod rewrite;

/// A link found in source text. `span` is a byte range into that text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CandidateLink {
    pub span: Range<usize>,
    pub original: String,
}

/// A candidate plus its post-redirect form. Equal to `original` when the link
/// is not a shortlink or resolution failed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedLink {
    pub link: CandidateLink,
    pub canonical_url: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TaggedUrl {
    pub resolved: ResolvedLink,
    pub tagged: String,
}

/// Source text with every candidate span replaced by its tagged URL.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RewriteResult {
    pub text: String,
    pub links: Vec<TaggedUrl>,
}

/// Marketplace and shortener host sets, shared by every pipeline stage.
#[derive(Clone, Debug)]
pub struct HostSet {
    pub marketplace_root: String,
    pub marketplace_tlds: Vec<String>,
    pub shortener_hosts: Vec<String>,
}

impl HostSet {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            marketplace_root: cfg.marketplace_root.clone(),
            marketplace_tlds: cfg.marketplace_tlds.clone(),
            shortener_hosts: cfg.shortener_hosts.clone(),
        }
    }

    /// `<root>.<tld>` or any subdomain of it, for a configured TLD.
    pub fn is_marketplace_host(&self, host: &str) -> bool {
        let host = normalize_host(host);
        self.marketplace_tlds.iter().any(|tld| {
            let domain = format!("{}.{tld}", self.marketplace_root);
            host == domain
                || host
                    .strip_suffix(domain.as_str())
                    .is_some_and(|sub| sub.ends_with('.'))
        })
    }

    pub fn is_shortener_host(&self, host: &str) -> bool {
        let host = normalize_host(host);
        let host = host.strip_prefix("www.").unwrap_or(&host);
        self.shortener_hosts.iter().any(|s| s == host)
    }
}

/// Lowercased host of an absolute URL, if it parses.
pub fn host_of(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    parsed.host_str().map(normalize_host)
}

fn normalize_host(host: &str) -> String {
    host.trim_end_matches('.').to_ascii_lowercase()
}


#[cfg(test)]
mod tests {
    use super::test_support::hosts;
    use super::*;

    #[test]
    fn marketplace_host_family() {
        let h = hosts();
        assert!(h.is_marketplace_host("www.amazon.in"));
        assert!(h.is_marketplace_host("amazon.in"));
        assert!(h.is_marketplace_host("smile.amazon.co.uk"));
        assert!(h.is_marketplace_host("WWW.AMAZON.COM."));
        assert!(h.is_marketplace_host("www.amazon.com.au"));

        assert!(!h.is_marketplace_host("evilamazon.in"));
        assert!(!h.is_marketplace_host("amazon.in.evil.example"));
        assert!(!h.is_marketplace_host("amazon.fr"));
        assert!(!h.is_marketplace_host("amzn.to"));
    }

    #[test]
    fn shortener_hosts_match_exactly() {
        let h = hosts();
        assert!(h.is_shortener_host("amzn.to"));
        assert!(h.is_shortener_host("www.amzn.to"));
        assert!(h.is_shortener_host("A.CO"));
        assert!(!h.is_shortener_host("xamzn.to"));
        assert!(!h.is_shortener_host("www.amazon.in"));
    }

    #[test]
    fn host_of_parses_absolute_urls_only() {
        assert_eq!(
            host_of("https://WWW.Amazon.in/dp/B000").as_deref(),
            Some("www.amazon.in")
        );
        assert_eq!(host_of("not a url"), None);
    }
}
