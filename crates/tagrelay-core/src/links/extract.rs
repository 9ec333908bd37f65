use regex::Regex;

use crate::{
    errors::Error,
    links::{CandidateLink, HostSet},
    Result,
};

/// Finds marketplace and shortener links in free text.
///
/// Grammar: `http(s)://`, optional `www.`, then either any subdomain chain
/// under `<root>.<tld>` or a shortener host, then `/` and everything up to the
/// next whitespace. Punctuation glued to the end of a URL is part of the match.
#[derive(Clone, Debug)]
pub struct LinkExtractor {
    pattern: Regex,
}

impl LinkExtractor {
    pub fn new(hosts: &HostSet) -> Result<Self> {
        let mut tlds: Vec<&str> = hosts.marketplace_tlds.iter().map(String::as_str).collect();
        // Longest first so `com.au` is preferred over `com` when both are listed.
        tlds.sort_by_key(|t| std::cmp::Reverse(t.len()));
        let tlds = tlds
            .into_iter()
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join("|");

        let mut host_alts = vec![format!(
            r"(?:[a-z0-9-]+\.)*{}\.(?:{tlds})",
            regex::escape(&hosts.marketplace_root)
        )];
        host_alts.extend(hosts.shortener_hosts.iter().map(|h| regex::escape(h)));

        let pattern = format!(r"(?i)https?://(?:www\.)?(?:{})/\S*", host_alts.join("|"));
        let pattern = Regex::new(&pattern)
            .map_err(|e| Error::Config(format!("invalid link grammar: {e}")))?;
        Ok(Self { pattern })
    }

    /// Non-overlapping matches, left to right. Repeated URLs appear once per occurrence.
    pub fn extract(&self, text: &str) -> Vec<CandidateLink> {
        self.pattern
            .find_iter(text)
            .map(|m| CandidateLink {
                span: m.range(),
                original: m.as_str().to_string(),
            })
            .collect()
    }
}
