use std::{sync::Arc, time::Duration};

use async_trait::async_trait;

use crate::{
    errors::Error,
    links::{host_of, CandidateLink, HostSet, ResolvedLink},
    Result,
};

/// Expands one shortlink to its final destination.
///
/// Kept behind a trait so the network call can be swapped out in tests.
#[async_trait]
pub trait ShortLinkExpander: Send + Sync {
    async fn expand(&self, url: &str) -> Result<String>;
}

/// Follows redirects with a HEAD request; no body is transferred.
#[derive(Clone, Debug)]
pub struct HttpExpander {
    http: reqwest::Client,
}

impl HttpExpander {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| Error::Config(format!("failed to build http client: {e}")))?;
        Ok(Self { http })
    }
}

#[async_trait]
impl ShortLinkExpander for HttpExpander {
    async fn expand(&self, url: &str) -> Result<String> {
        let resp = self
            .http
            .head(url)
            .send()
            .await
            .map_err(|e| Error::Resolve(format!("{url}: {e}")))?;

        let status = resp.status();
        let final_url = resp.url().to_string();
        let redirected = final_url.trim_end_matches('/') != url.trim_end_matches('/');

        // Marketplaces often reject HEAD on the landing page; the location we
        // were redirected to is still the answer.
        if !status.is_success() && !redirected {
            return Err(Error::Resolve(format!("{url}: status {status}")));
        }
        Ok(final_url)
    }
}

/// Turns candidates into canonical URLs; only shortlinks touch the network.
#[derive(Clone)]
pub struct LinkResolver {
    hosts: HostSet,
    expander: Arc<dyn ShortLinkExpander>,
}

impl LinkResolver {
    pub fn new(hosts: HostSet, expander: Arc<dyn ShortLinkExpander>) -> Self {
        Self { hosts, expander }
    }

    pub fn is_shortlink(&self, url: &str) -> bool {
        host_of(url).is_some_and(|h| self.hosts.is_shortener_host(&h))
    }

    /// Never fails: any expansion error falls back to the original string.
    pub async fn resolve(&self, link: CandidateLink) -> ResolvedLink {
        if !self.is_shortlink(&link.original) {
            let canonical_url = link.original.clone();
            return ResolvedLink {
                link,
                canonical_url,
            };
        }

        let target = request_target(&link.original);
        let canonical_url = match self.expander.expand(target).await {
            Ok(expanded) if url::Url::parse(&expanded).is_ok() => {
                tracing::info!(short = %link.original, long = %expanded, "expanded shortlink");
                expanded
            }
            Ok(expanded) => {
                tracing::warn!(short = %link.original, "shortlink expanded to unparsable url {expanded:?}");
                link.original.clone()
            }
            Err(e) => {
                tracing::warn!(short = %link.original, "keeping shortlink as-is: {e}");
                link.original.clone()
            }
        };

        ResolvedLink {
            link,
            canonical_url,
        }
    }
}

/// Shortlinks are requested with one trailing `/` removed.
fn request_target(url: &str) -> &str {
    url.strip_suffix('/').unwrap_or(url)
}

#[cfg(test)]
pub(crate) mod fakes {
    use std::{collections::HashMap, sync::Mutex};

    use super::*;

    /// Answers from a fixed table; unknown URLs fail like a DNS error would.
    #[derive(Default)]
    pub struct TableExpander {
        pub table: HashMap<String, String>,
        pub calls: Mutex<Vec<String>>,
    }

    impl TableExpander {
        pub fn with(pairs: &[(&str, &str)]) -> Self {
            Self {
                table: pairs
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ShortLinkExpander for TableExpander {
        async fn expand(&self, url: &str) -> Result<String> {
            self.calls.lock().unwrap().push(url.to_string());
            self.table
                .get(url)
                .cloned()
                .ok_or_else(|| Error::Resolve(format!("{url}: no such host")))
        }
    }
}
