use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use futures::future::join_all;

use crate::{
    config::Config,
    links::{
        extract::LinkExtractor,
        resolve::{LinkResolver, ShortLinkExpander},
        rewrite::AffiliateRewriter,
        HostSet, ResolvedLink, RewriteResult, TaggedUrl,
    },
    Result,
};

/// Extractor, resolver and rewriter wired together with one affiliate tag.
#[derive(Clone)]
pub struct LinkPipeline {
    extractor: LinkExtractor,
    resolver: LinkResolver,
    rewriter: AffiliateRewriter,
    affiliate_tag: String,
}

impl LinkPipeline {
    pub fn new(cfg: &Config, expander: Arc<dyn ShortLinkExpander>) -> Result<Self> {
        Self::from_parts(HostSet::from_config(cfg), cfg.affiliate_tag.clone(), expander)
    }

    pub fn from_parts(
        hosts: HostSet,
        affiliate_tag: String,
        expander: Arc<dyn ShortLinkExpander>,
    ) -> Result<Self> {
        Ok(Self {
            extractor: LinkExtractor::new(&hosts)?,
            resolver: LinkResolver::new(hosts.clone(), expander),
            rewriter: AffiliateRewriter::new(hosts),
            affiliate_tag,
        })
    }

    /// Replace every matched span with its tagged URL.
    ///
    /// Distinct links are resolved once each, all at the same time, so repeated
    /// occurrences get the same replacement. Bytes outside the spans are copied
    /// through unchanged.
    pub async fn rewrite_text(&self, text: &str) -> RewriteResult {
        let candidates = self.extractor.extract(text);
        if candidates.is_empty() {
            return RewriteResult {
                text: text.to_string(),
                links: Vec::new(),
            };
        }

        let pending: Vec<_> = {
            let mut distinct = HashSet::new();
            candidates
                .iter()
                .filter(|link| distinct.insert(link.original.as_str()))
                .map(|link| self.resolver.resolve(link.clone()))
                .collect()
        };

        // original -> (canonical, tagged)
        let seen: HashMap<String, (String, String)> = join_all(pending)
            .await
            .into_iter()
            .map(|resolved| {
                let t = self.rewriter.rewrite(resolved, &self.affiliate_tag);
                (t.resolved.link.original, (t.resolved.canonical_url, t.tagged))
            })
            .collect();

        let mut links = Vec::with_capacity(candidates.len());
        let mut out = String::with_capacity(text.len() + candidates.len() * 32);
        let mut cursor = 0;

        for link in candidates {
            let Some((canonical_url, tagged)) = seen.get(&link.original) else {
                continue;
            };
            out.push_str(&text[cursor..link.span.start]);
            cursor = link.span.end;
            out.push_str(tagged);
            links.push(TaggedUrl {
                resolved: ResolvedLink {
                    link,
                    canonical_url: canonical_url.clone(),
                },
                tagged: tagged.clone(),
            });
        }
        out.push_str(&text[cursor..]);

        RewriteResult { text: out, links }
    }
}
