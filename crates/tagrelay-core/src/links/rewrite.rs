use crate::links::{host_of, HostSet, ResolvedLink, TaggedUrl};

/// Query parameter that carries the affiliate id.
pub const TAG_PARAM: &str = "tag";
/// Seller marker that competes with `tag` for attribution; blanked when present.
pub const SMID_PARAM: &str = "smid";

/// Upserts the affiliate tag into marketplace URLs and leaves everything else alone.
#[derive(Clone, Debug)]
pub struct AffiliateRewriter {
    hosts: HostSet,
}

impl AffiliateRewriter {
    pub fn new(hosts: HostSet) -> Self {
        Self { hosts }
    }

    pub fn rewrite(&self, resolved: ResolvedLink, affiliate_tag: &str) -> TaggedUrl {
        let on_marketplace =
            host_of(&resolved.canonical_url).is_some_and(|h| self.hosts.is_marketplace_host(&h));

        let tagged = if on_marketplace {
            tag_url(&resolved.canonical_url, affiliate_tag)
        } else {
            tracing::debug!(url = %resolved.canonical_url, "not a marketplace url, leaving untagged");
            resolved.canonical_url.clone()
        };

        TaggedUrl { resolved, tagged }
    }
}

/// Set `tag`, blank an existing `smid`, keep every other byte of the URL.
///
/// Parameters keep their first-seen order; a repeated key collapses to one entry
/// holding the last value. Nothing is percent-decoded or re-encoded.
///
/// A `#` tail is kept as a fragment only when it carries no parameters; after a
/// query, `#x&tag=..` is read as more query so a stale tag cannot survive there.
pub fn tag_url(url: &str, affiliate_tag: &str) -> String {
    let (rest, fragment) = match url.split_once('#') {
        Some((rest, fragment)) if !(rest.contains('?') && looks_like_params(fragment)) => {
            (rest, Some(fragment))
        }
        _ => (url, None),
    };
    let (base, query) = rest.split_once('?').unwrap_or((rest, ""));

    let mut params = QueryParams::parse(query);
    if params.contains(SMID_PARAM) {
        params.set(SMID_PARAM, "");
    }
    params.set(TAG_PARAM, affiliate_tag);

    let mut out = format!("{base}?{}", params.serialize());
    if let Some(fragment) = fragment {
        out.push('#');
        out.push_str(fragment);
    }
    out
}

fn looks_like_params(s: &str) -> bool {
    s.contains(|c| c == '=' || c == '&')
}

/// Ordered, deduplicated view of a raw query string.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct QueryParams {
    // `None` is a bare key without `=`.
    pairs: Vec<(String, Option<String>)>,
}

impl QueryParams {
    fn parse(query: &str) -> Self {
        let mut params = Self::default();
        for segment in query.split('&').filter(|s| !s.is_empty()) {
            match segment.split_once('=') {
                Some((key, value)) => params.upsert(key, Some(value.to_string())),
                None => params.upsert(segment, None),
            }
        }
        params
    }

    fn contains(&self, key: &str) -> bool {
        self.pairs.iter().any(|(k, _)| k == key)
    }

    fn set(&mut self, key: &str, value: &str) {
        self.upsert(key, Some(value.to_string()));
    }

    fn upsert(&mut self, key: &str, value: Option<String>) {
        match self.pairs.iter_mut().find(|(k, _)| k == key) {
            Some((_, v)) => *v = value,
            None => self.pairs.push((key.to_string(), value)),
        }
    }

    fn serialize(&self) -> String {
        self.pairs
            .iter()
            .map(|(k, v)| match v {
                Some(v) => format!("{k}={v}"),
                None => k.clone(),
            })
            .collect::<Vec<_>>()
            .join("&")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::links::{test_support::hosts, CandidateLink};

    const TAG: &str = "tag123-21";

    fn resolved(original: &str, canonical: &str) -> ResolvedLink {
        ResolvedLink {
            link: CandidateLink {
                span: 0..original.len(),
                original: original.to_string(),
            },
            canonical_url: canonical.to_string(),
        }
    }

    fn rewrite(url: &str) -> String {
        AffiliateRewriter::new(hosts())
            .rewrite(resolved(url, url), TAG)
            .tagged
    }

    #[test]
    fn adds_tag_when_there_is_no_query() {
        assert_eq!(
            rewrite("https://www.amazon.in/dp/B000"),
            "https://www.amazon.in/dp/B000?tag=tag123-21"
        );
    }

    #[test]
    fn replaces_foreign_tag_in_place() {
        assert_eq!(
            rewrite("https://www.amazon.in/dp/B111?tag=other-20"),
            "https://www.amazon.in/dp/B111?tag=tag123-21"
        );

        let out = rewrite("https://www.amazon.in/dp/B1?tag=OLD&th=1&tag=OLDER");
        assert_eq!(out, "https://www.amazon.in/dp/B1?tag=tag123-21&th=1");
        assert_eq!(out.matches("tag=").count(), 1);
        assert!(!out.contains("OLD"));
    }

    #[test]
    fn blanks_smid_only_when_present() {
        assert_eq!(
            rewrite("https://www.amazon.in/dp/B000/?smid=ABC"),
            "https://www.amazon.in/dp/B000/?smid=&tag=tag123-21"
        );
        assert!(!rewrite("https://www.amazon.in/dp/B000/?th=1").contains("smid"));
    }

    #[test]
    fn preserves_other_params_and_their_encoding() {
        assert_eq!(
            rewrite("https://www.amazon.in/s?k=usb%20c&ref=nb_sb_noss&psc"),
            "https://www.amazon.in/s?k=usb%20c&ref=nb_sb_noss&psc&tag=tag123-21"
        );
    }

    #[test]
    fn keeps_fragment_at_the_end() {
        assert_eq!(
            rewrite("https://www.amazon.in/dp/B000?th=1#reviews"),
            "https://www.amazon.in/dp/B000?th=1&tag=tag123-21#reviews"
        );
        assert_eq!(
            rewrite("https://www.amazon.in/dp/B000#reviews"),
            "https://www.amazon.in/dp/B000?tag=tag123-21#reviews"
        );
    }

    #[test]
    fn stale_tag_after_hash_is_replaced() {
        let out = rewrite("https://www.amazon.in/dp/B1?th=1#x&tag=OLD");
        assert_eq!(out, "https://www.amazon.in/dp/B1?th=1#x&tag=tag123-21");
        assert!(!out.contains("OLD"));
        assert_eq!(out.matches("tag=").count(), 1);
        assert_eq!(rewrite(&out), out);
    }

    #[test]
    fn drops_empty_query_segments() {
        assert_eq!(
            rewrite("https://www.amazon.in/dp/B000?&&th=1&"),
            "https://www.amazon.in/dp/B000?th=1&tag=tag123-21"
        );
    }

    #[test]
    fn rewrite_is_idempotent() {
        for url in [
            "https://www.amazon.in/dp/B000",
            "https://www.amazon.in/dp/B000/?smid=ABC",
            "https://www.amazon.in/dp/B111?tag=other-20&th=1",
            "https://smile.amazon.co.uk/gp/x?a=1&a=2&flag#frag",
            "https://www.amazon.in/dp/B1?th=1#x&tag=OLD",
        ] {
            let once = rewrite(url);
            assert_eq!(rewrite(&once), once, "{url}");
        }
    }

    #[test]
    fn off_domain_urls_pass_through_untagged() {
        let r = AffiliateRewriter::new(hosts()).rewrite(
            resolved("https://amzn.to/3off", "https://example.com/landing?x=1"),
            TAG,
        );
        assert_eq!(r.tagged, "https://example.com/landing?x=1");

        // An unresolved shortlink is not a marketplace url either.
        assert_eq!(rewrite("https://amzn.to/3xyz"), "https://amzn.to/3xyz");
    }
}
