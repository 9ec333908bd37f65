use std::{
    env, fmt,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::Path,
    time::Duration,
};

use crate::{domain::ChatTarget, errors::Error, messaging::types::ParseMode, Result};

const DEFAULT_MARKETPLACE_ROOT: &str = "amazon";
const DEFAULT_MARKETPLACE_TLDS: &str =
    "in,com,co.uk,de,fr,it,es,ca,com.au,co.jp,com.br,com.mx,nl,se,pl,sg,ae,sa,com.tr";
const DEFAULT_SHORTENER_HOSTS: &str = "amzn.to,amzn.eu,a.co";
const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

const MIN_RESOLVE_TIMEOUT_MS: u64 = 5_000;
const MAX_RESOLVE_TIMEOUT_MS: u64 = 10_000;

/// How inbound updates reach the bot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Transport {
    Polling,
    /// Telegram pushes updates to `https://<public_host>/<token>`.
    Webhook {
        public_host: String,
        listen: SocketAddr,
    },
}

/// Typed, immutable configuration. Loaded once at startup and shared via `Arc`.
#[derive(Clone)]
pub struct Config {
    // Core
    pub telegram_bot_token: String,
    pub destination: ChatTarget,
    pub affiliate_tag: String,

    // Link grammar
    pub marketplace_root: String,
    pub marketplace_tlds: Vec<String>,
    pub shortener_hosts: Vec<String>,

    // Shortlink resolution
    pub resolve_timeout: Duration,
    pub resolve_user_agent: String,

    // Outbound
    pub parse_mode: ParseMode,
    pub send_min_interval: Duration,

    // Inbound
    pub transport: Transport,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("telegram_bot_token", &"<redacted>")
            .field("destination", &self.destination)
            .field("affiliate_tag", &self.affiliate_tag)
            .field("marketplace_root", &self.marketplace_root)
            .field("marketplace_tlds", &self.marketplace_tlds)
            .field("shortener_hosts", &self.shortener_hosts)
            .field("resolve_timeout", &self.resolve_timeout)
            .field("parse_mode", &self.parse_mode)
            .field("send_min_interval", &self.send_min_interval)
            .field("transport", &self.transport)
            .finish()
    }
}

impl Config {
    /// Load from the process environment, reading `.env` first if present.
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |keys: &[&str]| keys.iter().find_map(|k| lookup(k).and_then(non_empty));

        // Required
        let telegram_bot_token = get(&["TELEGRAM_BOT_TOKEN", "BOT_TOKEN"]).ok_or_else(|| {
            Error::Config("TELEGRAM_BOT_TOKEN environment variable is required".to_string())
        })?;
        let destination = get(&["DESTINATION_CHAT", "CHANNEL_USERNAME"])
            .ok_or_else(|| {
                Error::Config("DESTINATION_CHAT environment variable is required".to_string())
            })?
            .parse::<ChatTarget>()?;
        let affiliate_tag = get(&["AFFILIATE_TAG", "YOUR_TAG"]).ok_or_else(|| {
            Error::Config("AFFILIATE_TAG environment variable is required".to_string())
        })?;
        validate_tag(&affiliate_tag)?;

        // Link grammar
        let marketplace_root = get(&["MARKETPLACE_ROOT"])
            .unwrap_or_else(|| DEFAULT_MARKETPLACE_ROOT.to_string())
            .trim()
            .to_ascii_lowercase();
        validate_host_labels("MARKETPLACE_ROOT", &marketplace_root)?;

        let marketplace_tlds = parse_csv_lower(
            get(&["MARKETPLACE_TLDS"]).unwrap_or_else(|| DEFAULT_MARKETPLACE_TLDS.to_string()),
        );
        if marketplace_tlds.is_empty() {
            return Err(Error::Config("MARKETPLACE_TLDS must not be empty".to_string()));
        }
        for tld in &marketplace_tlds {
            validate_host_labels("MARKETPLACE_TLDS", tld)?;
        }

        let shortener_hosts = parse_csv_lower(
            get(&["SHORTENER_HOSTS"]).unwrap_or_else(|| DEFAULT_SHORTENER_HOSTS.to_string()),
        );
        for host in &shortener_hosts {
            validate_host_labels("SHORTENER_HOSTS", host)?;
        }

        // Resolver
        let resolve_timeout = Duration::from_millis(
            parse_u64(&lookup, "RESOLVE_TIMEOUT_MS")?
                .unwrap_or(MAX_RESOLVE_TIMEOUT_MS)
                .clamp(MIN_RESOLVE_TIMEOUT_MS, MAX_RESOLVE_TIMEOUT_MS),
        );
        let resolve_user_agent =
            get(&["RESOLVE_USER_AGENT"]).unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());

        // Outbound
        let parse_mode = match get(&["PARSE_MODE"]) {
            Some(v) => v.parse::<ParseMode>()?,
            None => ParseMode::Html,
        };
        let send_min_interval =
            Duration::from_millis(parse_u64(&lookup, "SEND_MIN_INTERVAL_MS")?.unwrap_or(1050));

        // Inbound
        let transport = match get(&["WEBHOOK_HOST", "RENDER_EXTERNAL_HOSTNAME"]) {
            None => Transport::Polling,
            Some(public_host) => {
                let ip = match get(&["WEBHOOK_LISTEN"]) {
                    Some(v) => v.trim().parse::<IpAddr>().map_err(|e| {
                        Error::Config(format!("WEBHOOK_LISTEN is not an IP address: {e}"))
                    })?,
                    None => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
                };
                let port = match get(&["PORT"]) {
                    Some(v) => v
                        .trim()
                        .parse::<u16>()
                        .map_err(|e| Error::Config(format!("PORT is not a valid port: {e}")))?,
                    None => 5000,
                };
                Transport::Webhook {
                    public_host: parse_public_host(&public_host)?,
                    listen: SocketAddr::new(ip, port),
                }
            }
        };

        Ok(Self {
            telegram_bot_token,
            destination,
            affiliate_tag,
            marketplace_root,
            marketplace_tlds,
            shortener_hosts,
            resolve_timeout,
            resolve_user_agent,
            parse_mode,
            send_min_interval,
            transport,
        })
    }
}

/// Reads `.env` into the environment without overriding existing variables.
fn load_dotenv_if_present(path: &Path) {
    match dotenvy::from_path(path) {
        Ok(()) => {}
        Err(e) if e.not_found() => {}
        Err(e) => tracing::warn!(path = %path.display(), "ignoring unreadable .env file: {e}"),
    }
}

/// Bare host (optionally with port) for the webhook URL; any scheme is dropped.
fn parse_public_host(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    let lower = trimmed.to_ascii_lowercase();
    let host = if lower.starts_with("https://") {
        &trimmed["https://".len()..]
    } else if lower.starts_with("http://") {
        &trimmed["http://".len()..]
    } else {
        trimmed
    };
    let host = host.trim_end_matches('/');

    if host.is_empty() || host.contains('/') || host.contains(char::is_whitespace) {
        return Err(Error::Config(format!(
            "WEBHOOK_HOST must be a bare host name, got {raw:?}"
        )));
    }
    Ok(host.to_string())
}

fn validate_tag(tag: &str) -> Result<()> {
    let ok = tag
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if ok {
        Ok(())
    } else {
        Err(Error::Config(format!(
            "AFFILIATE_TAG may only contain ASCII letters, digits, '-', '_' and '.', got {tag:?}"
        )))
    }
}

fn validate_host_labels(key: &str, value: &str) -> Result<()> {
    let ok = !value.is_empty()
        && value.split('.').all(|label| {
            !label.is_empty()
                && label
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-')
        });
    if ok {
        Ok(())
    } else {
        Err(Error::Config(format!("{key} contains an invalid host: {value:?}")))
    }
}

fn parse_u64(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<u64>> {
    let Some(raw) = lookup(key).and_then(non_empty) else {
        return Ok(None);
    };
    raw.trim()
        .parse::<u64>()
        .map(Some)
        .map_err(|e| Error::Config(format!("{key} is not a number: {e}")))
}

fn parse_csv_lower(v: String) -> Vec<String> {
    v.split(',')
        .map(|s| s.trim().to_ascii_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<Config> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|k| map.get(k).cloned())
    }

    const REQUIRED: &[(&str, &str)] = &[
        ("TELEGRAM_BOT_TOKEN", "123:abc"),
        ("DESTINATION_CHAT", "@deals"),
        ("AFFILIATE_TAG", "tag123-21"),
    ];

    #[test]
    fn loads_defaults_with_required_keys() {
        let cfg = load(REQUIRED).unwrap();
        assert_eq!(cfg.destination, ChatTarget::Username("@deals".to_string()));
        assert_eq!(cfg.affiliate_tag, "tag123-21");
        assert_eq!(cfg.marketplace_root, "amazon");
        assert!(cfg.marketplace_tlds.iter().any(|t| t == "in"));
        assert!(cfg.marketplace_tlds.iter().any(|t| t == "co.uk"));
        assert_eq!(cfg.shortener_hosts[0], "amzn.to");
        assert_eq!(cfg.resolve_timeout, Duration::from_secs(10));
        assert_eq!(cfg.parse_mode, ParseMode::Html);
        assert_eq!(cfg.transport, Transport::Polling);
    }

    #[test]
    fn missing_required_key_is_config_error() {
        for skip in ["TELEGRAM_BOT_TOKEN", "DESTINATION_CHAT", "AFFILIATE_TAG"] {
            let pairs: Vec<_> = REQUIRED.iter().copied().filter(|(k, _)| *k != skip).collect();
            let err = load(&pairs).unwrap_err();
            assert!(matches!(err, Error::Config(_)), "{skip}: {err}");
        }
    }

    #[test]
    fn blank_required_key_counts_as_missing() {
        let err = load(&[
            ("TELEGRAM_BOT_TOKEN", "   "),
            ("DESTINATION_CHAT", "@deals"),
            ("AFFILIATE_TAG", "tag123-21"),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("TELEGRAM_BOT_TOKEN"));
    }

    #[test]
    fn accepts_legacy_key_names() {
        let cfg = load(&[
            ("BOT_TOKEN", "123:abc"),
            ("CHANNEL_USERNAME", "@legacy"),
            ("YOUR_TAG", "legacy-21"),
        ])
        .unwrap();
        assert_eq!(cfg.telegram_bot_token, "123:abc");
        assert_eq!(cfg.destination.to_string(), "@legacy");
        assert_eq!(cfg.affiliate_tag, "legacy-21");
    }

    #[test]
    fn rejects_tag_that_would_break_query() {
        let mut pairs = REQUIRED.to_vec();
        pairs[2] = ("AFFILIATE_TAG", "a&b=c");
        assert!(matches!(load(&pairs), Err(Error::Config(_))));
    }

    #[test]
    fn resolve_timeout_is_clamped() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("RESOLVE_TIMEOUT_MS", "60000"));
        assert_eq!(load(&pairs).unwrap().resolve_timeout, Duration::from_secs(10));

        let mut pairs = REQUIRED.to_vec();
        pairs.push(("RESOLVE_TIMEOUT_MS", "5"));
        assert_eq!(load(&pairs).unwrap().resolve_timeout, Duration::from_secs(5));

        let mut pairs = REQUIRED.to_vec();
        pairs.push(("RESOLVE_TIMEOUT_MS", "1000"));
        assert_eq!(load(&pairs).unwrap().resolve_timeout, Duration::from_secs(5));

        let mut pairs = REQUIRED.to_vec();
        pairs.push(("RESOLVE_TIMEOUT_MS", "7500"));
        assert_eq!(
            load(&pairs).unwrap().resolve_timeout,
            Duration::from_millis(7500)
        );

        let mut pairs = REQUIRED.to_vec();
        pairs.push(("RESOLVE_TIMEOUT_MS", "soon"));
        assert!(load(&pairs).is_err());
    }

    #[test]
    fn webhook_mode_from_render_hostname() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("RENDER_EXTERNAL_HOSTNAME", "relay.example.com"));
        pairs.push(("PORT", "8080"));
        let cfg = load(&pairs).unwrap();
        assert_eq!(
            cfg.transport,
            Transport::Webhook {
                public_host: "relay.example.com".to_string(),
                listen: "0.0.0.0:8080".parse().unwrap(),
            }
        );
    }

    #[test]
    fn webhook_host_drops_either_scheme() {
        for raw in [
            "relay.example.com",
            "https://relay.example.com/",
            "http://relay.example.com",
            "HTTP://relay.example.com",
        ] {
            let mut pairs = REQUIRED.to_vec();
            pairs.push(("WEBHOOK_HOST", raw));
            match load(&pairs).unwrap().transport {
                Transport::Webhook { public_host, .. } => {
                    assert_eq!(public_host, "relay.example.com", "{raw}")
                }
                other => panic!("{raw}: expected webhook, got {other:?}"),
            }
        }
    }

    #[test]
    fn webhook_host_with_path_is_rejected() {
        for raw in ["https://relay.example.com/hook", "ftp://x/y", "relay example.com"] {
            let mut pairs = REQUIRED.to_vec();
            pairs.push(("WEBHOOK_HOST", raw));
            assert!(matches!(load(&pairs), Err(Error::Config(_))), "{raw}");
        }
    }

    #[test]
    fn custom_marketplace_lists_are_lowercased() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("MARKETPLACE_TLDS", " IN , co.UK ,,"));
        pairs.push(("SHORTENER_HOSTS", "AMZN.TO"));
        let cfg = load(&pairs).unwrap();
        assert_eq!(cfg.marketplace_tlds, vec!["in", "co.uk"]);
        assert_eq!(cfg.shortener_hosts, vec!["amzn.to"]);
    }

    #[test]
    fn debug_output_hides_token() {
        let cfg = load(REQUIRED).unwrap();
        let dbg = format!("{cfg:?}");
        assert!(!dbg.contains("123:abc"));
        assert!(dbg.contains("<redacted>"));
    }
}
