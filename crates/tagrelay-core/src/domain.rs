use std::{fmt, str::FromStr};

use crate::errors::Error;

/// Where outbound messages go: a numeric chat id or a public `@username`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ChatTarget {
    Id(i64),
    Username(String),
}

impl FromStr for ChatTarget {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::Config("destination chat is empty".to_string()));
        }
        if let Ok(id) = s.parse::<i64>() {
            return Ok(Self::Id(id));
        }

        let name = s.strip_prefix('@').unwrap_or(s);
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid {
            return Err(Error::Config(format!(
                "destination chat must be a numeric id or @username, got {s:?}"
            )));
        }
        Ok(Self::Username(format!("@{name}")))
    }
}

impl fmt::Display for ChatTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{id}"),
            Self::Username(name) => f.write_str(name),
        }
    }
}

/// Transport-owned media identifier (a Telegram `file_id`).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MediaRef(pub String);

/// Message id assigned by the destination chat.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageId(pub i32);

/// A reference to a message the outbound port created.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SentMessage {
    pub chat: ChatTarget,
    pub message_id: MessageId,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Media {
    Photo(MediaRef),
    Video(MediaRef),
}

/// One inbound message, as seen by the relay.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RawMessage {
    pub text: Option<String>,
    pub caption: Option<String>,
    pub media: Option<Media>,
    /// Who sent it; only used for logging.
    pub sender: Option<String>,
}

impl RawMessage {
    pub fn is_empty(&self) -> bool {
        self.text.is_none() && self.caption.is_none() && self.media.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_channel_username() {
        let t: ChatTarget = "@deals_channel".parse().unwrap();
        assert_eq!(t, ChatTarget::Username("@deals_channel".to_string()));

        let t: ChatTarget = "deals_channel".parse().unwrap();
        assert_eq!(t.to_string(), "@deals_channel");
    }

    #[test]
    fn parses_numeric_chat_id() {
        let t: ChatTarget = "-1001234567890".parse().unwrap();
        assert_eq!(t, ChatTarget::Id(-1001234567890));
    }

    #[test]
    fn rejects_garbage_destination() {
        assert!("".parse::<ChatTarget>().is_err());
        assert!("@".parse::<ChatTarget>().is_err());
        assert!("https://t.me/x".parse::<ChatTarget>().is_err());
    }

    #[test]
    fn empty_message_detection() {
        assert!(RawMessage::default().is_empty());
        let m = RawMessage {
            media: Some(Media::Photo(MediaRef("f".to_string()))),
            ..Default::default()
        };
        assert!(!m.is_empty());
    }
}
