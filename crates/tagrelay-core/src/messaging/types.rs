use std::str::FromStr;

use crate::{domain::MediaRef, errors::Error};

/// Formatting mode applied to outbound text and captions. Passed through to the
/// transport untouched; the relay never escapes or rewrites markup.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ParseMode {
    Plain,
    #[default]
    Html,
    MarkdownV2,
}

impl FromStr for ParseMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "plain" | "none" | "" => Ok(Self::Plain),
            "html" => Ok(Self::Html),
            "markdownv2" | "markdown_v2" => Ok(Self::MarkdownV2),
            other => Err(Error::Config(format!(
                "PARSE_MODE must be one of plain, html, markdownv2; got {other:?}"
            ))),
        }
    }
}

/// Exactly one of these is produced per relayed message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OutboundPayload {
    Text(String),
    Photo {
        media: MediaRef,
        caption: Option<String>,
    },
    Video {
        media: MediaRef,
        caption: Option<String>,
    },
}

impl OutboundPayload {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Photo { .. } => "photo",
            Self::Video { .. } => "video",
        }
    }
}

/// Limits of an outbound implementation.
#[derive(Clone, Copy, Debug)]
pub struct OutboundCapabilities {
    pub max_message_len: usize,
    pub max_caption_len: usize,
}
