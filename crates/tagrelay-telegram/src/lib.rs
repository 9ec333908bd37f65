//! Telegram adapter (teloxide).
//!
//! Implements the `tagrelay-core` OutboundPort over the Telegram Bot API and
//! feeds inbound messages into the relay.

use async_trait::async_trait;

use teloxide::{
    prelude::*,
    types::{InputFile, Recipient},
};

use tokio::time::sleep;

pub mod handlers;
pub mod router;

use tagrelay_core::{
    domain::{ChatTarget, MediaRef, MessageId, SentMessage},
    errors::Error,
    messaging::{
        port::OutboundPort,
        types::{OutboundCapabilities, ParseMode},
    },
    Result,
};

#[derive(Clone)]
pub struct TelegramMessenger {
    bot: Bot,
    parse_mode: ParseMode,
}

impl TelegramMessenger {
    pub fn new(bot: Bot, parse_mode: ParseMode) -> Self {
        Self { bot, parse_mode }
    }

    fn tg_recipient(chat: &ChatTarget) -> Recipient {
        match chat {
            ChatTarget::Id(id) => Recipient::Id(teloxide::types::ChatId(*id)),
            ChatTarget::Username(name) => Recipient::ChannelUsername(name.clone()),
        }
    }

    fn tg_parse_mode(&self) -> Option<teloxide::types::ParseMode> {
        match self.parse_mode {
            ParseMode::Plain => None,
            ParseMode::Html => Some(teloxide::types::ParseMode::Html),
            ParseMode::MarkdownV2 => Some(teloxide::types::ParseMode::MarkdownV2),
        }
    }

    fn map_err(e: teloxide::RequestError) -> Error {
        Error::Dispatch(format!("telegram error: {e}"))
    }

    fn sent(chat: &ChatTarget, msg: &Message) -> SentMessage {
        SentMessage {
            chat: chat.clone(),
            message_id: MessageId(msg.id.0),
        }
    }

    async fn with_retry<T, Fut>(&self, mut op: impl FnMut() -> Fut) -> Result<T>
    where
        Fut: std::future::IntoFuture<Output = std::result::Result<T, teloxide::RequestError>>,
        Fut::IntoFuture: Send,
    {
        const MAX_RETRIES: usize = 1;
        let mut attempts = 0usize;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) => match e {
                    teloxide::RequestError::RetryAfter(d) if attempts < MAX_RETRIES => {
                        attempts += 1;
                        tracing::warn!(retry_after = ?d, "flood control hit, retrying once");
                        sleep(d).await;
                        continue;
                    }
                    other => return Err(Self::map_err(other)),
                },
            }
        }
    }
}

#[async_trait]
impl OutboundPort for TelegramMessenger {
    fn capabilities(&self) -> OutboundCapabilities {
        OutboundCapabilities {
            max_message_len: 4096,
            max_caption_len: 1024,
        }
    }

    async fn send_text(&self, dest: &ChatTarget, text: &str) -> Result<SentMessage> {
        let parse_mode = self.tg_parse_mode();
        let msg = self
            .with_retry(|| {
                let mut req = self
                    .bot
                    .send_message(Self::tg_recipient(dest), text.to_string());
                if let Some(pm) = parse_mode {
                    req = req.parse_mode(pm);
                }
                req
            })
            .await?;
        Ok(Self::sent(dest, &msg))
    }

    async fn send_photo(
        &self,
        dest: &ChatTarget,
        media: &MediaRef,
        caption: Option<&str>,
    ) -> Result<SentMessage> {
        let parse_mode = self.tg_parse_mode();
        let msg = self
            .with_retry(|| {
                let mut req = self
                    .bot
                    .send_photo(Self::tg_recipient(dest), InputFile::file_id(media.0.clone()));
                if let Some(c) = caption {
                    req = req.caption(c.to_string());
                    if let Some(pm) = parse_mode {
                        req = req.parse_mode(pm);
                    }
                }
                req
            })
            .await?;
        Ok(Self::sent(dest, &msg))
    }

    async fn send_video(
        &self,
        dest: &ChatTarget,
        media: &MediaRef,
        caption: Option<&str>,
    ) -> Result<SentMessage> {
        let parse_mode = self.tg_parse_mode();
        let msg = self
            .with_retry(|| {
                let mut req = self
                    .bot
                    .send_video(Self::tg_recipient(dest), InputFile::file_id(media.0.clone()));
                if let Some(c) = caption {
                    req = req.caption(c.to_string());
                    if let Some(pm) = parse_mode {
                        req = req.parse_mode(pm);
                    }
                }
                req
            })
            .await?;
        Ok(Self::sent(dest, &msg))
    }
}
