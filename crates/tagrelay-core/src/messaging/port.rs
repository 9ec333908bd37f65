use async_trait::async_trait;

use crate::{
    domain::{ChatTarget, MediaRef, SentMessage},
    messaging::types::{OutboundCapabilities, OutboundPayload},
    Result,
};

/// Outbound send capability consumed by the relay.
///
/// Telegram is the only implementation; failures are reported as
/// [`Error::Dispatch`](crate::Error::Dispatch).
#[async_trait]
pub trait OutboundPort: Send + Sync {
    fn capabilities(&self) -> OutboundCapabilities;

    async fn send_text(&self, dest: &ChatTarget, text: &str) -> Result<SentMessage>;

    async fn send_photo(
        &self,
        dest: &ChatTarget,
        media: &MediaRef,
        caption: Option<&str>,
    ) -> Result<SentMessage>;

    async fn send_video(
        &self,
        dest: &ChatTarget,
        media: &MediaRef,
        caption: Option<&str>,
    ) -> Result<SentMessage>;
}

/// Route a payload to the matching port operation.
pub async fn send_payload(
    port: &dyn OutboundPort,
    dest: &ChatTarget,
    payload: &OutboundPayload,
) -> Result<SentMessage> {
    match payload {
        OutboundPayload::Text(text) => port.send_text(dest, text).await,
        OutboundPayload::Photo { media, caption } => {
            port.send_photo(dest, media, caption.as_deref()).await
        }
        OutboundPayload::Video { media, caption } => {
            port.send_video(dest, media, caption.as_deref()).await
        }
    }
}
