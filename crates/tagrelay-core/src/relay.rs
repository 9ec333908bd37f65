use std::sync::Arc;

use crate::{
    config::Config,
    domain::{ChatTarget, Media, RawMessage},
    links::{
        pipeline::LinkPipeline,
        resolve::{HttpExpander, ShortLinkExpander},
    },
    messaging::{
        port::{send_payload, OutboundPort},
        types::OutboundPayload,
    },
    Result,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RelayOutcome {
    /// Nothing worth republishing; no send was attempted.
    Dropped,
    Sent(OutboundPayload),
}

/// Rewrites one inbound message and republishes it to the destination chat.
///
/// Holds only read-only state, so one instance can serve concurrent messages.
pub struct Relay {
    pipeline: LinkPipeline,
    destination: ChatTarget,
    outbound: Arc<dyn OutboundPort>,
}

impl Relay {
    pub fn new(
        cfg: &Config,
        expander: Arc<dyn ShortLinkExpander>,
        outbound: Arc<dyn OutboundPort>,
    ) -> Result<Self> {
        Ok(Self {
            pipeline: LinkPipeline::new(cfg, expander)?,
            destination: cfg.destination.clone(),
            outbound,
        })
    }

    /// Production wiring: shortlinks are expanded over HTTP.
    pub fn from_config(cfg: &Config, outbound: Arc<dyn OutboundPort>) -> Result<Self> {
        let expander = HttpExpander::new(cfg.resolve_timeout, &cfg.resolve_user_agent)?;
        Self::new(cfg, Arc::new(expander), outbound)
    }

    pub fn with_pipeline(
        pipeline: LinkPipeline,
        destination: ChatTarget,
        outbound: Arc<dyn OutboundPort>,
    ) -> Self {
        Self {
            pipeline,
            destination,
            outbound,
        }
    }

    pub fn destination(&self) -> &ChatTarget {
        &self.destination
    }

    /// Build the payload for `msg` without sending it.
    pub async fn prepare(&self, msg: &RawMessage) -> Option<OutboundPayload> {
        if msg.is_empty() {
            return None;
        }

        let text = match &msg.text {
            Some(t) => Some(self.pipeline.rewrite_text(t).await),
            None => None,
        };
        let caption = match &msg.caption {
            Some(c) => Some(self.pipeline.rewrite_text(c).await),
            None => None,
        };

        let rewritten = text.iter().chain(caption.iter()).map(|r| r.links.len()).sum::<usize>();
        if rewritten > 0 {
            tracing::debug!(links = rewritten, "rewrote links");
        }

        match (&msg.media, text) {
            (Some(Media::Photo(media)), _) => Some(OutboundPayload::Photo {
                media: media.clone(),
                caption: caption.map(|r| r.text),
            }),
            (Some(Media::Video(media)), _) => Some(OutboundPayload::Video {
                media: media.clone(),
                caption: caption.map(|r| r.text),
            }),
            (None, Some(text)) => Some(OutboundPayload::Text(text.text)),
            (None, None) => None,
        }
    }

    /// Rewrite and send. At most one send call; a failed send is returned, not retried.
    pub async fn relay(&self, msg: &RawMessage) -> Result<RelayOutcome> {
        let sender = msg.sender.as_deref().unwrap_or("unknown");

        let Some(payload) = self.prepare(msg).await else {
            tracing::info!(sender, "message has no text, photo, or video; ignoring");
            return Ok(RelayOutcome::Dropped);
        };

        self.warn_if_too_long(&payload);

        let sent = send_payload(self.outbound.as_ref(), &self.destination, &payload).await?;
        tracing::info!(
            sender,
            kind = payload.kind(),
            chat = %sent.chat,
            message_id = sent.message_id.0,
            "relayed message"
        );
        Ok(RelayOutcome::Sent(payload))
    }

    fn warn_if_too_long(&self, payload: &OutboundPayload) {
        let caps = self.outbound.capabilities();
        let (len, limit) = match payload {
            OutboundPayload::Text(t) => (t.chars().count(), caps.max_message_len),
            OutboundPayload::Photo { caption, .. } | OutboundPayload::Video { caption, .. } => (
                caption.as_deref().map(|c| c.chars().count()).unwrap_or(0),
                caps.max_caption_len,
            ),
        };
        if len > limit {
            tracing::warn!(
                kind = payload.kind(),
                len,
                limit,
                "rewritten content exceeds the destination limit; send will likely fail"
            );
        }
    }
}
