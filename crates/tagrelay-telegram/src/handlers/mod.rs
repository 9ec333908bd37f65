//! Telegram update handlers.
//!
//! Every handler converts the update into a `RawMessage`, hands it to the
//! relay and reports failures without stopping the dispatcher.

use std::sync::Arc;

use teloxide::{prelude::*, types::Message};

use tagrelay_core::{
    domain::{Media, MediaRef, RawMessage},
    relay::RelayOutcome,
};

use crate::router::AppState;

pub async fn handle_message(msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let raw = raw_message(&msg);
    let sender = raw.sender.clone().unwrap_or_else(|| "unknown".to_string());
    tracing::info!(chat_id = msg.chat.id.0, sender = %sender, "received message");

    match state.relay.relay(&raw).await {
        Ok(RelayOutcome::Sent(_)) | Ok(RelayOutcome::Dropped) => {}
        Err(e) => {
            tracing::error!(
                chat_id = msg.chat.id.0,
                message_id = msg.id.0,
                destination = %state.relay.destination(),
                "error while processing message: {e}"
            );
        }
    }

    Ok(())
}

/// Telegram message → relay input. Photos use the largest size; a message
/// carries at most one media kind.
pub fn raw_message(msg: &Message) -> RawMessage {
    let media = match (msg.photo(), msg.video()) {
        (Some(sizes), _) => sizes
            .last()
            .map(|p| Media::Photo(MediaRef(p.file.id.clone()))),
        (None, Some(video)) => Some(Media::Video(MediaRef(video.file.id.clone()))),
        (None, None) => None,
    };

    let sender = msg.from().map(|u| match &u.username {
        Some(name) => format!("@{name}"),
        None => u.id.0.to_string(),
    });

    RawMessage {
        text: msg.text().map(str::to_string),
        caption: msg.caption().map(str::to_string),
        media,
        sender,
    }
}
