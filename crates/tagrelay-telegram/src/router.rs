use std::sync::Arc;

use teloxide::{
    dispatching::Dispatcher, dptree, error_handlers::LoggingErrorHandler, prelude::*,
    update_listeners::webhooks,
};

use tagrelay_core::{
    config::{Config, Transport},
    messaging::{
        port::OutboundPort,
        throttled::{ThrottleConfig, ThrottledOutbound},
    },
    relay::Relay,
};

use crate::handlers;
use crate::TelegramMessenger;

#[derive(Clone)]
pub struct AppState {
    pub relay: Arc<Relay>,
}

/// Run the bot until the transport stops, using polling or a webhook per config.
pub async fn run(cfg: Arc<Config>) -> anyhow::Result<()> {
    let bot = Bot::new(cfg.telegram_bot_token.clone());

    match bot.get_me().await {
        Ok(me) => tracing::info!("tagrelay started: @{}", me.username()),
        Err(e) => tracing::warn!("get_me failed, continuing anyway: {e}"),
    }
    tracing::info!(
        destination = %cfg.destination,
        tag = %cfg.affiliate_tag,
        tlds = cfg.marketplace_tlds.len(),
        "relay configured"
    );

    // Throttle in front of the raw messenger; the adapter itself still retries once on 429.
    let raw_messenger: Arc<dyn OutboundPort> =
        Arc::new(TelegramMessenger::new(bot.clone(), cfg.parse_mode));
    let outbound: Arc<dyn OutboundPort> = Arc::new(ThrottledOutbound::new(
        raw_messenger,
        ThrottleConfig {
            per_chat_min_interval: cfg.send_min_interval,
            ..ThrottleConfig::default()
        },
    ));
    let relay = Arc::new(Relay::from_config(&cfg, outbound)?);

    let state = Arc::new(AppState { relay });

    let handler = dptree::entry().branch(Update::filter_message().endpoint(handlers::handle_message));

    let mut dispatcher = Dispatcher::builder(bot.clone(), handler)
        .dependencies(dptree::deps![state])
        .default_handler(|upd| async move {
            tracing::warn!(update_id = ?upd.id, "received update without message");
        })
        .build();

    match &cfg.transport {
        Transport::Polling => {
            tracing::info!("bot is running with long polling");
            dispatcher.dispatch().await;
        }
        Transport::Webhook {
            public_host,
            listen,
        } => {
            let url = webhook_url(public_host, &cfg.telegram_bot_token)?;
            let listener = webhooks::axum(bot, webhooks::Options::new(*listen, url))
                .await
                .map_err(|e| {
                    tagrelay_core::Error::Transport(format!("failed to set up webhook: {e}"))
                })?;
            tracing::info!(listen = %listen, host = %public_host, "bot is running with webhook");
            dispatcher
                .dispatch_with_listener(
                    listener,
                    LoggingErrorHandler::with_custom_text("webhook update listener error"),
                )
                .await;
        }
    }

    Ok(())
}

/// `https://<host>/<token>`: the token is the secret path segment.
fn webhook_url(public_host: &str, token: &str) -> anyhow::Result<url::Url> {
    let url = url::Url::parse(&format!("https://{public_host}/{token}"))?;
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn webhook_path_is_the_bot_token() {
        let url = webhook_url("relay.example.com", "123:abc").unwrap();
        assert_eq!(url.host_str(), Some("relay.example.com"));
        assert_eq!(url.path(), "/123:abc");
        assert_eq!(url.scheme(), "https");
    }

    #[test]
    fn webhook_url_rejects_bad_hosts() {
        assert!(webhook_url("bad host", "123:abc").is_err());
    }
}
