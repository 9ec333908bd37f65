use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

use crate::{
    domain::{ChatTarget, MediaRef, SentMessage},
    messaging::{port::OutboundPort, types::OutboundCapabilities},
    Result,
};

#[derive(Clone, Copy, Debug)]
pub struct ThrottleConfig {
    /// Minimum spacing between *any* Bot API calls (global flood control).
    pub global_min_interval: Duration,
    /// Minimum spacing between posts to the same destination.
    pub per_chat_min_interval: Duration,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            global_min_interval: Duration::from_millis(40), // ~25/sec
            per_chat_min_interval: Duration::from_millis(1050), // ~0.95/sec
        }
    }
}

#[derive(Debug)]
struct IntervalLimiter {
    interval: Duration,
    next: Instant,
}

impl IntervalLimiter {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            next: Instant::now(),
        }
    }

    /// Reserve the next slot and return the wait duration required before executing.
    fn reserve_at(&mut self, now: Instant) -> Duration {
        let start = if now >= self.next { now } else { self.next };
        self.next = start + self.interval;
        start.saturating_duration_since(now)
    }

    fn reserve(&mut self) -> Duration {
        self.reserve_at(Instant::now())
    }
}

/// OutboundPort decorator that spaces sends out instead of dropping them.
///
/// Concurrent relays posting to one channel queue up behind the per-chat
/// limiter. A 429 can still happen; the Telegram adapter retries once on it.
pub struct ThrottledOutbound {
    inner: Arc<dyn OutboundPort>,
    cfg: ThrottleConfig,
    global: Mutex<IntervalLimiter>,
    per_chat: Mutex<HashMap<ChatTarget, Arc<Mutex<IntervalLimiter>>>>,
}

impl ThrottledOutbound {
    pub fn new(inner: Arc<dyn OutboundPort>, cfg: ThrottleConfig) -> Self {
        Self {
            inner,
            cfg,
            global: Mutex::new(IntervalLimiter::new(cfg.global_min_interval)),
            per_chat: Mutex::new(HashMap::new()),
        }
    }

    async fn limiter_for_chat(&self, chat: &ChatTarget) -> Arc<Mutex<IntervalLimiter>> {
        let mut map = self.per_chat.lock().await;
        map.entry(chat.clone())
            .or_insert_with(|| {
                Arc::new(Mutex::new(IntervalLimiter::new(
                    self.cfg.per_chat_min_interval,
                )))
            })
            .clone()
    }

    async fn throttle_chat(&self, chat: &ChatTarget) {
        let global_wait = { self.global.lock().await.reserve() };
        let chat_wait = {
            let lim = self.limiter_for_chat(chat).await;
            let mut guard = lim.lock().await;
            guard.reserve()
        };

        let wait = global_wait.max(chat_wait);
        if !wait.is_zero() {
            tracing::debug!(chat = %chat, wait_ms = wait.as_millis() as u64, "throttling send");
            sleep(wait).await;
        }
    }
}

#[async_trait]
impl OutboundPort for ThrottledOutbound {
    fn capabilities(&self) -> OutboundCapabilities {
        self.inner.capabilities()
    }

    async fn send_text(&self, dest: &ChatTarget, text: &str) -> Result<SentMessage> {
        self.throttle_chat(dest).await;
        self.inner.send_text(dest, text).await
    }

    async fn send_photo(
        &self,
        dest: &ChatTarget,
        media: &MediaRef,
        caption: Option<&str>,
    ) -> Result<SentMessage> {
        self.throttle_chat(dest).await;
        self.inner.send_photo(dest, media, caption).await
    }

    async fn send_video(
        &self,
        dest: &ChatTarget,
        media: &MediaRef,
        caption: Option<&str>,
    ) -> Result<SentMessage> {
        self.throttle_chat(dest).await;
        self.inner.send_video(dest, media, caption).await
    }
}
