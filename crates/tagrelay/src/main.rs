use std::sync::Arc;

use tagrelay_core::config::Config;

#[tokio::main]
async fn main() -> Result<(), tagrelay_core::Error> {
    tagrelay_core::logging::init("tagrelay")?;

    // Missing or invalid configuration is fatal: never start accepting updates.
    let cfg = match Config::load() {
        Ok(cfg) => Arc::new(cfg),
        Err(e) => {
            tracing::error!("{e}");
            return Err(e);
        }
    };
    tracing::debug!(config = ?cfg, "loaded configuration");

    tagrelay_telegram::router::run(cfg)
        .await
        .map_err(|e| tagrelay_core::Error::Transport(format!("telegram bot failed: {e}")))?;

    Ok(())
}
