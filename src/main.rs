use std::sync::Arc;

use factbot::channels::{Channel, CliChannel, TelegramChannel};
use factbot::config::{BotConfig, ChannelKind};
use factbot::dispatch::{Dispatcher, SessionRegistry};
use factbot::error::{ConfigError, Result};
use factbot::store::SnapshotStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = BotConfig::from_env()?;

    eprintln!("🤖 Fact bot v{}", env!("CARGO_PKG_VERSION"));

    run(config).await?;
    Ok(())
}

async fn run(config: BotConfig) -> Result<()> {
    config.ensure_data_dir().await?;

    // ── Sessions ─────────────────────────────────────────────────────────
    let snapshot_path = config.snapshot_path();
    let store = Arc::new(SnapshotStore::new(snapshot_path.clone()));

    // A corrupt snapshot stops startup here instead of being overwritten.
    let sessions = store.load().await?;
    eprintln!("   Snapshot: {}", snapshot_path.display());
    eprintln!("   Known users: {}", sessions.len());

    let registry = Arc::new(SessionRegistry::from_sessions(sessions));
    let dispatcher = Dispatcher::new(registry, store);

    // ── Channel ──────────────────────────────────────────────────────────
    let channel: Box<dyn Channel> = match config.channel {
        ChannelKind::Telegram => {
            let token = config
                .telegram_token
                .ok_or_else(|| ConfigError::MissingEnvVar("TELEGRAM_TOKEN".to_string()))?;
            eprintln!(
                "   Telegram: enabled (allowed: {})",
                if config.allowed_users.iter().any(|u| u == "*") {
                    "everyone".to_string()
                } else {
                    config.allowed_users.join(", ")
                }
            );
            let telegram = TelegramChannel::new(token, config.allowed_users);
            telegram.health_check().await?;
            Box::new(telegram)
        }
        ChannelKind::Cli => {
            eprintln!("   CLI: type /start to begin, Ctrl-D to exit.\n");
            Box::new(CliChannel::new())
        }
    };

    dispatcher.run(channel.as_ref()).await?;
    Ok(())
}
