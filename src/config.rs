//! Configuration types.

use std::path::PathBuf;
use std::str::FromStr;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Snapshot file name inside the data directory.
pub const SNAPSHOT_FILE: &str = "conversationbot.json";

/// Which gateway the bot talks through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelKind {
    #[default]
    Telegram,
    Cli,
}

impl FromStr for ChannelKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "telegram" => Ok(Self::Telegram),
            "cli" => Ok(Self::Cli),
            other => Err(ConfigError::InvalidValue {
                key: "FACTBOT_CHANNEL".to_string(),
                message: format!("unknown channel '{other}', expected 'telegram' or 'cli'"),
            }),
        }
    }
}

/// Bot configuration, read from the environment.
#[derive(Debug)]
pub struct BotConfig {
    /// Gateway to run.
    pub channel: ChannelKind,
    /// Bot API token. Required for the Telegram channel.
    pub telegram_token: Option<SecretString>,
    /// Telegram usernames or numeric ids allowed to talk to the bot (`*` = everyone).
    pub allowed_users: Vec<String>,
    /// Directory holding the session snapshot.
    pub data_dir: PathBuf,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            channel: ChannelKind::default(),
            telegram_token: None,
            allowed_users: vec!["*".to_string()],
            data_dir: PathBuf::from("."),
        }
    }
}

impl BotConfig {
    /// Read `FACTBOT_CHANNEL`, `TELEGRAM_TOKEN`, `TELEGRAM_ALLOWED_USERS`
    /// and `DATA_DIR`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let channel = match lookup("FACTBOT_CHANNEL") {
            Some(value) if !value.trim().is_empty() => value.parse()?,
            _ => defaults.channel,
        };

        let telegram_token = lookup("TELEGRAM_TOKEN")
            .filter(|t| !t.trim().is_empty())
            .map(SecretString::from);
        if channel == ChannelKind::Telegram && telegram_token.is_none() {
            return Err(ConfigError::MissingEnvVar("TELEGRAM_TOKEN".to_string()));
        }

        let allowed_users = match lookup("TELEGRAM_ALLOWED_USERS") {
            Some(value) => value
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            None => defaults.allowed_users,
        };

        let data_dir = lookup("DATA_DIR")
            .filter(|d| !d.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.data_dir);

        Ok(Self {
            channel,
            telegram_token,
            allowed_users,
            data_dir,
        })
    }

    /// Full path of the session snapshot.
    pub fn snapshot_path(&self) -> PathBuf {
        self.data_dir.join(SNAPSHOT_FILE)
    }

    /// Create the data directory if it does not exist yet.
    pub async fn ensure_data_dir(&self) -> Result<(), ConfigError> {
        tokio::fs::create_dir_all(&self.data_dir).await?;
        Ok(())
    }
}
