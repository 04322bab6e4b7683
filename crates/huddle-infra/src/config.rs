//! Configuration loader for Huddle.
//!
//! Reads `config.toml` from the data directory (`~/.huddle/` in
//! production) and deserializes it into [`HuddleConfig`]. Falls back to
//! defaults when the file is missing or malformed. Secrets come from the
//! environment only and are wrapped in [`secrecy::SecretString`].

use std::path::{Path, PathBuf};

use secrecy::SecretString;
use serde::Deserialize;
use uuid::Uuid;

use huddle_core::bot::BotConfig;

/// Environment variable naming the data directory.
pub const DATA_DIR_ENV: &str = "HUDDLE_DATA_DIR";

/// Environment variable carrying the generation API key.
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Environment variable pinning the bot's author id.
pub const BOT_USER_ID_ENV: &str = "HUDDLE_BOT_USER_ID";

/// File-backed configuration, all fields optional with defaults.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HuddleConfig {
    /// Model identifier for the generation backend.
    pub model: String,
    pub max_tokens: u32,
    pub temperature: Option<f32>,
    /// Configured bot author id; the env var takes precedence.
    pub bot_user_id: Option<Uuid>,
}

impl Default for HuddleConfig {
    fn default() -> Self {
        let defaults = BotConfig::default();
        Self {
            model: defaults.model,
            max_tokens: defaults.max_tokens,
            temperature: defaults.temperature,
            bot_user_id: None,
        }
    }
}

impl HuddleConfig {
    /// Translate into the pipeline's configuration, applying the
    /// `HUDDLE_BOT_USER_ID` env override.
    pub fn bot_config(&self) -> BotConfig {
        let env_bot_id = std::env::var(BOT_USER_ID_ENV)
            .ok()
            .and_then(|s| Uuid::parse_str(&s).ok());

        BotConfig {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            bot_author_id: env_bot_id.or(self.bot_user_id),
        }
    }
}

/// Resolve the data directory from `HUDDLE_DATA_DIR`, falling back to
/// `~/.huddle`.
pub fn resolve_data_dir() -> PathBuf {
    match std::env::var(DATA_DIR_ENV) {
        Ok(dir) => PathBuf::from(dir),
        Err(_) => {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".huddle")
        }
    }
}

/// The SQLite URL for the given data directory.
pub fn database_url(data_dir: &Path) -> String {
    format!("sqlite://{}?mode=rwc", data_dir.join("huddle.db").display())
}

/// Load configuration from `{data_dir}/config.toml`.
///
/// - Missing file: defaults, at debug level.
/// - Unreadable or malformed file: defaults, with a warning.
pub async fn load_config(data_dir: &Path) -> HuddleConfig {
    let config_path = data_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return HuddleConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return HuddleConfig::default();
        }
    };

    match toml::from_str::<HuddleConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            HuddleConfig::default()
        }
    }
}

/// The generation API key from the environment, if set and non-empty.
pub fn api_key_from_env() -> Option<SecretString> {
    std::env::var(API_KEY_ENV)
        .ok()
        .filter(|key| !key.trim().is_empty())
        .map(SecretString::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn missing_file_returns_defaults() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(tmp.path()).await;
        assert_eq!(config.model, "gemini-2.5-flash-lite");
        assert_eq!(config.max_tokens, 1024);
        assert!(config.bot_user_id.is_none());
    }

    #[tokio::test]
    async fn valid_toml_is_parsed() {
        let tmp = TempDir::new().unwrap();
        let bot_id = Uuid::now_v7();
        tokio::fs::write(
            tmp.path().join("config.toml"),
            format!(
                "model = \"gemini-2.0-pro\"\nmax_tokens = 2048\nbot_user_id = \"{bot_id}\"\n"
            ),
        )
        .await
        .unwrap();

        let config = load_config(tmp.path()).await;
        assert_eq!(config.model, "gemini-2.0-pro");
        assert_eq!(config.max_tokens, 2048);
        assert_eq!(config.bot_user_id, Some(bot_id));
    }

    #[tokio::test]
    async fn malformed_toml_degrades_to_defaults() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(tmp.path().join("config.toml"), "model = [not toml")
            .await
            .unwrap();

        let config = load_config(tmp.path()).await;
        assert_eq!(config.model, "gemini-2.5-flash-lite");
    }

    #[test]
    fn database_url_points_into_the_data_dir() {
        let url = database_url(Path::new("/tmp/huddle-data"));
        assert_eq!(url, "sqlite:///tmp/huddle-data/huddle.db?mode=rwc");
    }

    #[test]
    fn bot_config_carries_file_values() {
        let config = HuddleConfig {
            model: "gemini-2.0-pro".to_string(),
            max_tokens: 512,
            temperature: Some(0.4),
            bot_user_id: Some(Uuid::now_v7()),
        };
        let bot = config.bot_config();
        assert_eq!(bot.model, "gemini-2.0-pro");
        assert_eq!(bot.max_tokens, 512);
        assert_eq!(bot.bot_author_id, config.bot_user_id);
    }
}
