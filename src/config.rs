use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

/// Per-session playback settings.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct SessionConfig {
    /// How long an empty session waits for a new track before disconnecting.
    pub idle_timeout: Duration,
    pub default_volume: f32,
    pub max_queue_size: Option<usize>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(600),
            default_volume: 0.5,
            max_queue_size: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub application_id: u64,
    pub guild_id: Option<u64>, // Para comandos de desarrollo

    // Audio
    pub default_volume: f32,
    pub idle_timeout: u64, // En segundos
    pub max_queue_size: usize,
    pub queue_page_size: usize,

    // Fuentes
    pub ytdlp_path: PathBuf,
    pub resolve_timeout: u64, // En segundos
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            // Discord
            discord_token: std::env::var("DISCORD_TOKEN")?,
            application_id: std::env::var("APPLICATION_ID")?.parse()?,
            guild_id: std::env::var("GUILD_ID").ok().and_then(|s| s.parse().ok()),

            // Audio
            default_volume: std::env::var("DEFAULT_VOLUME")
                .unwrap_or_else(|_| "0.5".to_string())
                .parse()?,
            idle_timeout: std::env::var("IDLE_TIMEOUT")
                .unwrap_or_else(|_| "600".to_string()) // 10 min
                .parse()?,
            max_queue_size: std::env::var("MAX_QUEUE_SIZE")
                .unwrap_or_else(|_| "1000".to_string())
                .parse()?,
            queue_page_size: std::env::var("QUEUE_PAGE_SIZE")
                .unwrap_or_else(|_| "10".to_string())
                .parse()?,

            // Fuentes
            ytdlp_path: std::env::var("YTDLP_PATH")
                .unwrap_or_else(|_| "yt-dlp".to_string())
                .into(),
            resolve_timeout: std::env::var("RESOLVE_TIMEOUT")
                .unwrap_or_else(|_| "30".to_string())
                .parse()?,
        };

        config.validate()?;

        Ok(config)
    }

    /// Validates configuration values for correctness.
    ///
    /// # Validation Rules
    ///
    /// - Volume must be between 0.0 and 1.0
    /// - Idle and resolve timeouts must be greater than zero
    /// - Queue and page sizes must be greater than zero
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.default_volume) {
            anyhow::bail!("Default volume must be between 0.0 and 1.0, got: {}", self.default_volume);
        }

        if self.idle_timeout == 0 {
            anyhow::bail!("Idle timeout must be greater than 0");
        }

        if self.resolve_timeout == 0 {
            anyhow::bail!("Resolve timeout must be greater than 0");
        }

        if self.max_queue_size == 0 {
            anyhow::bail!("Max queue size must be greater than 0");
        }

        if self.queue_page_size == 0 {
            anyhow::bail!("Queue page size must be greater than 0");
        }

        Ok(())
    }

    /// Settings handed to every new session.
    pub fn session(&self) -> SessionConfig {
        SessionConfig {
            idle_timeout: Duration::from_secs(self.idle_timeout),
            default_volume: self.default_volume,
            max_queue_size: Some(self.max_queue_size),
        }
    }

    /// Returns a summary of the current configuration for logging.
    ///
    /// Excludes the token.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Discord: App ID {} (Guild: {})\n  \
            Audio: {}% vol, {}s idle timeout\n  \
            Limits: {} queue, {} per page\n  \
            Sources: {} ({}s timeout)",
            self.application_id,
            self.guild_id.map_or("global".to_string(), |id| id.to_string()),
            (self.default_volume * 100.0) as u32,
            self.idle_timeout,
            self.max_queue_size,
            self.queue_page_size,
            self.ytdlp_path.display(),
            self.resolve_timeout,
        )
    }
}

/// Default configuration values.
///
/// Used as fallbacks when environment variables are not provided.
impl Default for Config {
    fn default() -> Self {
        Self {
            // Discord (no defaults - must be provided)
            discord_token: String::new(),
            application_id: 0,
            guild_id: None,

            default_volume: 0.5,
            idle_timeout: 600,
            max_queue_size: 1000,
            queue_page_size: 10,

            ytdlp_path: "yt-dlp".into(),
            resolve_timeout: 30,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.session().idle_timeout, SessionConfig::default().idle_timeout);
        assert_eq!(config.session().max_queue_size, Some(1000));
    }

    #[test]
    fn test_rejects_out_of_range_volume() {
        let config = Config {
            default_volume: 1.5,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_summary_hides_token() {
        let config = Config {
            discord_token: "secret-token".into(),
            ..Config::default()
        };
        assert!(!config.summary().contains("secret-token"));
    }
}
