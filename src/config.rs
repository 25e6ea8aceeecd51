use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub scraper: ScraperConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub backoff: BackoffConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScraperConfig {
    pub user_agent: String,
    /// Whole-request timeout in seconds.
    pub request_timeout: u64,
    /// Extra headers merged into every outbound request.
    #[serde(default)]
    pub extra_headers: HashMap<String, String>,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36"
                .to_string(),
            request_timeout: 10,
            extra_headers: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Minutes between scan cycles. 720 = twice a day.
    pub interval_minutes: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_minutes: 720,
        }
    }
}

/// Randomized delay inserted before each competitor fetch, to stay polite
/// toward scraped sites. Set both bounds to zero to disable (tests do).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackoffConfig {
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            min_delay_ms: 1000,
            max_delay_ms: 3000,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            // Start with default configuration
            .add_source(File::with_name("config/default").required(false))
            // Add environment-specific config
            .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
            // Add local config (ignored by git)
            .add_source(File::with_name("config/local").required(false))
            // Add environment variables with prefix "PRICEWATCH_"
            .add_source(Environment::with_prefix("PRICEWATCH").separator("__"))
            .build()?;

        let config: AppConfig = s.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scraper.user_agent.trim().is_empty() {
            return Err(ConfigError::Message(
                "scraper.user_agent must not be empty".into(),
            ));
        }

        if self.scraper.request_timeout == 0 {
            return Err(ConfigError::Message(
                "scraper.request_timeout must be greater than 0".into(),
            ));
        }

        if self.scheduler.interval_minutes == 0 {
            return Err(ConfigError::Message(
                "scheduler.interval_minutes must be greater than 0".into(),
            ));
        }

        if self.backoff.min_delay_ms > self.backoff.max_delay_ms {
            return Err(ConfigError::Message(
                "backoff.min_delay_ms cannot exceed backoff.max_delay_ms".into(),
            ));
        }

        Ok(())
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scheduler.interval_minutes * 60)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.scraper.request_timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.scheduler.interval_minutes, 720);
        assert_eq!(config.scan_interval(), Duration::from_secs(720 * 60));
    }

    #[test]
    fn test_validation_empty_user_agent() {
        let mut config = AppConfig::default();
        config.scraper.user_agent = "  ".to_string();

        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("user_agent"));
    }

    #[test]
    fn test_validation_zero_timeout() {
        let mut config = AppConfig::default();
        config.scraper.request_timeout = 0;

        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("request_timeout"));
    }

    #[test]
    fn test_validation_zero_interval() {
        let mut config = AppConfig::default();
        config.scheduler.interval_minutes = 0;

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_inverted_backoff_bounds() {
        let mut config = AppConfig::default();
        config.backoff.min_delay_ms = 500;
        config.backoff.max_delay_ms = 100;

        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("min_delay_ms"));
    }

    #[test]
    fn test_disabled_backoff_is_valid() {
        let mut config = AppConfig::default();
        config.backoff.min_delay_ms = 0;
        config.backoff.max_delay_ms = 0;

        assert!(config.validate().is_ok());
    }
}
