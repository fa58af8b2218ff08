use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_DATA_FILE: &str = "data/pickem.json";
const DEFAULT_PORT: u16 = 3001;
const DEFAULT_REFRESH_MINUTES: u64 = 30;

/// Runtime settings read from the environment (and `.env`)
#[derive(Debug, Clone)]
pub struct Config {
    pub data_file: PathBuf,
    pub bind_addr: String,
    pub port: u16,
    pub static_dir: PathBuf,
    pub odds_api_key: Option<String>,
    pub api_sports_key: Option<String>,
    pub refresh_interval_minutes: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port = match non_empty("PORT") {
            Some(port) => port.parse().context("PORT must be a port number")?,
            None => DEFAULT_PORT,
        };
        let refresh_interval_minutes = match non_empty("REFRESH_INTERVAL_MINUTES") {
            Some(minutes) => minutes
                .parse()
                .context("REFRESH_INTERVAL_MINUTES must be a whole number")?,
            None => DEFAULT_REFRESH_MINUTES,
        };

        Ok(Self {
            data_file: non_empty("PICKEM_DATA_FILE")
                .unwrap_or_else(|| DEFAULT_DATA_FILE.to_string())
                .into(),
            bind_addr: non_empty("BIND_ADDR").unwrap_or_else(|| "127.0.0.1".to_string()),
            port,
            static_dir: non_empty("STATIC_DIR")
                .unwrap_or_else(|| "static".to_string())
                .into(),
            odds_api_key: non_empty("ODDS_API_KEY"),
            api_sports_key: non_empty("API_SPORTS_KEY"),
            refresh_interval_minutes,
        })
    }

    /// Both API keys are needed to pull scores and spreads
    pub fn refresh_enabled(&self) -> bool {
        self.odds_api_key.is_some() && self.api_sports_key.is_some() && self.refresh_interval_minutes > 0
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_minutes.saturating_mul(60))
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]).unwrap();
        assert_eq!(config.data_file, PathBuf::from(DEFAULT_DATA_FILE));
        assert_eq!(config.listen_addr(), "127.0.0.1:3001");
        assert_eq!(config.refresh_interval_minutes, 30);
        assert!(!config.refresh_enabled());
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            ("PORT", "8080"),
            ("BIND_ADDR", "0.0.0.0"),
            ("ODDS_API_KEY", "odds"),
            ("API_SPORTS_KEY", "sports"),
            ("API_SPORTS_KEY_UNUSED", ""),
            ("REFRESH_INTERVAL_MINUTES", "5"),
        ])
        .unwrap();
        assert_eq!(config.listen_addr(), "0.0.0.0:8080");
        assert!(config.refresh_enabled());
    }

    #[test]
    fn test_blank_key_disables_refresh() {
        let config = config(&[("ODDS_API_KEY", "odds"), ("API_SPORTS_KEY", "  ")]).unwrap();
        assert!(!config.refresh_enabled());
    }

    #[test]
    fn test_refresh_interval() {
        let quarter_hour = config(&[("REFRESH_INTERVAL_MINUTES", "15")]).unwrap();
        assert_eq!(quarter_hour.refresh_interval(), Duration::from_secs(900));

        let max = u64::MAX.to_string();
        let huge = config(&[("REFRESH_INTERVAL_MINUTES", max.as_str())]).unwrap();
        assert_eq!(huge.refresh_interval(), Duration::from_secs(u64::MAX));
    }

    #[test]
    fn test_bad_port() {
        assert!(config(&[("PORT", "http")]).is_err());
    }
}
