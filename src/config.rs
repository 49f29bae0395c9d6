//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Secrets (bot token, API keys) are referenced by env-var name in the
//! config and resolved at runtime into `SecretString`s.

use anyhow::{Context, Result};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub scanner: ScannerConfig,
    pub autopilot: AutopilotConfig,
    pub account: AccountConfig,
    pub alerts: AlertsConfig,
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub analyst: Option<AnalystConfig>,
    pub storage: StorageConfig,
    pub dashboard: DashboardConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScannerConfig {
    pub poll_interval_secs: u64,
    pub max_per_scan: usize,
    pub max_opportunities: usize,
}

impl ScannerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AutopilotConfig {
    pub enabled: bool,
    pub interval_secs: u64,
}

impl AutopilotConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Account parameters used for position sizing in delivered signals.
#[derive(Debug, Serialize, Deserialize, Clone, Copy)]
pub struct AccountConfig {
    pub balance: f64,
    /// Risk per trade, in percent of balance (1.0 = 1%).
    pub risk_pct: f64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AlertsConfig {
    pub notification_display_secs: u64,
    pub action_display_secs: u64,
    #[serde(default = "default_true")]
    pub sound: bool,
}

impl AlertsConfig {
    pub fn notification_ttl(&self) -> Duration {
        Duration::from_secs(self.notification_display_secs)
    }

    pub fn action_ttl(&self) -> Duration {
        Duration::from_secs(self.action_display_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelegramConfig {
    pub bot_token_env: String,
    pub chat_id_env: String,
    #[serde(default = "default_telegram_api")]
    pub api_base: String,
}

impl TelegramConfig {
    /// Resolve the bot token from the environment, if set and non-empty.
    pub fn bot_token(&self) -> Option<SecretString> {
        non_empty_env(&self.bot_token_env).map(SecretString::new)
    }

    pub fn chat_id(&self) -> Option<String> {
        non_empty_env(&self.chat_id_env)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AnalystConfig {
    pub model: String,
    pub api_key_env: String,
    pub max_tokens: u32,
}

impl AnalystConfig {
    pub fn api_key(&self) -> Option<SecretString> {
        non_empty_env(&self.api_key_env).map(SecretString::new)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    pub path: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DashboardConfig {
    pub enabled: bool,
    pub port: u16,
}

fn default_true() -> bool {
    true
}

fn default_telegram_api() -> String {
    "https://api.telegram.org".to_string()
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::parse(&contents).with_context(|| format!("Failed to parse config file: {path}"))
    }

    /// Parse configuration from TOML text and validate it.
    pub fn parse(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.scanner.poll_interval_secs > 0, "scanner.poll_interval_secs must be > 0");
        anyhow::ensure!(self.scanner.max_per_scan > 0, "scanner.max_per_scan must be > 0");
        anyhow::ensure!(self.scanner.max_opportunities > 0, "scanner.max_opportunities must be > 0");
        anyhow::ensure!(self.autopilot.interval_secs > 0, "autopilot.interval_secs must be > 0");
        anyhow::ensure!(self.account.balance > 0.0, "account.balance must be > 0");
        anyhow::ensure!(
            self.account.risk_pct > 0.0 && self.account.risk_pct <= 100.0,
            "account.risk_pct must be in (0, 100]"
        );
        Ok(())
    }
}
