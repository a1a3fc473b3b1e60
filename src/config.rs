// =============================================================================
// Application Configuration — JSON settings file + environment secrets
// =============================================================================
//
// Non-secret settings live in an optional JSON file. Every field carries a
// serde default so a missing or partial file still loads. Broker and
// completion credentials come only from the environment (a `.env` file is
// honoured by `main`) and are never serialised.
//
// Missing credentials are not rejected here; the broker or completion API
// will refuse the call later and the user sees that error.
// =============================================================================

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

pub const DEFAULT_CONFIG_PATH: &str = "analyser_config.json";

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_app_name() -> String {
    "AI Stock Analyser".to_string()
}

fn default_exchange() -> String {
    "NSE".to_string()
}

fn default_completion_model() -> String {
    "gpt-4o".to_string()
}

fn default_kite_api_base() -> String {
    "https://api.kite.trade".to_string()
}

fn default_kite_login_base() -> String {
    "https://kite.zerodha.com/connect/login".to_string()
}

fn default_openai_api_base() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_broker_timeout_secs() -> u64 {
    30
}

fn default_completion_timeout_secs() -> u64 {
    120
}

fn default_bind_addr() -> String {
    "0.0.0.0:8000".to_string()
}

// =============================================================================
// Credentials
// =============================================================================

/// API credentials read from the environment.
#[derive(Clone, Default)]
pub struct Credentials {
    pub kite_api_key: String,
    pub kite_api_secret: String,
    pub openai_api_key: String,
}

impl Credentials {
    /// Read `ZERODHA_API_KEY`, `ZERODHA_API_SECRET` and `OPENAI_API_KEY`.
    /// Unset variables become empty strings.
    pub fn from_env() -> Self {
        let creds = Self {
            kite_api_key: std::env::var("ZERODHA_API_KEY").unwrap_or_default(),
            kite_api_secret: std::env::var("ZERODHA_API_SECRET").unwrap_or_default(),
            openai_api_key: std::env::var("OPENAI_API_KEY").unwrap_or_default(),
        };
        for missing in creds.missing() {
            warn!(variable = missing, "credential not set — dependent calls will fail");
        }
        creds
    }

    /// Names of the environment variables that were empty.
    pub fn missing(&self) -> Vec<&'static str> {
        let mut out = Vec::new();
        if self.kite_api_key.is_empty() {
            out.push("ZERODHA_API_KEY");
        }
        if self.kite_api_secret.is_empty() {
            out.push("ZERODHA_API_SECRET");
        }
        if self.openai_api_key.is_empty() {
            out.push("OPENAI_API_KEY");
        }
        out
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("kite_api_key", &"<redacted>")
            .field("kite_api_secret", &"<redacted>")
            .field("openai_api_key", &"<redacted>")
            .finish()
    }
}

// =============================================================================
// AppConfig
// =============================================================================

/// Top-level settings for the analyser.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Shown in page titles and headers.
    #[serde(default = "default_app_name")]
    pub app_name: String,

    /// Exchange whose instruments populate the directory.
    #[serde(default = "default_exchange")]
    pub exchange: String,

    /// Chat model used for the analysis.
    #[serde(default = "default_completion_model")]
    pub completion_model: String,

    #[serde(default = "default_kite_api_base")]
    pub kite_api_base: String,

    /// Hosted login page the `/login` route redirects to.
    #[serde(default = "default_kite_login_base")]
    pub kite_login_base: String,

    #[serde(default = "default_openai_api_base")]
    pub openai_api_base: String,

    #[serde(default = "default_broker_timeout_secs")]
    pub broker_timeout_secs: u64,

    #[serde(default = "default_completion_timeout_secs")]
    pub completion_timeout_secs: u64,

    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    #[serde(skip)]
    pub credentials: Credentials,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            app_name: default_app_name(),
            exchange: default_exchange(),
            completion_model: default_completion_model(),
            kite_api_base: default_kite_api_base(),
            kite_login_base: default_kite_login_base(),
            openai_api_base: default_openai_api_base(),
            broker_timeout_secs: default_broker_timeout_secs(),
            completion_timeout_secs: default_completion_timeout_secs(),
            bind_addr: default_bind_addr(),
            credentials: Credentials::default(),
        }
    }
}

impl AppConfig {
    /// Load settings from a JSON file at `path`.
    ///
    /// Returns an error if the file is missing or malformed so the caller can
    /// fall back to defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse config from {}", path.display()))?;

        info!(
            path = %path.display(),
            exchange = %config.exchange,
            model = %config.completion_model,
            "config loaded"
        );

        Ok(config)
    }

    /// Apply `ANALYSER_BIND_ADDR`, `ANALYSER_EXCHANGE`, `OPENAI_MODEL` and
    /// `OPENAI_API_BASE` when set, and read credentials.
    pub fn with_env(mut self) -> Self {
        let overrides = [
            ("ANALYSER_BIND_ADDR", &mut self.bind_addr),
            ("ANALYSER_EXCHANGE", &mut self.exchange),
            ("OPENAI_MODEL", &mut self.completion_model),
            ("OPENAI_API_BASE", &mut self.openai_api_base),
        ];
        for (var, slot) in overrides {
            if let Ok(val) = std::env::var(var) {
                let val = val.trim();
                if !val.is_empty() {
                    *slot = val.to_string();
                }
            }
        }
        self.exchange = self.exchange.to_uppercase();
        self.credentials = Credentials::from_env();
        self
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_expected_values() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.app_name, "AI Stock Analyser");
        assert_eq!(cfg.exchange, "NSE");
        assert_eq!(cfg.completion_model, "gpt-4o");
        assert_eq!(cfg.kite_api_base, "https://api.kite.trade");
        assert_eq!(cfg.broker_timeout_secs, 30);
        assert_eq!(cfg.completion_timeout_secs, 120);
    }

    #[test]
    fn deserialise_empty_json_uses_defaults() {
        let cfg: AppConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.exchange, "NSE");
        assert_eq!(cfg.bind_addr, "0.0.0.0:8000");
        assert!(cfg.credentials.kite_api_key.is_empty());
    }

    #[test]
    fn deserialise_partial_json_fills_defaults() {
        let json = r#"{ "exchange": "BSE", "completion_model": "gpt-4o-mini" }"#;
        let cfg: AppConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.exchange, "BSE");
        assert_eq!(cfg.completion_model, "gpt-4o-mini");
        assert_eq!(cfg.openai_api_base, "https://api.openai.com/v1");
    }

    #[test]
    fn credentials_never_serialised_or_printed() {
        let mut cfg = AppConfig::default();
        cfg.credentials.kite_api_secret = "s3cret".into();
        let json = serde_json::to_string(&cfg).unwrap();
        assert!(!json.contains("s3cret"));
        assert!(!format!("{cfg:?}").contains("s3cret"));
    }

    #[test]
    fn missing_credentials_are_listed() {
        let creds = Credentials {
            kite_api_key: "k".into(),
            ..Default::default()
        };
        assert_eq!(creds.missing(), vec!["ZERODHA_API_SECRET", "OPENAI_API_KEY"]);
    }
}
