//! TOML configuration types for the LinkPeek firewall service.
//!
//! The top-level [`AppConfig`] is deserialized from `linkpeek.toml` and contains
//! sections for the HTTP server, firewall thresholds, channel alerts, and the
//! benchmark aggregation job.
//!
//! # Example `linkpeek.toml`
//!
//! ```toml
//! [server]
//! listen = "127.0.0.1:8787"
//!
//! [firewall]
//! high_risk_threshold = 70
//! medium_risk_threshold = 40
//! medium_risk_platforms = ["instagram"]
//! ```

use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{LinkPeekError, Result};

/// HTTP server configuration (`[server]` section).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Address to listen on (e.g., `"127.0.0.1:8787"`).
    pub listen: String,
    /// Public site base URL used for sitemap generation.
    #[serde(default = "default_site_url")]
    pub site_url: String,
}

fn default_site_url() -> String {
    "https://linkpeek.app".to_string()
}

/// Firewall decision thresholds (`[firewall]` section).
///
/// The defaults reproduce the production gate: score ≥ 70 routes through the
/// safe fallback, score ≥ 40 routes through the recovery fallback on the
/// configured in-app-browser platforms (Instagram by default).
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct FirewallConfig {
    /// Score at or above which every platform gets the safe fallback.
    #[serde(default = "default_high_threshold")]
    pub high_risk_threshold: u8,
    /// Score at or above which the platforms in `medium_risk_platforms`
    /// get the recovery fallback.
    #[serde(default = "default_medium_threshold")]
    pub medium_risk_threshold: u8,
    /// Platforms eligible for the medium-risk recovery fallback.
    #[serde(default = "default_medium_platforms")]
    pub medium_risk_platforms: Vec<String>,
    /// Strategy name returned for high-risk traffic.
    #[serde(default = "default_safe_strategy")]
    pub safe_strategy: String,
    /// Strategy name returned for medium-risk traffic on eligible platforms.
    #[serde(default = "default_recovery_strategy")]
    pub recovery_strategy: String,
}

fn default_high_threshold() -> u8 {
    70
}

fn default_medium_threshold() -> u8 {
    40
}

fn default_medium_platforms() -> Vec<String> {
    vec!["instagram".to_string()]
}

fn default_safe_strategy() -> String {
    "webview-safe".to_string()
}

fn default_recovery_strategy() -> String {
    "webview-recovery".to_string()
}

impl Default for FirewallConfig {
    fn default() -> Self {
        Self {
            high_risk_threshold: default_high_threshold(),
            medium_risk_threshold: default_medium_threshold(),
            medium_risk_platforms: default_medium_platforms(),
            safe_strategy: default_safe_strategy(),
            recovery_strategy: default_recovery_strategy(),
        }
    }
}

/// Webhook target for alert delivery (nested under `[alerts.webhook]`).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AlertWebhookConfig {
    /// URL the alert JSON is POSTed to.
    pub url: String,
}

/// Channel alert configuration (`[alerts]` section).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AlertConfig {
    /// Whether alert evaluation is active.
    #[serde(default)]
    pub enabled: bool,
    /// Redirect success rate below which a platform is flagged.
    #[serde(default = "default_min_success_rate")]
    pub min_success_rate: f64,
    /// Minimum benchmark sample size before a platform can be flagged.
    #[serde(default = "default_min_sample_size")]
    pub min_sample_size: u64,
    /// Optional webhook delivery target.
    #[serde(default)]
    pub webhook: Option<AlertWebhookConfig>,
}

fn default_min_success_rate() -> f64 {
    0.85
}

fn default_min_sample_size() -> u64 {
    50
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            min_success_rate: default_min_success_rate(),
            min_sample_size: default_min_sample_size(),
            webhook: None,
        }
    }
}

/// Benchmark aggregation job configuration (`[aggregation]` section).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AggregationConfig {
    /// Interval between benchmark recomputations, in seconds.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

fn default_interval_secs() -> u64 {
    300
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
        }
    }
}

/// Top-level application configuration deserialized from `linkpeek.toml`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// HTTP server settings.
    pub server: ServerConfig,
    /// Firewall thresholds and strategy names.
    #[serde(default)]
    pub firewall: FirewallConfig,
    /// Channel alert thresholds and delivery.
    #[serde(default)]
    pub alerts: AlertConfig,
    /// Benchmark aggregation job settings.
    #[serde(default)]
    pub aggregation: AggregationConfig,
}

impl AppConfig {
    /// Load and parse the configuration from a TOML file at the given path.
    ///
    /// Before parsing, `${VAR}` and `$VAR` placeholders in the TOML text are
    /// replaced with the corresponding environment variable values. An error is
    /// returned if a referenced variable is not set.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let content = substitute_env_vars(&content)?;
        let config: AppConfig = toml::from_str(&content)?;
        Ok(config)
    }
}

/// Replace `${VAR_NAME}` and `$VAR_NAME` placeholders with environment variable values.
///
/// Returns an error containing the variable name if the variable is not set.
fn substitute_env_vars(input: &str) -> Result<String> {
    // Match ${VAR_NAME} (braces form)
    let re_braces = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap();
    // Match $VAR_NAME (no braces, uppercase + underscore only to avoid false positives)
    let re_bare = Regex::new(r"\$([A-Z_][A-Z0-9_]*)").unwrap();

    let mut result = input.to_string();

    for cap in re_braces.captures_iter(input) {
        let var_name = &cap[1];
        let value = std::env::var(var_name)
            .map_err(|_| LinkPeekError::ConfigEnvVar(var_name.to_string()))?;
        result = result.replace(&cap[0], &value);
    }

    let intermediate = result.clone();
    for cap in re_bare.captures_iter(&intermediate) {
        let full_match = &cap[0];
        let var_name = &cap[1];
        let value = std::env::var(var_name)
            .map_err(|_| LinkPeekError::ConfigEnvVar(var_name.to_string()))?;
        result = result.replace(full_match, &value);
    }

    Ok(result)
}
