use std::{fs, path::Path};

use serde::Deserialize;

pub const DEFAULT_CONFIG_FILE: &str = "wizard.toml";

/// How results of superseded lifecycle actions are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StaleResponsePolicy {
    /// A result is dropped when a newer action of the same key was started
    /// before it settled; banners only move forward in ticket order.
    #[default]
    LatestWins,
    /// Results are applied in the order they arrive.
    ArrivalOrder,
}

impl StaleResponsePolicy {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "latest_wins" | "latest-wins" => Some(Self::LatestWins),
            "arrival_order" | "arrival-order" => Some(Self::ArrivalOrder),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WizardConfig {
    pub api_base_url: String,
    pub default_country_code: String,
    pub stale_response_policy: StaleResponsePolicy,
}

impl Default for WizardConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://127.0.0.1:8080/api".into(),
            default_country_code: "BD".into(),
            stale_response_policy: StaleResponsePolicy::LatestWins,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    api_base_url: Option<String>,
    default_country_code: Option<String>,
    stale_response_policy: Option<StaleResponsePolicy>,
}

/// Defaults, then `wizard.toml` in the working directory, then environment.
pub fn load_config() -> WizardConfig {
    load_config_from(Path::new(DEFAULT_CONFIG_FILE))
}

pub fn load_config_from(path: &Path) -> WizardConfig {
    let mut config = WizardConfig::default();

    if let Ok(raw) = fs::read_to_string(path) {
        match toml::from_str::<FileConfig>(&raw) {
            Ok(file_cfg) => apply_file_config(&mut config, file_cfg),
            Err(err) => tracing::warn!(
                path = %path.display(),
                error = %err,
                "ignoring unreadable wizard config file"
            ),
        }
    }

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    config
}

fn apply_file_config(config: &mut WizardConfig, file_cfg: FileConfig) {
    if let Some(v) = file_cfg.api_base_url {
        config.api_base_url = v;
    }
    if let Some(v) = file_cfg.default_country_code {
        config.default_country_code = v;
    }
    if let Some(v) = file_cfg.stale_response_policy {
        config.stale_response_policy = v;
    }
}

fn apply_env_overrides(config: &mut WizardConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("API_BASE_URL") {
        config.api_base_url = v;
    }
    if let Some(v) = lookup("APP__API_BASE_URL") {
        config.api_base_url = v;
    }

    if let Some(v) = lookup("APP__DEFAULT_COUNTRY_CODE") {
        config.default_country_code = v;
    }

    if let Some(v) = lookup("APP__STALE_RESPONSE_POLICY") {
        if let Some(policy) = StaleResponsePolicy::parse(&v) {
            config.stale_response_policy = policy;
        }
    }

    config.api_base_url = normalize_base_url(&config.api_base_url);
}

fn normalize_base_url(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return WizardConfig::default().api_base_url;
    }
    trimmed.to_string()
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
