//! Configuration loader for YAML files
//!
//! This module handles loading, env-overriding and validating configuration.
//! Secrets are never read from YAML; they come from the environment (which
//! `main` populates from `.env` via dotenvy).

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::adapters::types::Credential;
use crate::error::AppError;

use super::types::AppConfig;

/// Load configuration from a YAML file
///
/// This function:
/// 1. Checks if the file exists
/// 2. Parses the YAML content
/// 3. Applies environment overrides (`RPC_URL`, `FUNDER_PRIVATE_KEY`,
///    `ALERT_WEBHOOK_URL`, `ALERT_RECIPIENT`, `ALERT_API_KEY`)
/// 4. Validates the configuration rules
pub fn load_config(path: &Path) -> Result<AppConfig, AppError> {
    if !path.exists() {
        return Err(AppError::Config(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let file = File::open(path)?;
    let reader = BufReader::new(file);

    let mut config: AppConfig = serde_yaml::from_reader(reader).map_err(|e| {
        AppError::Config(format!("YAML parse error in '{}': {}", path.display(), e))
    })?;

    apply_env_overrides(&mut config);
    config.validate()?;

    Ok(config)
}

/// Load configuration from a YAML string (useful for testing)
pub fn load_config_from_str(yaml_content: &str) -> Result<AppConfig, AppError> {
    let mut config: AppConfig = serde_yaml::from_str(yaml_content)
        .map_err(|e| AppError::Config(format!("YAML parse error: {}", e)))?;

    apply_env_overrides(&mut config);
    config.validate()?;

    Ok(config)
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Overlay environment-provided values onto a parsed config
pub fn apply_env_overrides(config: &mut AppConfig) {
    if let Some(url) = env_non_empty("RPC_URL") {
        config.network.rpc_url = url;
    }
    if let Some(key) = env_non_empty("FUNDER_PRIVATE_KEY") {
        config.funder_private_key = Some(Credential::new(key));
    }
    if let Some(url) = env_non_empty("ALERT_WEBHOOK_URL") {
        config.alerts.webhook_url = Some(url);
    }
    if let Some(to) = env_non_empty("ALERT_RECIPIENT") {
        config.alerts.recipient = Some(to);
    }
    if let Some(key) = env_non_empty("ALERT_API_KEY") {
        config.alerts.api_key = Some(Credential::new(key));
    }
}

// ============================================================================
// Tests
// ============================================================================
