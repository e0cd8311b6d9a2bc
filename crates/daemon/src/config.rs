use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Canonical config file name under the config directory.
pub const CONFIG_FILE_NAME: &str = "gitsms.toml";

/// Environment override for the GitHub token, so deployments can avoid
/// persisting the secret in the config file.
pub const TOKEN_ENV_VAR: &str = "GITSMS_TOKEN";

/// Top-level relay configuration (persisted as `gitsms.toml`).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RelayConfig {
    #[serde(default)]
    pub source: SourceSettings,
    #[serde(default)]
    pub relay: RelaySettings,
    #[serde(default)]
    pub gateway: GatewaySettings,
}

/// Where the queue file lives and how to authenticate against GitHub.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SourceSettings {
    /// `https://github.com/{owner}/{repo}/blob/{branch}/{path}` or the
    /// equivalent raw.githubusercontent.com URL.
    #[serde(default)]
    pub file_url: String,
    #[serde(default)]
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelaySettings {
    /// Polling interval in minutes, minimum 1.
    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: u64,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            interval_minutes: default_interval_minutes(),
        }
    }
}

/// The HTTP SMS gateway messages are dispatched through.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewaySettings {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_gateway_timeout")]
    pub timeout_secs: u64,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            url: String::new(),
            api_key: String::new(),
            timeout_secs: default_gateway_timeout(),
        }
    }
}

fn default_interval_minutes() -> u64 {
    15
}

fn default_gateway_timeout() -> u64 {
    30
}

/// Get the config directory path (~/.config/gitsms/)
pub fn config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .context("Could not determine home directory")?;
    Ok(PathBuf::from(home).join(".config").join("gitsms"))
}

/// Canonical config file path.
pub fn config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load config from disk. A missing file yields defaults; the interval is
/// clamped to at least one minute and `GITSMS_TOKEN` overrides the stored
/// token.
pub fn load_config() -> Result<RelayConfig> {
    let path = config_path()?;
    let mut config = if path.exists() {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config at {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config at {}", path.display()))?
    } else {
        RelayConfig::default()
    };
    normalize(&mut config, std::env::var(TOKEN_ENV_VAR).ok());
    Ok(config)
}

fn normalize(config: &mut RelayConfig, token_override: Option<String>) {
    if config.relay.interval_minutes < 1 {
        config.relay.interval_minutes = 1;
    }
    if let Some(token) = token_override {
        let token = token.trim();
        if !token.is_empty() {
            config.source.token = token.to_string();
        }
    }
}

pub fn save_config(config: &RelayConfig) -> Result<()> {
    let path = config_path()?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let body = toml::to_string_pretty(config).context("Failed to serialize config")?;
    std::fs::write(&path, body)
        .with_context(|| format!("Failed to write config at {}", path.display()))?;
    Ok(())
}

/// Print the effective config, secrets masked.
pub fn show_config() -> Result<()> {
    let config = load_config()?;
    println!("config: {}", config_path()?.display());
    println!("file_url: {}", or_unset(&config.source.file_url));
    println!("token: {}", mask(&config.source.token));
    println!("interval_minutes: {}", config.relay.interval_minutes);
    println!("gateway.url: {}", or_unset(&config.gateway.url));
    println!("gateway.api_key: {}", mask(&config.gateway.api_key));
    println!("gateway.timeout_secs: {}", config.gateway.timeout_secs);
    Ok(())
}

/// Apply the given field updates and persist.
pub fn set_config(
    file_url: Option<String>,
    token: Option<String>,
    interval: Option<u64>,
    gateway_url: Option<String>,
    gateway_api_key: Option<String>,
) -> Result<()> {
    // Read the stored file directly: the env override must not be written
    // back into the config.
    let path = config_path()?;
    let mut config: RelayConfig = if path.exists() {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config at {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config at {}", path.display()))?
    } else {
        RelayConfig::default()
    };

    if let Some(url) = file_url {
        config.source.file_url = url.trim().to_string();
    }
    if let Some(token) = token {
        config.source.token = token.trim().to_string();
    }
    if let Some(minutes) = interval {
        config.relay.interval_minutes = minutes.max(1);
    }
    if let Some(url) = gateway_url {
        config.gateway.url = url.trim().trim_end_matches('/').to_string();
    }
    if let Some(key) = gateway_api_key {
        config.gateway.api_key = key.trim().to_string();
    }

    save_config(&config)?;
    println!("Config updated: {}", path.display());
    Ok(())
}

fn or_unset(value: &str) -> &str {
    if value.is_empty() { "(not set)" } else { value }
}

fn mask(value: &str) -> &'static str {
    if value.is_empty() { "(not set)" } else { "(set)" }
}

#[cfg(test)]
mod tests {
    use super::{normalize, RelayConfig};

    #[test]
    fn default_config_serializes() {
        let config = RelayConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("interval_minutes = 15"));
        assert!(toml_str.contains("timeout_secs = 30"));
    }

    #[test]
    fn config_roundtrip() {
        let config = RelayConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: RelayConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.relay.interval_minutes, 15);
        assert_eq!(parsed.gateway.timeout_secs, 30);
        assert!(parsed.source.file_url.is_empty());
    }

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let parsed: RelayConfig = toml::from_str("[source]\nfile_url = \"x\"\n").unwrap();
        assert_eq!(parsed.source.file_url, "x");
        assert_eq!(parsed.relay.interval_minutes, 15);
    }

    #[test]
    fn interval_is_clamped_to_one_minute() {
        let mut config = RelayConfig::default();
        config.relay.interval_minutes = 0;
        normalize(&mut config, None);
        assert_eq!(config.relay.interval_minutes, 1);
    }

    #[test]
    fn env_token_overrides_the_stored_one() {
        let mut config = RelayConfig::default();
        config.source.token = "stored".to_string();
        normalize(&mut config, Some("  from-env  ".to_string()));
        assert_eq!(config.source.token, "from-env");
    }

    #[test]
    fn blank_env_token_keeps_the_stored_one() {
        let mut config = RelayConfig::default();
        config.source.token = "stored".to_string();
        normalize(&mut config, Some("   ".to_string()));
        assert_eq!(config.source.token, "stored");
        normalize(&mut config, None);
        assert_eq!(config.source.token, "stored");
    }
}
