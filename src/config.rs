//! Configuration management for route53-ddns.

use crate::error::{DdnsError, Result};
use crate::resolver::DEFAULT_LOOKUP_URL;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable holding a semicolon-delimited domain list.
pub const DOMAINS_ENV: &str = "DOMAINS";

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Fully-qualified domains to keep in sync, without trailing dot.
    #[serde(default)]
    pub domains: Vec<String>,

    /// Check interval in seconds (default: 300 = 5 minutes).
    #[serde(default = "default_interval")]
    pub check_interval_secs: u64,

    /// JSON endpoint answering `{"ip": "..."}`.
    #[serde(default = "default_lookup_url")]
    pub ip_lookup_url: String,

    /// Route 53 credentials and region.
    #[serde(default)]
    pub aws: AwsConfig,
}

/// AWS settings. Values starting with `$` are read from the environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AwsConfig {
    #[serde(default = "default_access_key_id")]
    pub access_key_id: String,

    #[serde(default = "default_secret_access_key")]
    pub secret_access_key: String,

    #[serde(default = "default_region")]
    pub region: String,

    /// Endpoint override, mostly for tests and compatible services.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

fn default_interval() -> u64 {
    300
}

fn default_lookup_url() -> String {
    DEFAULT_LOOKUP_URL.to_string()
}

fn default_access_key_id() -> String {
    "$AWS_ACCESS_KEY_ID".to_string()
}

fn default_secret_access_key() -> String {
    "$AWS_SECRET_ACCESS_KEY".to_string()
}

fn default_region() -> String {
    "$AWS_REGION".to_string()
}

impl Default for AwsConfig {
    fn default() -> Self {
        Self {
            access_key_id: default_access_key_id(),
            secret_access_key: default_secret_access_key(),
            region: default_region(),
            endpoint: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            domains: Vec::new(),
            check_interval_secs: default_interval(),
            ip_lookup_url: default_lookup_url(),
            aws: AwsConfig::default(),
        }
    }
}

impl Config {
    /// Get the default config file path.
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| DdnsError::Config("Could not find config directory".to_string()))?;

        Ok(config_dir.join("route53-ddns").join("config.toml"))
    }

    /// Load configuration from a specific path, then apply the environment.
    ///
    /// A missing file is not an error: everything can come from the
    /// environment.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = Self::read_file(path)?;
        config.apply_domains_override(std::env::var(DOMAINS_ENV).ok());
        Ok(config)
    }

    fn read_file(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Ok(toml::from_str(&content)?)
        } else {
            tracing::debug!("No config file at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Replace the domain list with a `;`-separated override, if any.
    fn apply_domains_override(&mut self, value: Option<String>) {
        if let Some(domains) = value {
            self.domains = parse_domain_list(&domains);
        }
    }

    /// Save configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Generate example configuration.
    pub fn example() -> Self {
        Self {
            domains: vec!["home.example.com".to_string(), "vpn.example.com".to_string()],
            ..Self::default()
        }
    }

    /// Check the configuration after environment references are resolved.
    pub fn validate(&self) -> Result<()> {
        if self.domains.is_empty() {
            return Err(DdnsError::Config(format!(
                "No domains configured (set `domains` or {})",
                DOMAINS_ENV
            )));
        }

        if let Some(domain) = self.domains.iter().find(|d| d.trim().is_empty()) {
            return Err(DdnsError::Config(format!("Invalid domain: {:?}", domain)));
        }

        if self.check_interval_secs == 0 {
            return Err(DdnsError::Config(
                "check_interval_secs must be greater than zero".to_string(),
            ));
        }

        reqwest::Url::parse(&self.ip_lookup_url).map_err(|e| {
            DdnsError::Config(format!("Invalid ip_lookup_url {}: {}", self.ip_lookup_url, e))
        })?;

        let checks = [
            ("aws.access_key_id", self.aws.access_key_id()),
            ("aws.secret_access_key", self.aws.secret_access_key()),
            ("aws.region", self.aws.region()),
        ];
        for (name, value) in checks {
            if value.is_empty() || value.starts_with('$') {
                return Err(DdnsError::Config(format!("{} is not set", name)));
            }
        }

        Ok(())
    }
}

impl AwsConfig {
    pub fn access_key_id(&self) -> String {
        resolve_env(&self.access_key_id)
    }

    pub fn secret_access_key(&self) -> String {
        resolve_env(&self.secret_access_key)
    }

    pub fn region(&self) -> String {
        resolve_env(&self.region)
    }
}

/// Split a `;`-delimited domain list, dropping blanks.
pub fn parse_domain_list(value: &str) -> Vec<String> {
    value
        .split(';')
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(str::to_string)
        .collect()
}

/// Resolve environment variable references (values starting with $).
pub(crate) fn resolve_env(value: &str) -> String {
    if let Some(var_name) = value.strip_prefix('$') {
        std::env::var(var_name).unwrap_or_else(|_| {
            tracing::warn!("Environment variable {} not set", var_name);
            value.to_string()
        })
    } else {
        value.to_string()
    }
}
