use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{SkykitError, SkykitResult};

/// Portal used when neither the config file nor the environment names one
pub const DEFAULT_PORTAL_URL: &str = "https://siasky.net";

/// Top-level client configuration (loaded from skykit.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SkykitConfig {
    pub portal: PortalConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PortalConfig {
    /// Portal base URL (default: https://siasky.net)
    pub url: String,
    /// API key sent as the Skynet-Api-Key header
    pub api_key: Option<String>,
    /// User-Agent header for portal requests
    pub user_agent: String,
    /// Per-request timeout enforced by the transport
    pub timeout_secs: u64,
    /// Refuse plaintext HTTP portals instead of warning
    pub enforce_tls: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level / EnvFilter directive (default: warn)
    pub level: String,
    /// Log format: "json" or "text"
    pub format: String,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_PORTAL_URL.into(),
            api_key: None,
            user_agent: concat!("skykit/", env!("CARGO_PKG_VERSION")).into(),
            timeout_secs: 60,
            enforce_tls: false,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "warn".into(),
            format: "text".into(),
        }
    }
}

impl PortalConfig {
    /// Portal base URL with a scheme and without trailing slashes.
    ///
    /// Scheme-less URLs get `https://`. Plain `http://` is an error when
    /// `enforce_tls` is set and a warning otherwise.
    pub fn normalized_url(&self) -> SkykitResult<String> {
        let trimmed = self.url.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            return Err(SkykitError::Config("portal url is empty".into()));
        }

        if trimmed.starts_with("https://") {
            return Ok(trimmed.to_string());
        }
        if trimmed.starts_with("http://") {
            if self.enforce_tls {
                return Err(SkykitError::Config(format!(
                    "portal url uses plaintext HTTP ({trimmed}), but enforce_tls is enabled. \
                     Use an HTTPS portal or set portal.enforce_tls = false for local development."
                )));
            }
            tracing::warn!(
                portal = %trimmed,
                "portal url uses plaintext HTTP; registry writes and uploads are not confidential"
            );
            return Ok(trimmed.to_string());
        }
        if trimmed.contains("://") {
            return Err(SkykitError::Config(format!(
                "unsupported portal url scheme: {trimmed}"
            )));
        }
        Ok(format!("https://{trimmed}"))
    }
}

/// Load configuration from a TOML file, falling back to defaults when the
/// file does not exist.
pub fn load_config(path: &Path) -> SkykitResult<SkykitConfig> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        return Ok(SkykitConfig::default());
    }
    let content = std::fs::read_to_string(path)?;
    toml::from_str(&content)
        .map_err(|e| SkykitError::Config(format!("parsing config {}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let toml_str = r#"
[portal]
url = "https://portal.example.com"
api_key = "secret-key"
user_agent = "custom-agent"
timeout_secs = 15
enforce_tls = true

[log]
level = "debug"
format = "json"
"#;
        let config: SkykitConfig = toml::from_str(toml_str).unwrap();

        assert_eq!(config.portal.url, "https://portal.example.com");
        assert_eq!(config.portal.api_key.as_deref(), Some("secret-key"));
        assert_eq!(config.portal.user_agent, "custom-agent");
        assert_eq!(config.portal.timeout_secs, 15);
        assert!(config.portal.enforce_tls);
        assert_eq!(config.log.level, "debug");
        assert_eq!(config.log.format, "json");
    }

    #[test]
    fn test_parse_defaults() {
        let config: SkykitConfig = toml::from_str("").unwrap();

        assert_eq!(config.portal.url, DEFAULT_PORTAL_URL);
        assert!(config.portal.api_key.is_none());
        assert!(config.portal.user_agent.starts_with("skykit/"));
        assert_eq!(config.portal.timeout_secs, 60);
        assert!(!config.portal.enforce_tls);
        assert_eq!(config.log.level, "warn");
        assert_eq!(config.log.format, "text");
    }

    #[test]
    fn test_parse_partial_config() {
        let toml_str = r#"
[portal]
url = "http://localhost:9980"
"#;
        let config: SkykitConfig = toml::from_str(toml_str).unwrap();

        assert_eq!(config.portal.url, "http://localhost:9980");
        assert_eq!(config.portal.timeout_secs, 60);
        assert_eq!(config.log.level, "warn");
    }

    #[test]
    fn test_normalized_url() {
        let mut portal = PortalConfig {
            url: "siasky.net/".into(),
            ..Default::default()
        };
        assert_eq!(portal.normalized_url().unwrap(), "https://siasky.net");

        portal.url = "https://portal.example.com//".into();
        assert_eq!(portal.normalized_url().unwrap(), "https://portal.example.com");

        portal.url = "http://localhost:9980".into();
        assert_eq!(portal.normalized_url().unwrap(), "http://localhost:9980");

        portal.enforce_tls = true;
        let err = portal.normalized_url().unwrap_err();
        assert!(err.to_string().contains("enforce_tls"));

        portal.url = "ftp://portal".into();
        assert!(portal.normalized_url().is_err());
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.portal.url, DEFAULT_PORTAL_URL);
    }

    #[test]
    fn test_load_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("skykit.toml");
        std::fs::write(&path, "[portal\nurl = 1").unwrap();
        let err = load_config(&path).unwrap_err();
        assert!(matches!(err, SkykitError::Config(_)));
    }

    #[test]
    fn test_serialize_roundtrip() {
        let config = SkykitConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: SkykitConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(config.portal.url, parsed.portal.url);
        assert_eq!(config.log.format, parsed.log.format);
    }
}
