//! Uploader configuration.
//!
//! Configuration is stored as TOML:
//! - Linux: `~/.config/printpush/printpush.toml`
//! - Windows: `%APPDATA%/printpush/printpush.toml`

use std::path::{Path, PathBuf};
use std::time::Duration;

use printpush_protocol::{DEFAULT_JOB_NAME, Endpoint};
use serde::{Deserialize, Serialize};

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Connection settings for one OctoPrint server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Display name used in notifications.
    #[serde(default = "default_name")]
    pub name: String,

    /// Server base URL, e.g. `http://octopi.local`.
    #[serde(default)]
    pub base_url: String,

    /// OctoPrint API key.
    #[serde(default)]
    pub api_key: String,

    /// Skip TLS certificate validation (self-signed servers).
    #[serde(default)]
    pub accept_invalid_certs: bool,

    /// Request timeout; 0 disables it.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// File name stem used when none is given.
    #[serde(default = "default_job_name")]
    pub job_name: String,
}

fn default_name() -> String {
    "OctoPrint".into()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_job_name() -> String {
    DEFAULT_JOB_NAME.into()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            base_url: String::new(),
            api_key: String::new(),
            accept_invalid_certs: false,
            timeout_secs: default_timeout_secs(),
            job_name: default_job_name(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from `path` (or the platform default), creating a
    /// default file if none exists.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => config_path()?,
        };

        if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            let config: AppConfig = toml::from_str(&content)?;
            tracing::debug!(path = %path.display(), "configuration loaded");
            Ok(config)
        } else {
            let config = AppConfig::default();
            config.save(&path)?;
            Ok(config)
        }
    }

    /// Saves the configuration to `path`.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        // Restrict permissions on Unix (contains the API key).
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }

        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }

    /// Builds the upload endpoint these settings describe.
    pub fn endpoint(&self) -> Endpoint {
        let timeout = (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs));
        Endpoint::new(&self.name, &self.base_url, &self.api_key)
            .with_accept_invalid_certs(self.accept_invalid_certs)
            .with_timeout(timeout)
    }
}

/// Returns the platform-specific configuration file path.
pub fn config_path() -> anyhow::Result<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        Ok(PathBuf::from(appdata)
            .join("printpush")
            .join("printpush.toml"))
    }

    #[cfg(not(target_os = "windows"))]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        Ok(PathBuf::from(home)
            .join(".config")
            .join("printpush")
            .join("printpush.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = AppConfig::default();
        assert_eq!(config.name, "OctoPrint");
        assert!(config.base_url.is_empty());
        assert_eq!(config.timeout_secs, 300);
        assert_eq!(config.job_name, "print");
        assert!(!config.accept_invalid_certs);
    }

    #[test]
    fn config_partial_toml() {
        let config: AppConfig = toml::from_str(r#"base_url = "http://octopi.local""#).unwrap();
        assert_eq!(config.base_url, "http://octopi.local");
        assert_eq!(config.name, "OctoPrint");
        assert_eq!(config.timeout_secs, 300);
    }

    #[test]
    fn config_path_not_empty() {
        let path = config_path().unwrap();
        assert!(path.to_string_lossy().contains("printpush"));
    }

    #[test]
    fn missing_file_is_created_with_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("printpush.toml");

        let config = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(config, AppConfig::default());
        assert!(path.exists());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[test]
    fn save_and_load() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("printpush.toml");

        let config = AppConfig {
            name: "Workshop".into(),
            base_url: "https://printer.lan".into(),
            api_key: "ABC123".into(),
            accept_invalid_certs: true,
            ..AppConfig::default()
        };
        config.save(&path).unwrap();

        assert_eq!(AppConfig::load(Some(&path)).unwrap(), config);
    }

    #[test]
    fn invalid_toml_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("printpush.toml");
        std::fs::write(&path, "timeout_secs = \"soon\"").unwrap();

        assert!(AppConfig::load(Some(&path)).is_err());
    }

    #[test]
    fn endpoint_from_config() {
        let config = AppConfig {
            name: "Shop".into(),
            base_url: "http://octopi.local/".into(),
            api_key: "k".into(),
            timeout_secs: 0,
            ..AppConfig::default()
        };
        let ep = config.endpoint();

        assert_eq!(ep.display_name(), "Shop");
        assert_eq!(ep.upload_url(), "http://octopi.local/api/files/local");
        assert_eq!(ep.timeout(), None);

        let ep = AppConfig::default().endpoint();
        assert_eq!(ep.timeout(), Some(Duration::from_secs(300)));
    }
}
