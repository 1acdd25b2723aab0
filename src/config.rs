use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Application-level constants
pub const APP_NAME: &str = "AE Audit";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Name of the optional JSON override file inside the data directory.
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Get the application data directory.
/// ~/AeAudit/ when a home directory is known, ./AeAudit otherwise.
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("AeAudit")
}

/// Default location of the reference/audit database.
pub fn database_path() -> PathBuf {
    app_data_dir().join("ae_audit.db")
}

/// Default directory for CSV exports.
pub fn exports_dir() -> PathBuf {
    app_data_dir().join("exports")
}

/// Log filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "ae_audit_lib=info,ae_audit=info,warn"
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Deployment settings for the portal.
///
/// Defaults reproduce the production deployment. Any field may be overridden
/// from `config.json`; missing fields keep their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortalConfig {
    /// Note authors that are automated accounts, never audited.
    pub system_authors: Vec<String>,
    /// Exact note bodies that are workflow boilerplate, never audited.
    pub boilerplate_notes: Vec<String>,
    pub database_path: PathBuf,
    pub export_dir: PathBuf,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            system_authors: vec![
                "smcsystemuser@inovalon.com".into(),
                "smc-scheduler@inovalon.com".into(),
                "SYSADM".into(),
            ],
            boilerplate_notes: vec!["--- Order Created from Referral Tracking---".into()],
            database_path: database_path(),
            export_dir: exports_dir(),
        }
    }
}

impl PortalConfig {
    /// Load from `path` if it exists, defaults otherwise.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::info!(path = %path.display(), "Loaded config overrides");
        Ok(config)
    }

    /// Load from the default location under the data directory.
    pub fn load_default() -> Result<Self, ConfigError> {
        Self::load(&app_data_dir().join(CONFIG_FILE_NAME))
    }
}
