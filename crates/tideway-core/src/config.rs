//! tideway.toml configuration parser.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TidewayConfig {
    pub git: GitConfig,
    pub provisioner: ProvisionerConfig,
    pub state: StateConfig,
    pub cleanup: CleanupConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GitConfig {
    /// Repository root on every unit. Hook paths in app.conf are relative to it.
    pub unit_repo: PathBuf,
    /// Directory holding the bare repositories, one `<app>.git` per app.
    pub bare_root: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvisionerConfig {
    pub binary: String,
    pub charms: PathBuf,
    pub hooks_dir: PathBuf,
    pub reload_hook: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateConfig {
    pub data_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanupConfig {
    pub max_attempts: u32,
    pub retry_delay_ms: u64,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            unit_repo: PathBuf::from("/home/application/current"),
            bare_root: PathBuf::from("/var/repositories"),
        }
    }
}

impl Default for ProvisionerConfig {
    fn default() -> Self {
        Self {
            binary: "juju".to_string(),
            charms: PathBuf::from("/home/charms"),
            hooks_dir: PathBuf::from("/var/lib/tideway/hooks"),
            reload_hook: "reload-gunicorn".to_string(),
            timeout_secs: 300,
        }
    }
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("/var/lib/tideway"),
        }
    }
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay_ms: 500,
        }
    }
}

impl ProvisionerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl CleanupConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl StateConfig {
    /// Location of the redb file inside the data directory.
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("tideway.redb")
    }
}

impl TidewayConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: TidewayConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load `path` when given, otherwise fall back to the built-in defaults.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => {
                let config = Self::from_file(path)?;
                tracing::debug!(path = %path.display(), "loaded config file");
                Ok(config)
            }
            None => Ok(Self::default()),
        }
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}
