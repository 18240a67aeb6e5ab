use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::store::LockoutPolicy;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,

    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Directory holding the credential file and the one-time disclosure
    /// sidecar. Created with owner-only permissions on first write.
    pub data_dir: PathBuf,

    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        let data_dir = dirs::home_dir()
            .map_or_else(|| PathBuf::from(".medguard"), |home| home.join(".medguard"));
        Self {
            data_dir,
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// PBKDF2-HMAC-SHA256 iteration count for new hashes. Stored hashes are
    /// self-describing, so raising this never invalidates existing records.
    pub pbkdf2_iterations: u32,

    /// Absolute session lifetime; the inactivity timeout is half of this.
    pub session_timeout_minutes: i64,

    /// Login rate-limiting and lockout policy.
    pub lockout: LockoutConfig,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            pbkdf2_iterations: 100_000,
            session_timeout_minutes: 30,
            lockout: LockoutConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LockoutConfig {
    /// Consecutive failed logins before the account locks.
    pub max_attempts: u32,

    /// How long the account stays locked once the threshold is reached.
    pub lockout_minutes: i64,
}

impl Default for LockoutConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            lockout_minutes: 15,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            security: SecurityConfig::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let paths = Self::config_paths();

        for path in &paths {
            if path.exists() {
                info!("Loading config from: {}", path.display());
                return Self::load_from_path(path);
            }
        }

        info!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Config saved to: {}", path.display());
        Ok(())
    }

    fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![];

        paths.push(PathBuf::from("medguard.toml"));

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("medguard").join("medguard.toml"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".medguard").join("medguard.toml"));
        }

        paths
    }

    pub fn create_default_if_missing() -> Result<bool> {
        let path = PathBuf::from("medguard.toml");
        if path.exists() {
            Ok(false)
        } else {
            let config = Self::default();
            config.save_to_path(&path)?;
            info!("Created default config file: {}", path.display());
            Ok(true)
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.security.pbkdf2_iterations == 0 {
            anyhow::bail!("pbkdf2_iterations must be > 0");
        }
        if self.security.session_timeout_minutes <= 0 {
            anyhow::bail!("session_timeout_minutes must be > 0");
        }
        if self.security.lockout.max_attempts == 0 {
            anyhow::bail!("lockout.max_attempts must be > 0");
        }
        if self.security.lockout.lockout_minutes <= 0 {
            anyhow::bail!("lockout.lockout_minutes must be > 0");
        }
        Ok(())
    }

    /// Path of the persisted credential record.
    #[must_use]
    pub fn credentials_path(&self) -> PathBuf {
        self.general.data_dir.join("admin_credentials.json")
    }

    /// Path of the one-time plaintext disclosure sidecar written by `init`.
    #[must_use]
    pub fn disclosure_path(&self) -> PathBuf {
        self.general.data_dir.join("initial_credentials.txt")
    }

    #[must_use]
    pub fn lockout_policy(&self) -> LockoutPolicy {
        LockoutPolicy {
            max_attempts: self.security.lockout.max_attempts,
            lockout_minutes: self.security.lockout.lockout_minutes,
        }
    }
}
