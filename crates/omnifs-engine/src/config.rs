//! Engine configuration.
//!
//! The engine only ever sees a validated [`Config`] value. Loading layers
//! the sources the usual way:
//!
//! 1. Environment variables (`OMNIFS_*`)
//! 2. Configuration file (`omnifs.toml`)
//! 3. Default values
//!
//! ## Example configuration file
//!
//! ```toml
//! data_dir = "data"
//! total_size = 104857600
//! block_size = 65536
//! max_users = 50
//! admin_username = "admin"
//! admin_password = "admin123"
//! require_auth = true
//! port = 8080
//! queue_timeout = 5
//! ```

use crate::error::{EngineError, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use omnifs_container::FormatOptions;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding the container and its sidecar files.
    pub data_dir: PathBuf,
    /// Container byte length.
    pub total_size: u64,
    /// Header size; the format fixes this at 512.
    pub header_size: u32,
    /// Payload region block size.
    pub block_size: u32,
    /// Metadata table slots.
    pub max_files: u32,
    /// User table slots.
    pub max_users: u32,
    /// Seed admin username.
    pub admin_username: String,
    /// Seed admin password.
    pub admin_password: String,
    /// Require a valid session for every operation.
    pub require_auth: bool,
    /// Listener port for the network collaborator.
    pub port: u16,
    /// Connection cap for the network collaborator.
    pub max_connections: u32,
    /// Default response wait in seconds.
    pub queue_timeout: u64,
    /// Bounded request queue capacity.
    pub queue_capacity: usize,
    /// Session lifetime in seconds.
    pub session_timeout: u64,
    /// Free-form identifier stored in the header.
    pub student_id: String,
    /// ISO date stored in the header.
    pub submission_date: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            total_size: 104_857_600,
            header_size: 512,
            block_size: 65536,
            max_files: 8192,
            max_users: 50,
            admin_username: "admin".to_string(),
            admin_password: "admin123".to_string(),
            require_auth: true,
            port: 8080,
            max_connections: 64,
            queue_timeout: 5,
            queue_capacity: 256,
            session_timeout: 3600,
            student_id: String::new(),
            submission_date: String::new(),
        }
    }
}

impl Config {
    /// Loads configuration from the default file and environment.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if loading or validation fails.
    pub fn load() -> Result<Self> {
        Self::extract(Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file(user_config_path()))
            .merge(Env::prefixed("OMNIFS_")))
    }

    /// Loads configuration from a specific file.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if loading or validation fails.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        Self::extract(Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("OMNIFS_")))
    }

    fn extract(figment: Figment) -> Result<Self> {
        let config: Self = figment
            .extract()
            .map_err(|e| EngineError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks every sizing and credential rule.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` naming the offending key.
    pub fn validate(&self) -> Result<()> {
        if self.total_size == 0 {
            return Err(EngineError::InvalidConfig(
                "total_size must be positive".to_string(),
            ));
        }
        if self.header_size != 512 {
            return Err(EngineError::InvalidConfig(format!(
                "header_size must be 512, got {}",
                self.header_size
            )));
        }
        if !self.block_size.is_power_of_two()
            || !(512..=1_048_576).contains(&self.block_size)
        {
            return Err(EngineError::InvalidConfig(format!(
                "block_size must be a power of two in [512, 1048576], got {}",
                self.block_size
            )));
        }
        if self.max_files == 0 {
            return Err(EngineError::InvalidConfig(
                "max_files must be positive".to_string(),
            ));
        }
        if !(1..=1000).contains(&self.max_users) {
            return Err(EngineError::InvalidConfig(format!(
                "max_users must be in [1, 1000], got {}",
                self.max_users
            )));
        }
        if self.admin_username.is_empty() || self.admin_username.len() > 31 {
            return Err(EngineError::InvalidConfig(
                "admin_username must be 1-31 characters".to_string(),
            ));
        }
        if self.admin_password.len() < 4 {
            return Err(EngineError::InvalidConfig(
                "admin_password must be at least 4 characters".to_string(),
            ));
        }
        if self.port == 0 {
            return Err(EngineError::InvalidConfig(
                "port must be in [1, 65535]".to_string(),
            ));
        }
        if self.max_connections == 0 {
            return Err(EngineError::InvalidConfig(
                "max_connections must be positive".to_string(),
            ));
        }
        if self.queue_capacity == 0 {
            return Err(EngineError::InvalidConfig(
                "queue_capacity must be positive".to_string(),
            ));
        }
        if self.session_timeout == 0 {
            return Err(EngineError::InvalidConfig(
                "session_timeout must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns the container path for a container named `name`.
    #[must_use]
    pub fn container_path(&self, name: &str) -> PathBuf {
        self.data_dir.join(format!("{name}.omni"))
    }

    /// Sizing parameters for formatting a new container.
    #[must_use]
    pub fn format_options(&self) -> FormatOptions {
        FormatOptions {
            total_size: self.total_size,
            block_size: self.block_size,
            max_users: self.max_users,
            max_files: self.max_files,
            student_id: self.student_id.clone(),
            submission_date: self.submission_date.clone(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("omnifs")
}

fn user_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("~/.config"))
        .join("omnifs")
        .join("omnifs.toml")
}
