//! Configuration management for the RAX file browser
//!
//! Loads `config.toml` with environment overrides and validates the values
//! the storage layer, the path sanitizer and the command server depend on.

use config::{Config, Environment, File};
use regex::Regex;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Complete application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct BrowserConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub file: FileConfig,
    #[serde(default)]
    pub messages: Messages,
}

/// Network settings for the command server
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// IP address the command listener binds to
    pub bind_address: String,

    /// Port for the command listener
    pub port: u16,

    /// Largest accepted upload in bytes
    pub max_upload_size: u64,

    /// Buffer size for streaming responses
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,

    /// Concurrent sessions before new connections are turned away
    #[serde(default = "default_max_clients")]
    pub max_clients: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// Root directory all operations are confined to
    pub base_path: String,
}

/// Naming and permission rules for stored entries
#[derive(Debug, Deserialize, Clone)]
pub struct FileConfig {
    #[serde(default = "default_max_name_length")]
    pub max_name_length: usize,

    /// Unix mode used for directories created by the storage layer
    #[serde(default = "default_dir_permissions")]
    pub dir_permissions: u32,

    #[serde(default)]
    pub forbidden_extensions: Vec<String>,

    #[serde(default = "default_valid_name_regex")]
    pub valid_name_regex: String,
}

/// Client-facing response texts
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Messages {
    pub cannot_list_directory: String,
    pub forbidden_file: String,
    pub cannot_serve: String,
    pub cannot_delete: String,
    pub invalid_request: String,
    pub not_found: String,
    pub internal_error: String,
}

fn default_buffer_size() -> usize {
    8192
}

fn default_max_clients() -> usize {
    10
}

fn default_max_name_length() -> usize {
    255
}

fn default_dir_permissions() -> u32 {
    0o755
}

fn default_valid_name_regex() -> String {
    r"^[\w\-. ]+$".to_string()
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            max_name_length: default_max_name_length(),
            dir_permissions: default_dir_permissions(),
            forbidden_extensions: Vec::new(),
            valid_name_regex: default_valid_name_regex(),
        }
    }
}

impl Default for Messages {
    fn default() -> Self {
        Self {
            cannot_list_directory: "Cannot list directory".into(),
            forbidden_file: "Access to this file is forbidden".into(),
            cannot_serve: "Cannot serve file".into(),
            cannot_delete: "Cannot delete file or folder".into(),
            invalid_request: "Invalid request".into(),
            not_found: "File or folder not found".into(),
            internal_error: "Internal server error".into(),
        }
    }
}

impl BrowserConfig {
    /// Load configuration from config.toml with environment overrides
    pub fn load() -> Result<Self, config::ConfigError> {
        // Packaged layout first, then the working directory
        let config_paths = ["rax-file-browser/config", "config"];

        let mut last_error = None;

        for config_path in &config_paths {
            match Self::load_from(config_path) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    last_error = Some(e);
                    continue;
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            config::ConfigError::Message(format!(
                "Failed to load config.toml from any location. Tried: {config_paths:?}"
            ))
        }))
    }

    /// Load and validate a single configuration file (extension optional)
    pub fn load_from(path: &str) -> Result<Self, config::ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("RAX_BROWSER")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let config: BrowserConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validation for all configuration values
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        if self.storage.base_path.trim().is_empty() {
            return Err(config::ConfigError::Message(
                "storage.base_path is required".into(),
            ));
        }

        if self.file.valid_name_regex.is_empty() {
            return Err(config::ConfigError::Message(
                "file.valid_name_regex is required".into(),
            ));
        }

        if let Err(e) = Regex::new(&self.file.valid_name_regex) {
            return Err(config::ConfigError::Message(format!(
                "file.valid_name_regex does not compile: {e}"
            )));
        }

        if self.server.port == 0 {
            return Err(config::ConfigError::Message(
                "server.port must be between 1 and 65535, got 0".into(),
            ));
        }

        if self.server.max_upload_size == 0 {
            return Err(config::ConfigError::Message(
                "server.max_upload_size must be greater than 0".into(),
            ));
        }

        if self.server.max_clients == 0 {
            return Err(config::ConfigError::Message(
                "server.max_clients must be greater than 0".into(),
            ));
        }

        if self.file.max_name_length == 0 {
            return Err(config::ConfigError::Message(
                "file.max_name_length must be greater than 0".into(),
            ));
        }

        Ok(())
    }
}

impl ServerConfig {
    /// Get bind address and port as a socket address string
    pub fn listen_socket(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

impl StorageConfig {
    /// Base path resolved against the working directory
    pub fn absolute_base_path(&self) -> std::io::Result<PathBuf> {
        std::path::absolute(Path::new(&self.base_path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(body: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        file.write_all(body.as_bytes()).unwrap();
        file
    }

    const MINIMAL: &str = r#"
[server]
bind_address = "127.0.0.1"
port = 8080
max_upload_size = 1024

[storage]
base_path = "./data"
"#;

    #[test]
    fn test_defaults_fill_optional_sections() {
        let file = write_config(MINIMAL);
        let config = BrowserConfig::load_from(file.path().to_str().unwrap()).unwrap();

        assert_eq!(config.server.listen_socket(), "127.0.0.1:8080");
        assert_eq!(config.server.buffer_size, 8192);
        assert_eq!(config.server.max_clients, 10);
        assert_eq!(config.file.max_name_length, 255);
        assert_eq!(config.file.dir_permissions, 0o755);
        assert_eq!(config.file.valid_name_regex, r"^[\w\-. ]+$");
        assert!(config.file.forbidden_extensions.is_empty());
        assert_eq!(config.messages.not_found, "File or folder not found");
    }

    #[test]
    fn test_file_section_is_read() {
        let body = format!(
            "{MINIMAL}\n[file]\nmax_name_length = 64\nforbidden_extensions = [\".exe\"]\nvalid_name_regex = '^[a-z]+$'\n"
        );
        let file = write_config(&body);
        let config = BrowserConfig::load_from(file.path().to_str().unwrap()).unwrap();

        assert_eq!(config.file.max_name_length, 64);
        assert_eq!(config.file.forbidden_extensions, vec![".exe".to_string()]);
        assert_eq!(config.file.valid_name_regex, "^[a-z]+$");
    }

    #[test]
    fn test_rejects_zero_upload_size() {
        let body = MINIMAL.replace("max_upload_size = 1024", "max_upload_size = 0");
        let file = write_config(&body);
        let err = BrowserConfig::load_from(file.path().to_str().unwrap()).unwrap_err();
        assert!(err.to_string().contains("max_upload_size"));
    }

    #[test]
    fn test_rejects_broken_regex() {
        let body = format!("{MINIMAL}\n[file]\nvalid_name_regex = '^[a-z'\n");
        let file = write_config(&body);
        let err = BrowserConfig::load_from(file.path().to_str().unwrap()).unwrap_err();
        assert!(err.to_string().contains("valid_name_regex"));
    }

    #[test]
    fn test_rejects_empty_base_path() {
        let body = MINIMAL.replace("./data", "");
        let file = write_config(&body);
        assert!(BrowserConfig::load_from(file.path().to_str().unwrap()).is_err());
    }
}
