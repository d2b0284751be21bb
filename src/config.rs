use serde::Deserialize;
use std::path::{Path, PathBuf};

fn default_port() -> u16 {
    5000
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from("uploads")
}

fn default_database_path() -> PathBuf {
    PathBuf::from("database.db")
}

fn default_allowed_origin() -> String {
    "http://localhost:5173".to_string()
}

fn default_max_upload_mb() -> usize {
    200
}

/// Server configuration file structure
///
/// ```toml
/// port = 5000
/// upload_dir = "uploads"
/// database_path = "database.db"
/// allowed_origin = "https://recorder.example.com"
/// public_base_url = "https://api.example.com"
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Port to listen on (default: 5000, overridden by the PORT env var)
    #[serde(default = "default_port")]
    pub port: u16,
    /// Directory holding uploaded files (default: uploads)
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,
    /// SQLite database file for recording metadata (default: database.db)
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
    /// The single browser origin allowed by CORS
    #[serde(default = "default_allowed_origin")]
    pub allowed_origin: String,
    /// Base address used to build stream URLs in listings
    /// (default: http://localhost:<port>)
    pub public_base_url: Option<String>,
    /// Maximum accepted upload body in megabytes (default: 200)
    #[serde(default = "default_max_upload_mb")]
    pub max_upload_mb: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            upload_dir: default_upload_dir(),
            database_path: default_database_path(),
            allowed_origin: default_allowed_origin(),
            public_base_url: None,
            max_upload_mb: default_max_upload_mb(),
        }
    }
}

impl ServerConfig {
    /// Read and parse a TOML config file
    pub fn load(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file '{}': {}", path.display(), e))?;
        toml::from_str(&content)
            .map_err(|e| format!("Failed to parse config file '{}': {}", path.display(), e))
    }

    /// Base address for stream URLs, without a trailing slash
    pub fn public_base_url(&self) -> String {
        match &self.public_base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("http://localhost:{}", self.port),
        }
    }

    /// Upload limit in bytes, saturating at `usize::MAX`
    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }

    /// Validate values that serde cannot check on its own
    pub fn validate(&self) -> Result<(), String> {
        let origin = url::Url::parse(&self.allowed_origin)
            .map_err(|e| format!("allowed_origin '{}' is not a URL: {}", self.allowed_origin, e))?;
        if origin.path() != "/" || origin.query().is_some() {
            return Err(format!(
                "allowed_origin '{}' must be a bare origin (scheme://host[:port])",
                self.allowed_origin
            ));
        }

        if let Some(base) = &self.public_base_url {
            url::Url::parse(base)
                .map_err(|e| format!("public_base_url '{}' is not a URL: {}", base, e))?;
        }

        if self.max_upload_mb == 0 {
            return Err("max_upload_mb must be greater than 0".to_string());
        }
        if self.max_upload_mb.checked_mul(1024 * 1024).is_none() {
            return Err(format!(
                "max_upload_mb {} is too large to express in bytes",
                self.max_upload_mb
            ));
        }

        Ok(())
    }

    /// CORS header value for the allowed origin
    pub fn allowed_origin_header(&self) -> String {
        self.allowed_origin.trim_end_matches('/').to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config: ServerConfig = toml::from_str("").unwrap();
        assert_eq!(config.port, 5000);
        assert_eq!(config.upload_dir, PathBuf::from("uploads"));
        assert_eq!(config.database_path, PathBuf::from("database.db"));
        assert_eq!(config.public_base_url(), "http://localhost:5000");
        assert_eq!(config.max_upload_bytes(), 200 * 1024 * 1024);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn explicit_base_url_drops_trailing_slash() {
        let config: ServerConfig = toml::from_str(
            r#"
            port = 8080
            public_base_url = "https://api.example.com/"
            allowed_origin = "https://recorder.example.com"
            "#,
        )
        .unwrap();
        assert_eq!(config.public_base_url(), "https://api.example.com");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn origin_with_path_is_rejected() {
        let config = ServerConfig {
            allowed_origin: "https://recorder.example.com/app".to_string(),
            ..ServerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn overflowing_upload_limit_is_rejected() {
        let config = ServerConfig {
            max_upload_mb: usize::MAX / 1024,
            ..ServerConfig::default()
        };
        assert!(config.validate().is_err());
        assert_eq!(config.max_upload_bytes(), usize::MAX);
    }

    #[test]
    fn zero_upload_limit_is_rejected() {
        let config = ServerConfig {
            max_upload_mb: 0,
            ..ServerConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
