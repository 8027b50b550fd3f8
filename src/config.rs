//! Configuration module
//!
//! Loaded from a TOML file; every section and field falls back to its
//! default so a partial file is enough:
//!
//! ```toml
//! [server]
//! port = 8080
//!
//! [security]
//! jwt_secret = "a long random string"
//!
//! [admin]
//! password = "first-login-password"
//! ```

use std::path::{Path, PathBuf};

use chrono::Duration;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::infrastructure::crypto::JwtConfig;
use crate::infrastructure::DatabaseConfig;

/// Environment variable naming an explicit config file
pub const CONFIG_ENV: &str = "FSD_USER_SERVICE_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub security: SecurityConfig,
    pub email_code: EmailCodeConfig,
    pub admin: AdminConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Seconds allowed for in-flight side effects after a shutdown signal
    pub shutdown_timeout: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            shutdown_timeout: 30,
        }
    }
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    pub jwt_secret: String,
    pub issuer: String,
    pub access_token_ttl_secs: i64,
    pub refresh_token_ttl_secs: i64,
    pub fsd_token_ttl_secs: i64,
    pub bcrypt_cost: u32,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        let jwt = JwtConfig::default();
        Self {
            jwt_secret: jwt.secret,
            issuer: jwt.issuer,
            access_token_ttl_secs: jwt.access_ttl.num_seconds(),
            refresh_token_ttl_secs: jwt.refresh_ttl.num_seconds(),
            fsd_token_ttl_secs: jwt.fsd_ttl.num_seconds(),
            bcrypt_cost: bcrypt::DEFAULT_COST,
        }
    }
}

impl SecurityConfig {
    pub fn jwt_config(&self) -> JwtConfig {
        JwtConfig {
            secret: self.jwt_secret.clone(),
            issuer: self.issuer.clone(),
            access_ttl: Duration::seconds(self.access_token_ttl_secs),
            refresh_ttl: Duration::seconds(self.refresh_token_ttl_secs),
            fsd_ttl: Duration::seconds(self.fsd_token_ttl_secs),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailCodeConfig {
    pub ttl_secs: i64,
    /// Codes held at once; new addresses are refused beyond this
    pub max_pending: usize,
}

impl Default for EmailCodeConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 300,
            max_pending: 10_000,
        }
    }
}

impl EmailCodeConfig {
    pub fn ttl(&self) -> Duration {
        Duration::seconds(self.ttl_secs)
    }
}

/// Account created on first start when the user table is empty
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminConfig {
    pub cid: i64,
    pub username: String,
    pub email: String,
    pub password: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            cid: 1,
            username: "admin".to_string(),
            email: "admin@localhost".to_string(),
            password: "admin123".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive; `RUST_LOG` wins when set
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn parse(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }
}

/// `$FSD_USER_SERVICE_CONFIG`, else `<config dir>/fsd-user-service/config.toml`
pub fn config_path() -> PathBuf {
    std::env::var_os(CONFIG_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(default_config_path)
}

pub fn default_config_path() -> PathBuf {
    dirs_next::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("fsd-user-service")
        .join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let cfg = AppConfig::parse("").unwrap();
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.email_code.ttl_secs, 300);
        assert_eq!(cfg.email_code.max_pending, 10_000);
        assert_eq!(cfg.database.max_connections, 8);
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let cfg = AppConfig::parse(
            r#"
[server]
port = 9100

[security]
jwt_secret = "s3cret"
access_token_ttl_secs = 60
"#,
        )
        .unwrap();
        assert_eq!(cfg.server.port, 9100);
        assert_eq!(cfg.server.host, "0.0.0.0");
        assert_eq!(cfg.server.address(), "0.0.0.0:9100");

        let jwt = cfg.security.jwt_config();
        assert_eq!(jwt.secret, "s3cret");
        assert_eq!(jwt.access_ttl, Duration::seconds(60));
        assert_eq!(jwt.refresh_ttl, JwtConfig::default().refresh_ttl);
    }

    #[test]
    fn load_reports_missing_and_invalid_files() {
        let dir = std::env::temp_dir().join(format!("fsd-user-service-cfg-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let missing = dir.join("missing.toml");
        assert!(matches!(AppConfig::load(&missing), Err(ConfigError::Read { .. })));

        let bad = dir.join("bad.toml");
        std::fs::write(&bad, "[server]\nport = \"eighty\"\n").unwrap();
        assert!(matches!(AppConfig::load(&bad), Err(ConfigError::Parse { .. })));

        let good = dir.join("good.toml");
        std::fs::write(&good, "[admin]\ncid = 1000\n").unwrap();
        assert_eq!(AppConfig::load(&good).unwrap().admin.cid, 1000);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn default_path_ends_with_service_dir() {
        assert!(default_config_path().ends_with("fsd-user-service/config.toml"));
    }
}
