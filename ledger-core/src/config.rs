//! Configuration management
//!
//! Load order: defaults, then an optional TOML file, then environment
//! variables. The binary applies CLI flags last.

use crate::config_error;
use crate::error::{ErrorContext, LedgerError, LedgerResult};
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Secret used when nothing is configured. Only suitable for development.
pub const DEFAULT_JWT_SECRET: &str = "dev-secret-key-change-in-production";

/// Longest accepted token lifetime: one year
pub const MAX_TOKEN_TTL_HOURS: i64 = 24 * 365;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub pagination: PaginationConfig,
    pub catalog: CatalogConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Allowed CORS origins; `*` allows any
    pub cors_origins: Vec<String>,
    /// Expose internal error details in 500 responses
    pub debug: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
            cors_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:8080".to_string(),
            ],
            debug: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://ledger.db".to_string(),
            max_connections: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub jwt_secret: Option<String>,
    /// Fallback signing secret when `jwt_secret` is unset
    pub secret_key: Option<String>,
    pub token_ttl_hours: i64,
    pub bootstrap_admin_username: String,
    pub bootstrap_admin_password: String,
    pub min_password_length: usize,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            secret_key: None,
            token_ttl_hours: 24,
            bootstrap_admin_username: "admin".to_string(),
            bootstrap_admin_password: "admin123".to_string(),
            min_password_length: 6,
        }
    }
}

impl AuthConfig {
    /// The secret tokens are signed with
    pub fn signing_secret(&self) -> &str {
        self.jwt_secret
            .as_deref()
            .or(self.secret_key.as_deref())
            .unwrap_or(DEFAULT_JWT_SECRET)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PaginationConfig {
    pub default_page_size: u32,
    pub max_page_size: u32,
    pub admin_page_size: u32,
    pub suggestion_candidates: u32,
    pub suggestion_limit: usize,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_page_size: 10,
            max_page_size: 100,
            admin_page_size: 20,
            suggestion_candidates: 20,
            suggestion_limit: 20,
        }
    }
}

/// Lookup lists offered to clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub provinces: Vec<String>,
    pub nature_options: Vec<String>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        let to_vec = |items: &[&str]| items.iter().map(|s| s.to_string()).collect();
        Self {
            provinces: to_vec(&[
                "上海", "江苏", "浙江", "安徽", "福建", "江西", "山东", "其他", "另外",
            ]),
            nature_options: to_vec(&[
                "会议纪要",
                "工作安排",
                "问题反馈",
                "质量管理",
                "临时任务",
                "研讨交流",
                "资料交接",
                "人员对接",
                "常规项目工作",
                "其他",
            ]),
        }
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

impl LedgerConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> LedgerResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| LedgerError::Config {
            message: format!("Failed to read config file: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config").with_operation("read_file"),
        })?;

        toml::from_str(&content).map_err(|e| LedgerError::Config {
            message: format!("Failed to parse config: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config").with_operation("parse_toml"),
        })
    }

    /// Defaults, optional file, then process environment
    pub fn load(path: Option<&Path>) -> LedgerResult<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_with(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Overlay values from an environment lookup
    pub fn apply_env_with<F>(&mut self, lookup: F) -> LedgerResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("LEDGER_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("LEDGER_PORT") {
            self.server.port = port
                .trim()
                .parse()
                .map_err(|_| config_error!(format!("Invalid LEDGER_PORT: {}", port), "config"))?;
        }
        if let Some(debug) = lookup("LEDGER_DEBUG") {
            self.server.debug = parse_bool(&debug);
        }
        if let Some(origins) = lookup("LEDGER_CORS_ORIGINS") {
            self.server.cors_origins = origins
                .split(',')
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect();
        }
        if let Some(url) = lookup("DATABASE_URL") {
            self.database.url = url;
        }
        if let Some(secret) = lookup("JWT_SECRET_KEY") {
            self.auth.jwt_secret = Some(secret);
        }
        if let Some(secret) = lookup("SECRET_KEY") {
            self.auth.secret_key = Some(secret);
        }
        if let Some(level) = lookup("LOG_LEVEL") {
            self.logging.level = level.to_lowercase();
        }
        if let Some(path) = lookup("LOG_FILE_PATH") {
            self.logging.log_to_file = true;
            self.logging.log_file_path = Some(path);
        }
        Ok(())
    }

    pub fn validate(&self) -> LedgerResult<()> {
        let p = &self.pagination;
        if p.default_page_size == 0 || p.max_page_size == 0 || p.admin_page_size == 0 {
            return Err(config_error!("Page sizes must be greater than 0", "config"));
        }
        if p.default_page_size > p.max_page_size || p.admin_page_size > p.max_page_size {
            return Err(config_error!(
                "Default page sizes must not exceed max_page_size",
                "config"
            ));
        }
        if self.auth.token_ttl_hours <= 0 || self.auth.token_ttl_hours > MAX_TOKEN_TTL_HOURS {
            return Err(config_error!(
                format!(
                    "auth.token_ttl_hours must be between 1 and {}",
                    MAX_TOKEN_TTL_HOURS
                ),
                "config"
            ));
        }
        if self.auth.signing_secret().trim().is_empty() {
            return Err(config_error!("JWT secret must not be empty", "config"));
        }
        if self.auth.min_password_length == 0 {
            return Err(config_error!(
                "auth.min_password_length must be greater than 0",
                "config"
            ));
        }
        if self.database.url.trim().is_empty() {
            return Err(config_error!("database.url must not be empty", "config"));
        }
        Ok(())
    }

    /// Settings that are valid but unsafe outside development
    pub fn security_warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.auth.signing_secret() == DEFAULT_JWT_SECRET {
            warnings.push("JWT secret is the built-in default; set JWT_SECRET_KEY".to_string());
        } else if self.auth.signing_secret().len() < 32 {
            warnings.push("JWT secret is shorter than 32 characters".to_string());
        }
        if self.auth.bootstrap_admin_password == "admin123" {
            warnings.push(
                "Bootstrap admin uses the default password; change it after first login"
                    .to_string(),
            );
        }
        if self.server.cors_origins.iter().any(|o| o == "*") {
            warnings.push("CORS allows any origin".to_string());
        }
        if self.server.debug {
            warnings.push("Debug mode exposes internal error details".to_string());
        }
        warnings
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_are_valid() {
        let config = LedgerConfig::default();
        config.validate().unwrap();
        assert_eq!(config.pagination.default_page_size, 10);
        assert_eq!(config.pagination.max_page_size, 100);
        assert_eq!(config.auth.token_ttl_hours, 24);
        assert_eq!(config.catalog.provinces.len(), 9);
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = LedgerConfig::default();
        config
            .apply_env_with(env(&[
                ("LEDGER_PORT", "8088"),
                ("LEDGER_DEBUG", "true"),
                ("DATABASE_URL", "sqlite::memory:"),
                ("SECRET_KEY", "fallback-secret"),
                ("LEDGER_CORS_ORIGINS", "http://a.test, http://b.test"),
                ("LOG_LEVEL", "DEBUG"),
            ]))
            .unwrap();

        assert_eq!(config.server.port, 8088);
        assert!(config.server.debug);
        assert_eq!(config.database.url, "sqlite::memory:");
        assert_eq!(config.auth.signing_secret(), "fallback-secret");
        assert_eq!(config.server.cors_origins, vec!["http://a.test", "http://b.test"]);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn jwt_secret_takes_precedence_over_secret_key() {
        let mut config = LedgerConfig::default();
        config
            .apply_env_with(env(&[("SECRET_KEY", "one"), ("JWT_SECRET_KEY", "two")]))
            .unwrap();
        assert_eq!(config.auth.signing_secret(), "two");
    }

    #[test]
    fn bad_port_is_rejected() {
        let mut config = LedgerConfig::default();
        let err = config
            .apply_env_with(env(&[("LEDGER_PORT", "not-a-port")]))
            .unwrap_err();
        assert!(err.to_string().contains("LEDGER_PORT"));
    }

    #[test]
    fn validation_rejects_inconsistent_pagination() {
        let mut config = LedgerConfig::default();
        config.pagination.default_page_size = 200;
        assert!(config.validate().is_err());

        let mut config = LedgerConfig::default();
        config.auth.token_ttl_hours = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validation_bounds_token_lifetime() {
        let mut config = LedgerConfig::default();
        config.auth.token_ttl_hours = MAX_TOKEN_TTL_HOURS;
        assert!(config.validate().is_ok());

        config.auth.token_ttl_hours = i64::MAX;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("token_ttl_hours"));
    }

    #[test]
    fn default_secret_is_flagged() {
        let warnings = LedgerConfig::default().security_warnings();
        assert!(warnings.iter().any(|w| w.contains("JWT secret")));
    }
}
