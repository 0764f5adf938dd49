//! Runtime configuration.
//!
//! JSON document with kebab-case keys; every field has a default so a
//! partial file (or `{}`) is accepted. Secrets are never logged.

use crate::auth::jwt::is_reserved_identity_claim;
use crate::logging::default_log_level;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Upper bound for `auth.token-ttl-secs` (30 days).
pub const MAX_TOKEN_TTL_SECS: u64 = 30 * 24 * 60 * 60;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct HomehubConfig {
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    pub busy_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("homehub.sqlite3"),
            busy_timeout_ms: 5_000,
        }
    }
}

impl DatabaseConfig {
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct AuthConfig {
    /// Credential scheme expected before the token, e.g. `Bearer`.
    pub scheme: String,
    /// HMAC secret for HS256 tokens.
    pub secret: String,
    pub issuer: Option<String>,
    pub audience: Option<String>,
    /// Claim holding the principal email.
    pub identity_claim: String,
    /// Lifetime of tokens minted by the issuance helper.
    pub token_ttl_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            scheme: "Bearer".to_string(),
            secret: String::new(),
            issuer: None,
            audience: None,
            identity_claim: "sub".to_string(),
            token_ttl_secs: 3_600,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct LoggingConfig {
    pub level: String,
    /// Absolute directory for rolling log files; logging stays off when unset.
    pub dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level().to_string(),
            dir: None,
        }
    }
}

/// Configuration load/validation failures.
#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: std::io::Error },
    Parse(serde_json::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "failed to parse config: {err}"),
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

impl HomehubConfig {
    pub fn from_json_str(value: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(value).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&content)
    }

    /// Checks everything except the secret, so registration and storage
    /// commands work on a config without one.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let scheme = self.auth.scheme.as_str();
        if scheme.trim().is_empty() || scheme.chars().any(char::is_whitespace) {
            return Err(ConfigError::Invalid(
                "auth.scheme must be a single non-empty word".to_string(),
            ));
        }
        let claim = self.auth.identity_claim.trim();
        if claim.is_empty() {
            return Err(ConfigError::Invalid(
                "auth.identity-claim must not be empty".to_string(),
            ));
        }
        if is_reserved_identity_claim(claim) {
            return Err(ConfigError::Invalid(format!(
                "auth.identity-claim `{claim}` is a registered claim"
            )));
        }
        if self.auth.token_ttl_secs == 0 || self.auth.token_ttl_secs > MAX_TOKEN_TTL_SECS {
            return Err(ConfigError::Invalid(format!(
                "auth.token-ttl-secs must be within 1..={MAX_TOKEN_TTL_SECS}"
            )));
        }
        if self.database.busy_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "database.busy-timeout-ms must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// [`Self::validate`] plus the secret needed to issue or verify tokens.
    pub fn validate_for_tokens(&self) -> Result<(), ConfigError> {
        self.validate()?;
        if self.auth.secret.is_empty() {
            return Err(ConfigError::Invalid("auth.secret must be set".to_string()));
        }
        Ok(())
    }
}
