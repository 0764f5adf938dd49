//! Family-scoped access control for household devices.
//!
//! Principals belong to a family; families own devices. Every device
//! operation resolves the caller from a bearer credential, checks family
//! membership, then delegates to storage.

pub mod access;
pub mod auth;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use access::gate::{decide, AccessGate, Decision, FamilyScoped};
pub use auth::credential::{strip_scheme, CredentialError};
pub use auth::jwt::{JwtVerifier, TokenIssueError};
pub use auth::{IdentityError, IdentityResolver, TokenVerifier};
pub use config::{AuthConfig, ConfigError, DatabaseConfig, HomehubConfig, LoggingConfig};
pub use logging::{
    default_log_level, init_logging, init_logging_from_config, logging_status, LoggingError,
};
pub use model::device::{
    Device, DeviceDescriptor, DeviceDetailsUpdate, DeviceValidationError, DeviceView, PowerState,
};
pub use model::family::{Family, FamilyId};
pub use model::principal::Principal;
pub use repo::device_repo::{DeviceRepository, SqliteDeviceRepository};
pub use repo::membership_repo::{MembershipStore, RepoError, RepoResult, SqliteMembershipStore};
pub use service::device_service::{
    DeviceService, DeviceServiceError, DeviceServiceResult, PowerAck, RequestStage,
};

/// Façade wired to SQLite storage and HS256 tokens.
pub type SqliteDeviceService<'conn> =
    DeviceService<SqliteMembershipStore<'conn>, SqliteDeviceRepository<'conn>, JwtVerifier>;

/// Builds the SQLite-backed façade from configuration.
pub fn sqlite_device_service<'conn>(
    conn: &'conn rusqlite::Connection,
    auth: &AuthConfig,
) -> SqliteDeviceService<'conn> {
    DeviceService::new(
        IdentityResolver::new(auth.scheme.clone(), JwtVerifier::from_config(auth)),
        SqliteMembershipStore::new(conn),
        SqliteDeviceRepository::new(conn),
        AccessGate::new(),
    )
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
