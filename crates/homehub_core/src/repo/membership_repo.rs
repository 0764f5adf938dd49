//! Family membership store contracts and SQLite implementation.
//!
//! # Responsibility
//! - Resolve principals by email and devices by name.
//! - Register families and principals (seeding and onboarding paths).
//!
//! # Invariants
//! - Emails are normalized before both writes and lookups.
//! - A principal's family reference may be absent; it is never defaulted.

use crate::db::DbError;
use crate::model::device::{Device, DeviceValidationError};
use crate::model::family::{Family, FamilyId};
use crate::model::principal::{normalize_email, Principal};
use crate::repo::device_repo::{parse_device_row, DEVICE_SELECT_SQL};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

/// Persistence error shared by membership and device repositories.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    /// Write targeted a device that does not exist.
    DeviceNotFound(String),
    /// Referenced family does not exist.
    FamilyNotFound(FamilyId),
    DuplicateDeviceName(String),
    DuplicatePrincipal(String),
    InvalidEmail(String),
    InvalidDevice(DeviceValidationError),
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::DeviceNotFound(name) => write!(f, "device not found: {name}"),
            Self::FamilyNotFound(id) => write!(f, "family not found: {id}"),
            Self::DuplicateDeviceName(name) => write!(f, "device name already exists: {name}"),
            Self::DuplicatePrincipal(email) => write!(f, "principal already exists: {email}"),
            Self::InvalidEmail(value) => write!(f, "invalid email: `{value}`"),
            Self::InvalidDevice(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::InvalidDevice(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<DeviceValidationError> for RepoError {
    fn from(value: DeviceValidationError) -> Self {
        Self::InvalidDevice(value)
    }
}

/// Lookup contract for principals, families and devices.
pub trait MembershipStore {
    /// Finds a principal by email; `Ok(None)` when no record matches.
    fn lookup_principal(&self, email: &str) -> RepoResult<Option<Principal>>;
    /// Finds a device by its globally unique name.
    fn lookup_device(&self, device_name: &str) -> RepoResult<Option<Device>>;
    fn get_family(&self, family_id: FamilyId) -> RepoResult<Option<Family>>;
}

/// SQLite-backed membership store.
pub struct SqliteMembershipStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteMembershipStore<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    /// Creates a family and returns it with its storage-assigned id.
    pub fn register_family(&self, family_name: &str) -> RepoResult<Family> {
        let family_name = family_name.trim();
        if family_name.is_empty() {
            return Err(RepoError::InvalidData(
                "family name must not be blank".to_string(),
            ));
        }

        self.conn.execute(
            "INSERT INTO families (family_name) VALUES (?1);",
            params![family_name],
        )?;
        let family_id = FamilyId(self.conn.last_insert_rowid());
        Ok(Family::new(family_id, family_name))
    }

    /// Creates a principal, optionally attached to an existing family.
    pub fn register_principal(
        &self,
        email: &str,
        family_id: Option<FamilyId>,
    ) -> RepoResult<Principal> {
        let email =
            normalize_email(email).ok_or_else(|| RepoError::InvalidEmail(email.to_string()))?;

        let inserted = self.conn.execute(
            "INSERT INTO principals (email, family_id) VALUES (?1, ?2);",
            params![email.as_str(), family_id.map(|id| id.0)],
        );

        match inserted {
            Ok(_) => Ok(Principal::new(email, family_id)),
            Err(err) => Err(match constraint_kind(&err) {
                Some(ConstraintKind::Unique) => RepoError::DuplicatePrincipal(email),
                Some(ConstraintKind::ForeignKey) => match family_id {
                    Some(id) => RepoError::FamilyNotFound(id),
                    None => RepoError::from(err),
                },
                _ => RepoError::from(err),
            }),
        }
    }
}

impl MembershipStore for SqliteMembershipStore<'_> {
    fn lookup_principal(&self, email: &str) -> RepoResult<Option<Principal>> {
        let Some(email) = normalize_email(email) else {
            return Ok(None);
        };

        let principal = self
            .conn
            .query_row(
                "SELECT email, family_id FROM principals WHERE email = ?1;",
                params![email],
                |row| {
                    Ok(Principal {
                        email: row.get("email")?,
                        family_id: row.get::<_, Option<i64>>("family_id")?.map(FamilyId),
                    })
                },
            )
            .optional()?;
        Ok(principal)
    }

    fn lookup_device(&self, device_name: &str) -> RepoResult<Option<Device>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{DEVICE_SELECT_SQL} WHERE device_name = ?1;"))?;
        let mut rows = stmt.query(params![device_name.trim()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_device_row(row)?));
        }

        Ok(None)
    }

    fn get_family(&self, family_id: FamilyId) -> RepoResult<Option<Family>> {
        let family = self
            .conn
            .query_row(
                "SELECT family_id, family_name FROM families WHERE family_id = ?1;",
                params![family_id.0],
                |row| {
                    Ok(Family {
                        family_id: FamilyId(row.get("family_id")?),
                        family_name: row.get("family_name")?,
                    })
                },
            )
            .optional()?;
        Ok(family)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ConstraintKind {
    Unique,
    ForeignKey,
    Other,
}

/// Classifies SQLite constraint failures by extended result code.
pub(crate) fn constraint_kind(err: &rusqlite::Error) -> Option<ConstraintKind> {
    match err {
        rusqlite::Error::SqliteFailure(inner, _)
            if inner.code == ErrorCode::ConstraintViolation =>
        {
            Some(match inner.extended_code {
                rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                | rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE => ConstraintKind::Unique,
                rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY => ConstraintKind::ForeignKey,
                _ => ConstraintKind::Other,
            })
        }
        _ => None,
    }
}
