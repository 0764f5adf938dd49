//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the lookup contract of the family membership store.
//! - Define device write/list contracts used by the device façade.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Lookups return `Ok(None)` for a missing record; callers decide how an
//!   absent record surfaces.
//! - Constraint violations are mapped to semantic errors
//!   (`DuplicateDeviceName`, `DuplicatePrincipal`, `FamilyNotFound`).

pub mod device_repo;
pub mod membership_repo;
