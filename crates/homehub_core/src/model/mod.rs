//! Household domain model.
//!
//! # Responsibility
//! - Define families, principals and devices as seen by the access core.
//! - Keep family references explicit so absent membership is representable.
//!
//! # Invariants
//! - Families are compared by `FamilyId`, never by name.
//! - A device's owning family must equal the family of any principal allowed
//!   to read or mutate it.

pub mod device;
pub mod family;
pub mod principal;
