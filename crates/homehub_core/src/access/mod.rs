//! Family-scoped access decisions.
//!
//! # Invariants
//! - ALLOW only when both sides carry a family reference and the ids match.
//! - Missing data always yields DENY.

pub mod gate;
