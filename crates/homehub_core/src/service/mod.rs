//! Core use-case services.
//!
//! # Responsibility
//! - Sequence identity resolution, lookups, access decisions and the
//!   delegated persistence call for every device operation.
//! - Keep transport layers decoupled from storage and token details.

pub mod device_service;
