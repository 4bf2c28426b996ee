//! Repository layer for real object persistence.
//!
//! # Responsibility
//! - Define the data access contract used by store services and traversal.
//! - Keep SQLite query details out of service orchestration.
//!
//! # Invariants
//! - Writes enforce `RealObject::validate()` before persistence.
//! - Missing objects surface as `RepoError::NotFound`, never as defaults.

pub mod object_repo;
