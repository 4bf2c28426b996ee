//! Store use-case services.
//!
//! # Responsibility
//! - Compose repository primitives and the link codec into store operations.
//! - Keep the reference-count invariant while content and links change.
//!
//! # See also
//! - `crate::graph` for the walk shared with deep clone.

pub mod clone_ops;
pub mod object_service;
