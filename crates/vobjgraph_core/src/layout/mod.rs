//! Coordinate assignment for reference graphs.
//!
//! # Responsibility
//! - Deterministic depth/column layout for tree-like presentation.
//! - Iterative force simulation stepped by an external scheduler.
//! - Zoom/pan viewport math and level-of-detail decisions.
//!
//! # Invariants
//! - Nothing in this module reads input devices or renders; callers drive
//!   every step and every drag.

pub mod force;
pub mod hierarchical;
pub mod viewport;
