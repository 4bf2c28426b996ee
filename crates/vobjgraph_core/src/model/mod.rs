//! Persistent domain model for real objects and their embedded links.
//!
//! # Responsibility
//! - Define the real object / record / link shapes shared by every layer.
//! - Keep validation rules next to the data they protect.
//!
//! # Invariants
//! - Every real object is identified by a time-ordered `RealId`.
//! - A real object always owns at least one record, numbered densely from 0.
//! - Link geometry satisfies `right > left` and `bottom > top`.

pub mod link;
pub mod real_object;
