//! Reference graph derived from the store.
//!
//! # Responsibility
//! - Walk links from a root object into an explicit node/edge arena.
//! - Share one cycle/budget guard between traversal and deep clone.
//!
//! # Invariants
//! - Each real object appears at most once per walk.
//! - A walk never holds more than `max_nodes` nodes.
//! - Cycles are an expected input, never an error.

pub mod guard;
pub mod node;
pub mod traversal;

pub use guard::{Admission, VisitGuard};
pub use node::{GraphEdge, GraphNode, NodeId, Vec2};
pub use traversal::{build_reference_graph, compute_incoming_counts, ReferenceGraph};
