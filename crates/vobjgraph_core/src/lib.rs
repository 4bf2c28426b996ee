//! Core of the real/virtual object graph store.
//!
//! Real objects are persistent, reference-counted content holders; links
//! ("virtual objects") are positioned references embedded in their records.
//! This crate owns persistence, the link codec, cycle-safe traversal and
//! cloning, and the layout/viewport math used to present the graph.

pub mod codec;
pub mod db;
pub mod graph;
pub mod layout;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod store;

pub use codec::link_codec::{parse_link_target, parse_links, resolve_target_id, serialize_links};
pub use graph::{
    build_reference_graph, compute_incoming_counts, Admission, GraphEdge, GraphNode, NodeId,
    ReferenceGraph, Vec2, VisitGuard,
};
pub use layout::force::{Canvas, ForceConfig, ForceSimulation, StepOutcome};
pub use layout::hierarchical::{layout_hierarchical, HierarchicalConfig, HierarchicalLayout};
pub use layout::viewport::{LodPolicy, NodeDetail, Viewport, ViewportConfig};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::link::{Color, Link, LinkError, LinkFlags, LinkRect, LinkStyle, LinkTarget};
pub use model::real_object::{
    HandlerEntry, ObjectValidationError, RealId, RealObject, RealObjectMeta, Record, RecordNo,
};
pub use repo::object_repo::{ObjectRepository, RepoError, RepoResult, SqliteObjectRepository};
pub use service::clone_ops::CloneOutcome;
pub use service::object_service::{
    ObjectService, ReconcileReport, RefCountRepair, DEFAULT_MAX_NODES,
};
pub use store::{default_db_path, resolve_db_path, Store, DB_PATH_ENV, DEFAULT_DB_FILE_NAME};

/// Minimal health-check API for host integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
