//! Bounded breadth-first walk over the link graph.
//!
//! # Invariants
//! - Node ids equal guard slots, so `nodes[i].node_id == i`.
//! - At most one edge exists per ordered `(from, to)` pair.
//! - Links whose target is missing from the store are skipped, not fatal.

use crate::codec::link_codec::parse_links;
use crate::graph::guard::{Admission, VisitGuard};
use crate::graph::node::{GraphEdge, GraphNode, NodeId};
use crate::model::real_object::RealId;
use crate::repo::object_repo::{ObjectRepository, RepoError, RepoResult};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Instant;

/// Node/edge set reachable from one root.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReferenceGraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    /// `true` when the node budget stopped the walk early.
    pub truncated: bool,
}

impl ReferenceGraph {
    pub fn node_of(&self, real_id: RealId) -> Option<&GraphNode> {
        self.nodes.iter().find(|node| node.real_id == real_id)
    }

    pub fn contains_edge(&self, from: RealId, to: RealId) -> bool {
        let (Some(from), Some(to)) = (self.node_of(from), self.node_of(to)) else {
            return false;
        };
        self.edges.contains(&GraphEdge::new(from.node_id, to.node_id))
    }

    /// Direct neighbours of `node_id`, ignoring edge direction.
    pub fn neighbours(&self, node_id: NodeId) -> HashSet<NodeId> {
        self.edges
            .iter()
            .filter_map(|edge| {
                if edge.from == node_id {
                    Some(edge.to)
                } else if edge.to == node_id {
                    Some(edge.from)
                } else {
                    None
                }
            })
            .filter(|other| *other != node_id)
            .collect()
    }
}

/// Builds the reference graph rooted at `root_id`, holding at most
/// `max_nodes` nodes.
///
/// # Errors
/// - `RepoError::NotFound` when the root does not exist.
/// - Storage errors from the repository.
pub fn build_reference_graph<R: ObjectRepository>(
    repo: &R,
    root_id: RealId,
    max_nodes: usize,
) -> RepoResult<ReferenceGraph> {
    let started_at = Instant::now();
    if !repo.exists(root_id)? {
        return Err(RepoError::NotFound(root_id));
    }

    let mut guard = VisitGuard::new(max_nodes);
    let mut graph = ReferenceGraph::default();
    let mut edge_set = HashSet::new();
    let mut queue = VecDeque::new();

    if let Admission::Fresh(slot) = guard.admit(root_id) {
        graph.nodes.push(GraphNode::new(slot, root_id, 0));
        queue.push_back(slot);
    }

    while let Some(current) = queue.pop_front() {
        let current_id = graph.nodes[current].real_id;
        let current_depth = graph.nodes[current].depth;
        let Some(object) = repo.get_object(current_id)? else {
            continue;
        };

        for record in &object.records {
            for link in parse_links(record) {
                let target_id = link.target.real_id;
                let target_node = match guard.slot_of(target_id) {
                    Some(slot) => slot,
                    None => {
                        if !repo.exists(target_id)? {
                            debug!(
                                "event=graph_walk module=graph status=skip reason=dangling_link from={} to={}",
                                current_id, target_id
                            );
                            continue;
                        }
                        match guard.admit(target_id) {
                            Admission::Fresh(slot) => {
                                graph
                                    .nodes
                                    .push(GraphNode::new(slot, target_id, current_depth + 1));
                                queue.push_back(slot);
                                slot
                            }
                            Admission::Seen(slot) => slot,
                            Admission::Rejected => continue,
                        }
                    }
                };

                if edge_set.insert((current, target_node)) {
                    graph.edges.push(GraphEdge::new(current, target_node));
                }
            }
        }
    }

    graph.truncated = guard.is_truncated();
    info!(
        "event=graph_build module=graph status=ok nodes={} edges={} truncated={} max_nodes={} duration_ms={}",
        graph.nodes.len(),
        graph.edges.len(),
        graph.truncated,
        guard.budget(),
        started_at.elapsed().as_millis()
    );
    Ok(graph)
}

/// Counts incoming edges per node; every node gets an entry.
pub fn compute_incoming_counts(nodes: &[GraphNode], edges: &[GraphEdge]) -> HashMap<NodeId, usize> {
    let mut counts = nodes
        .iter()
        .map(|node| (node.node_id, 0usize))
        .collect::<HashMap<_, _>>();
    for edge in edges {
        *counts.entry(edge.to).or_insert(0) += 1;
    }
    counts
}
