//! Transient graph arena types.

use crate::model::real_object::RealId;
use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Mul, Sub};

/// Index of a node inside one `ReferenceGraph`.
pub type NodeId = usize;

/// 2D vector used for positions, velocities and forces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn length(self) -> f64 {
        self.x.hypot(self.y)
    }
}

impl Add for Vec2 {
    type Output = Vec2;

    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl AddAssign for Vec2 {
    fn add_assign(&mut self, rhs: Vec2) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl Sub for Vec2 {
    type Output = Vec2;

    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Vec2 {
    type Output = Vec2;

    fn mul(self, rhs: f64) -> Vec2 {
        Vec2::new(self.x * rhs, self.y * rhs)
    }
}

/// One real object as seen by traversal and layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub node_id: NodeId,
    pub real_id: RealId,
    /// Hop distance from the traversal root.
    pub depth: usize,
    pub position: Vec2,
    pub velocity: Vec2,
    pub radius: f64,
    /// Set while an external caller is positioning the node.
    pub pinned: bool,
}

impl GraphNode {
    pub fn new(node_id: NodeId, real_id: RealId, depth: usize) -> Self {
        Self {
            node_id,
            real_id,
            depth,
            position: Vec2::ZERO,
            velocity: Vec2::ZERO,
            radius: 0.0,
            pinned: false,
        }
    }
}

/// Directed edge between two nodes of the same graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GraphEdge {
    pub from: NodeId,
    pub to: NodeId,
}

impl GraphEdge {
    pub fn new(from: NodeId, to: NodeId) -> Self {
        Self { from, to }
    }
}
