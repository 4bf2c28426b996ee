//! Deterministic depth-column layout.
//!
//! # Invariants
//! - Every node at depth `d` shares `x = d * (node_width + horizontal_gap)`.
//! - Within a depth, `y = index * (node_height + vertical_gap)` in traversal
//!   order.

use crate::graph::node::{GraphNode, NodeId, Vec2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Spacing parameters for the hierarchical layout.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HierarchicalConfig {
    pub node_width: f64,
    pub node_height: f64,
    pub horizontal_gap: f64,
    pub vertical_gap: f64,
    /// Added on every side of the scroll bounds.
    pub padding: f64,
}

impl Default for HierarchicalConfig {
    fn default() -> Self {
        Self {
            node_width: 160.0,
            node_height: 48.0,
            horizontal_gap: 80.0,
            vertical_gap: 24.0,
            padding: 40.0,
        }
    }
}

/// Axis-aligned rectangle in layout space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Bounds {
    pub const EMPTY: Bounds = Bounds {
        min_x: 0.0,
        min_y: 0.0,
        max_x: 0.0,
        max_y: 0.0,
    };

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    fn include(&mut self, rect: &NodeRect) {
        self.min_x = self.min_x.min(rect.x);
        self.min_y = self.min_y.min(rect.y);
        self.max_x = self.max_x.max(rect.x + rect.width);
        self.max_y = self.max_y.max(rect.y + rect.height);
    }
}

/// Placed rectangle of one node.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NodeRect {
    pub node_id: NodeId,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Output of `layout_hierarchical`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HierarchicalLayout {
    /// One rect per input node, in input order.
    pub rects: Vec<NodeRect>,
    /// Union of all rects grown by `padding`, for scroll-range reporting.
    pub scroll_bounds: Bounds,
}

impl HierarchicalLayout {
    pub fn rect_of(&self, node_id: NodeId) -> Option<&NodeRect> {
        self.rects.iter().find(|rect| rect.node_id == node_id)
    }

    /// Copies rect origins into node positions.
    pub fn apply_to(&self, nodes: &mut [GraphNode]) {
        for node in nodes {
            if let Some(rect) = self.rect_of(node.node_id) {
                node.position = Vec2::new(rect.x, rect.y);
                node.velocity = Vec2::ZERO;
            }
        }
    }
}

/// Assigns column/row coordinates by depth.
pub fn layout_hierarchical(nodes: &[GraphNode], config: &HierarchicalConfig) -> HierarchicalLayout {
    let column_step = config.node_width + config.horizontal_gap;
    let row_step = config.node_height + config.vertical_gap;

    let mut next_row: BTreeMap<usize, usize> = BTreeMap::new();
    let mut rects = Vec::with_capacity(nodes.len());
    for node in nodes {
        let row = next_row.entry(node.depth).or_insert(0);
        rects.push(NodeRect {
            node_id: node.node_id,
            x: node.depth as f64 * column_step,
            y: *row as f64 * row_step,
            width: config.node_width,
            height: config.node_height,
        });
        *row += 1;
    }

    let scroll_bounds = match rects.first() {
        None => Bounds::EMPTY,
        Some(first) => {
            let mut bounds = Bounds {
                min_x: first.x,
                min_y: first.y,
                max_x: first.x + first.width,
                max_y: first.y + first.height,
            };
            for rect in &rects[1..] {
                bounds.include(rect);
            }
            Bounds {
                min_x: bounds.min_x - config.padding,
                min_y: bounds.min_y - config.padding,
                max_x: bounds.max_x + config.padding,
                max_y: bounds.max_y + config.padding,
            }
        }
    };

    HierarchicalLayout {
        rects,
        scroll_bounds,
    }
}
