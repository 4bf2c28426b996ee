//! Force-directed layout as a cooperative simulation.
//!
//! The host owns the frame loop and calls `step` once per tick. Dragging is
//! modeled by `pin` / `set_position` / `unpin`; the simulation never reads
//! input devices.
//!
//! # Invariants
//! - A step is never interrupted; `cancel` takes effect before the next one.
//! - The simulation stops after `max_iterations` steps at the latest.
//! - Pinned nodes keep their position but still push and pull others.

use crate::graph::node::{GraphEdge, GraphNode, NodeId, Vec2};
use crate::graph::traversal::{compute_incoming_counts, ReferenceGraph};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::f64::consts::TAU;

/// Physics parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForceConfig {
    pub base_radius: f64,
    /// Radius added per incoming edge.
    pub radius_scale: f64,
    pub max_radius: f64,
    pub repulsion: f64,
    pub attraction: f64,
    /// Velocity multiplier per step, in `(0, 1)`.
    pub damping: f64,
    /// Lower bound for the repulsion distance.
    pub min_distance: f64,
    pub center_pull: f64,
    /// Distance kept from the canvas edges.
    pub margin: f64,
    pub max_iterations: u32,
    /// Rest threshold for the sum of node speeds.
    pub epsilon: f64,
}

impl Default for ForceConfig {
    fn default() -> Self {
        Self {
            base_radius: 20.0,
            radius_scale: 4.0,
            max_radius: 60.0,
            repulsion: 5000.0,
            attraction: 0.01,
            damping: 0.85,
            min_distance: 10.0,
            center_pull: 0.001,
            margin: 20.0,
            max_iterations: 500,
            epsilon: 0.1,
        }
    }
}

/// Drawing surface size in layout units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Canvas {
    pub width: f64,
    pub height: f64,
}

impl Canvas {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(self.width / 2.0, self.height / 2.0)
    }
}

/// State reported after each `step`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepOutcome {
    /// Still moving; call `step` again.
    Running,
    /// Total speed dropped below `epsilon`.
    Settled,
    /// `max_iterations` reached.
    IterationCap,
    Cancelled,
}

impl StepOutcome {
    pub fn is_finished(self) -> bool {
        !matches!(self, StepOutcome::Running)
    }
}

/// Force simulation over one graph.
#[derive(Debug, Clone)]
pub struct ForceSimulation {
    nodes: Vec<GraphNode>,
    neighbours: Vec<Vec<NodeId>>,
    config: ForceConfig,
    canvas: Canvas,
    iterations: u32,
    state: StepOutcome,
}

impl ForceSimulation {
    /// Builds a simulation from a traversal result.
    pub fn from_graph(graph: &ReferenceGraph, canvas: Canvas, config: ForceConfig) -> Self {
        Self::new(graph.nodes.clone(), &graph.edges, canvas, config)
    }

    /// Places `nodes` on the initial circle and sizes them by in-degree.
    ///
    /// Node ids must equal their index in `nodes`.
    pub fn new(
        mut nodes: Vec<GraphNode>,
        edges: &[GraphEdge],
        canvas: Canvas,
        config: ForceConfig,
    ) -> Self {
        let incoming = compute_incoming_counts(&nodes, edges);
        let mut neighbours = vec![BTreeSet::new(); nodes.len()];
        for edge in edges {
            if edge.from == edge.to || edge.from >= nodes.len() || edge.to >= nodes.len() {
                continue;
            }
            neighbours[edge.from].insert(edge.to);
            neighbours[edge.to].insert(edge.from);
        }

        let center = canvas.center();
        let ring = canvas.width.min(canvas.height) * 0.7;
        let count = nodes.len();
        for (index, node) in nodes.iter_mut().enumerate() {
            node.velocity = Vec2::ZERO;
            node.pinned = false;
            node.radius = node_radius(
                &config,
                incoming.get(&node.node_id).copied().unwrap_or(0),
            );
            node.position = if count == 1 {
                center
            } else {
                let angle = TAU * index as f64 / count as f64;
                clamp_to_canvas(
                    center + Vec2::new(angle.cos(), angle.sin()) * ring,
                    canvas,
                    config.margin,
                )
            };
        }

        let state = if count <= 1 {
            StepOutcome::Settled
        } else {
            StepOutcome::Running
        };
        Self {
            nodes,
            neighbours: neighbours
                .into_iter()
                .map(|set| set.into_iter().collect())
                .collect(),
            config,
            canvas,
            iterations: 0,
            state,
        }
    }

    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    pub fn into_nodes(self) -> Vec<GraphNode> {
        self.nodes
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    pub fn state(&self) -> StepOutcome {
        self.state
    }

    /// Sum of node speeds, the rest criterion.
    pub fn total_speed(&self) -> f64 {
        self.nodes.iter().map(|node| node.velocity.length()).sum()
    }

    /// Advances the simulation by one step of `dt` (1.0 is nominal).
    ///
    /// Returns the state after the step; finished simulations ignore
    /// further calls.
    pub fn step(&mut self, dt: f64) -> StepOutcome {
        if self.state.is_finished() {
            return self.state;
        }
        if self.iterations >= self.config.max_iterations {
            self.state = StepOutcome::IterationCap;
            return self.state;
        }

        let forces = self.compute_forces();
        for (node, force) in self.nodes.iter_mut().zip(forces) {
            if node.pinned {
                node.velocity = Vec2::ZERO;
                continue;
            }
            node.velocity = (node.velocity + force * dt) * self.config.damping;
            node.position = clamp_to_canvas(
                node.position + node.velocity * dt,
                self.canvas,
                self.config.margin,
            );
        }
        self.iterations += 1;

        self.state = if self.total_speed() < self.config.epsilon {
            StepOutcome::Settled
        } else if self.iterations >= self.config.max_iterations {
            StepOutcome::IterationCap
        } else {
            StepOutcome::Running
        };
        if self.state.is_finished() {
            debug!(
                "event=force_layout module=layout status=ok outcome={:?} iterations={} nodes={}",
                self.state,
                self.iterations,
                self.nodes.len()
            );
        }
        self.state
    }

    /// Steps until the simulation finishes.
    pub fn run(&mut self) -> StepOutcome {
        while !self.step(1.0).is_finished() {}
        self.state
    }

    /// Stops the simulation before the next step.
    pub fn cancel(&mut self) {
        self.state = StepOutcome::Cancelled;
    }

    /// Restarts a finished simulation from the current positions.
    ///
    /// Used after a drag so the rest of the graph can settle again.
    pub fn reheat(&mut self) {
        self.iterations = 0;
        self.state = StepOutcome::Running;
    }

    /// Freezes a node so the caller can position it. Returns `false` for
    /// unknown ids.
    pub fn pin(&mut self, node_id: NodeId) -> bool {
        match self.nodes.get_mut(node_id) {
            Some(node) => {
                node.pinned = true;
                node.velocity = Vec2::ZERO;
                true
            }
            None => false,
        }
    }

    /// Releases a pinned node.
    pub fn unpin(&mut self, node_id: NodeId) -> bool {
        match self.nodes.get_mut(node_id) {
            Some(node) => {
                node.pinned = false;
                true
            }
            None => false,
        }
    }

    /// Moves a node, clamped to the canvas.
    pub fn set_position(&mut self, node_id: NodeId, x: f64, y: f64) -> bool {
        let (canvas, margin) = (self.canvas, self.config.margin);
        match self.nodes.get_mut(node_id) {
            Some(node) => {
                node.position = clamp_to_canvas(Vec2::new(x, y), canvas, margin);
                node.velocity = Vec2::ZERO;
                true
            }
            None => false,
        }
    }

    fn compute_forces(&self) -> Vec<Vec2> {
        let config = &self.config;
        let center = self.canvas.center();
        let mut forces = vec![Vec2::ZERO; self.nodes.len()];

        for (index, node) in self.nodes.iter().enumerate() {
            if node.pinned {
                continue;
            }
            let mut force = Vec2::ZERO;

            for (other_index, other) in self.nodes.iter().enumerate() {
                if other_index == index {
                    continue;
                }
                let delta = node.position - other.position;
                let distance = delta.length();
                let direction = if distance > f64::EPSILON {
                    delta * (1.0 / distance)
                } else {
                    separation_direction(index, other_index)
                };
                let clamped = distance.max(config.min_distance);
                force += direction * (config.repulsion / (clamped * clamped));
            }

            for neighbour in &self.neighbours[index] {
                force += (self.nodes[*neighbour].position - node.position) * config.attraction;
            }

            force += (center - node.position) * config.center_pull;
            forces[index] = force;
        }
        forces
    }
}

/// Radius from in-degree, clamped to `[base_radius, max_radius]`.
pub fn node_radius(config: &ForceConfig, incoming: usize) -> f64 {
    let upper = config.max_radius.max(config.base_radius);
    (config.base_radius + incoming as f64 * config.radius_scale).clamp(config.base_radius, upper)
}

fn clamp_to_canvas(position: Vec2, canvas: Canvas, margin: f64) -> Vec2 {
    let clamp_axis = |value: f64, extent: f64| {
        let low = margin.min(extent / 2.0);
        let high = (extent - margin).max(extent / 2.0);
        value.clamp(low, high)
    };
    Vec2::new(
        clamp_axis(position.x, canvas.width),
        clamp_axis(position.y, canvas.height),
    )
}

/// Deterministic unit vector for coincident nodes.
fn separation_direction(index: usize, other_index: usize) -> Vec2 {
    let angle = (index as f64 * 0.618_034 + other_index as f64 * 0.414_214) * TAU;
    let direction = Vec2::new(angle.cos(), angle.sin());
    if index < other_index {
        direction
    } else {
        direction * -1.0
    }
}
