//! Window into layout space plus the level-of-detail policy.
//!
//! Pure math with no dependency on graph storage; any presentation layer
//! may drive it.

use crate::graph::node::NodeId;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Zoom step and scale limits.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewportConfig {
    /// Width multiplier for one zoom-out step; zoom-in divides by it.
    pub zoom_factor: f64,
    pub min_scale: f64,
    pub max_scale: f64,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            zoom_factor: 1.1,
            min_scale: 0.1,
            max_scale: 10.0,
        }
    }
}

/// Visible rectangle of layout space.
///
/// `scale` is always `base_width / width`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub scale: f64,
    base_width: f64,
    base_height: f64,
    config: ViewportConfig,
}

impl Viewport {
    /// Viewport at scale 1 showing `width x height` from `(x, y)`.
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self::with_config(x, y, width, height, ViewportConfig::default())
    }

    pub fn with_config(x: f64, y: f64, width: f64, height: f64, config: ViewportConfig) -> Self {
        Self {
            x,
            y,
            width,
            height,
            scale: 1.0,
            base_width: width,
            base_height: height,
            config,
        }
    }

    pub fn base_size(&self) -> (f64, f64) {
        (self.base_width, self.base_height)
    }

    /// Zooms around a screen point. `sign > 0` zooms out, `sign < 0` zooms
    /// in, zero is a no-op.
    ///
    /// The layout point under `(focal_x, focal_y)` stays under it unless the
    /// scale clamp absorbs the whole step.
    pub fn zoom(
        &mut self,
        sign: i32,
        focal_x: f64,
        focal_y: f64,
        screen_width: f64,
        screen_height: f64,
    ) {
        if sign == 0 || screen_width <= 0.0 || screen_height <= 0.0 {
            return;
        }
        let anchor_x = self.x + focal_x / screen_width * self.width;
        let anchor_y = self.y + focal_y / screen_height * self.height;

        let factor = if sign > 0 {
            self.config.zoom_factor
        } else {
            1.0 / self.config.zoom_factor
        };
        let mut width = self.width * factor;
        let mut height = self.height * factor;
        let scale = self.base_width / width;
        if scale < self.config.min_scale || scale > self.config.max_scale {
            let clamped = scale.clamp(self.config.min_scale, self.config.max_scale);
            width = self.base_width / clamped;
            height = self.base_height / clamped;
        }

        self.width = width;
        self.height = height;
        self.scale = self.base_width / width;
        self.x = anchor_x - focal_x / screen_width * width;
        self.y = anchor_y - focal_y / screen_height * height;
    }

    /// Moves the window by a screen-space drag delta.
    pub fn pan(&mut self, dx_screen: f64, dy_screen: f64, screen_width: f64, screen_height: f64) {
        if screen_width <= 0.0 || screen_height <= 0.0 {
            return;
        }
        self.x -= dx_screen * (self.width / screen_width);
        self.y -= dy_screen * (self.height / screen_height);
    }

    /// Maps a screen coordinate to layout space.
    pub fn screen_to_layout(
        &self,
        screen_x: f64,
        screen_y: f64,
        screen_width: f64,
        screen_height: f64,
    ) -> (f64, f64) {
        (
            self.x + screen_x / screen_width * self.width,
            self.y + screen_y / screen_height * self.height,
        )
    }
}

/// How a node should be drawn at the current zoom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeDetail {
    /// Abstract circle.
    Marker,
    /// Full content preview.
    Full,
}

/// Level-of-detail thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LodPolicy {
    /// Share of the screen width a node must exceed to be drawn in full.
    pub detail_fraction: f64,
    /// Scale above which every node gets a label.
    pub label_scale_threshold: f64,
}

impl Default for LodPolicy {
    fn default() -> Self {
        Self {
            detail_fraction: 0.1,
            label_scale_threshold: 0.8,
        }
    }
}

impl LodPolicy {
    pub fn node_detail(&self, radius: f64, scale: f64, screen_width: f64) -> NodeDetail {
        if 2.0 * radius * scale > screen_width * self.detail_fraction {
            NodeDetail::Full
        } else {
            NodeDetail::Marker
        }
    }

    pub fn labels_visible(&self, scale: f64) -> bool {
        scale > self.label_scale_threshold
    }

    /// Nodes that get a text label.
    ///
    /// The selection and its direct neighbours are labeled at any zoom.
    pub fn labeled_nodes(
        &self,
        node_ids: impl IntoIterator<Item = NodeId>,
        scale: f64,
        selected: Option<NodeId>,
        selected_neighbours: &HashSet<NodeId>,
    ) -> HashSet<NodeId> {
        let all = self.labels_visible(scale);
        node_ids
            .into_iter()
            .filter(|node_id| {
                all || selected == Some(*node_id) || selected_neighbours.contains(node_id)
            })
            .collect()
    }
}
