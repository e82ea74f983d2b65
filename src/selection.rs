//! Per-frame selection of the octree nodes to display.
//!
//! Nodes are visited greedily by projected screen size, largest first, until
//! the point budget would be exceeded. Nothing is kept between passes: a
//! subtree pruned for being too small is reconsidered from scratch on the
//! next call.

use crate::camera::{Camera, Viewport};
use crate::frustum::Frustum;
use crate::octree::aabb::BoundingSphere;
use crate::octree::{NodeId, Octree};
use crate::priority_queue::BinaryHeap;
use glam::{DMat4, DVec3};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, span, trace, Level};

#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct SelectionOptions {
    /// Maximum number of points across all selected nodes.
    pub point_budget: u64,
    /// Nodes at this level or deeper are never selected. `None` is unbounded.
    pub max_level: Option<u32>,
    /// Children whose bounding sphere projects to a smaller radius, in
    /// pixels, are not traversed.
    pub minimum_node_pixel_size: f64,
}

impl Default for SelectionOptions {
    fn default() -> Self {
        Self {
            point_budget: 500_000,
            max_level: None,
            minimum_node_pixel_size: 150.0,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Selection {
    /// Selected nodes, in traversal order.
    pub nodes: Vec<NodeId>,
    /// Smallest spacing among the selected nodes, `None` if nothing was selected.
    pub lowest_spacing: Option<f64>,
    pub num_points: u64,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SelectionError {
    #[error("Invalid camera: matrices must be finite and invertible, fov in (0, pi)")]
    InvalidCamera,

    #[error("Invalid viewport: {0:?}")]
    InvalidViewport(Viewport),

    #[error("Point cloud transform is not invertible")]
    InvalidTransform,
}

#[derive(Clone, Copy, Debug)]
struct Candidate {
    node: NodeId,
    weight: f64,
}

/// Converts bounding spheres to a projected pixel radius.
#[derive(Clone, Copy, Debug)]
struct ScreenProjection {
    camera_position: DVec3,
    slope: f64,
    half_height: f64,
    minimum_pixel_size: f64,
}

impl ScreenProjection {
    /// Queue weight of a node, or `None` when it is too small to traverse.
    fn weight(&self, sphere: &BoundingSphere) -> Option<f64> {
        let distance = sphere.center.distance(self.camera_position);
        let screen_pixel_radius = sphere.radius * self.half_height / (self.slope * distance);

        if screen_pixel_radius < self.minimum_pixel_size {
            return None;
        }
        if sphere.contains(self.camera_position) {
            return Some(f64::MAX);
        }
        Some(screen_pixel_radius)
    }
}

/// Select the nodes to display for one frame.
///
/// `world` places the octree in the scene; frustum and distances are
/// evaluated in the octree's own coordinate space. Nodes at level 0 and 1 are
/// always selected unless the budget runs out first. The pass stops at the
/// first node that would exceed `point_budget`.
pub fn select(
    octree: &Octree,
    world: &DMat4,
    camera: &Camera,
    viewport: Viewport,
    options: &SelectionOptions,
) -> Result<Selection, SelectionError> {
    if !camera.is_valid() {
        return Err(SelectionError::InvalidCamera);
    }
    if !viewport.is_valid() {
        return Err(SelectionError::InvalidViewport(viewport));
    }
    if !world.is_finite() || world.determinant() == 0.0 {
        return Err(SelectionError::InvalidTransform);
    }

    let _span = span!(Level::DEBUG, "select", nodes = octree.len()).entered();

    let frustum = Frustum::from_matrix(&(camera.projection * camera.view() * *world));
    let projection = ScreenProjection {
        camera_position: world.inverse().transform_point3(camera.position()),
        slope: (camera.fov_y / 2.0).tan(),
        half_height: 0.5 * viewport.height as f64,
        minimum_pixel_size: options.minimum_node_pixel_size,
    };

    let mut queue = BinaryHeap::with_capacity(octree.len(), |candidate: &Candidate| {
        1.0 / candidate.weight
    });
    for node in octree.iter().filter(|node| node.level <= 1) {
        queue.push(Candidate {
            node: node.id,
            weight: f64::MAX,
        });
    }

    let mut selection = Selection::default();

    while let Ok(candidate) = queue.pop_min() {
        let Some(node) = octree.node(candidate.node) else {
            continue;
        };

        let num_points = selection.num_points + node.num_points as u64;
        if num_points > options.point_budget {
            debug!(node = %node.name, "point budget reached");
            break;
        }

        let in_frustum = frustum.intersects_aabb(&node.bounding_box);
        let below_max_level = options.max_level.map_or(true, |max| node.level < max);
        if !(node.level <= 1 || (in_frustum && below_max_level)) {
            trace!(node = %node.name, in_frustum, "node culled");
            continue;
        }

        selection.num_points = num_points;
        selection.nodes.push(node.id);
        selection.lowest_spacing = Some(
            selection
                .lowest_spacing
                .map_or(node.spacing, |spacing| spacing.min(node.spacing)),
        );

        // levels 0 and 1 are already queued
        for child in node.children().filter_map(|id| octree.node(id)) {
            if child.level <= 1 {
                continue;
            }
            match projection.weight(&child.bounding_sphere) {
                Some(weight) => {
                    queue.push(Candidate {
                        node: child.id,
                        weight,
                    });
                }
                None => trace!(node = %child.name, "node too small on screen"),
            }
        }
    }

    debug!(
        selected = selection.nodes.len(),
        points = selection.num_points,
        lowest_spacing = ?selection.lowest_spacing,
        "selection pass done"
    );

    Ok(selection)
}
