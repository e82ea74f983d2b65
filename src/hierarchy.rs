//! Builds the octree from the flat `[name, pointCount]` hierarchy list.
//!
//! Node names are the root marker `r` followed by one octal digit per level,
//! the digit being the octant chosen at that depth. `r0` is the first child
//! of the root, `r07` the last child of `r0`, and so on.

use crate::metadata::HierarchyEntry;
use crate::octree::aabb::{create_child_aabb, Aabb};
use crate::octree::node::OctreeNode;
use crate::octree::Octree;
use thiserror::Error;
use tracing::{debug, trace, warn};

pub const ROOT_NAME: &str = "r";

#[derive(Error, Debug)]
pub enum HierarchyError {
    #[error("Hierarchy has no root entry \"r\"")]
    MissingRoot,

    #[error("Invalid node name: {0:?}")]
    InvalidName(String),

    #[error("Invalid bounding box: {0:?}")]
    InvalidBoundingBox(Aabb),

    #[error("Invalid spacing: {0}")]
    InvalidSpacing(f64),

    #[error("Invalid json: {0}")]
    Json(#[from] serde_json::Error),
}

/// Build the octree described by `entries`.
///
/// The first entry must be the root. Entries whose parent has not been seen
/// yet are skipped, any other malformed input fails the whole build.
pub fn build_octree(
    entries: &[HierarchyEntry],
    bounding_box: Aabb,
    spacing: f64,
) -> Result<Octree, HierarchyError> {
    if !bounding_box.is_valid() {
        return Err(HierarchyError::InvalidBoundingBox(bounding_box));
    }
    if !spacing.is_finite() || spacing <= 0.0 {
        return Err(HierarchyError::InvalidSpacing(spacing));
    }

    let (root, entries) = entries.split_first().ok_or(HierarchyError::MissingRoot)?;
    if root.name != ROOT_NAME {
        return Err(HierarchyError::MissingRoot);
    }

    let mut octree = Octree::with_root(root.name.clone(), bounding_box, spacing, entries.len() + 1);
    let mut skipped = 0_usize;

    for entry in entries {
        if octree.node_by_name(&entry.name).is_some() {
            warn!(name = %entry.name, "skipping duplicate hierarchy entry");
            skipped += 1;
            continue;
        }

        let index = octant_index(&entry.name)?;
        let (parent_name, _) = entry.name.split_at(entry.name.len() - 1);

        let Some(parent) = octree.node_by_name(parent_name) else {
            trace!(name = %entry.name, "skipping hierarchy entry without parent");
            skipped += 1;
            continue;
        };

        let parent_id = parent.id;
        let bounding_box = create_child_aabb(&parent.bounding_box, index as usize);
        let level = (entry.name.len() - 1) as u32;
        let child_spacing = spacing / 2_f64.powi(level as i32);

        octree.insert_child(parent_id, |id| {
            OctreeNode::new(
                id,
                entry.name.clone(),
                index,
                level,
                bounding_box,
                child_spacing,
                entry.num_points,
                Some(parent_id),
            )
        });
    }

    debug!(nodes = octree.len(), skipped, "built octree");

    Ok(octree)
}

/// Octant encoded by the last character of a non-root node name.
fn octant_index(name: &str) -> Result<u8, HierarchyError> {
    let invalid = || HierarchyError::InvalidName(name.to_string());

    let path = name.strip_prefix(ROOT_NAME).ok_or_else(invalid)?;
    if path.is_empty() || !path.bytes().all(|b| (b'0'..=b'7').contains(&b)) {
        return Err(invalid());
    }

    Ok(path.as_bytes()[path.len() - 1] - b'0')
}
