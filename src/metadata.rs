use crate::hierarchy::{build_octree, HierarchyError};
use crate::octree::aabb::Aabb;
use crate::octree::Octree;
use glam::DVec3;
use serde::Deserialize;

/// Parse a `meta.json` hierarchy descriptor.
pub fn parse_descriptor(bytes: &[u8]) -> Result<HierarchyDescriptor, HierarchyError> {
    Ok(serde_json::from_slice(bytes)?)
}

#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct HierarchyDescriptor {
    pub spacing: f64,
    pub bounding_box: BoundingBox,
    /// Parents always precede their children.
    pub hierarchy: Vec<HierarchyEntry>,
}

#[derive(Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    #[serde(rename = "Lx")]
    pub lx: f64,
    #[serde(rename = "Ly")]
    pub ly: f64,
    #[serde(rename = "Lz")]
    pub lz: f64,
    #[serde(rename = "Ux")]
    pub ux: f64,
    #[serde(rename = "Uy")]
    pub uy: f64,
    #[serde(rename = "Uz")]
    pub uz: f64,
}

/// One `[name, pointCount]` pair of the hierarchy list.
#[derive(Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(from = "(String, u32)")]
pub struct HierarchyEntry {
    pub name: String,
    pub num_points: u32,
}

impl HierarchyEntry {
    pub fn new(name: impl Into<String>, num_points: u32) -> Self {
        Self {
            name: name.into(),
            num_points,
        }
    }
}

impl From<(String, u32)> for HierarchyEntry {
    fn from((name, num_points): (String, u32)) -> Self {
        Self { name, num_points }
    }
}

impl From<BoundingBox> for Aabb {
    fn from(bounding_box: BoundingBox) -> Self {
        Aabb::new(
            DVec3::new(bounding_box.lx, bounding_box.ly, bounding_box.lz),
            DVec3::new(bounding_box.ux, bounding_box.uy, bounding_box.uz),
        )
    }
}

impl HierarchyDescriptor {
    pub fn build(&self) -> Result<Octree, HierarchyError> {
        build_octree(&self.hierarchy, self.bounding_box.into(), self.spacing)
    }
}
