use crate::octree::aabb::Aabb;
use crate::octree::node::OctreeNode;

/// Owned, tree shaped copy of a hierarchy, for inspection and debug output.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OctreeNodeSnapshot {
    pub name: String,
    pub bounding_box: Aabb,
    pub spacing: f64,
    pub level: u32,
    pub num_points: u32,
    pub loaded: bool,
    pub visible: bool,
    pub children: Vec<OctreeNodeSnapshot>,
}

impl From<&OctreeNode> for OctreeNodeSnapshot {
    fn from(node: &OctreeNode) -> Self {
        Self {
            name: node.name.clone(),
            bounding_box: node.bounding_box,
            spacing: node.spacing,
            level: node.level,
            num_points: node.num_points,
            loaded: node.is_loaded(),
            visible: node.is_visible(),
            children: Vec::new(),
        }
    }
}

pub struct SnapshotIter<'a> {
    stack: Vec<&'a OctreeNodeSnapshot>,
}

impl<'a> Iterator for SnapshotIter<'a> {
    type Item = &'a OctreeNodeSnapshot;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        for child in node.children.iter().rev() {
            self.stack.push(child);
        }
        Some(node)
    }
}

impl OctreeNodeSnapshot {
    /// Depth-first, pre-order iteration.
    pub fn iter(&self) -> SnapshotIter<'_> {
        SnapshotIter { stack: vec![self] }
    }

    pub fn total_points(&self) -> u64 {
        self.iter().map(|node| node.num_points as u64).sum()
    }
}
