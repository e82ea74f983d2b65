pub mod aabb;
pub mod loader;
pub mod node;
pub mod snapshot;

use crate::octree::node::OctreeNode;
use crate::octree::snapshot::OctreeNodeSnapshot;
use slab::Slab;
use std::collections::HashMap;

/// Handle of a node inside its [`Octree`]. Ids are assigned in creation order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Arena holding every node of a hierarchy.
///
/// Nodes are never removed, so slab keys grow monotonically and double as
/// node ids. Parent links are plain ids and carry no ownership.
#[derive(Debug)]
pub struct Octree {
    storage: Slab<OctreeNode>,
    names: HashMap<String, NodeId>,
    root_id: NodeId,
}

impl Octree {
    pub(crate) fn with_root(
        name: String,
        bounding_box: aabb::Aabb,
        spacing: f64,
        capacity: usize,
    ) -> Self {
        let mut storage = Slab::with_capacity(capacity);
        let root_id = NodeId(storage.vacant_key());
        storage.insert(OctreeNode::new(
            root_id,
            name.clone(),
            0,
            0,
            bounding_box,
            spacing,
            0,
            None,
        ));

        let mut names = HashMap::with_capacity(capacity);
        names.insert(name, root_id);

        Self {
            storage,
            names,
            root_id,
        }
    }

    pub fn root(&self) -> &OctreeNode {
        self.storage
            .get(self.root_id.0)
            .expect("root node not found - invariant broken")
    }

    pub fn root_id(&self) -> NodeId {
        self.root_id
    }

    pub fn node(&self, node_id: NodeId) -> Option<&OctreeNode> {
        self.storage.get(node_id.0)
    }

    pub fn node_by_name(&self, name: &str) -> Option<&OctreeNode> {
        self.names.get(name).and_then(|id| self.node(*id))
    }

    pub fn len(&self) -> usize {
        self.storage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    /// All nodes in creation order.
    pub fn iter(&self) -> impl Iterator<Item = &OctreeNode> + '_ {
        self.storage.iter().map(|(_, node)| node)
    }

    /// Insert `child` under `parent` at its octant slot.
    pub(crate) fn insert_child(
        &mut self,
        parent: NodeId,
        build: impl FnOnce(NodeId) -> OctreeNode,
    ) -> NodeId {
        let child_id = NodeId(self.storage.vacant_key());
        let child = build(child_id);
        let index = child.index as usize;

        self.names.insert(child.name.clone(), child_id);
        self.storage.insert(child);

        let parent = self
            .storage
            .get_mut(parent.0)
            .expect("parent node not found - invariant broken");
        parent.children[index] = Some(child_id);

        child_id
    }

    /// Takes a snapshot of the hierarchy and its current load/visibility state.
    pub fn snapshot(&self) -> OctreeNodeSnapshot {
        self.snapshot_from_node(self.root())
    }

    fn snapshot_from_node(&self, node: &OctreeNode) -> OctreeNodeSnapshot {
        let mut snapshot = OctreeNodeSnapshot::from(node);
        snapshot.children = node
            .children()
            .filter_map(|child| self.node(child))
            .map(|child| self.snapshot_from_node(child))
            .collect();
        snapshot
    }
}
