use crate::chunk::PointChunk;
use crate::octree::aabb::{Aabb, BoundingSphere};
use crate::octree::NodeId;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

#[derive(Debug)]
pub struct OctreeNode {
    pub id: NodeId,
    pub name: String,
    /// Octant of this node inside its parent, 0 for the root.
    pub index: u8,
    pub level: u32,
    pub bounding_box: Aabb,
    pub bounding_sphere: BoundingSphere,
    pub spacing: f64,
    pub num_points: u32,
    pub parent: Option<NodeId>,
    pub children: [Option<NodeId>; 8],
    pub(crate) state: NodeState,
}

impl OctreeNode {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        id: NodeId,
        name: String,
        index: u8,
        level: u32,
        bounding_box: Aabb,
        spacing: f64,
        num_points: u32,
        parent: Option<NodeId>,
    ) -> Self {
        Self {
            id,
            name,
            index,
            level,
            bounding_sphere: bounding_box.bounding_sphere(),
            bounding_box,
            spacing,
            num_points,
            parent,
            children: [None; 8],
            state: NodeState::default(),
        }
    }

    /// Ids of the existing children, in octant order.
    pub fn children(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.children.iter().flatten().copied()
    }

    pub fn has_children(&self) -> bool {
        self.children.iter().any(Option::is_some)
    }

    pub fn is_loaded(&self) -> bool {
        self.state.loaded.load(Ordering::Acquire)
    }

    pub fn is_visible(&self) -> bool {
        self.state.visible.load(Ordering::Acquire)
    }

    /// Point data attached once the chunk has been fetched.
    pub fn chunk(&self) -> Option<&Arc<PointChunk>> {
        self.state.chunk.get()
    }

    /// Returns the previous visibility.
    pub(crate) fn set_visible(&self, visible: bool) -> bool {
        self.state.visible.swap(visible, Ordering::AcqRel)
    }
}

/// Mutable part of a node, shared between the selection driver and chunk loads.
///
/// `visible` is only written by the selection driver, `loaded` only by the
/// loader. `loading` is the in-flight marker serializing loads of one node.
#[derive(Debug, Default)]
pub(crate) struct NodeState {
    loaded: AtomicBool,
    loading: AtomicBool,
    visible: AtomicBool,
    chunk: OnceLock<Arc<PointChunk>>,
}

impl NodeState {
    /// Takes the in-flight marker. Fails if a load is running or done.
    ///
    /// The marker is released when the returned guard is dropped, so a
    /// cancelled load can be retried.
    pub(crate) fn try_begin_load(&self) -> Option<LoadGuard<'_>> {
        if self.loaded.load(Ordering::Acquire) {
            return None;
        }
        self.loading
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        let guard = LoadGuard { state: self };
        // a load may have completed between both checks
        if self.loaded.load(Ordering::Acquire) {
            return None;
        }
        Some(guard)
    }

    #[cfg(test)]
    pub(crate) fn is_loading(&self) -> bool {
        self.loading.load(Ordering::Acquire)
    }
}

/// Holds the in-flight marker of one node.
#[derive(Debug)]
pub(crate) struct LoadGuard<'a> {
    state: &'a NodeState,
}

impl LoadGuard<'_> {
    /// Stores the chunk and marks the node loaded.
    pub(crate) fn complete(self, chunk: Arc<PointChunk>) -> Arc<PointChunk> {
        let chunk = self.state.chunk.get_or_init(|| chunk).clone();
        self.state.loaded.store(true, Ordering::Release);
        chunk
    }
}

impl Drop for LoadGuard<'_> {
    fn drop(&mut self) {
        self.state.loading.store(false, Ordering::Release);
    }
}
