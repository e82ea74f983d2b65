pub use crate::camera::{Camera, Viewport};
pub use crate::chunk::PointChunk;
pub use crate::metadata::{parse_descriptor, HierarchyDescriptor};
pub use crate::octree::loader::{ChunkLoader, LoadOutcome, NoopSink, RenderSink};
pub use crate::octree::node::OctreeNode;
pub use crate::octree::snapshot::OctreeNodeSnapshot;
pub use crate::octree::{NodeId, Octree};
pub use crate::point::PointData;
pub use crate::point_cloud::{PointCloud, PointCloudOptions};
pub use crate::resource::ResourceClient;
pub use crate::selection::{select, Selection, SelectionOptions};

#[cfg(feature = "fs")]
pub use crate::resource::file::FileClient;
#[cfg(feature = "reqwest")]
pub use crate::resource::reqwest::ReqwestClient;
#[cfg(feature = "ehttp")]
pub use crate::resource::ehttp::EhttpClient;
#[cfg(all(feature = "fs", feature = "reqwest"))]
pub use crate::resource::hybrid::HybridClient;

// Error types
pub use crate::chunk::ChunkFormatError;
pub use crate::hierarchy::HierarchyError;
pub use crate::octree::loader::LoadChunkError;
pub use crate::point_cloud::LoadPointCloudError;
pub use crate::priority_queue::EmptyQueue;
pub use crate::resource::ResourceError;
pub use crate::selection::SelectionError;
