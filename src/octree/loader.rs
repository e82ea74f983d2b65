use crate::chunk::{parse_chunk, ChunkFormatError, PointChunk};
use crate::octree::node::OctreeNode;
use crate::octree::{NodeId, Octree};
use crate::resource::{ResourceClient, ResourceError};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, span, warn, Instrument, Level};

/// Placeholder substituted with `<node name>.bin` in chunk url templates.
pub const NODE_PLACEHOLDER: &str = "{r}";

/// Rendering side of the point cloud.
pub trait RenderSink: Send + Sync {
    /// A freshly loaded chunk of a visible node is ready for display.
    ///
    /// A selection pass running concurrently may hide the node before this
    /// returns, in which case `set_visible(node, false)` follows the attach.
    fn attach(&self, node: &OctreeNode, chunk: Arc<PointChunk>);

    /// The node's visibility changed after a selection pass.
    fn set_visible(&self, node: &OctreeNode, visible: bool);
}

/// Sink discarding everything, for headless use.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSink;

impl RenderSink for NoopSink {
    fn attach(&self, _node: &OctreeNode, _chunk: Arc<PointChunk>) {}

    fn set_visible(&self, _node: &OctreeNode, _visible: bool) {}
}

#[derive(Error, Debug)]
pub enum LoadChunkError {
    #[error("Node does not exist")]
    NodeNotFound,

    #[error("Failed to load node {node} from {url}: {source}")]
    ChunkLoadFailed {
        node: String,
        url: String,
        source: ResourceError,
    },

    #[error("Failed to load node {node} from {url}: empty payload")]
    EmptyPayload { node: String, url: String },

    #[error("Failed to load node {node} from {url}: {source}")]
    InvalidChunk {
        node: String,
        url: String,
        source: ChunkFormatError,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The chunk was fetched by this call, with this many points.
    Loaded(usize),
    AlreadyLoaded,
    /// Another call is fetching the chunk.
    InFlight,
}

/// Fetches and decodes node chunks.
///
/// A failed or cancelled load leaves the node unloaded so it is retried the
/// next time it gets selected.
#[derive(Clone, Debug)]
pub struct ChunkLoader<C: ResourceClient> {
    url_template: String,
    client: C,
}

impl<C: ResourceClient> ChunkLoader<C> {
    pub fn new(url_template: impl Into<String>, client: C) -> Self {
        Self {
            url_template: url_template.into(),
            client,
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn url_template(&self) -> &str {
        &self.url_template
    }

    pub fn chunk_url(&self, node: &OctreeNode) -> String {
        self.url_template
            .replace(NODE_PLACEHOLDER, &format!("{}.bin", node.name))
    }

    pub async fn ensure_loaded(
        &self,
        octree: &Octree,
        node_id: NodeId,
        sink: &dyn RenderSink,
    ) -> Result<LoadOutcome, LoadChunkError> {
        let node = octree.node(node_id).ok_or(LoadChunkError::NodeNotFound)?;

        let Some(guard) = node.state.try_begin_load() else {
            return Ok(if node.is_loaded() {
                LoadOutcome::AlreadyLoaded
            } else {
                LoadOutcome::InFlight
            });
        };

        let url = self.chunk_url(node);

        let span = span!(Level::DEBUG, "load_chunk", node = %node.name);
        let chunk = match self.fetch(node, &url).instrument(span).await {
            Ok(chunk) => chunk,
            Err(error) => {
                warn!(node = %node.name, %error, "chunk load failed");
                return Err(error);
            }
        };

        let num_points = chunk.len();
        let chunk = guard.complete(Arc::new(chunk));
        debug!(node = %node.name, %url, num_points, "chunk loaded");

        if node.is_visible() {
            sink.attach(node, chunk);
            // hidden by a selection pass while attaching
            if !node.is_visible() {
                sink.set_visible(node, false);
            }
        }

        Ok(LoadOutcome::Loaded(num_points))
    }

    async fn fetch(&self, node: &OctreeNode, url: &str) -> Result<PointChunk, LoadChunkError> {
        let bytes = self.client.get(url, None).await.map_err(|source| {
            LoadChunkError::ChunkLoadFailed {
                node: node.name.clone(),
                url: url.to_string(),
                source,
            }
        })?;

        if bytes.is_empty() {
            return Err(LoadChunkError::EmptyPayload {
                node: node.name.clone(),
                url: url.to_string(),
            });
        }

        parse_chunk(&bytes).map_err(|source| LoadChunkError::InvalidChunk {
            node: node.name.clone(),
            url: url.to_string(),
            source,
        })
    }
}
