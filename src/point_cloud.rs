use crate::camera::{Camera, Viewport};
use crate::hierarchy::HierarchyError;
use crate::metadata::HierarchyDescriptor;
use crate::octree::loader::{ChunkLoader, LoadChunkError, LoadOutcome, RenderSink, NODE_PLACEHOLDER};
use crate::octree::{NodeId, Octree};
use crate::resource::{ResourceClient, ResourceError};
use crate::selection::{select, Selection, SelectionError, SelectionOptions};
use futures::future::join_all;
use glam::DMat4;
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tracing::{debug, info};

const META_FILE_NAME: &str = "meta.json";

#[derive(Error, Debug)]
pub enum LoadPointCloudError {
    #[error("Error loading descriptor: {0}")]
    Resource(#[from] ResourceError),

    #[error("Error building hierarchy: {0}")]
    Hierarchy(#[from] HierarchyError),
}

#[derive(Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct PointCloudOptions {
    /// Chunk url template, `{r}` standing for the node name. When unset it is
    /// derived from the descriptor url.
    pub chunk_url: Option<String>,
    #[serde(flatten)]
    pub selection: SelectionOptions,
}

impl PointCloudOptions {
    pub fn from_json(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

/// Chunk url template next to a `meta.json` descriptor.
pub fn chunk_url_from_meta_url(meta_url: &str) -> String {
    meta_url.replace(META_FILE_NAME, NODE_PLACEHOLDER)
}

/// A streamed point cloud: its octree, the loader fetching node chunks and
/// the renderer receiving them.
pub struct PointCloud<C: ResourceClient> {
    octree: Octree,
    options: PointCloudOptions,
    transform: DMat4,
    loader: ChunkLoader<C>,
    sink: Arc<dyn RenderSink>,
    visible_nodes: Mutex<Vec<NodeId>>,
}

impl<C: ResourceClient> PointCloud<C> {
    /// Fetch the `meta.json` descriptor at `meta_url` and build the point cloud.
    pub async fn from_url(
        meta_url: &str,
        client: C,
        mut options: PointCloudOptions,
        sink: Arc<dyn RenderSink>,
    ) -> Result<Self, LoadPointCloudError> {
        let descriptor: HierarchyDescriptor = client.get_json(meta_url, None).await?;

        if options.chunk_url.is_none() {
            options.chunk_url = Some(chunk_url_from_meta_url(meta_url));
        }

        Self::from_descriptor(&descriptor, client, options, sink)
    }

    /// Build the point cloud from an already parsed descriptor. Without a
    /// `chunk_url` option, chunks are requested by their bare file name.
    pub fn from_descriptor(
        descriptor: &HierarchyDescriptor,
        client: C,
        options: PointCloudOptions,
        sink: Arc<dyn RenderSink>,
    ) -> Result<Self, LoadPointCloudError> {
        let octree = descriptor.build()?;
        let url_template = options
            .chunk_url
            .clone()
            .unwrap_or_else(|| NODE_PLACEHOLDER.to_string());

        info!(
            nodes = octree.len(),
            chunk_url = %url_template,
            "point cloud loaded"
        );

        Ok(Self {
            octree,
            options,
            transform: DMat4::IDENTITY,
            loader: ChunkLoader::new(url_template, client),
            sink,
            visible_nodes: Mutex::new(Vec::new()),
        })
    }

    pub fn octree(&self) -> &Octree {
        &self.octree
    }

    pub fn options(&self) -> &PointCloudOptions {
        &self.options
    }

    pub fn loader(&self) -> &ChunkLoader<C> {
        &self.loader
    }

    /// Object to world transform of the point cloud.
    pub fn transform(&self) -> DMat4 {
        self.transform
    }

    pub fn set_transform(&mut self, transform: DMat4) {
        self.transform = transform;
    }

    /// Nodes selected by the last successful [`PointCloud::update`].
    pub fn visible_nodes(&self) -> Vec<NodeId> {
        self.visible_nodes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Run a selection pass and forward visibility changes to the sink.
    ///
    /// Passes are serialized, a concurrent call waits for the running one.
    /// On error nothing is toggled.
    pub fn update(&self, camera: &Camera, viewport: Viewport) -> Result<Selection, SelectionError> {
        let mut visible_nodes = self
            .visible_nodes
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let selection = select(
            &self.octree,
            &self.transform,
            camera,
            viewport,
            &self.options.selection,
        )?;
        let selected: HashSet<NodeId> = selection.nodes.iter().copied().collect();

        let mut hidden = 0_usize;
        for node in visible_nodes
            .iter()
            .filter(|id| !selected.contains(*id))
            .filter_map(|id| self.octree.node(*id))
        {
            if node.set_visible(false) {
                self.sink.set_visible(node, false);
                hidden += 1;
            }
        }

        let mut shown = 0_usize;
        for node in selection.nodes.iter().filter_map(|id| self.octree.node(*id)) {
            if !node.set_visible(true) {
                self.sink.set_visible(node, true);
                shown += 1;
            }
        }

        debug!(shown, hidden, visible = selection.nodes.len(), "visibility updated");

        visible_nodes.clone_from(&selection.nodes);

        Ok(selection)
    }

    pub async fn ensure_loaded(&self, node_id: NodeId) -> Result<LoadOutcome, LoadChunkError> {
        self.loader
            .ensure_loaded(&self.octree, node_id, self.sink.as_ref())
            .await
    }

    /// Load every visible node that has no data yet, concurrently.
    ///
    /// Failures are isolated per node and returned, the failed nodes stay
    /// unloaded and are retried by a later call.
    pub async fn load_pending(&self) -> Vec<LoadChunkError> {
        let pending: Vec<NodeId> = self
            .visible_nodes()
            .into_iter()
            .filter(|id| self.octree.node(*id).is_some_and(|node| !node.is_loaded()))
            .collect();

        let results = join_all(pending.iter().map(|id| self.ensure_loaded(*id))).await;
        let errors: Vec<_> = results.into_iter().filter_map(Result::err).collect();

        debug!(pending = pending.len(), failed = errors.len(), "pending chunks loaded");

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::{encode_records, ChunkRecord, PointChunk};
    use crate::octree::node::OctreeNode;
    use async_trait::async_trait;
    use glam::DVec3;
    use std::collections::{BTreeMap, HashMap};

    const META_URL: &str = "https://example.com/cloud/meta.json";

    const META: &str = r#"{
        "Spacing": 2.0,
        "BoundingBox": {"Lx": 0, "Ly": 0, "Lz": 0, "Ux": 8, "Uy": 8, "Uz": 8},
        "Hierarchy": [["r", 0], ["r0", 10], ["r00", 10]]
    }"#;

    /// Serves a fixed set of urls, 404 for anything else.
    #[derive(Default)]
    struct MapClient {
        files: HashMap<String, Vec<u8>>,
        requests: Mutex<Vec<String>>,
    }

    impl MapClient {
        fn with(mut self, url: &str, bytes: Vec<u8>) -> Self {
            self.files.insert(url.to_string(), bytes);
            self
        }
    }

    #[async_trait]
    impl ResourceClient for MapClient {
        async fn get(
            &self,
            url: &str,
            _headers: Option<BTreeMap<String, String>>,
        ) -> Result<Vec<u8>, ResourceError> {
            self.requests.lock().unwrap().push(url.to_string());
            self.files.get(url).cloned().ok_or(ResourceError::Status(404))
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<(String, bool)>>,
        attached: Mutex<Vec<String>>,
    }

    impl RecordingSink {
        fn take_events(&self) -> Vec<(String, bool)> {
            std::mem::take(&mut *self.events.lock().unwrap())
        }
    }

    impl RenderSink for RecordingSink {
        fn attach(&self, node: &OctreeNode, chunk: Arc<PointChunk>) {
            assert!(!chunk.is_empty());
            self.attached.lock().unwrap().push(node.name.clone());
        }

        fn set_visible(&self, node: &OctreeNode, visible: bool) {
            self.events.lock().unwrap().push((node.name.clone(), visible));
        }
    }

    fn chunk(num_points: usize) -> Vec<u8> {
        let record = ChunkRecord {
            x: 1.0,
            y: 1.0,
            z: 1.0,
            r: 10,
            g: 20,
            b: 30,
        };
        encode_records(&vec![record; num_points])
    }

    fn client() -> MapClient {
        MapClient::default()
            .with(META_URL, META.as_bytes().to_vec())
            .with("https://example.com/cloud/r.bin", chunk(1))
            .with("https://example.com/cloud/r0.bin", chunk(10))
            .with("https://example.com/cloud/r00.bin", chunk(10))
    }

    /// Camera above `r00` looking straight down, at `height` over the origin.
    fn camera(height: f64) -> Camera {
        Camera::look_at(
            DVec3::new(1.0, 1.0, height),
            DVec3::new(1.0, 1.0, 0.0),
            DVec3::Y,
            90_f64.to_radians(),
            1.0,
            0.1,
            1000.0,
        )
    }

    fn names(cloud: &PointCloud<MapClient>, ids: &[NodeId]) -> Vec<String> {
        ids.iter()
            .map(|id| cloud.octree().node(*id).unwrap().name.clone())
            .collect()
    }

    async fn load(sink: Arc<RecordingSink>) -> PointCloud<MapClient> {
        PointCloud::from_url(META_URL, client(), PointCloudOptions::default(), sink)
            .await
            .unwrap()
    }

    #[test]
    fn test_options_from_json() {
        let options = PointCloudOptions::from_json(
            br#"{"chunkUrl": "data/{r}", "pointBudget": 1000, "maxLevel": 4}"#,
        )
        .unwrap();

        assert_eq!(options.chunk_url.as_deref(), Some("data/{r}"));
        assert_eq!(options.selection.point_budget, 1000);
        assert_eq!(options.selection.max_level, Some(4));
        assert_eq!(options.selection.minimum_node_pixel_size, 150.0);

        assert_eq!(PointCloudOptions::from_json(b"{}").unwrap(), PointCloudOptions::default());
    }

    #[test]
    fn test_chunk_url_from_meta_url() {
        assert_eq!(
            chunk_url_from_meta_url("https://example.com/cloud/meta.json"),
            "https://example.com/cloud/{r}"
        );
    }

    #[tokio::test]
    async fn test_from_url_builds_octree() {
        let cloud = load(Arc::default()).await;

        assert_eq!(cloud.octree().len(), 3);
        assert_eq!(
            cloud.options().chunk_url.as_deref(),
            Some("https://example.com/cloud/{r}")
        );
        assert_eq!(cloud.loader().url_template(), "https://example.com/cloud/{r}");
        assert_eq!(cloud.transform(), DMat4::IDENTITY);

        let snapshot = cloud.octree().snapshot();
        let names: Vec<_> = snapshot.iter().map(|node| node.name.as_str()).collect();
        assert_eq!(names, vec!["r", "r0", "r00"]);
        assert_eq!(snapshot.total_points(), 20);
        assert!(snapshot.iter().all(|node| !node.loaded && !node.visible));
    }

    #[tokio::test]
    async fn test_explicit_chunk_url_is_kept() {
        let options = PointCloudOptions {
            chunk_url: Some("https://cdn.example.com/{r}".to_string()),
            ..Default::default()
        };
        let cloud = PointCloud::from_url(META_URL, client(), options, Arc::new(RecordingSink::default()))
            .await
            .unwrap();

        let root = cloud.octree().root();
        assert_eq!(cloud.loader().chunk_url(root), "https://cdn.example.com/r.bin");
    }

    #[tokio::test]
    async fn test_from_url_failures() {
        let missing = PointCloud::from_url(
            META_URL,
            MapClient::default(),
            PointCloudOptions::default(),
            Arc::new(RecordingSink::default()),
        )
        .await;
        assert!(matches!(
            missing,
            Err(LoadPointCloudError::Resource(ResourceError::Status(404)))
        ));

        let garbage = PointCloud::from_url(
            META_URL,
            MapClient::default().with(META_URL, b"not json".to_vec()),
            PointCloudOptions::default(),
            Arc::new(RecordingSink::default()),
        )
        .await;
        assert!(matches!(
            garbage,
            Err(LoadPointCloudError::Resource(ResourceError::Json(_)))
        ));

        let rootless = br#"{"Spacing": 1, "BoundingBox": {"Lx": 0, "Ly": 0, "Lz": 0, "Ux": 1, "Uy": 1, "Uz": 1}, "Hierarchy": [["r0", 1]]}"#;
        let no_root = PointCloud::from_url(
            META_URL,
            MapClient::default().with(META_URL, rootless.to_vec()),
            PointCloudOptions::default(),
            Arc::new(RecordingSink::default()),
        )
        .await;
        assert!(matches!(
            no_root,
            Err(LoadPointCloudError::Hierarchy(HierarchyError::MissingRoot))
        ));
    }

    #[tokio::test]
    async fn test_update_toggles_visibility() {
        let sink = Arc::new(RecordingSink::default());
        let cloud = load(sink.clone()).await;
        let viewport = Viewport::new(1000, 1000);

        let near = cloud.update(&camera(4.0), viewport).unwrap();
        assert_eq!(names(&cloud, &near.nodes), vec!["r", "r0", "r00"]);
        assert_eq!(near.num_points, 20);
        assert_eq!(
            sink.take_events(),
            vec![
                ("r".to_string(), true),
                ("r0".to_string(), true),
                ("r00".to_string(), true),
            ]
        );

        // r00 projects to a few pixels from far away
        let far = cloud.update(&camera(100.0), viewport).unwrap();
        assert_eq!(names(&cloud, &far.nodes), vec!["r", "r0"]);
        assert_eq!(sink.take_events(), vec![("r00".to_string(), false)]);
        assert_eq!(names(&cloud, &cloud.visible_nodes()), vec!["r", "r0"]);

        cloud.update(&camera(100.0), viewport).unwrap();
        assert!(sink.take_events().is_empty());

        let snapshot = cloud.octree().snapshot();
        let visible: Vec<_> = snapshot
            .iter()
            .filter(|node| node.visible)
            .map(|node| node.name.as_str())
            .collect();
        assert_eq!(visible, vec!["r", "r0"]);
    }

    #[tokio::test]
    async fn test_failed_update_keeps_previous_state() {
        let sink = Arc::new(RecordingSink::default());
        let cloud = load(sink.clone()).await;

        cloud.update(&camera(4.0), Viewport::new(1000, 1000)).unwrap();
        sink.take_events();

        let result = cloud.update(&camera(4.0), Viewport::new(0, 1000));
        assert!(matches!(result, Err(SelectionError::InvalidViewport(_))));
        assert!(sink.take_events().is_empty());
        assert_eq!(cloud.visible_nodes().len(), 3);
    }

    #[tokio::test]
    async fn test_load_pending_loads_visible_nodes() {
        let sink = Arc::new(RecordingSink::default());
        let cloud = load(sink.clone()).await;

        cloud.update(&camera(100.0), Viewport::new(1000, 1000)).unwrap();
        assert!(cloud.load_pending().await.is_empty());

        let mut attached = sink.attached.lock().unwrap().clone();
        attached.sort();
        assert_eq!(attached, vec!["r", "r0"]);
        assert!(!cloud.octree().node_by_name("r00").unwrap().is_loaded());
        assert_eq!(
            cloud.octree().node_by_name("r0").unwrap().chunk().unwrap().len(),
            10
        );

        // nothing left to fetch
        let requests_before = cloud.loader.client_requests();
        assert!(cloud.load_pending().await.is_empty());
        assert_eq!(cloud.loader.client_requests(), requests_before);
    }

    #[tokio::test]
    async fn test_load_pending_isolates_failures() {
        let client = MapClient::default()
            .with(META_URL, META.as_bytes().to_vec())
            .with("https://example.com/cloud/r.bin", chunk(1))
            .with("https://example.com/cloud/r00.bin", chunk(10));
        let cloud = PointCloud::from_url(
            META_URL,
            client,
            PointCloudOptions::default(),
            Arc::new(RecordingSink::default()),
        )
        .await
        .unwrap();

        cloud.update(&camera(4.0), Viewport::new(1000, 1000)).unwrap();
        let errors = cloud.load_pending().await;

        assert_eq!(errors.len(), 1);
        assert!(matches!(
            &errors[0],
            LoadChunkError::ChunkLoadFailed { node, .. } if node == "r0"
        ));
        let loaded: Vec<_> = cloud
            .octree()
            .iter()
            .filter(|node| node.is_loaded())
            .map(|node| node.name.as_str())
            .collect();
        assert_eq!(loaded, vec!["r", "r00"]);

        let retry = cloud.ensure_loaded(cloud.octree().node_by_name("r0").unwrap().id).await;
        assert!(retry.is_err());
    }

    #[tokio::test]
    async fn test_transform_moves_selection() {
        let sink = Arc::new(RecordingSink::default());
        let mut cloud = load(sink).await;
        cloud.set_transform(DMat4::from_translation(DVec3::new(0.0, 0.0, 96.0)));

        // the camera at 100 is now 4 units above the translated r00
        let selection = cloud.update(&camera(100.0), Viewport::new(1000, 1000)).unwrap();
        assert_eq!(names(&cloud, &selection.nodes), vec!["r", "r0", "r00"]);
    }

    #[test]
    fn test_from_descriptor_defaults_to_relative_chunks() {
        let descriptor = crate::metadata::parse_descriptor(META.as_bytes()).unwrap();
        let cloud = PointCloud::from_descriptor(
            &descriptor,
            MapClient::default(),
            PointCloudOptions::default(),
            Arc::new(RecordingSink::default()),
        )
        .unwrap();
        assert_eq!(cloud.loader().chunk_url(cloud.octree().root()), "r.bin");
    }

    impl ChunkLoader<MapClient> {
        fn client_requests(&self) -> usize {
            self.client().requests.lock().unwrap().len()
        }
    }
}
