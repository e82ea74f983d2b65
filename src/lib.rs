pub mod camera;
pub mod chunk;
pub mod frustum;
pub mod hierarchy;
pub mod metadata;
pub mod octree;
pub mod point;
pub mod point_cloud;
pub mod prelude;
pub mod priority_queue;
pub mod resource;
pub mod selection;
