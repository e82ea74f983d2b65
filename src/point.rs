use glam::{DVec3, Vec3};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct PointData {
    pub position: DVec3,
    /// RGB normalized to `0.0..=1.0`.
    pub color: Vec3,
}
