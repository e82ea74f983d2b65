use glam::{DMat4, DVec3};

/// Perspective camera as seen by the selection pass.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    /// Camera to world transform, the inverse of the view matrix.
    pub world: DMat4,
    pub projection: DMat4,
    /// Vertical field of view in radians.
    pub fov_y: f64,
}

impl Camera {
    /// Right-handed camera looking from `eye` at `target`, with an OpenGL
    /// style clip volume.
    pub fn look_at(
        eye: DVec3,
        target: DVec3,
        up: DVec3,
        fov_y: f64,
        aspect_ratio: f64,
        z_near: f64,
        z_far: f64,
    ) -> Self {
        Self {
            world: DMat4::look_at_rh(eye, target, up).inverse(),
            projection: DMat4::perspective_rh_gl(fov_y, aspect_ratio, z_near, z_far),
            fov_y,
        }
    }

    pub fn view(&self) -> DMat4 {
        self.world.inverse()
    }

    pub fn position(&self) -> DVec3 {
        self.world.w_axis.truncate()
    }

    pub(crate) fn is_valid(&self) -> bool {
        self.world.is_finite()
            && self.projection.is_finite()
            && self.world.determinant() != 0.0
            && self.fov_y > 0.0
            && self.fov_y < std::f64::consts::PI
    }
}

/// Size of the render target in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn aspect_ratio(&self) -> f64 {
        self.width as f64 / self.height as f64
    }

    pub(crate) fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}
