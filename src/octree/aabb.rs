use glam::DVec3;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Aabb {
    pub min: DVec3,
    pub max: DVec3,
}

impl Aabb {
    pub fn new(min: DVec3, max: DVec3) -> Self {
        Self { min, max }
    }

    pub fn center(&self) -> DVec3 {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> DVec3 {
        self.max - self.min
    }

    pub fn volume(&self) -> f64 {
        let size = self.size();
        size.x * size.y * size.z
    }

    /// Finite corners with `min <= max` on every axis.
    pub fn is_valid(&self) -> bool {
        self.min.is_finite() && self.max.is_finite() && self.min.cmple(self.max).all()
    }

    /// Volume shared with `other`, zero when they only touch.
    pub fn intersection_volume(&self, other: &Aabb) -> f64 {
        let min = self.min.max(other.min);
        let max = self.max.min(other.max);
        let size = (max - min).max(DVec3::ZERO);
        size.x * size.y * size.z
    }

    /// Smallest sphere enclosing the box.
    pub fn bounding_sphere(&self) -> BoundingSphere {
        BoundingSphere {
            center: self.center(),
            radius: self.size().length() * 0.5,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BoundingSphere {
    pub center: DVec3,
    pub radius: f64,
}

impl BoundingSphere {
    pub fn contains(&self, point: DVec3) -> bool {
        self.center.distance(point) - self.radius < 0.0
    }
}

/// Bounding box of the child in octant `index` (0..8).
///
/// Bit 0 selects the upper half along Z, bit 1 along Y and bit 2 along X.
/// This ordering is part of the hierarchy format.
pub fn create_child_aabb(aabb: &Aabb, index: usize) -> Aabb {
    let mut min = aabb.min;
    let mut max = aabb.max;
    let size = (max - min) * 0.5;

    if (index & 0b0001) > 0 {
        min.z += size.z;
    } else {
        max.z -= size.z;
    }
    if (index & 0b0010) > 0 {
        min.y += size.y;
    } else {
        max.y -= size.y;
    }
    if (index & 0b0100) > 0 {
        min.x += size.x;
    } else {
        max.x -= size.x;
    }

    Aabb::new(min, max)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cube(size: f64) -> Aabb {
        Aabb::new(DVec3::ZERO, DVec3::splat(size))
    }

    #[test]
    fn test_octant_zero_is_lower_half_everywhere() {
        let child = create_child_aabb(&cube(8.0), 0);
        assert_eq!(child, Aabb::new(DVec3::ZERO, DVec3::splat(4.0)));
    }

    #[test]
    fn test_octant_bits_map_to_z_y_x() {
        let parent = cube(8.0);
        assert_eq!(
            create_child_aabb(&parent, 1),
            Aabb::new(DVec3::new(0.0, 0.0, 4.0), DVec3::new(4.0, 4.0, 8.0))
        );
        assert_eq!(
            create_child_aabb(&parent, 2),
            Aabb::new(DVec3::new(0.0, 4.0, 0.0), DVec3::new(4.0, 8.0, 4.0))
        );
        assert_eq!(
            create_child_aabb(&parent, 4),
            Aabb::new(DVec3::new(4.0, 0.0, 0.0), DVec3::new(8.0, 4.0, 4.0))
        );
        assert_eq!(
            create_child_aabb(&parent, 7),
            Aabb::new(DVec3::splat(4.0), DVec3::splat(8.0))
        );
    }

    #[test]
    fn test_children_partition_parent() {
        let parent = Aabb::new(DVec3::new(-3.0, 1.0, 10.0), DVec3::new(5.0, 3.0, 26.0));
        let children: Vec<_> = (0..8).map(|i| create_child_aabb(&parent, i)).collect();

        let total: f64 = children.iter().map(Aabb::volume).sum();
        assert_eq!(total, parent.volume());

        for (i, a) in children.iter().enumerate() {
            assert!(a.min.cmpge(parent.min).all() && a.max.cmple(parent.max).all());
            for b in &children[i + 1..] {
                assert_eq!(a.intersection_volume(b), 0.0);
            }
        }
    }

    #[test]
    fn test_bounding_sphere_covers_corners() {
        let aabb = Aabb::new(DVec3::new(-1.0, -2.0, -3.0), DVec3::new(1.0, 2.0, 3.0));
        let sphere = aabb.bounding_sphere();
        assert_eq!(sphere.center, DVec3::ZERO);
        assert!((sphere.radius - 14.0_f64.sqrt()).abs() < 1e-12);
        assert!(sphere.contains(DVec3::new(0.9, 1.9, 2.9)));
        assert!(!sphere.contains(DVec3::new(2.0, 3.0, 3.0)));
    }

    #[test]
    fn test_is_valid_rejects_inverted_and_nan() {
        assert!(cube(1.0).is_valid());
        assert!(!Aabb::new(DVec3::ONE, DVec3::ZERO).is_valid());
        assert!(!Aabb::new(DVec3::ZERO, DVec3::new(f64::NAN, 1.0, 1.0)).is_valid());
    }
}
