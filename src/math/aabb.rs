// Copyright 2026 @TwoCookingMice

use super::constants::{Float, Vector3f};
use super::ray::Ray3f;

/// Axis-aligned bounding box. Default-constructed boxes are empty
/// (`p_min = +inf`, `p_max = -inf`) so `expand_by_point` extends correctly.
#[derive(Clone, Copy, Debug)]
pub struct AABB {
    pub p_min: Vector3f,
    pub p_max: Vector3f,
}

impl Default for AABB {
    fn default() -> Self {
        Self {
            p_min: Vector3f::new(Float::INFINITY, Float::INFINITY, Float::INFINITY),
            p_max: Vector3f::new(Float::NEG_INFINITY, Float::NEG_INFINITY, Float::NEG_INFINITY),
        }
    }
}

impl AABB {
    pub fn new(p_min: Vector3f, p_max: Vector3f) -> Self {
        Self { p_min: p_min.inf(&p_max), p_max: p_max.sup(&p_min) }
    }

    pub fn center(&self) -> Vector3f {
        0.5 * self.p_min + 0.5 * self.p_max
    }

    pub fn size(&self) -> Vector3f {
        self.p_max - self.p_min
    }

    pub fn expand_by_point(&mut self, p: &Vector3f) {
        for idx in 0..3 {
            self.p_min[idx] = self.p_min[idx].min(p[idx]);
            self.p_max[idx] = self.p_max[idx].max(p[idx]);
        }
    }

    pub fn expand_by_aabb(&mut self, other: &AABB) {
        for idx in 0..3 {
            self.p_min[idx] = self.p_min[idx].min(other.p_min[idx]);
            self.p_max[idx] = self.p_max[idx].max(other.p_max[idx]);
        }
    }

    pub fn half_area(&self) -> Float {
        let size = self.size();
        size[0] * (size[1] + size[2]) + size[1] * size[2]
    }

    pub fn surface_area(&self) -> Float {
        2.0 * self.half_area()
    }

    /// Axis with the longest extent. Ties prefer x over y over z.
    pub fn max_extent(&self) -> usize {
        let size = self.size();
        if size[0] >= size[1] && size[0] >= size[2] {
            0
        } else if size[1] >= size[2] {
            1
        } else {
            2
        }
    }

    /// Slab test. Returns the entry distance when the ray hits the box and
    /// the box is not entirely behind the ray origin.
    pub fn ray_intersect(&self, ray: &Ray3f) -> Option<Float> {
        let o = ray.origin();
        let d = ray.dir();

        let mut t1 = Float::NEG_INFINITY;
        let mut t2 = Float::INFINITY;
        for idx in 0..3 {
            let mut t_near = (self.p_min[idx] - o[idx]) / d[idx];
            let mut t_far = (self.p_max[idx] - o[idx]) / d[idx];
            if t_near > t_far {
                std::mem::swap(&mut t_near, &mut t_far);
            }
            t1 = t1.max(t_near);
            t2 = t2.min(t_far);
        }

        if t1 > t2 {
            return None;
        }
        if t1 < 0.0 && t2 < 0.0 {
            return None;
        }

        Some(t1)
    }

    pub fn is_valid(&self) -> bool {
        for idx in 0..3 {
            if self.p_min[idx] > self.p_max[idx] {
                return false;
            }
        }

        true
    }
}

/* Tests for AABB */
#[cfg(test)]
mod tests {
    use super::AABB;
    use super::Ray3f;
    use super::Vector3f;

    #[test]
    fn test_aabb_geometry() {
        let min = Vector3f::new(1.0, 7.0, 3.0);
        let max = Vector3f::new(4.0, 4.0, 4.0);
        let bbox = AABB::new(min, max);

        assert!(bbox.is_valid());
        let center = bbox.center();
        assert!((center[0] - 2.5).abs() < 1e-6);
        assert!((center[1] - 5.5).abs() < 1e-6);
        assert!((center[2] - 3.5).abs() < 1e-6);

        // size = (3, 3, 1), half area = 3 * 4 + 3 = 15
        assert!((bbox.half_area() - 15.0).abs() < 1e-6);
        assert!((bbox.surface_area() - 30.0).abs() < 1e-6);
    }

    #[test]
    fn test_aabb_fit_monotonic() {
        let points = [
            Vector3f::new(-1.0, 5.0, 6.0),
            Vector3f::new(3.0, -2.0, 0.5),
            Vector3f::new(0.0, 0.0, 0.0),
            Vector3f::new(7.0, 7.0, -7.0),
        ];

        let mut bbox = AABB::default();
        assert!(!bbox.is_valid());
        for p in &points {
            bbox.expand_by_point(p);
        }

        for p in &points {
            for idx in 0..3 {
                assert!(bbox.p_min[idx] <= p[idx]);
                assert!(bbox.p_max[idx] >= p[idx]);
            }
        }
    }

    #[test]
    fn test_aabb_max_extent_tie_break() {
        let mut bbox = AABB::default();
        bbox.expand_by_point(&Vector3f::new(0.0, 0.0, 0.0));
        bbox.expand_by_point(&Vector3f::new(2.0, 2.0, 2.0));
        // All extents equal: x wins.
        assert_eq!(bbox.max_extent(), 0);

        let mut bbox = AABB::default();
        bbox.expand_by_point(&Vector3f::new(0.0, 0.0, 0.0));
        bbox.expand_by_point(&Vector3f::new(1.0, 2.0, 2.0));
        // y and z tied: y wins.
        assert_eq!(bbox.max_extent(), 1);
    }

    #[test]
    fn test_aabb_intersect() {
        let bbox = AABB::new(Vector3f::new(-1.0, -1.0, -1.0),
                             Vector3f::new(1.0, 1.0, 1.0));

        let r1 = Ray3f::new(Vector3f::new(0.0, 0.0, -5.0),
                            Vector3f::new(0.0, 0.0, 1.0), None, None);
        let t = bbox.ray_intersect(&r1);
        assert!(t.is_some());
        assert!((t.unwrap() - 4.0).abs() < 1e-5);

        // Ray starting inside reports the (negative) entry distance.
        let r2 = Ray3f::new(Vector3f::new(0.0, 0.0, 0.0),
                            Vector3f::new(0.0, 0.0, 1.0), None, None);
        assert!(bbox.ray_intersect(&r2).is_some());

        // Box entirely behind the origin.
        let r3 = Ray3f::new(Vector3f::new(0.0, 0.0, 5.0),
                            Vector3f::new(0.0, 0.0, 1.0), None, None);
        assert!(bbox.ray_intersect(&r3).is_none());

        let r4 = Ray3f::new(Vector3f::new(5.0, 5.0, 5.0),
                            Vector3f::new(1.0, 1.0, 1.0), None, None);
        assert!(bbox.ray_intersect(&r4).is_none());
    }
}
