// Copyright @yucwang 2026

use super::aabb::AABB;
use super::constants::{Float, Vector3f, Vector4f};
use super::ray::Ray3f;

/// Four axis-aligned bounding boxes. The x, y, z components of each box are
/// stored across `Vector4f` lanes, lane `i` holding the `i`-th box, so one
/// ray can be tested against all four boxes in a single pass.
#[derive(Clone, Copy, Debug)]
pub struct Aabb4 {
    min_x: Vector4f,
    min_y: Vector4f,
    min_z: Vector4f,
    max_x: Vector4f,
    max_y: Vector4f,
    max_z: Vector4f,
}

pub struct Aabb4Hit {
    pub is_hit: [bool; 4],
    pub distances: Vector4f,
}

impl Default for Aabb4 {
    fn default() -> Self {
        Self {
            min_x: Vector4f::repeat(Float::INFINITY),
            min_y: Vector4f::repeat(Float::INFINITY),
            min_z: Vector4f::repeat(Float::INFINITY),
            max_x: Vector4f::repeat(Float::NEG_INFINITY),
            max_y: Vector4f::repeat(Float::NEG_INFINITY),
            max_z: Vector4f::repeat(Float::NEG_INFINITY),
        }
    }
}

impl Aabb4 {
    pub fn new(a: &AABB, b: &AABB, c: &AABB, d: &AABB) -> Self {
        Self {
            min_x: Vector4f::new(a.p_min[0], b.p_min[0], c.p_min[0], d.p_min[0]),
            min_y: Vector4f::new(a.p_min[1], b.p_min[1], c.p_min[1], d.p_min[1]),
            min_z: Vector4f::new(a.p_min[2], b.p_min[2], c.p_min[2], d.p_min[2]),
            max_x: Vector4f::new(a.p_max[0], b.p_max[0], c.p_max[0], d.p_max[0]),
            max_y: Vector4f::new(a.p_max[1], b.p_max[1], c.p_max[1], d.p_max[1]),
            max_z: Vector4f::new(a.p_max[2], b.p_max[2], c.p_max[2], d.p_max[2]),
        }
    }

    pub fn get_min(&self, idx: usize) -> Vector3f {
        Vector3f::new(self.min_x[idx], self.min_y[idx], self.min_z[idx])
    }

    pub fn get_max(&self, idx: usize) -> Vector3f {
        Vector3f::new(self.max_x[idx], self.max_y[idx], self.max_z[idx])
    }

    pub fn get_size(&self, idx: usize) -> Vector3f {
        self.get_max(idx) - self.get_min(idx)
    }

    pub fn get_aabb(&self, idx: usize) -> AABB {
        AABB { p_min: self.get_min(idx), p_max: self.get_max(idx) }
    }

    pub fn half_area(&self, idx: usize) -> Float {
        let size = self.get_size(idx);
        size[0] * (size[1] + size[2]) + size[1] * size[2]
    }

    /// Lane-parallel slab test against all four boxes. The per-lane hit rule
    /// matches the scalar `AABB::ray_intersect`.
    pub fn intersect(&self, ray: &Ray3f) -> Aabb4Hit {
        let o = ray.origin();
        let d = ray.dir();

        let t_min_x = self.min_x.add_scalar(-o[0]) / d[0];
        let t_max_x = self.max_x.add_scalar(-o[0]) / d[0];
        let t_min_y = self.min_y.add_scalar(-o[1]) / d[1];
        let t_max_y = self.max_y.add_scalar(-o[1]) / d[1];
        let t_min_z = self.min_z.add_scalar(-o[2]) / d[2];
        let t_max_z = self.max_z.add_scalar(-o[2]) / d[2];

        let tx1 = t_min_x.inf(&t_max_x);
        let tx2 = t_min_x.sup(&t_max_x);
        let ty1 = t_min_y.inf(&t_max_y);
        let ty2 = t_min_y.sup(&t_max_y);
        let tz1 = t_min_z.inf(&t_max_z);
        let tz2 = t_min_z.sup(&t_max_z);

        let t1 = tx1.sup(&ty1.sup(&tz1));
        let t2 = tx2.inf(&ty2.inf(&tz2));

        let mut is_hit = [false; 4];
        for lane in 0..4 {
            is_hit[lane] = t1[lane] <= t2[lane] && !(t1[lane] < 0.0 && t2[lane] < 0.0);
        }

        Aabb4Hit { is_hit, distances: t1 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::constants::Vector3f;

    fn make_box(center: Vector3f, half: Float) -> AABB {
        AABB::new(
            center - Vector3f::new(half, half, half),
            center + Vector3f::new(half, half, half),
        )
    }

    #[test]
    fn test_aabb4_matches_scalar() {
        let boxes = [
            make_box(Vector3f::new(0.0, 0.0, 0.0), 1.0),
            make_box(Vector3f::new(4.0, 0.0, 0.0), 1.0),
            make_box(Vector3f::new(0.0, 4.0, 0.0), 0.5),
            make_box(Vector3f::new(-3.0, -3.0, -3.0), 1.5),
        ];
        let packed = Aabb4::new(&boxes[0], &boxes[1], &boxes[2], &boxes[3]);

        let rays = [
            Ray3f::new(Vector3f::new(0.0, 0.0, -10.0), Vector3f::new(0.0, 0.0, 1.0), None, None),
            Ray3f::new(Vector3f::new(4.0, -10.0, 0.0), Vector3f::new(0.0, 1.0, 0.0), None, None),
            Ray3f::new(Vector3f::new(-10.0, -10.0, -10.0), Vector3f::new(1.0, 1.0, 1.0), None, None),
            Ray3f::new(Vector3f::new(10.0, 10.0, 10.0), Vector3f::new(1.0, 0.0, 0.0), None, None),
            Ray3f::new(Vector3f::new(0.0, 2.0, 0.0), Vector3f::new(0.0, 1.0, 0.0), None, None),
        ];

        for ray in &rays {
            let hit = packed.intersect(ray);
            for lane in 0..4 {
                let scalar = boxes[lane].ray_intersect(ray);
                assert_eq!(hit.is_hit[lane], scalar.is_some());
                if let Some(t) = scalar {
                    assert!((hit.distances[lane] - t).abs() < 1e-5);
                }
            }
        }
    }

    #[test]
    fn test_aabb4_lane_accessors() {
        let a = make_box(Vector3f::new(1.0, 2.0, 3.0), 0.5);
        let b = make_box(Vector3f::new(-1.0, 0.0, 0.0), 2.0);
        let packed = Aabb4::new(&a, &b, &a, &b);

        assert!((packed.get_min(1)[0] - (-3.0)).abs() < 1e-6);
        assert!((packed.get_size(0)[2] - 1.0).abs() < 1e-6);
        assert!((packed.half_area(1) - b.half_area()).abs() < 1e-4);
        assert!(packed.get_aabb(2).is_valid());
    }
}
