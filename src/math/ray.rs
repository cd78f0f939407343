// Copyright 2026 @TwoCookingMice

use super::constants::{Float, Vector3f};

/// A ray with distance bounds. The direction is normalized on construction,
/// so `at(t)` measures world-space distance along the ray.
pub struct Ray3f {
    origin: Vector3f,
    dir: Vector3f,
    pub min_t: Float,
    pub max_t: Float,
}

impl Ray3f {
    pub fn new(o: Vector3f, d: Vector3f,
               min_t: Option<Float>, max_t: Option<Float>) -> Self {
        Self { origin: o, dir: d.normalize(),
               min_t: min_t.unwrap_or(0.0),
               max_t: max_t.unwrap_or(Float::MAX) }
    }

    pub fn origin(&self) -> Vector3f {
        self.origin
    }

    pub fn dir(&self) -> Vector3f {
        self.dir
    }

    pub fn at(&self, t: Float) -> Vector3f {
        self.origin + self.dir * t
    }

    pub fn test_segment(&self, t: Float) -> bool {
        t >= self.min_t && t <= self.max_t
    }
}

/* Tests for Ray */

#[cfg(test)]
mod tests {
    use super::Ray3f;
    use super::Vector3f;

    #[test]
    fn test_ray3f() {
        let o = Vector3f::new(0.0, 0.0, 0.0);
        let d = Vector3f::new(2.0, 0.0, 0.0);
        let ray = Ray3f::new(o, d, None, Some(4.0));
        assert_eq!(o, ray.origin());
        assert!((ray.dir().norm() - 1.0).abs() < 1e-6);

        let p = ray.at(3.0);
        assert!((p[0] - 3.0).abs() < 1e-6);

        assert!(ray.test_segment(3.0));
        assert!(!ray.test_segment(5.0));
    }
}
