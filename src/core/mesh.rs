// Copyright @yucwang 2026

use crate::core::bvh::Bvh;
use crate::math::constants::{Float, Vector2f, Vector3f};

#[derive(Clone, Copy, Debug)]
pub struct Triangle {
    pub positions: [Vector3f; 3],
    pub normals: [Vector3f; 3],
    pub texture_coords: [Vector2f; 3],
}

impl Triangle {
    pub fn compute_area(&self) -> Float {
        let edge1 = self.positions[1] - self.positions[0];
        let edge2 = self.positions[2] - self.positions[0];
        edge1.cross(&edge2).norm()
    }
}

/// Discrete distribution sampled by inverse CDF over a weight table.
pub struct DiscreteDistribution {
    cdf: Vec<Float>,
}

impl DiscreteDistribution {
    pub fn from_weights(weights: &[Float]) -> Self {
        let mut cdf = Vec::with_capacity(weights.len());
        let mut total = 0.0;
        for weight in weights {
            total += weight;
            cdf.push(total);
        }
        Self { cdf }
    }

    pub fn total(&self) -> Float {
        self.cdf.last().copied().unwrap_or(0.0)
    }

    pub fn sample(&self, u: Float) -> usize {
        let target = u * self.total();
        let idx = self.cdf.partition_point(|&c| c <= target);
        idx.min(self.cdf.len().saturating_sub(1))
    }
}

/// A contiguous triangle range of a mesh with one material, its own BVH and
/// an area-weighted distribution over its triangles for light sampling.
pub struct Primitive {
    pub start_idx: usize,
    pub count: usize,
    pub material_idx: Option<usize>,
    pub bvh: Bvh,
    pub total_area: Float,
    pub triangle_distribution: DiscreteDistribution,
}

#[derive(Default)]
pub struct Mesh {
    pub name: String,
    pub triangles: Vec<Triangle>,
    pub primitives: Vec<Primitive>,
}

impl Mesh {
    pub fn with_name(name: &str) -> Self {
        Self { name: String::from(name), ..Default::default() }
    }

    pub fn add_primitive(
            &mut self,
            start_idx: usize,
            count: usize,
            material_idx: Option<usize>) {
        let areas: Vec<Float> = self.triangles[start_idx..start_idx + count]
            .iter()
            .map(|triangle| triangle.compute_area())
            .collect();
        let total_area = areas.iter().sum();
        let bvh = Bvh::new(&self.triangles, start_idx, count);
        self.primitives.push(Primitive {
            start_idx,
            count,
            material_idx,
            bvh,
            total_area,
            triangle_distribution: DiscreteDistribution::from_weights(&areas),
        });
    }

    /// Picks a triangle of `primitive_idx` weighted by area. Returns a
    /// mesh-level triangle index.
    pub fn sample_triangle(&self, primitive_idx: usize, u: Float) -> usize {
        let primitive = &self.primitives[primitive_idx];
        primitive.start_idx + primitive.triangle_distribution.sample(u)
    }
}
