// Copyright @yucwang 2026

use crate::core::path::{BounceType, Vertex};
use crate::core::rng::Pcg32Rng;
use crate::core::scene::Scene;
use crate::math::constants::{EPSILON, Float, PI, Vector2f, Vector3f, Vector4f};
use crate::math::ray::Ray3f;
use crate::math::warp::sample_cosine_hemisphere;

/// PBR-style material parameters. The derived bounce behaviour is a hard
/// classification over the factors, see `bounce_type`.
#[derive(Clone, Debug)]
pub struct MaterialData {
    pub name: String,

    pub base_color_factor: Vector4f,
    pub base_color_texture_idx: Option<usize>,

    pub metallic_factor: Float,
    pub roughness_factor: Float,

    pub emissive_factor: Vector3f,
    pub emissive_strength: Float,
    pub emissive_texture_idx: Option<usize>,

    pub transmission_factor: Float,
    pub transmission_texture_idx: Option<usize>,

    pub ior: Float,
}

impl Default for MaterialData {
    fn default() -> Self {
        Self {
            name: String::new(),
            base_color_factor: Vector4f::new(1.0, 1.0, 1.0, 1.0),
            base_color_texture_idx: None,
            metallic_factor: 1.0,
            roughness_factor: 1.0,
            emissive_factor: Vector3f::zeros(),
            emissive_strength: 1.0,
            emissive_texture_idx: None,
            transmission_factor: 0.0,
            transmission_texture_idx: None,
            ior: 1.5,
        }
    }
}

impl MaterialData {
    pub fn bounce_type(&self) -> BounceType {
        if self.transmission_factor > 0.5 && self.metallic_factor < 0.5 {
            return BounceType::Refractive;
        }
        if self.metallic_factor > 0.5 && self.roughness_factor < 0.5 {
            return BounceType::Reflective;
        }
        BounceType::Diffuse
    }
}

/// A material bound to its scene for texture lookups.
pub struct Material<'a> {
    scene: &'a Scene,
    data: &'a MaterialData,
}

fn to_world(local: &Vector3f, normal: &Vector3f) -> Vector3f {
    let tangent = if normal.x.abs() > normal.z.abs() {
        Vector3f::new(0.0, 1.0, 0.0).cross(normal).normalize()
    } else {
        Vector3f::new(1.0, 0.0, 0.0).cross(normal).normalize()
    };
    let bitangent = normal.cross(&tangent);
    local.x * tangent + local.y * bitangent + local.z * normal
}

fn sample_reflected_ray(
        in_dir: &Vector3f,
        position: &Vector3f,
        shading_normal: &Vector3f,
        geometric_normal: &Vector3f) -> (Ray3f, BounceType) {
    let mut reflected_direction =
        -(in_dir - 2.0 * in_dir.dot(shading_normal) * shading_normal).normalize();
    if reflected_direction.dot(geometric_normal) < 0.0 {
        // The shading normal reflected below the surface; fall back to the
        // geometric normal.
        reflected_direction =
            -(in_dir - 2.0 * in_dir.dot(geometric_normal) * geometric_normal).normalize();
    }
    (
        Ray3f::new(position + EPSILON * geometric_normal, reflected_direction, None, None),
        BounceType::Reflective,
    )
}

fn compute_fresnel(cos_in: Float, cos_out: Float, eta1: Float, eta2: Float) -> Float {
    let ps = (eta1 * cos_in - eta2 * cos_out) / (eta1 * cos_in + eta2 * cos_out);
    let pt = (eta1 * cos_out - eta2 * cos_in) / (eta1 * cos_out + eta2 * cos_in);

    0.5 * (ps * ps + pt * pt)
}

fn sample_refracted_ray(
        in_dir: &Vector3f,
        position: &Vector3f,
        shading_normal: &Vector3f,
        geometric_normal: &Vector3f,
        ior: Float,
        rng: &mut Pcg32Rng) -> (Ray3f, BounceType) {
    let true_dir = -in_dir;
    let is_entering = true_dir.dot(shading_normal) < 0.0;

    let eta1 = if is_entering { 1.0 } else { ior };
    let eta2 = if is_entering { ior } else { 1.0 };
    let refraction_ratio = eta1 / eta2;

    let normal = if is_entering { *shading_normal } else { -shading_normal };

    let cos_in = -normal.dot(&true_dir);

    let discriminant = 1.0 - refraction_ratio * refraction_ratio * (1.0 - cos_in * cos_in);
    if discriminant < 0.0 {
        // Total internal reflection.
        return sample_reflected_ray(in_dir, position, shading_normal, geometric_normal);
    }

    let cos_out = discriminant.sqrt();

    let refracted_direction =
        (refraction_ratio * true_dir + (refraction_ratio * cos_in - cos_out) * normal).normalize();

    let fresnel = compute_fresnel(cos_in, cos_out, eta1, eta2);

    if rng.next_f32() < fresnel {
        return sample_reflected_ray(in_dir, position, shading_normal, geometric_normal);
    }

    let bias = geometric_normal * EPSILON * (if is_entering { -1.0 } else { 1.0 });
    (
        Ray3f::new(position + bias, refracted_direction, None, None),
        BounceType::Refractive,
    )
}

fn sample_diffused_ray(
        position: &Vector3f,
        shading_normal: &Vector3f,
        geometric_normal: &Vector3f,
        rng: &mut Pcg32Rng) -> (Ray3f, BounceType) {
    let u = Vector2f::new(rng.next_f32(), rng.next_f32());
    let local_direction = sample_cosine_hemisphere(&u);
    (
        Ray3f::new(
            position + EPSILON * geometric_normal,
            to_world(&local_direction, shading_normal),
            None, None),
        BounceType::Diffuse,
    )
}

impl<'a> Material<'a> {
    pub fn new(scene: &'a Scene, data: &'a MaterialData) -> Self {
        Self { scene, data }
    }

    pub fn bounce_type(&self) -> BounceType {
        self.data.bounce_type()
    }

    /// Lambertian BSDF value, used by the explicit-connection transport.
    pub fn bsdf(&self, vertex: &Vertex) -> Vector3f {
        let mut result = self.data.base_color_factor.xyz() / PI;
        if let Some(texture_idx) = self.data.base_color_texture_idx {
            result.component_mul_assign(
                &self.scene.sample_texture(texture_idx, &vertex.texture_coord));
        }
        result
    }

    /// Per-bounce throughput factor of the implicit path evaluation.
    /// Refractive surfaces always contribute white.
    pub fn expected_contribution(&self, vertex: &Vertex, _in_dir: &Vector3f) -> Vector3f {
        let mut base_color = Vector3f::new(1.0, 1.0, 1.0);
        if self.data.bounce_type() != BounceType::Refractive {
            base_color.component_mul_assign(&self.data.base_color_factor.xyz());
            if let Some(texture_idx) = self.data.base_color_texture_idx {
                base_color.component_mul_assign(
                    &self.scene.sample_texture(texture_idx, &vertex.texture_coord));
            }
        }
        base_color
    }

    pub fn emission(&self, vertex: &Vertex) -> Vector3f {
        let mut emission = self.data.emissive_factor * self.data.emissive_strength;
        if emission != Vector3f::zeros() {
            if let Some(texture_idx) = self.data.emissive_texture_idx {
                emission.component_mul_assign(
                    &self.scene.sample_texture(texture_idx, &vertex.texture_coord));
            }
        }
        emission
    }

    /// Samples an outgoing ray at `vertex`. `in_dir` points away from the
    /// surface, back along the arriving ray.
    pub fn sample_direction(
            &self,
            in_dir: &Vector3f,
            vertex: &Vertex,
            rng: &mut Pcg32Rng) -> (Ray3f, BounceType) {
        match self.data.bounce_type() {
            BounceType::Refractive => sample_refracted_ray(
                in_dir, &vertex.position, &vertex.normal, &vertex.geometric_normal,
                self.data.ior, rng),
            BounceType::Reflective => sample_reflected_ray(
                in_dir, &vertex.position, &vertex.normal, &vertex.geometric_normal),
            _ => sample_diffused_ray(
                &vertex.position, &vertex.normal, &vertex.geometric_normal, rng),
        }
    }
}
