// Copyright @yucwang 2026

use crate::core::mesh::Triangle;
use crate::core::rng::Pcg32Rng;
use crate::core::scene::{Light, Scene};
use crate::math::constants::{EPSILON, Float, PI, Vector2f, Vector3f};
use crate::math::ray::Ray3f;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionType {
    Origin,
    Implicit,
    Explicit,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BounceType {
    None,
    Diffuse,
    Reflective,
    Refractive,
}

#[derive(Clone, Copy, Debug)]
pub struct Vertex {
    pub connection_type: ConnectionType,
    pub bounce_type: BounceType,
    pub position: Vector3f,
    pub normal: Vector3f,
    pub geometric_normal: Vector3f,
    pub texture_coord: Vector2f,
    pub material_idx: Option<usize>,
    /// Only set for explicit light vertices.
    pub light_idx: Option<usize>,
}

impl Default for Vertex {
    fn default() -> Self {
        Self {
            connection_type: ConnectionType::Origin,
            bounce_type: BounceType::None,
            position: Vector3f::zeros(),
            normal: Vector3f::zeros(),
            geometric_normal: Vector3f::zeros(),
            texture_coord: Vector2f::zeros(),
            material_idx: None,
            light_idx: None,
        }
    }
}

/// A transport path as a fixed-capacity vertex chain. Vertex 0 is the eye
/// origin; later vertices are implicit bounces unless spliced in as
/// explicit connections.
#[derive(Clone)]
pub struct Path {
    vertices: [Vertex; Self::MAX_LENGTH],
    length: usize,
}

impl Path {
    pub const MAX_LENGTH: usize = 10;
    pub const TERMINATION_PROBABILITY: Float = 0.35826;

    pub fn new() -> Self {
        Self { vertices: [Vertex::default(); Self::MAX_LENGTH], length: 0 }
    }

    pub fn from_vertex(vertex: Vertex) -> Self {
        let mut path = Self::new();
        path.vertices[0] = vertex;
        path.length = 1;
        path
    }

    pub fn length(&self) -> usize {
        self.length
    }

    pub fn vertex(&self, idx: usize) -> &Vertex {
        &self.vertices[idx]
    }

    pub fn last(&self) -> &Vertex {
        &self.vertices[self.length - 1]
    }

    pub fn last_mut(&mut self) -> &mut Vertex {
        &mut self.vertices[self.length - 1]
    }

    pub fn slice(&self, first: usize, last: usize) -> &[Vertex] {
        &self.vertices[first..last]
    }

    pub fn to_slice(&self) -> &[Vertex] {
        &self.vertices[0..self.length]
    }

    /// Concatenates `other` onto the tail. Fails when the result would
    /// exceed the capacity.
    pub fn append_slice(&mut self, other: &[Vertex]) -> bool {
        if self.length + other.len() > Self::MAX_LENGTH {
            return false;
        }
        self.vertices[self.length..self.length + other.len()].copy_from_slice(other);
        self.length += other.len();
        true
    }

    /// Intersects the scene, appends the hit as an implicit vertex, applies
    /// Russian roulette when a termination probability is given, and samples
    /// the next direction from the hit material.
    pub fn add_bounce(
            &mut self,
            scene: &Scene,
            in_ray: &Ray3f,
            termination_probability: Option<Float>,
            rng: &mut Pcg32Rng) -> Option<Ray3f> {
        if self.length == Self::MAX_LENGTH {
            return None;
        }

        let mut hit = scene.ray_intersection(in_ray)?;

        let material = scene.get_material(hit.material_idx);
        if material.bounce_type() != BounceType::Refractive
                && in_ray.dir().dot(&hit.geometric_normal) > 0.0 {
            // Treat the hit side as the front.
            hit.normal = -hit.normal;
            hit.geometric_normal = -hit.geometric_normal;
        }

        self.vertices[self.length] = Vertex {
            connection_type: ConnectionType::Implicit,
            bounce_type: BounceType::None,
            position: hit.position,
            normal: hit.normal,
            geometric_normal: hit.geometric_normal,
            texture_coord: hit.texture_coord,
            material_idx: hit.material_idx,
            light_idx: None,
        };
        self.length += 1;

        if let Some(termination_probability) = termination_probability {
            if rng.next_f32() < termination_probability {
                return None;
            }
        }

        let (new_ray, bounce_type) =
            material.sample_direction(&-in_ray.dir(), self.last(), rng);
        self.last_mut().bounce_type = bounce_type;
        Some(new_ray)
    }

    /// Random walk from `ray` with Russian roulette at every bounce.
    pub fn create_random_eye_path(scene: &Scene, ray: Ray3f, rng: &mut Pcg32Rng) -> Path {
        let mut path = Path::from_vertex(Vertex {
            connection_type: ConnectionType::Origin,
            position: ray.origin(),
            ..Default::default()
        });

        let mut ray = ray;
        while path.length < Self::MAX_LENGTH {
            match path.add_bounce(scene, &ray, Some(Self::TERMINATION_PROBABILITY), rng) {
                Some(next_ray) => ray = next_ray,
                None => return path,
            }
        }

        path
    }

    /// One explicit vertex on a uniformly chosen light.
    pub fn create_random_light_path(scene: &Scene, rng: &mut Pcg32Rng) -> Path {
        if scene.lights.is_empty() {
            return Path::new();
        }
        let light_idx = rng.next_bounded(scene.lights.len() as u32) as usize;
        Path::from_vertex(choose_random_vertex_on_light(scene, light_idx, rng))
    }
}

impl Default for Path {
    fn default() -> Self {
        Self::new()
    }
}

fn choose_random_vertex_on_triangle(triangle: &Triangle, rng: &mut Pcg32Rng) -> Vertex {
    let sqrt_u1 = rng.next_f32().sqrt();
    let u2 = rng.next_f32();

    let alpha = 1.0 - sqrt_u1;
    let beta = (1.0 - u2) * sqrt_u1;
    let gamma = u2 * sqrt_u1;

    Vertex {
        connection_type: ConnectionType::Explicit,
        bounce_type: BounceType::None,
        position: triangle.positions[0] * alpha
            + triangle.positions[1] * beta
            + triangle.positions[2] * gamma,
        normal: (triangle.normals[0] * alpha
            + triangle.normals[1] * beta
            + triangle.normals[2] * gamma)
            .normalize(),
        geometric_normal: (triangle.positions[1] - triangle.positions[0])
            .cross(&(triangle.positions[2] - triangle.positions[0]))
            .normalize(),
        texture_coord: triangle.texture_coords[0] * alpha
            + triangle.texture_coords[1] * beta
            + triangle.texture_coords[2] * gamma,
        material_idx: None,
        light_idx: None,
    }
}

fn choose_random_vertex_on_light(scene: &Scene, light_idx: usize, rng: &mut Pcg32Rng) -> Vertex {
    match scene.lights[light_idx] {
        Light::Point(light) => Vertex {
            connection_type: ConnectionType::Explicit,
            position: light.position,
            light_idx: Some(light_idx),
            ..Default::default()
        },
        Light::Mesh(light) => {
            let mesh = &scene.meshes[light.mesh_idx];
            let primitive = &mesh.primitives[light.primitive_idx];
            let triangle_idx = mesh.sample_triangle(light.primitive_idx, rng.next_f32());
            let mut vertex =
                choose_random_vertex_on_triangle(&mesh.triangles[triangle_idx], rng);
            vertex.material_idx = primitive.material_idx;
            vertex.light_idx = Some(light_idx);
            vertex
        }
    }
}

/// Mutual visibility with the epsilon offset convention: the ray starts
/// above `v1` along its geometric normal and stops short of `v2`.
pub fn has_visibility(scene: &Scene, v1: &Vertex, v2: &Vertex) -> bool {
    let origin = v1.position + EPSILON * v1.geometric_normal;
    let mut dir = v2.position - origin;
    let dist = dir.norm();
    dir /= dist;

    if dir.dot(&v1.normal) < EPSILON
            || (v2.normal.norm_squared() > EPSILON && (-dir).dot(&v2.normal) < EPSILON) {
        return false;
    }

    scene
        .ray_intersection(&Ray3f::new(origin, dir, Some(0.0), Some(dist - 2.0 * EPSILON)))
        .is_none()
}

#[derive(Clone, Copy, Debug)]
pub struct EvaluationResult {
    /// The true expected radiance along the path.
    pub radiance: Vector3f,
    /// The radiance divided by the per-step continuation probability; the
    /// importance function of the new-path mutation.
    pub russian_roulette_radiance: Vector3f,
}

impl EvaluationResult {
    pub fn zero() -> Self {
        Self {
            radiance: Vector3f::zeros(),
            russian_roulette_radiance: Vector3f::zeros(),
        }
    }
}

pub fn evaluate_implicit(scene: &Scene, v1: &Vertex, v2: &Vertex) -> EvaluationResult {
    const CONTINUATION_PROBABILITY: Float = 1.0 - Path::TERMINATION_PROBABILITY;

    let in_dir = (v1.position - v2.position).normalize();
    let material = scene.get_material(v2.material_idx);

    let radiance = material.expected_contribution(v2, &in_dir);
    EvaluationResult {
        radiance,
        russian_roulette_radiance: radiance / CONTINUATION_PROBABILITY,
    }
}

/// Transport of an explicit connection ending on a light vertex, including
/// the visibility query.
pub fn evaluate_explicit_light(
        scene: &Scene,
        _x1: &Vertex,
        x2: &Vertex,
        light_vertex: &Vertex) -> Vector3f {
    let light_dist = (light_vertex.position - x2.position).norm();
    let out_dir = (light_vertex.position - x2.position) / light_dist;

    if !has_visibility(scene, x2, light_vertex) {
        return Vector3f::zeros();
    }

    let material = scene.get_material(x2.material_idx);

    let mut result = material.bsdf(x2);
    result /= light_dist * light_dist;
    result *= x2.normal.dot(&out_dir).max(0.0);

    let Some(light_idx) = light_vertex.light_idx else {
        return Vector3f::zeros();
    };

    match scene.lights[light_idx] {
        Light::Point(light) => {
            result = result.component_mul(&light.wattage) / (4.0 * PI);
        }
        Light::Mesh(light) => {
            let primitive = &scene.meshes[light.mesh_idx].primitives[light.primitive_idx];
            let light_material = scene.get_material(light_vertex.material_idx);
            result *= light_vertex.normal.dot(&-out_dir).max(0.0);
            result *= primitive.total_area;
            result = result.component_mul(&light_material.emission(light_vertex));
        }
    }

    result * scene.lights.len() as Float
}

/// Lambertian two-vertex transport of an interior explicit connection.
pub fn evaluate_explicit(
        scene: &Scene,
        _x1: &Vertex,
        x2: &Vertex,
        _y1: &Vertex,
        y2: &Vertex) -> Vector3f {
    let inv_dist = 1.0 / (y2.position - x2.position).norm();
    let x2_to_y2 = (y2.position - x2.position) * inv_dist;

    let material1 = scene.get_material(x2.material_idx);
    let material2 = scene.get_material(y2.material_idx);

    let mut result = material1.bsdf(x2).component_mul(&material2.bsdf(x2));
    result *= inv_dist * inv_dist;
    result *= x2.normal.dot(&x2_to_y2).max(0.0);
    result *= y2.normal.dot(&-x2_to_y2).max(0.0);
    result
}

/// Radiance along a vertex chain, accumulating implicit and explicit
/// contributions with both the plain and the Russian-roulette-scaled
/// throughput.
pub fn evaluate(scene: &Scene, path: &[Vertex]) -> EvaluationResult {
    let mut throughput = Vector3f::new(1.0, 1.0, 1.0);
    let mut russian_roulette_throughput = Vector3f::new(1.0, 1.0, 1.0);
    let mut result = EvaluationResult::zero();

    if path.len() < 2 {
        return result;
    }

    for i in 1..path.len() - 1 {
        match path[i + 1].connection_type {
            ConnectionType::Implicit => {
                let implicit_evaluation = evaluate_implicit(scene, &path[i - 1], &path[i]);
                throughput.component_mul_assign(&implicit_evaluation.radiance);
                russian_roulette_throughput
                    .component_mul_assign(&implicit_evaluation.russian_roulette_radiance);
                if i == path.len() - 2 {
                    let material = scene.get_material(path[i + 1].material_idx);
                    let emission = material.emission(&path[i + 1]);
                    result.radiance += throughput.component_mul(&emission);
                    result.russian_roulette_radiance +=
                        russian_roulette_throughput.component_mul(&emission);
                }
            }
            ConnectionType::Explicit => {
                if i < path.len() - 2 {
                    let explicit_evaluation = evaluate_explicit(
                        scene, &path[i - 1], &path[i], &path[i + 1], &path[i + 2]);
                    throughput.component_mul_assign(&explicit_evaluation);
                    russian_roulette_throughput.component_mul_assign(&explicit_evaluation);
                } else if path[i + 1].light_idx.is_some() {
                    let explicit_evaluation =
                        evaluate_explicit_light(scene, &path[i - 1], &path[i], &path[i + 1]);
                    result.radiance += throughput.component_mul(&explicit_evaluation);
                    result.russian_roulette_radiance +=
                        russian_roulette_throughput.component_mul(&explicit_evaluation);
                } else {
                    let material = scene.get_material(path[i + 1].material_idx);
                    let emission = material.emission(&path[i + 1]);
                    result.radiance += throughput.component_mul(&emission);
                    result.russian_roulette_radiance +=
                        russian_roulette_throughput.component_mul(&emission);
                }
            }
            ConnectionType::Origin => {}
        }

        let material = scene.get_material(path[i].material_idx);
        let emission = material.emission(&path[i]);
        result.radiance += throughput.component_mul(&emission);
        result.russian_roulette_radiance +=
            russian_roulette_throughput.component_mul(&emission);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::material::MaterialData;
    use crate::core::mesh::Mesh;
    use crate::core::scene::{Camera, MeshLight};
    use crate::math::constants::Vector2f;

    fn test_camera() -> Camera {
        Camera::new(
            32, 24, 45.0, 0.032,
            Vector3f::new(0.0, 1.0, 0.5),
            Vector3f::new(0.0, 0.0, -1.0),
            Vector3f::new(0.0, 1.0, 0.0))
    }

    fn push_quad(mesh: &mut Mesh, p0: Vector3f, p1: Vector3f, p2: Vector3f, p3: Vector3f) {
        let normal = (p1 - p0).cross(&(p2 - p0)).normalize();
        let uv = [Vector2f::zeros(); 3];
        mesh.triangles.push(Triangle {
            positions: [p0, p1, p2],
            normals: [normal; 3],
            texture_coords: uv,
        });
        mesh.triangles.push(Triangle {
            positions: [p0, p2, p3],
            normals: [normal; 3],
            texture_coords: uv,
        });
    }

    fn diffuse_material(name: &str) -> MaterialData {
        MaterialData {
            name: String::from(name),
            metallic_factor: 0.0,
            roughness_factor: 1.0,
            ..Default::default()
        }
    }

    /// Two horizontal quads: a floor at y = 0 facing up and an emissive
    /// panel at y = 2 facing down.
    fn floor_and_panel_scene() -> Scene {
        let mut scene = Scene::new(test_camera());

        let floor_material = scene.add_material(diffuse_material("floor"));
        let mut floor = Mesh::with_name("floor");
        push_quad(
            &mut floor,
            Vector3f::new(-2.0, 0.0, 2.0),
            Vector3f::new(2.0, 0.0, 2.0),
            Vector3f::new(2.0, 0.0, -2.0),
            Vector3f::new(-2.0, 0.0, -2.0),
        );
        floor.add_primitive(0, 2, Some(floor_material));
        scene.meshes.push(floor);

        let panel_material = scene.add_material(MaterialData {
            emissive_factor: Vector3f::new(1.0, 1.0, 1.0),
            emissive_strength: 5.0,
            ..diffuse_material("panel")
        });
        let mut panel = Mesh::with_name("panel");
        push_quad(
            &mut panel,
            Vector3f::new(-1.0, 2.0, -1.0),
            Vector3f::new(1.0, 2.0, -1.0),
            Vector3f::new(1.0, 2.0, 1.0),
            Vector3f::new(-1.0, 2.0, 1.0),
        );
        panel.add_primitive(0, 2, Some(panel_material));
        scene.meshes.push(panel);
        scene.lights.push(Light::Mesh(MeshLight { mesh_idx: 1, primitive_idx: 0 }));

        scene
    }

    fn surface_vertex(position: Vector3f, normal: Vector3f) -> Vertex {
        Vertex {
            connection_type: ConnectionType::Implicit,
            position,
            normal,
            geometric_normal: normal,
            ..Default::default()
        }
    }

    #[test]
    fn test_append_respects_capacity() {
        let mut path = Path::from_vertex(Vertex::default());
        let tail = [Vertex::default(); 9];
        assert!(path.append_slice(&tail));
        assert_eq!(path.length(), 10);
        assert!(!path.append_slice(&tail[0..1]));
        assert_eq!(path.length(), 10);
    }

    #[test]
    fn test_eye_path_capped_at_max_length() {
        let scene = floor_and_panel_scene();
        let mut rng = Pcg32Rng::new(123);
        for _ in 0..64 {
            let ray = scene.eye_ray(Vector2f::new(16.0, 12.0));
            let path = Path::create_random_eye_path(&scene, ray, &mut rng);
            assert!(path.length() <= Path::MAX_LENGTH);
            assert!(path.length() >= 1);
            assert_eq!(path.vertex(0).connection_type, ConnectionType::Origin);
        }
    }

    #[test]
    fn test_visibility_symmetry() {
        let scene = floor_and_panel_scene();
        let a = surface_vertex(Vector3f::new(0.2, 0.0, 0.1), Vector3f::new(0.0, 1.0, 0.0));
        let b = surface_vertex(Vector3f::new(-0.3, 2.0, 0.2), Vector3f::new(0.0, -1.0, 0.0));
        assert!(has_visibility(&scene, &a, &b));
        assert!(has_visibility(&scene, &b, &a));
        assert_eq!(
            has_visibility(&scene, &a, &b),
            has_visibility(&scene, &b, &a)
        );
    }

    #[test]
    fn test_visibility_rejects_below_surface() {
        let scene = floor_and_panel_scene();
        let a = surface_vertex(Vector3f::new(0.0, 0.0, 0.0), Vector3f::new(0.0, 1.0, 0.0));
        // A target below the floor plane is behind a's hemisphere.
        let b = surface_vertex(Vector3f::new(0.0, -1.0, 0.0), Vector3f::new(0.0, 1.0, 0.0));
        assert!(!has_visibility(&scene, &a, &b));
    }

    #[test]
    fn test_light_path_has_one_explicit_vertex() {
        let scene = floor_and_panel_scene();
        let mut rng = Pcg32Rng::new(7);
        let path = Path::create_random_light_path(&scene, &mut rng);
        assert_eq!(path.length(), 1);
        let vertex = path.vertex(0);
        assert_eq!(vertex.connection_type, ConnectionType::Explicit);
        assert_eq!(vertex.light_idx, Some(0));
        assert!((vertex.position.y - 2.0).abs() < 1e-5);
        assert!(vertex.position.x.abs() <= 1.0 + 1e-5);
        assert!(vertex.position.z.abs() <= 1.0 + 1e-5);
    }

    #[test]
    fn test_evaluate_direct_emitter_hit() {
        let scene = floor_and_panel_scene();

        // origin -> floor -> panel, all implicit: the radiance is the floor's
        // expected contribution times the panel emission.
        let origin = Vertex {
            connection_type: ConnectionType::Origin,
            position: Vector3f::new(0.0, 1.0, 0.5),
            ..Default::default()
        };
        let floor_vertex = Vertex {
            material_idx: Some(0),
            ..surface_vertex(Vector3f::new(0.0, 0.0, 0.0), Vector3f::new(0.0, 1.0, 0.0))
        };
        let panel_vertex = Vertex {
            material_idx: Some(1),
            ..surface_vertex(Vector3f::new(0.0, 2.0, 0.0), Vector3f::new(0.0, -1.0, 0.0))
        };

        let mut path = Path::from_vertex(origin);
        assert!(path.append_slice(&[floor_vertex, panel_vertex]));

        let result = evaluate(&scene, path.to_slice());
        // Floor base color is white so the throughput stays (1, 1, 1) and
        // the result equals the panel emission.
        assert!((result.radiance - Vector3f::new(5.0, 5.0, 5.0)).norm() < 1e-4);

        let continuation = 1.0 - Path::TERMINATION_PROBABILITY;
        let expected_rr = 5.0 / continuation;
        assert!((result.russian_roulette_radiance.x - expected_rr).abs() < 1e-3);
    }

    #[test]
    fn test_evaluate_explicit_light_tail() {
        let scene = floor_and_panel_scene();

        let origin = Vertex {
            connection_type: ConnectionType::Origin,
            position: Vector3f::new(0.0, 1.0, 0.5),
            ..Default::default()
        };
        let floor_vertex = Vertex {
            material_idx: Some(0),
            bounce_type: BounceType::Diffuse,
            ..surface_vertex(Vector3f::new(0.0, 0.0, 0.0), Vector3f::new(0.0, 1.0, 0.0))
        };
        let light_vertex = Vertex {
            connection_type: ConnectionType::Explicit,
            material_idx: Some(1),
            light_idx: Some(0),
            ..surface_vertex(Vector3f::new(0.0, 2.0, 0.0), Vector3f::new(0.0, -1.0, 0.0))
        };

        let mut path = Path::from_vertex(origin);
        assert!(path.append_slice(&[floor_vertex, light_vertex]));

        let result = evaluate(&scene, path.to_slice());
        // bsdf = 1/pi, distance^2 = 4, both cosines 1, area = 4,
        // emission = 5, one light.
        let expected = (1.0 / PI) * (1.0 / 4.0) * 4.0 * 5.0;
        assert!((result.radiance.x - expected).abs() < 1e-3);
        assert!(result.radiance.x > 0.0);
    }

    #[test]
    fn test_evaluate_skips_occluded_light() {
        let mut scene = floor_and_panel_scene();

        // Drop an occluder quad between the floor and the panel.
        let blocker_material = scene.add_material(diffuse_material("blocker"));
        let mut blocker = Mesh::with_name("blocker");
        push_quad(
            &mut blocker,
            Vector3f::new(-1.5, 1.0, 1.5),
            Vector3f::new(1.5, 1.0, 1.5),
            Vector3f::new(1.5, 1.0, -1.5),
            Vector3f::new(-1.5, 1.0, -1.5),
        );
        blocker.add_primitive(0, 2, Some(blocker_material));
        scene.meshes.push(blocker);

        let floor_vertex = Vertex {
            material_idx: Some(0),
            ..surface_vertex(Vector3f::new(0.0, 0.0, 0.0), Vector3f::new(0.0, 1.0, 0.0))
        };
        let light_vertex = Vertex {
            connection_type: ConnectionType::Explicit,
            material_idx: Some(1),
            light_idx: Some(0),
            ..surface_vertex(Vector3f::new(0.0, 2.0, 0.0), Vector3f::new(0.0, -1.0, 0.0))
        };

        let contribution =
            evaluate_explicit_light(&scene, &floor_vertex, &floor_vertex, &light_vertex);
        assert!((contribution - Vector3f::zeros()).norm() < 1e-6);
    }
}
