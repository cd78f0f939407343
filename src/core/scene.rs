// Copyright @yucwang 2026

use crate::core::material::{Material, MaterialData};
use crate::core::mesh::Mesh;
use crate::math::bitmap::Bitmap;
use crate::math::constants::{DEG_TO_RAD, Float, Vector2f, Vector3f};
use crate::math::ray::Ray3f;

/// Pinhole camera. The film distance is derived from the vertical field of
/// view; the aspect ratio is fixed at construction.
pub struct Camera {
    pub width: usize,
    pub height: usize,
    pub aspect_ratio: Float,
    pub fov: Float,
    pub film_size: Float,
    pub distance_to_film: Float,
    pub position: Vector3f,
    pub forward: Vector3f,
    pub up: Vector3f,
    pub right: Vector3f,
}

impl Camera {
    pub fn new(
            width: usize, height: usize, fov: Float, film_size: Float,
            position: Vector3f, forward: Vector3f, up: Vector3f) -> Self {
        let forward = forward.normalize();
        let up = up.normalize();
        Self {
            width,
            height,
            aspect_ratio: width as Float / height as Float,
            fov,
            film_size,
            distance_to_film: film_size / (2.0 * (fov * DEG_TO_RAD * 0.5).tan()),
            position,
            forward,
            up,
            right: forward.cross(&up).normalize(),
        }
    }

    pub fn move_by(&mut self, delta: Vector3f) {
        self.position += delta;
    }

    /// Rotate right by `yaw`, then up by `pitch`, re-orthonormalizing the
    /// basis against the world up axis.
    pub fn rotate(&mut self, yaw: Float, pitch: Float) {
        self.forward = (self.forward * yaw.cos() + self.right * yaw.sin()).normalize();
        self.forward = (self.forward * pitch.cos() + self.up * pitch.sin()).normalize();
        self.right = self.forward.cross(&Vector3f::new(0.0, 1.0, 0.0)).normalize();
        self.up = self.right.cross(&self.forward).normalize();
    }
}

#[derive(Clone, Copy, Debug)]
pub struct PointLight {
    pub position: Vector3f,
    pub wattage: Vector3f,
}

#[derive(Clone, Copy, Debug)]
pub struct MeshLight {
    pub mesh_idx: usize,
    pub primitive_idx: usize,
}

#[derive(Clone, Copy, Debug)]
pub enum Light {
    Point(PointLight),
    Mesh(MeshLight),
}

#[derive(Clone, Copy, Debug)]
pub struct Texture {
    pub image_idx: usize,
}

#[derive(Clone, Copy, Debug)]
pub struct HitInfo {
    pub distance: Float,
    pub position: Vector3f,
    pub normal: Vector3f,
    pub geometric_normal: Vector3f,
    pub texture_coord: Vector2f,
    pub material_idx: Option<usize>,
}

/// Read-only (after construction) scene description shared by the
/// integrators: geometry, materials, textures, lights and the camera.
pub struct Scene {
    pub camera: Camera,
    pub meshes: Vec<Mesh>,
    pub textures: Vec<Texture>,
    pub images: Vec<Bitmap>,
    pub lights: Vec<Light>,
    materials: Vec<MaterialData>,
    default_material: MaterialData,
}

impl Scene {
    pub fn new(camera: Camera) -> Self {
        Self {
            camera,
            meshes: Vec::new(),
            textures: Vec::new(),
            images: Vec::new(),
            lights: Vec::new(),
            materials: Vec::new(),
            default_material: MaterialData::default(),
        }
    }

    pub fn add_material(&mut self, data: MaterialData) -> usize {
        log::info!("Added material name={}", data.name);
        self.materials.push(data);
        self.materials.len() - 1
    }

    pub fn num_materials(&self) -> usize {
        self.materials.len()
    }

    pub fn get_material(&self, material_idx: Option<usize>) -> Material<'_> {
        match material_idx {
            Some(idx) => Material::new(self, &self.materials[idx]),
            None => Material::new(self, &self.default_material),
        }
    }

    /// Nearest hit over every primitive of every mesh within the ray's
    /// distance bounds. The shading normal and texture coordinate are
    /// interpolated with the barycentric weights; the geometric normal is
    /// recomputed from the triangle edges so it stays consistent.
    pub fn ray_intersection(&self, ray: &Ray3f) -> Option<HitInfo> {
        let mut closest: Option<(usize, usize, crate::core::bvh::BvhHit)> = None;
        for (mesh_idx, mesh) in self.meshes.iter().enumerate() {
            for (primitive_idx, primitive) in mesh.primitives.iter().enumerate() {
                if let Some(hit) = primitive.bvh.intersect(ray) {
                    if closest
                        .as_ref()
                        .is_none_or(|(_, _, closest)| hit.distance < closest.distance)
                    {
                        closest = Some((mesh_idx, primitive_idx, hit));
                    }
                }
            }
        }

        let (mesh_idx, primitive_idx, hit) = closest?;
        let mesh = &self.meshes[mesh_idx];
        let triangle = &mesh.triangles[hit.triangle_idx];
        let edge1 = triangle.positions[1] - triangle.positions[0];
        let edge2 = triangle.positions[2] - triangle.positions[0];
        let weights = hit.barycentric;

        Some(HitInfo {
            distance: hit.distance,
            position: hit.position,
            normal: (weights[0] * triangle.normals[0]
                + weights[1] * triangle.normals[1]
                + weights[2] * triangle.normals[2])
                .normalize(),
            geometric_normal: edge1.cross(&edge2).normalize(),
            texture_coord: weights[0] * triangle.texture_coords[0]
                + weights[1] * triangle.texture_coords[1]
                + weights[2] * triangle.texture_coords[2],
            material_idx: mesh.primitives[primitive_idx].material_idx,
        })
    }

    /// Perspective ray through `pixel` on a virtual film plane of size
    /// `film_size x film_size * aspect` at the derived film distance.
    pub fn eye_ray(&self, pixel: Vector2f) -> Ray3f {
        let camera = &self.camera;
        let film_u = pixel.x / camera.width as Float - 0.5;
        let film_v = pixel.y / camera.height as Float - 0.5;

        let pixel_pos = camera.position
            + camera.aspect_ratio * camera.film_size * film_u * camera.right
            + camera.film_size * film_v * camera.up
            + camera.distance_to_film * camera.forward;

        Ray3f::new(camera.position, pixel_pos - camera.position, None, None)
    }

    /// Nearest-neighbour lookup with repeat wrapping. Empty images sample
    /// as white.
    pub fn sample_texture(&self, texture_idx: usize, texture_coord: &Vector2f) -> Vector3f {
        let texture = &self.textures[texture_idx];
        let image = &self.images[texture.image_idx];
        if image.is_empty() {
            return Vector3f::new(1.0, 1.0, 1.0);
        }

        let width = image.width() as i64;
        let height = image.height() as i64;
        let u = ((texture_coord.x * width as Float) as i64).rem_euclid(width) as usize;
        let v = ((texture_coord.y * height as Float) as i64).rem_euclid(height) as usize;
        image[(u, v)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::mesh::Triangle;

    fn single_triangle_mesh(z: Float) -> Mesh {
        let mut mesh = Mesh::with_name("triangle");
        mesh.triangles.push(Triangle {
            positions: [
                Vector3f::new(-10.0, -10.0, z),
                Vector3f::new(10.0, -10.0, z),
                Vector3f::new(0.0, 10.0, z),
            ],
            normals: [Vector3f::new(0.0, 0.0, 1.0); 3],
            texture_coords: [
                Vector2f::new(0.0, 0.0),
                Vector2f::new(1.0, 0.0),
                Vector2f::new(0.5, 1.0),
            ],
        });
        mesh.add_primitive(0, 1, None);
        mesh
    }

    fn test_camera() -> Camera {
        Camera::new(
            64, 48, 45.0, 0.032,
            Vector3f::new(0.0, 0.0, 5.0),
            Vector3f::new(0.0, 0.0, -1.0),
            Vector3f::new(0.0, 1.0, 0.0))
    }

    #[test]
    fn test_nearest_hit_across_meshes() {
        let mut scene = Scene::new(test_camera());
        scene.meshes.push(single_triangle_mesh(0.0));
        scene.meshes.push(single_triangle_mesh(2.0));

        let ray = Ray3f::new(
            Vector3f::new(0.0, 0.0, 5.0),
            Vector3f::new(0.0, 0.0, -1.0),
            None, None);
        let hit = scene.ray_intersection(&ray).expect("expected a hit");
        assert!((hit.distance - 3.0).abs() < 1e-4);
        assert!((hit.geometric_normal.z.abs() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_eye_ray_through_center() {
        let scene = Scene::new(test_camera());
        let ray = scene.eye_ray(Vector2f::new(32.0, 24.0));
        let dir = ray.dir();
        assert!((dir.x - 0.0).abs() < 1e-6);
        assert!((dir.y - 0.0).abs() < 1e-6);
        assert!((dir.z + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_camera_rotate_keeps_basis_orthonormal() {
        let mut camera = test_camera();
        camera.rotate(0.3, -0.2);
        camera.rotate(-1.1, 0.4);

        assert!((camera.forward.norm() - 1.0).abs() < 1e-5);
        assert!((camera.up.norm() - 1.0).abs() < 1e-5);
        assert!((camera.right.norm() - 1.0).abs() < 1e-5);
        assert!(camera.forward.dot(&camera.up).abs() < 1e-5);
        assert!(camera.forward.dot(&camera.right).abs() < 1e-5);
        assert!(camera.up.dot(&camera.right).abs() < 1e-5);
        // Right-handed: forward x up == -right under the chosen convention.
        let cross = camera.right.cross(&camera.forward);
        assert!((cross - camera.up).norm() < 1e-4);
    }

    #[test]
    fn test_sample_texture_wraps() {
        let mut scene = Scene::new(test_camera());
        let mut image = Bitmap::new(2, 2);
        image[(0, 0)] = Vector3f::new(1.0, 0.0, 0.0);
        image[(1, 0)] = Vector3f::new(0.0, 1.0, 0.0);
        image[(0, 1)] = Vector3f::new(0.0, 0.0, 1.0);
        image[(1, 1)] = Vector3f::new(1.0, 1.0, 0.0);
        scene.images.push(image);
        scene.textures.push(Texture { image_idx: 0 });

        let sample = scene.sample_texture(0, &Vector2f::new(0.25, 0.25));
        assert!((sample - Vector3f::new(1.0, 0.0, 0.0)).norm() < 1e-6);

        // One full period to the right lands on the same texel.
        let wrapped = scene.sample_texture(0, &Vector2f::new(1.25, 0.25));
        assert!((wrapped - sample).norm() < 1e-6);

        // Negative coordinates wrap as well.
        let negative = scene.sample_texture(0, &Vector2f::new(-0.75, 0.25));
        assert!((negative - Vector3f::new(0.0, 1.0, 0.0)).norm() < 1e-6);
    }

    #[test]
    fn test_empty_image_samples_white() {
        let mut scene = Scene::new(test_camera());
        scene.images.push(Bitmap::new(0, 0));
        scene.textures.push(Texture { image_idx: 0 });
        let sample = scene.sample_texture(0, &Vector2f::new(0.3, 0.7));
        assert!((sample - Vector3f::new(1.0, 1.0, 1.0)).norm() < 1e-6);
    }
}
