// Copyright @yucwang 2026

use millefeuille::core::material::MaterialData;
use millefeuille::core::mesh::{Mesh, Triangle};
use millefeuille::core::renderer::Renderer;
use millefeuille::core::scene::{Camera, Light, MeshLight, Scene};
use millefeuille::integrators::mlt::{EnabledMutations, Mlt};
use millefeuille::integrators::path_tracer::PathTracer;
use millefeuille::io::exr_utils;
use millefeuille::math::bitmap::Bitmap;
use millefeuille::math::constants::{Vector2f, Vector3f, Vector4f};
use millefeuille::renderers::render_process::RenderProcess;

use std::env;
use std::sync::Arc;

const SAMPLE_TARGET: u32 = 16384;

/// Case-insensitive prefix match, so `new,lens` selects the full names.
fn matches(token: &str, reference: &str) -> bool {
    if token.len() > reference.len() {
        return false;
    }
    token
        .chars()
        .zip(reference.chars())
        .all(|(a, b)| a.eq_ignore_ascii_case(&b))
}

fn parse_enabled_mutations(string: &str) -> Option<EnabledMutations> {
    let mut result = EnabledMutations::default();
    for token in string.split(',') {
        if token.is_empty() {
            continue;
        }
        if matches(token, "newPathMutation") {
            result.new_path_mutation = true;
        } else if matches(token, "lensPerturbation") {
            result.lens_perturbation = true;
        } else if matches(token, "multiChainPerturbation") {
            result.multi_chain_perturbation = true;
        } else if matches(token, "bidirectionalMutation") {
            result.bidirectional_mutation = true;
        } else {
            eprintln!("Unknown mutation type: {}", token);
            return None;
        }
    }
    Some(result)
}

fn push_quad(mesh: &mut Mesh, p0: Vector3f, p1: Vector3f, p2: Vector3f, p3: Vector3f) {
    let normal = (p1 - p0).cross(&(p2 - p0)).normalize();
    let uvs = [
        Vector2f::new(0.0, 0.0),
        Vector2f::new(1.0, 0.0),
        Vector2f::new(1.0, 1.0),
        Vector2f::new(0.0, 1.0),
    ];
    mesh.triangles.push(Triangle {
        positions: [p0, p1, p2],
        normals: [normal; 3],
        texture_coords: [uvs[0], uvs[1], uvs[2]],
    });
    mesh.triangles.push(Triangle {
        positions: [p0, p2, p3],
        normals: [normal; 3],
        texture_coords: [uvs[0], uvs[2], uvs[3]],
    });
}

/// Axis-aligned box with outward-facing quads.
fn push_box(mesh: &mut Mesh, min: Vector3f, max: Vector3f) {
    // Bottom, top.
    push_quad(mesh,
        Vector3f::new(min.x, min.y, min.z), Vector3f::new(max.x, min.y, min.z),
        Vector3f::new(max.x, min.y, max.z), Vector3f::new(min.x, min.y, max.z));
    push_quad(mesh,
        Vector3f::new(min.x, max.y, max.z), Vector3f::new(max.x, max.y, max.z),
        Vector3f::new(max.x, max.y, min.z), Vector3f::new(min.x, max.y, min.z));
    // Front, back.
    push_quad(mesh,
        Vector3f::new(min.x, min.y, max.z), Vector3f::new(max.x, min.y, max.z),
        Vector3f::new(max.x, max.y, max.z), Vector3f::new(min.x, max.y, max.z));
    push_quad(mesh,
        Vector3f::new(max.x, min.y, min.z), Vector3f::new(min.x, min.y, min.z),
        Vector3f::new(min.x, max.y, min.z), Vector3f::new(max.x, max.y, min.z));
    // Left, right.
    push_quad(mesh,
        Vector3f::new(min.x, min.y, min.z), Vector3f::new(min.x, min.y, max.z),
        Vector3f::new(min.x, max.y, max.z), Vector3f::new(min.x, max.y, min.z));
    push_quad(mesh,
        Vector3f::new(max.x, min.y, max.z), Vector3f::new(max.x, min.y, min.z),
        Vector3f::new(max.x, max.y, min.z), Vector3f::new(max.x, max.y, max.z));
}

fn diffuse_material(name: &str, color: Vector3f) -> MaterialData {
    MaterialData {
        name: String::from(name),
        base_color_factor: Vector4f::new(color.x, color.y, color.z, 1.0),
        metallic_factor: 0.0,
        roughness_factor: 1.0,
        ..Default::default()
    }
}

/// A Cornell-style room with diffuse, mirror, glass and emissive surfaces.
/// Scene loading is handled by external collaborators; the demo scene is
/// built in code.
fn build_demo_scene(width: usize, height: usize) -> Scene {
    let camera = Camera::new(
        width, height, 45.0, 0.032,
        Vector3f::new(0.0, 1.0, 0.85),
        Vector3f::new(0.0, 0.0, -1.0),
        Vector3f::new(0.0, 1.0, 0.0));
    let mut scene = Scene::new(camera);

    let white = scene.add_material(diffuse_material("white", Vector3f::new(0.75, 0.75, 0.75)));
    let red = scene.add_material(diffuse_material("red", Vector3f::new(0.75, 0.2, 0.2)));
    let green = scene.add_material(diffuse_material("green", Vector3f::new(0.2, 0.75, 0.2)));
    let mirror = scene.add_material(MaterialData {
        name: String::from("mirror"),
        metallic_factor: 1.0,
        roughness_factor: 0.0,
        ..Default::default()
    });
    let glass = scene.add_material(MaterialData {
        name: String::from("glass"),
        metallic_factor: 0.0,
        roughness_factor: 0.0,
        transmission_factor: 1.0,
        ior: 1.5,
        ..Default::default()
    });
    let light = scene.add_material(MaterialData {
        emissive_factor: Vector3f::new(1.0, 1.0, 1.0),
        emissive_strength: 5.0,
        ..diffuse_material("light", Vector3f::new(1.0, 1.0, 1.0))
    });

    let mut walls = Mesh::with_name("walls");
    // Floor, ceiling, back wall, front wall.
    push_quad(&mut walls,
        Vector3f::new(-1.0, 0.0, 1.0), Vector3f::new(1.0, 0.0, 1.0),
        Vector3f::new(1.0, 0.0, -1.0), Vector3f::new(-1.0, 0.0, -1.0));
    push_quad(&mut walls,
        Vector3f::new(-1.0, 2.0, -1.0), Vector3f::new(1.0, 2.0, -1.0),
        Vector3f::new(1.0, 2.0, 1.0), Vector3f::new(-1.0, 2.0, 1.0));
    push_quad(&mut walls,
        Vector3f::new(-1.0, 0.0, -1.0), Vector3f::new(1.0, 0.0, -1.0),
        Vector3f::new(1.0, 2.0, -1.0), Vector3f::new(-1.0, 2.0, -1.0));
    push_quad(&mut walls,
        Vector3f::new(1.0, 0.0, 1.0), Vector3f::new(-1.0, 0.0, 1.0),
        Vector3f::new(-1.0, 2.0, 1.0), Vector3f::new(1.0, 2.0, 1.0));
    walls.add_primitive(0, 8, Some(white));

    let start = walls.triangles.len();
    push_quad(&mut walls,
        Vector3f::new(-1.0, 0.0, -1.0), Vector3f::new(-1.0, 2.0, -1.0),
        Vector3f::new(-1.0, 2.0, 1.0), Vector3f::new(-1.0, 0.0, 1.0));
    walls.add_primitive(start, 2, Some(red));

    let start = walls.triangles.len();
    push_quad(&mut walls,
        Vector3f::new(1.0, 0.0, -1.0), Vector3f::new(1.0, 0.0, 1.0),
        Vector3f::new(1.0, 2.0, 1.0), Vector3f::new(1.0, 2.0, -1.0));
    walls.add_primitive(start, 2, Some(green));
    scene.meshes.push(walls);

    let mut tall_box = Mesh::with_name("tallBox");
    push_box(&mut tall_box,
        Vector3f::new(-0.65, 0.0, -0.75),
        Vector3f::new(-0.2, 1.2, -0.3));
    tall_box.add_primitive(0, 12, Some(mirror));
    scene.meshes.push(tall_box);

    let mut short_box = Mesh::with_name("shortBox");
    push_box(&mut short_box,
        Vector3f::new(0.2, 0.0, -0.35),
        Vector3f::new(0.6, 0.6, 0.1));
    short_box.add_primitive(0, 12, Some(glass));
    scene.meshes.push(short_box);

    let mut panel = Mesh::with_name("light");
    push_quad(&mut panel,
        Vector3f::new(-0.5, 1.99, -0.5), Vector3f::new(0.5, 1.99, -0.5),
        Vector3f::new(0.5, 1.99, 0.5), Vector3f::new(-0.5, 1.99, 0.5));
    panel.add_primitive(0, 2, Some(light));
    let mesh_idx = scene.meshes.len();
    scene.meshes.push(panel);
    scene.lights.push(Light::Mesh(MeshLight { mesh_idx, primitive_idx: 0 }));
    log::info!("Added mesh name=light primitiveIdx=0 as a light");

    scene
}

fn main() {
    env::set_var("RUST_LOG", "info");
    env_logger::init();

    let args: Vec<String> = env::args().collect();

    let mut output_path = String::from("render.exr");
    let mut use_path_tracer = false;
    let mut enabled_mutations = EnabledMutations::all();
    let mut spp_override: Option<u32> = None;
    let mut num_jobs = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    let mut seed: u64 = 0;
    let mut width: usize = 512;
    let mut height: usize = 384;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--pt" | "--use-path-tracer" => {
                use_path_tracer = true;
            }
            "-m" | "--mutations" => {
                i += 1;
                let parsed = args
                    .get(i)
                    .and_then(|v| parse_enabled_mutations(v));
                match parsed {
                    Some(mutations) => enabled_mutations = mutations,
                    None => {
                        eprintln!(
                            "Usage: {} [output.exr] [--pt] [-m MUTATIONS] [--spp N] \
                             [-j N] [--seed N] [--width N] [--height N]",
                            args[0]);
                        std::process::exit(1);
                    }
                }
            }
            "--spp" => {
                i += 1;
                spp_override = args.get(i).and_then(|v| v.parse::<u32>().ok());
            }
            "-j" | "--jobs" => {
                i += 1;
                num_jobs = args
                    .get(i)
                    .and_then(|v| v.parse::<usize>().ok())
                    .unwrap_or(num_jobs);
            }
            "--seed" => {
                i += 1;
                seed = args.get(i).and_then(|v| v.parse::<u64>().ok()).unwrap_or(0);
            }
            "--width" => {
                i += 1;
                width = args.get(i).and_then(|v| v.parse::<usize>().ok()).unwrap_or(width);
            }
            "--height" => {
                i += 1;
                height = args.get(i).and_then(|v| v.parse::<usize>().ok()).unwrap_or(height);
            }
            other => {
                output_path = String::from(other);
            }
        }
        i += 1;
    }

    let sample_target = spp_override.unwrap_or(SAMPLE_TARGET);
    let scene = Arc::new(build_demo_scene(width, height));

    let renderer: Box<dyn Renderer> = if use_path_tracer {
        log::info!("Rendering with the path tracer");
        Box::new(PathTracer::new(width, height, seed))
    } else {
        log::info!("Rendering with Metropolis light transport");
        Box::new(Mlt::new(&enabled_mutations, width, height, num_jobs.max(1), seed))
    };

    let process = RenderProcess::new(
        renderer, scene, width, height, num_jobs, sample_target, true);
    let renderer = process.finish().expect("render thread failed");

    let mut frame_buffer = Bitmap::new(width, height);
    renderer.update_frame_buffer(&mut frame_buffer);
    exr_utils::write_exr_to_file(&frame_buffer, &output_path);
}
