// Copyright @yucwang 2026

use crate::core::path::{BounceType, Path, evaluate_explicit_light, evaluate_implicit};
use crate::core::renderer::{Renderer, StopFlag};
use crate::core::rng::Pcg32Rng;
use crate::core::scene::Scene;
use crate::core::threadpool::ThreadPool;
use crate::math::bitmap::{Bitmap, apply_correction};
use crate::math::constants::{Float, Vector2f, Vector3f};

use std::sync::{Arc, Mutex, MutexGuard};

const BLOCK_WIDTH: usize = 32;

/// Tile-parallel unidirectional path tracer. Implicit and explicit light
/// contributions are averaged with a fixed 0.5 weight.
pub struct PathTracer {
    accumulation_buffer: Arc<Mutex<Bitmap>>,
    num_samples_per_pixel: u32,
    stop_flag: StopFlag,
    seed: u64,
}

fn lock(buffer: &Mutex<Bitmap>) -> MutexGuard<'_, Bitmap> {
    buffer.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn block_seed(seed: u64, block_idx: u64, pass: u32) -> u64 {
    seed.wrapping_add(block_idx.wrapping_mul(0x9e3779b97f4a7c15))
        .wrapping_add((pass as u64).wrapping_mul(0xd1b54a32d192ed03))
}

fn trace_sample(scene: &Scene, pixel_x: Float, pixel_y: Float, rng: &mut Pcg32Rng) -> Vector3f {
    let ray = scene.eye_ray(Vector2f::new(
        pixel_x + rng.next_f32(),
        pixel_y + rng.next_f32()));
    let eye_path = Path::create_random_eye_path(scene, ray, rng);
    let light_path = Path::create_random_light_path(scene, rng);

    let mut radiance = Vector3f::zeros();
    let mut throughput = Vector3f::new(1.0, 1.0, 1.0);
    for i in 1..eye_path.length() {
        let prev_vertex = eye_path.vertex(i - 1);
        let vertex = eye_path.vertex(i);

        if i < eye_path.length() - 1 {
            let implicit_evaluation = evaluate_implicit(scene, prev_vertex, vertex);
            throughput.component_mul_assign(&implicit_evaluation.russian_roulette_radiance);
        }

        if vertex.bounce_type == BounceType::Diffuse && light_path.length() > 0 {
            radiance += 0.5
                * throughput.component_mul(&evaluate_explicit_light(
                    scene, prev_vertex, vertex, light_path.vertex(0)));
        }

        let material = scene.get_material(vertex.material_idx);
        radiance += 0.5 * throughput.component_mul(&material.emission(vertex));
    }

    radiance
}

#[allow(clippy::too_many_arguments)]
fn accumulate_block(
        scene: &Scene,
        buffer: &Mutex<Bitmap>,
        stop_flag: &StopFlag,
        seed: u64,
        num_samples: u32,
        x0: usize,
        y0: usize,
        block_width: usize) {
    let (width, height) = {
        let buffer = lock(buffer);
        (buffer.width(), buffer.height())
    };
    let x1 = (x0 + block_width).min(width);
    let y1 = (y0 + block_width).min(height);

    let mut rng = Pcg32Rng::new(seed);
    let mut block = vec![Vector3f::zeros(); (x1 - x0) * (y1 - y0)];
    for j in y0..y1 {
        for i in x0..x1 {
            let mut radiance = Vector3f::zeros();
            for _ in 0..num_samples {
                if stop_flag.is_stopping() {
                    return;
                }
                radiance += trace_sample(scene, i as Float, j as Float, &mut rng);
            }
            block[(i - x0) + (x1 - x0) * (j - y0)] = radiance;
        }
    }

    let mut buffer = lock(buffer);
    for j in y0..y1 {
        for i in x0..x1 {
            buffer[(i, j)] += block[(i - x0) + (x1 - x0) * (j - y0)];
        }
    }
}

impl PathTracer {
    pub fn new(width: usize, height: usize, seed: u64) -> Self {
        Self {
            accumulation_buffer: Arc::new(Mutex::new(Bitmap::new(width, height))),
            num_samples_per_pixel: 0,
            stop_flag: StopFlag::new(),
            seed,
        }
    }
}

impl Renderer for PathTracer {
    fn accumulate(&mut self, scene: &Arc<Scene>, num_samples: u32, pool: Option<&ThreadPool>) {
        let (width, height) = {
            let buffer = lock(&self.accumulation_buffer);
            (buffer.width(), buffer.height())
        };

        match pool {
            Some(pool) => {
                let mut block_idx: u64 = 0;
                for y in (0..height).step_by(BLOCK_WIDTH) {
                    for x in (0..width).step_by(BLOCK_WIDTH) {
                        let scene = Arc::clone(scene);
                        let buffer = Arc::clone(&self.accumulation_buffer);
                        let stop_flag = self.stop_flag.clone();
                        let seed = block_seed(self.seed, block_idx, self.num_samples_per_pixel);
                        pool.assign_work(move || {
                            accumulate_block(
                                &scene, &buffer, &stop_flag, seed, num_samples,
                                x, y, BLOCK_WIDTH);
                        });
                        block_idx += 1;
                    }
                }
                pool.wait();
            }
            None => {
                let seed = block_seed(self.seed, 0, self.num_samples_per_pixel);
                accumulate_block(
                    scene, &self.accumulation_buffer, &self.stop_flag, seed,
                    num_samples, 0, 0, width.max(height));
            }
        }

        self.num_samples_per_pixel += num_samples;
    }

    fn update_frame_buffer(&self, frame_buffer: &mut Bitmap) {
        if self.num_samples_per_pixel == 0 {
            frame_buffer.clear();
            return;
        }
        let inv_num_samples = 1.0 / self.num_samples_per_pixel as Float;
        let buffer = lock(&self.accumulation_buffer);
        for y in 0..frame_buffer.height() {
            for x in 0..frame_buffer.width() {
                frame_buffer[(x, y)] = apply_correction(buffer[(x, y)] * inv_num_samples);
            }
        }
    }

    fn num_samples_per_pixel(&self) -> u32 {
        self.num_samples_per_pixel
    }

    fn reset(&mut self) {
        self.stop_flag.clear();
        lock(&self.accumulation_buffer).clear();
        self.num_samples_per_pixel = 0;
    }

    fn stop_flag(&self) -> StopFlag {
        self.stop_flag.clone()
    }
}
