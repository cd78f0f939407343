// Copyright @yucwang 2026

use crate::core::renderer::{Renderer, StopFlag};
use crate::core::scene::Scene;
use crate::core::threadpool::ThreadPool;
use crate::math::bitmap::Bitmap;

use indicatif::{ProgressBar, ProgressStyle};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::Instant;

/// Progressive render driver: a background thread accumulates samples with
/// a doubling step size and publishes converged frames into a shared front
/// buffer. `reset` restarts the renderer, e.g. after a camera change.
pub struct RenderProcess {
    front_buffer: Arc<Mutex<Bitmap>>,
    scene: Arc<Scene>,
    stop_flag: StopFlag,
    thread: Option<JoinHandle<Box<dyn Renderer>>>,
    width: usize,
    height: usize,
    num_jobs: usize,
    sample_target: u32,
    show_progress: bool,
}

fn lock(buffer: &Mutex<Bitmap>) -> MutexGuard<'_, Bitmap> {
    buffer.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[allow(clippy::too_many_arguments)]
fn render_loop(
        mut renderer: Box<dyn Renderer>,
        scene: Arc<Scene>,
        front_buffer: Arc<Mutex<Bitmap>>,
        width: usize,
        height: usize,
        num_jobs: usize,
        sample_target: u32,
        show_progress: bool) -> Box<dyn Renderer> {
    const MAX_SAMPLES_PER_STEP: u32 = 128;

    let pool = if num_jobs > 1 { Some(ThreadPool::new(num_jobs)) } else { None };
    let mut back_buffer = Bitmap::new(width, height);
    let mut sample_step_size = 1u32;

    let progress = if show_progress {
        let bar = ProgressBar::new(sample_target as u64);
        bar.set_style(
            ProgressStyle::with_template(
                "[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} samples per pixel")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        Some(bar)
    } else {
        None
    };

    let start_time = Instant::now();
    while renderer.num_samples_per_pixel() < sample_target {
        renderer.accumulate(&scene, sample_step_size, pool.as_ref());
        if renderer.is_stopping() {
            break;
        }

        if sample_step_size < MAX_SAMPLES_PER_STEP {
            sample_step_size *= 2;
        } else {
            log::info!(
                "Samples per pixel: {}, time: {:.3}s",
                renderer.num_samples_per_pixel(),
                start_time.elapsed().as_secs_f64());
        }

        renderer.update_frame_buffer(&mut back_buffer);
        {
            let mut front_buffer = lock(&front_buffer);
            std::mem::swap(&mut *front_buffer, &mut back_buffer);
        }

        if let Some(progress) = &progress {
            progress.set_position(renderer.num_samples_per_pixel().min(sample_target) as u64);
        }
    }

    if let Some(progress) = &progress {
        progress.finish_and_clear();
    }
    renderer
}

impl RenderProcess {
    pub fn new(
            renderer: Box<dyn Renderer>,
            scene: Arc<Scene>,
            width: usize,
            height: usize,
            num_jobs: usize,
            sample_target: u32,
            show_progress: bool) -> Self {
        let mut process = Self {
            front_buffer: Arc::new(Mutex::new(Bitmap::new(width, height))),
            scene,
            stop_flag: renderer.stop_flag(),
            thread: None,
            width,
            height,
            num_jobs,
            sample_target,
            show_progress,
        };
        process.start(renderer);
        process
    }

    fn start(&mut self, renderer: Box<dyn Renderer>) {
        self.stop_flag = renderer.stop_flag();
        let scene = Arc::clone(&self.scene);
        let front_buffer = Arc::clone(&self.front_buffer);
        let (width, height) = (self.width, self.height);
        let num_jobs = self.num_jobs;
        let sample_target = self.sample_target;
        let show_progress = self.show_progress;
        self.thread = Some(std::thread::spawn(move || {
            render_loop(
                renderer, scene, front_buffer, width, height, num_jobs,
                sample_target, show_progress)
        }));
    }

    /// Live converging frame buffer for presentation. Readers observe
    /// whole frames; the swap happens under the lock.
    pub fn frame_buffer(&self) -> Arc<Mutex<Bitmap>> {
        Arc::clone(&self.front_buffer)
    }

    /// Stops the render thread, resets the renderer and restarts. Called
    /// when the scene changed.
    pub fn reset(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        self.stop_flag.stop();
        let Ok(mut renderer) = thread.join() else {
            log::error!("Render thread panicked; not restarting");
            return;
        };
        renderer.reset();
        self.start(renderer);
    }

    /// Swaps in an updated scene (e.g. after camera input) and restarts.
    pub fn replace_scene(&mut self, scene: Arc<Scene>) {
        self.scene = scene;
        self.reset();
    }

    /// Waits for the render thread to finish its sample target and returns
    /// the renderer for final readback.
    pub fn finish(mut self) -> Option<Box<dyn Renderer>> {
        self.thread.take().and_then(|thread| thread.join().ok())
    }
}

impl Drop for RenderProcess {
    fn drop(&mut self) {
        if let Some(thread) = self.thread.take() {
            self.stop_flag.stop();
            let _ = thread.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::material::MaterialData;
    use crate::core::mesh::{Mesh, Triangle};
    use crate::core::scene::{Camera, Light, MeshLight};
    use crate::integrators::path_tracer::PathTracer;
    use crate::math::constants::{Float, Vector2f, Vector3f};

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

    fn small_scene(width: usize, height: usize) -> Scene {
        let camera = Camera::new(
            width, height, 45.0, 0.032,
            Vector3f::new(0.0, 1.0, 0.5),
            Vector3f::new(0.0, 0.0, -1.0),
            Vector3f::new(0.0, 1.0, 0.0));
        let mut scene = Scene::new(camera);

        let white = scene.add_material(MaterialData {
            name: String::from("white"),
            metallic_factor: 0.0,
            ..Default::default()
        });
        let light = scene.add_material(MaterialData {
            name: String::from("light"),
            metallic_factor: 0.0,
            emissive_factor: Vector3f::new(1.0, 1.0, 1.0),
            emissive_strength: 5.0,
            ..Default::default()
        });

        let mut walls = Mesh::with_name("walls");
        push_quad(&mut walls,
            Vector3f::new(-2.0, 0.0, 2.0), Vector3f::new(2.0, 0.0, 2.0),
            Vector3f::new(2.0, 0.0, -2.0), Vector3f::new(-2.0, 0.0, -2.0));
        push_quad(&mut walls,
            Vector3f::new(-2.0, 0.0, -2.0), Vector3f::new(2.0, 0.0, -2.0),
            Vector3f::new(2.0, 3.0, -2.0), Vector3f::new(-2.0, 3.0, -2.0));
        walls.add_primitive(0, 4, Some(white));
        scene.meshes.push(walls);

        let mut panel = Mesh::with_name("panel");
        push_quad(&mut panel,
            Vector3f::new(-1.0, 2.5, -1.0), Vector3f::new(1.0, 2.5, -1.0),
            Vector3f::new(1.0, 2.5, 1.0), Vector3f::new(-1.0, 2.5, 1.0));
        panel.add_primitive(0, 2, Some(light));
        scene.meshes.push(panel);
        scene.lights.push(Light::Mesh(MeshLight { mesh_idx: 1, primitive_idx: 0 }));

        scene
    }

    fn mean_luminance(bitmap: &Bitmap) -> Float {
        let mut total = 0.0;
        for pixel in bitmap.pixels() {
            total += 0.299 * pixel.x + 0.587 * pixel.y + 0.114 * pixel.z;
        }
        total / bitmap.pixels().len() as Float
    }

    #[test]
    fn test_runs_to_sample_target() {
        let scene = Arc::new(small_scene(12, 10));
        let renderer = Box::new(PathTracer::new(12, 10, 1));
        let process = RenderProcess::new(renderer, scene, 12, 10, 2, 8, false);

        let renderer = process.finish().expect("render thread failed");
        assert!(renderer.num_samples_per_pixel() >= 8);

        let mut frame_buffer = Bitmap::new(12, 10);
        renderer.update_frame_buffer(&mut frame_buffer);
        assert!(mean_luminance(&frame_buffer) > 0.0);
    }

    #[test]
    fn test_front_buffer_is_published() {
        let scene = Arc::new(small_scene(12, 10));
        let renderer = Box::new(PathTracer::new(12, 10, 2));
        let process = RenderProcess::new(renderer, scene, 12, 10, 1, 8, false);
        let front_buffer = process.frame_buffer();

        let renderer = process.finish().expect("render thread failed");
        assert!(renderer.num_samples_per_pixel() >= 8);
        // The final published frame is the last update before the target
        // was reached.
        let front_buffer = lock(&front_buffer);
        assert!(mean_luminance(&front_buffer) > 0.0);
    }

    #[test]
    fn test_reset_restarts_rendering() {
        let scene = Arc::new(small_scene(8, 6));
        let renderer = Box::new(PathTracer::new(8, 6, 3));
        let mut process = RenderProcess::new(renderer, scene, 8, 6, 1, 2048, false);

        process.reset();
        process.reset();

        // After the restarts the process keeps converging until stopped.
        let stop_flag = process.stop_flag.clone();
        std::thread::sleep(std::time::Duration::from_millis(50));
        stop_flag.stop();
        let renderer = process.finish().expect("render thread failed");
        assert!(renderer.is_stopping());
    }
}
