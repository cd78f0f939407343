// Copyright @yucwang 2026

use crate::core::path::{
    BounceType, ConnectionType, EvaluationResult, Path, Vertex, evaluate, has_visibility,
};
use crate::core::renderer::{Renderer, StopFlag};
use crate::core::rng::Pcg32Rng;
use crate::core::scene::Scene;
use crate::core::threadpool::ThreadPool;
use crate::math::bitmap::{Bitmap, apply_correction};
use crate::math::clipped_geometric::{
    ClippedGeometricDistribution, TwoSidedClippedGeometricDistribution,
};
use crate::math::constants::{EPSILON, Float, Int, PI, Vector2f, Vector3f};
use crate::math::ray::Ray3f;

use std::sync::{Arc, Mutex, MutexGuard};

const GEOMETRIC_BASE: Float = 0.5;
const LENS_RADIUS_1: Float = 0.1;
const ANGLE_THETA_1: Float = 1e-4;
const ANGLE_THETA_2: Float = 0.1;

/// The set of proposal kernels a chain draws from, uniformly over the
/// enabled ones.
#[derive(Clone, Copy, Debug, Default)]
pub struct EnabledMutations {
    pub new_path_mutation: bool,
    pub lens_perturbation: bool,
    pub multi_chain_perturbation: bool,
    pub bidirectional_mutation: bool,
}

impl EnabledMutations {
    pub fn all() -> Self {
        Self {
            new_path_mutation: true,
            lens_perturbation: true,
            multi_chain_perturbation: true,
            bidirectional_mutation: true,
        }
    }

    fn enabled_types(&self) -> Vec<MutationType> {
        let mut types = Vec::new();
        if self.new_path_mutation {
            types.push(MutationType::NewPath);
        }
        if self.lens_perturbation {
            types.push(MutationType::Lens);
        }
        if self.multi_chain_perturbation {
            types.push(MutationType::MultiChain);
        }
        if self.bidirectional_mutation {
            types.push(MutationType::Bidirectional);
        }
        types
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum MutationType {
    NewPath,
    Lens,
    MultiChain,
    Bidirectional,
}

#[derive(Clone)]
struct State {
    path: Path,
    pixel: Vector2f,
    evaluation: EvaluationResult,
}

struct MutationInfo {
    proposal: State,
    acceptance: Float,
}

fn luminance(color: &Vector3f) -> Float {
    0.299 * color.x + 0.587 * color.y + 0.114 * color.z
}

fn clamp_pixel(pixel: &Vector2f, width: usize, height: usize) -> (usize, usize) {
    let x = (pixel.x as i64).clamp(0, width as i64 - 1) as usize;
    let y = (pixel.y as i64).clamp(0, height as i64 - 1) as usize;
    (x, y)
}

fn random_eye_ray(scene: &Scene, rng: &mut Pcg32Rng) -> (Vector2f, Ray3f) {
    let pixel = Vector2f::new(
        rng.next_f32() * scene.camera.width as Float,
        rng.next_f32() * scene.camera.height as Float);
    let ray = scene.eye_ray(pixel);
    (pixel, ray)
}

/// Polar offset with an exponentially distributed radius in [r1, r2].
fn pixel_offset(r1: Float, r2: Float, rng: &mut Pcg32Rng) -> Vector2f {
    let phi = rng.next_f32() * 2.0 * PI;
    let r = r2 * (-(r2 / r1).ln() * rng.next_f32()).exp();
    Vector2f::new(r * phi.cos(), r * phi.sin())
}

/// Small-angle perturbation of `dir` in its tangent plane.
fn offset_bounce_direction(
        theta1: Float,
        theta2: Float,
        dir: &Vector3f,
        rng: &mut Pcg32Rng) -> Vector3f {
    let u = if dir.x.abs() < 0.5 {
        dir.cross(&Vector3f::new(1.0, 0.0, 0.0))
    } else {
        dir.cross(&Vector3f::new(0.0, 1.0, 0.0))
    }
    .normalize();
    let v = u.cross(dir);

    let phi = rng.next_f32() * 2.0 * PI;
    let r = theta2 * (-(theta2 / theta1).ln() * rng.next_f32()).exp();
    (dir + r * phi.cos() * u + r * phi.sin() * v).normalize()
}

/// Inverse geometry term of an explicit connection between `a` and `b`,
/// cosines clamped to zero.
fn inv_geometry_term(a: &Vertex, b: &Vertex) -> Float {
    let mut a_to_b = b.position - (a.position + EPSILON * a.geometric_normal);
    let d2 = a_to_b.norm_squared();
    a_to_b /= d2.sqrt();
    let cos1 = a.normal.dot(&a_to_b).max(0.0);
    let cos2 = b.normal.dot(&-a_to_b).max(0.0);
    d2 / (cos1 * cos2)
}

/// One Markov chain: its state, its private accumulation buffer and the
/// tallies feeding the normalization estimator.
struct MltChain {
    accumulation_buffer: Bitmap,
    accumulated_luminance: Float,
    num_new_path_mutations: u32,
    average_samples_per_pixel: Float,
    current: Option<State>,
    enabled_types: Vec<MutationType>,
    rng: Pcg32Rng,
    seed: u64,
}

impl MltChain {
    fn new(width: usize, height: usize, config: &EnabledMutations, seed: u64) -> Self {
        Self {
            accumulation_buffer: Bitmap::new(width, height),
            accumulated_luminance: 0.0,
            num_new_path_mutations: 0,
            average_samples_per_pixel: 0.0,
            current: None,
            enabled_types: config.enabled_types(),
            rng: Pcg32Rng::new(seed),
            seed,
        }
    }

    fn reset(&mut self) {
        self.accumulation_buffer.clear();
        self.accumulated_luminance = 0.0;
        self.num_new_path_mutations = 0;
        self.average_samples_per_pixel = 0.0;
        self.current = None;
        self.rng = Pcg32Rng::new(self.seed);
    }

    /// Draws an entirely independent path. Acceptance uses the
    /// Russian-roulette-scaled luminance, and the proposal tallies feed the
    /// image normalization.
    fn new_path_mutation(&mut self, scene: &Scene) -> Option<MutationInfo> {
        let current_luminance =
            luminance(&self.current.as_ref()?.evaluation.russian_roulette_radiance);

        let (pixel, ray) = random_eye_ray(scene, &mut self.rng);
        let path = Path::create_random_eye_path(scene, ray, &mut self.rng);
        if path.length() <= 1 {
            self.num_new_path_mutations += 1;
            return None;
        }

        let evaluation = evaluate(scene, path.to_slice());
        let proposal_luminance = luminance(&evaluation.russian_roulette_radiance);

        self.num_new_path_mutations += 1;
        self.accumulated_luminance += proposal_luminance;

        let acceptance = proposal_luminance / current_luminance;
        if !acceptance.is_finite() {
            return None;
        }

        Some(MutationInfo {
            proposal: State { path, pixel, evaluation },
            acceptance: acceptance.clamp(0.0, 1.0),
        })
    }

    /// Offsets the pixel, then re-propagates through the same sequence of
    /// bounce types as the current path. At a diffuse vertex the remainder
    /// of the current path is reconnected explicitly; with `multi_chain`
    /// a non-diffuse successor is instead re-aimed by a small-angle
    /// perturbation.
    fn eye_path_perturbation(&mut self, scene: &Scene, multi_chain: bool) -> Option<MutationInfo> {
        let current = self.current.clone()?;

        let width = self.accumulation_buffer.width();
        let height = self.accumulation_buffer.height();
        let new_pixel =
            current.pixel + pixel_offset(LENS_RADIUS_1, 0.1 * width as Float, &mut self.rng);
        if new_pixel.x > width as Float || new_pixel.x < 0.0
                || new_pixel.y > height as Float || new_pixel.y < 0.0 {
            return None;
        }

        let mut next_ray = scene.eye_ray(new_pixel);
        let mut path = Path::from_vertex(Vertex {
            connection_type: ConnectionType::Origin,
            position: next_ray.origin(),
            ..Default::default()
        });

        let mut txy: Float = 1.0;
        let mut tyx: Float = 1.0;

        for i in 1..current.path.length() {
            let current_vertex = current.path.vertex(i);
            next_ray = path.add_bounce(scene, &next_ray, None, &mut self.rng)?;

            if path.last().bounce_type != current_vertex.bounce_type {
                return None;
            }

            if current_vertex.bounce_type == BounceType::Diffuse {
                if i == current.path.length() - 1 {
                    break;
                }

                let next_vertex = current.path.vertex(i + 1);

                if next_vertex.bounce_type != BounceType::Diffuse {
                    if !multi_chain {
                        return None;
                    }
                    // Multi-chain bounce: re-aim toward the old direction,
                    // slightly perturbed.
                    let original_direction = next_vertex.position - current_vertex.position;
                    let new_direction = offset_bounce_direction(
                        ANGLE_THETA_1, ANGLE_THETA_2, &original_direction, &mut self.rng);
                    txy *= original_direction.dot(&current_vertex.normal).max(0.0);
                    tyx *= new_direction.dot(&current_vertex.normal).max(0.0);
                    next_ray = Ray3f::new(next_ray.origin(), new_direction, None, None);
                    continue;
                }

                if !has_visibility(scene, path.last(), next_vertex) {
                    return None;
                }

                txy *= inv_geometry_term(current_vertex, next_vertex);
                tyx *= inv_geometry_term(path.last(), next_vertex);

                if !path.append_slice(current.path.slice(i + 1, current.path.length())) {
                    return None;
                }
                break;
            }
        }

        let evaluation = evaluate(scene, path.to_slice());
        let current_luminance = luminance(&current.evaluation.radiance);
        let proposal_luminance = luminance(&evaluation.radiance);

        let acceptance = (proposal_luminance * txy) / (current_luminance * tyx);
        if !acceptance.is_finite() {
            return None;
        }

        Some(MutationInfo {
            proposal: State { path, pixel: new_pixel, evaluation },
            acceptance: acceptance.clamp(0.0, 1.0),
        })
    }

    /// Deletes a subrange of the current path and replaces it with a fresh
    /// subpath, reconnecting to the surviving suffix when one remains.
    fn bidirectional_mutation(&mut self, scene: &Scene) -> Option<MutationInfo> {
        let current = self.current.clone()?;
        let current_length = current.path.length();

        let mut clipped_geo_dist = ClippedGeometricDistribution::new(GEOMETRIC_BASE);
        let mut two_sided_geo_dist =
            TwoSidedClippedGeometricDistribution::new(GEOMETRIC_BASE);

        clipped_geo_dist.set_parameters(current_length as Int - 1);
        let deleted_length = clipped_geo_dist.sample(&mut self.rng) as usize;

        // Vertices s to t are deleted, non-inclusive.
        let s = self.rng.next_bounded((current_length - deleted_length) as u32) as usize;
        let t = s + deleted_length + 1;

        // If the suffix survives, its first vertex must accept an explicit
        // connection.
        if t < current_length
                && current.path.vertex(t).bounce_type != BounceType::Diffuse {
            return None;
        }

        let max_added_length = (Path::MAX_LENGTH - current_length + deleted_length) as Int;
        let min_added_length = 0;
        two_sided_geo_dist.set_parameters(min_added_length, deleted_length as Int, max_added_length);
        let added_length = two_sided_geo_dist.sample(&mut self.rng) as usize;

        let mut path = Path::from_vertex(*current.path.vertex(0));
        let mut txy: Float = 1.0;
        let mut tyx: Float = 1.0;

        if !path.append_slice(current.path.slice(1, s + 1)) {
            return None;
        }

        let mut pixel = current.pixel;
        let mut ray;
        if s == 0 {
            // The deleted range starts at the eye ray's point of contact, so
            // the proposal needs a new eye ray.
            let (new_pixel, new_ray) = random_eye_ray(scene, &mut self.rng);
            pixel = new_pixel;
            ray = new_ray;
        } else {
            // Bounce in a new direction from the material at vertex s.
            let last_vertex = *path.last();
            let in_dir = last_vertex.position - current.path.vertex(s - 1).position;
            let material = scene.get_material(last_vertex.material_idx);
            let (new_ray, bounce_type) =
                material.sample_direction(&-in_dir, &last_vertex, &mut self.rng);
            path.last_mut().bounce_type = bounce_type;
            ray = new_ray;
        }

        for _ in 0..added_length {
            ray = path.add_bounce(scene, &ray, None, &mut self.rng)?;
        }

        if t < current_length {
            if path.last().bounce_type != BounceType::Diffuse {
                return None;
            }
            if !has_visibility(scene, path.last(), current.path.vertex(t)) {
                return None;
            }
            if path.length() > 1 {
                tyx *= PI * inv_geometry_term(path.last(), current.path.vertex(t));
            }
            if t > 1 {
                txy *= PI * inv_geometry_term(current.path.vertex(t - 1), current.path.vertex(t));
            }
            if !path.append_slice(current.path.slice(t, current_length)) {
                return None;
            }
        }

        // pd: probability of the deletion we made, pa: probability of the
        // addition; the reverse factors swap their roles on the new path.
        let pd = clipped_geo_dist.pdf(deleted_length as Int)
            / (current_length - deleted_length) as Float;
        let pa = two_sided_geo_dist.pdf(added_length as Int);
        tyx *= pd * pa;

        let new_length = current_length + added_length - deleted_length;
        clipped_geo_dist.set_parameters(new_length as Int - 1);

        let max_added_length = Path::MAX_LENGTH as Int - new_length as Int + added_length as Int;
        two_sided_geo_dist.set_parameters(min_added_length, added_length as Int, max_added_length);

        let pd = clipped_geo_dist.pdf(added_length as Int)
            / (current_length as Int - added_length as Int) as Float;
        let pa = two_sided_geo_dist.pdf(deleted_length as Int);
        txy *= pd * pa;

        let evaluation = evaluate(scene, path.to_slice());
        let current_luminance = luminance(&current.evaluation.radiance);
        let proposal_luminance = luminance(&evaluation.radiance);

        let acceptance = (proposal_luminance * txy) / (current_luminance * tyx);
        if !acceptance.is_finite() {
            return None;
        }

        Some(MutationInfo {
            proposal: State { path, pixel, evaluation },
            acceptance: acceptance.clamp(0.0, 1.0),
        })
    }

    fn compute_random_mutation(&mut self, scene: &Scene) -> Option<MutationInfo> {
        if self.enabled_types.is_empty() {
            return None;
        }
        let mutation_type =
            self.enabled_types[self.rng.next_bounded(self.enabled_types.len() as u32) as usize];
        match mutation_type {
            MutationType::NewPath => self.new_path_mutation(scene),
            MutationType::Lens => self.eye_path_perturbation(scene, false),
            MutationType::MultiChain => self.eye_path_perturbation(scene, true),
            MutationType::Bidirectional => self.bidirectional_mutation(scene),
        }
    }

    fn accumulate(&mut self, scene: &Scene, num_mutations: usize, stop_flag: &StopFlag) {
        // Find a valid initial state: any path with non-zero luminance.
        while !stop_flag.is_stopping() && self.current.is_none() {
            let (pixel, ray) = random_eye_ray(scene, &mut self.rng);
            let path = Path::create_random_eye_path(scene, ray, &mut self.rng);
            let evaluation = evaluate(scene, path.to_slice());
            if luminance(&evaluation.radiance) > EPSILON {
                self.current = Some(State { path, pixel, evaluation });
            }
        }

        for _ in 0..num_mutations {
            if stop_flag.is_stopping() {
                break;
            }

            let (current_color, current_pixel) = match &self.current {
                Some(current) => (
                    current.evaluation.radiance / luminance(&current.evaluation.radiance),
                    current.pixel,
                ),
                None => break,
            };

            let (x, y) = clamp_pixel(
                &current_pixel,
                self.accumulation_buffer.width(),
                self.accumulation_buffer.height());

            let Some(info) = self.compute_random_mutation(scene) else {
                // Self-transition.
                self.accumulation_buffer[(x, y)] += current_color;
                continue;
            };

            let mut new_color = info.proposal.evaluation.radiance;
            let new_luminance = luminance(&new_color);
            if new_luminance < EPSILON {
                self.accumulation_buffer[(x, y)] += current_color;
                continue;
            }
            new_color /= new_luminance;

            let (new_x, new_y) = clamp_pixel(
                &info.proposal.pixel,
                self.accumulation_buffer.width(),
                self.accumulation_buffer.height());

            self.accumulation_buffer[(x, y)] += current_color * (1.0 - info.acceptance);
            self.accumulation_buffer[(new_x, new_y)] += new_color * info.acceptance;

            if self.rng.next_f32() < info.acceptance {
                self.current = Some(info.proposal);
            }
        }

        let num_pixels =
            self.accumulation_buffer.width() * self.accumulation_buffer.height();
        self.average_samples_per_pixel += num_mutations as Float / num_pixels as Float;
    }
}

/// Metropolis light transport driver: N independent chains merged through
/// the Veach normalization estimator.
pub struct Mlt {
    width: usize,
    height: usize,
    chains: Vec<Arc<Mutex<MltChain>>>,
    average_samples_per_pixel: u32,
    stop_flag: StopFlag,
}

fn lock(chain: &Mutex<MltChain>) -> MutexGuard<'_, MltChain> {
    chain.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Mlt {
    pub fn new(
            config: &EnabledMutations,
            width: usize,
            height: usize,
            num_chains: usize,
            seed: u64) -> Self {
        if config.new_path_mutation {
            log::info!("New path mutations enabled");
        }
        if config.lens_perturbation {
            log::info!("Lens perturbations enabled");
        }
        if config.multi_chain_perturbation {
            log::info!("Multi-chain perturbations enabled");
        }
        if config.bidirectional_mutation {
            log::info!("Bidirectional mutations enabled");
        }

        let num_chains = num_chains.max(1);
        let chains = (0..num_chains)
            .map(|i| {
                let chain_seed = seed
                    .wrapping_add((i as u64).wrapping_mul(0x9e3779b97f4a7c15))
                    .wrapping_add(1);
                Arc::new(Mutex::new(MltChain::new(width, height, config, chain_seed)))
            })
            .collect();

        Self {
            width,
            height,
            chains,
            average_samples_per_pixel: 0,
            stop_flag: StopFlag::new(),
        }
    }

    /// Scaling factor that makes the splat histogram approximate the image:
    /// the mean path brightness estimated by the new-path proposals, divided
    /// by the accumulated samples per pixel.
    fn compute_scale_factor(&self) -> Float {
        let mut total_accumulated_luminance = 0.0;
        let mut total_num_new_path_mutations = 0u64;
        for chain in &self.chains {
            let chain = lock(chain);
            total_accumulated_luminance += chain.accumulated_luminance;
            total_num_new_path_mutations += chain.num_new_path_mutations as u64;
        }
        if total_num_new_path_mutations == 0 || self.average_samples_per_pixel == 0 {
            return 0.0;
        }
        (total_accumulated_luminance / total_num_new_path_mutations as Float)
            / self.average_samples_per_pixel as Float
    }
}

impl Renderer for Mlt {
    fn accumulate(&mut self, scene: &Arc<Scene>, num_samples: u32, pool: Option<&ThreadPool>) {
        let num_mutations_per_chain =
            num_samples as usize * self.width * self.height / self.chains.len();

        match pool {
            Some(pool) => {
                for chain in &self.chains {
                    let chain = Arc::clone(chain);
                    let scene = Arc::clone(scene);
                    let stop_flag = self.stop_flag.clone();
                    pool.assign_work(move || {
                        lock(&chain).accumulate(&scene, num_mutations_per_chain, &stop_flag);
                    });
                }
                pool.wait();
            }
            None => {
                for chain in &self.chains {
                    lock(chain).accumulate(scene, num_mutations_per_chain, &self.stop_flag);
                }
            }
        }

        self.average_samples_per_pixel += num_samples;
    }

    fn update_frame_buffer(&self, frame_buffer: &mut Bitmap) {
        frame_buffer.clear();
        let scale_factor = self.compute_scale_factor();
        for chain in &self.chains {
            let chain = lock(chain);
            for y in 0..frame_buffer.height() {
                for x in 0..frame_buffer.width() {
                    frame_buffer[(x, y)] += chain.accumulation_buffer[(x, y)] * scale_factor;
                }
            }
        }
        for y in 0..frame_buffer.height() {
            for x in 0..frame_buffer.width() {
                frame_buffer[(x, y)] = apply_correction(frame_buffer[(x, y)]);
            }
        }
    }

    fn num_samples_per_pixel(&self) -> u32 {
        self.average_samples_per_pixel
    }

    fn reset(&mut self) {
        self.stop_flag.clear();
        for chain in &self.chains {
            lock(chain).reset();
        }
        self.average_samples_per_pixel = 0;
    }

    fn stop_flag(&self) -> StopFlag {
        self.stop_flag.clone()
    }
}
