// Copyright @yucwang 2026

use crate::core::scene::Scene;
use crate::core::threadpool::ThreadPool;
use crate::math::bitmap::Bitmap;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared cooperative-cancellation flag. Workers poll it at loop
/// boundaries; `stop` is observable across threads.
#[derive(Clone)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn clear(&self) {
        self.0.store(false, Ordering::Release);
    }

    pub fn is_stopping(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

impl Default for StopFlag {
    fn default() -> Self {
        Self::new()
    }
}

/// Common contract for the rendering techniques.
pub trait Renderer: Send {
    /// Takes `num_samples` more samples per pixel into the internal
    /// accumulation state, scheduling on `pool` when one is given.
    fn accumulate(&mut self, scene: &Arc<Scene>, num_samples: u32, pool: Option<&ThreadPool>);

    /// Composes the accumulated state into a presentable frame buffer,
    /// including the tone-mapping and gamma correction pass.
    fn update_frame_buffer(&self, frame_buffer: &mut Bitmap);

    fn num_samples_per_pixel(&self) -> u32;

    fn reset(&mut self);

    fn stop_flag(&self) -> StopFlag;

    fn stop(&self) {
        self.stop_flag().stop();
    }

    fn is_stopping(&self) -> bool {
        self.stop_flag().is_stopping()
    }
}
