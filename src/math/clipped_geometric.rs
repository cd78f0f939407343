// Copyright @yucwang 2026

use super::constants::{Float, Int};
use crate::core::rng::Pcg32Rng;

/// Geometric distribution with base `b`, clipped to `{0, .., n}`:
/// `pdf(i) = (1 - b) * b^i / Z` with `Z = 1 - b^(n + 1)`.
/// Sampled by inverse CDF.
pub struct ClippedGeometricDistribution {
    base: Float,
    inv_log_base: Float,
    normalization: Float,
    inv_normalization: Float,
}

impl ClippedGeometricDistribution {
    pub fn new(base: Float) -> Self {
        Self {
            base,
            inv_log_base: 1.0 / base.log2(),
            normalization: 1.0,
            inv_normalization: 1.0,
        }
    }

    pub fn set_parameters(&mut self, n: Int) {
        self.normalization = 1.0 - self.base.powi(n + 1);
        self.inv_normalization = 1.0 / self.normalization;
    }

    pub fn sample(&self, rng: &mut Pcg32Rng) -> Int {
        let u = rng.next_f32() * self.normalization;
        let value = ((1.0 - u).log2() * self.inv_log_base).ceil() - 1.0;
        (value as Int).max(0)
    }

    pub fn pdf(&self, i: Int) -> Float {
        (1.0 - self.base) * self.base.powi(i) * self.inv_normalization
    }
}

/// Two-sided variant: a triangular-exponential profile peaked at `center`
/// over `[left, right]` with mirrored halves. The pdf is doubled at
/// `i == 0`, matching the sampler's half-selection offset.
pub struct TwoSidedClippedGeometricDistribution {
    base: Float,
    inv_log_base: Float,
    normalization: Float,
    inv_normalization: Float,
    offset: Float,
    left: Int,
    center: Int,
}

impl TwoSidedClippedGeometricDistribution {
    pub fn new(base: Float) -> Self {
        Self {
            base,
            inv_log_base: 1.0 / base.log2(),
            normalization: 1.0,
            inv_normalization: 1.0,
            offset: 0.0,
            left: 0,
            center: 0,
        }
    }

    pub fn set_parameters(&mut self, left: Int, center: Int, right: Int) {
        self.offset = self.base.powi(center - left + 1);
        self.normalization = 2.0 - self.offset - self.base.powi(right - center + 1);
        self.inv_normalization = 1.0 / self.normalization;
        self.left = left;
        self.center = center;
    }

    pub fn sample(&self, rng: &mut Pcg32Rng) -> Int {
        let u = rng.next_f32() * self.normalization + self.offset;
        if u < 1.0 {
            let value = self.center as Float - (u.log2() * self.inv_log_base).ceil() + 1.0;
            (value as Int).max(self.left)
        } else {
            let value = self.center as Float + ((2.0 - u).log2() * self.inv_log_base).ceil() - 1.0;
            (value as Int).max(self.left)
        }
    }

    pub fn pdf(&self, i: Int) -> Float {
        let mut result =
            (1.0 - self.base) * self.base.powi((i - self.center).abs()) * self.inv_normalization;
        if i == 0 {
            result *= 2.0;
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clipped_geometric_pdf_normalized() {
        let mut dist = ClippedGeometricDistribution::new(0.5);
        for n in [0, 1, 3, 9] {
            dist.set_parameters(n);
            let total: Float = (0..=n).map(|i| dist.pdf(i)).sum();
            assert!((total - 1.0).abs() < 1e-5, "n = {}: total = {}", n, total);
        }
    }

    #[test]
    fn test_clipped_geometric_sampling_frequencies() {
        let mut dist = ClippedGeometricDistribution::new(0.5);
        dist.set_parameters(4);
        let mut rng = Pcg32Rng::new(3);
        let n = 100000;
        let mut counts = [0usize; 5];
        for _ in 0..n {
            let sample = dist.sample(&mut rng);
            assert!((0..=4).contains(&sample));
            counts[sample as usize] += 1;
        }
        for i in 0..5 {
            let frequency = counts[i] as Float / n as Float;
            assert!(
                (frequency - dist.pdf(i as Int)).abs() < 0.01,
                "i = {}: frequency = {}, pdf = {}", i, frequency, dist.pdf(i as Int)
            );
        }
    }

    #[test]
    fn test_two_sided_samples_in_range() {
        let mut dist = TwoSidedClippedGeometricDistribution::new(0.5);
        dist.set_parameters(0, 2, 6);
        let mut rng = Pcg32Rng::new(17);
        for _ in 0..10000 {
            let sample = dist.sample(&mut rng);
            assert!((0..=6).contains(&sample));
        }
    }

    #[test]
    fn test_two_sided_symmetry_around_center() {
        let mut dist = TwoSidedClippedGeometricDistribution::new(0.5);
        // Symmetric support, center away from zero so the i == 0 doubling
        // does not apply.
        dist.set_parameters(1, 3, 5);
        assert!((dist.pdf(2) - dist.pdf(4)).abs() < 1e-6);
        assert!((dist.pdf(1) - dist.pdf(5)).abs() < 1e-6);
    }

    #[test]
    fn test_two_sided_doubles_at_zero() {
        let mut dist = TwoSidedClippedGeometricDistribution::new(0.5);
        dist.set_parameters(0, 2, 4);
        // The source doubles the mass at i == 0; the quirk is preserved.
        assert!((dist.pdf(0) - 2.0 * dist.pdf(4)).abs() < 1e-6);
    }
}
