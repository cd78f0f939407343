// Copyright 2026 @TwoCookingMice

use super::constants::{Float, Vector3f};

use std::ops;

/// A 2D image of linear RGB values.
#[derive(Debug, Clone)]
pub struct Bitmap {
    data: Vec<Vector3f>,
    height: usize,
    width: usize,
}

impl ops::Index<(usize, usize)> for Bitmap {
    type Output = Vector3f;

    fn index(&self, index: (usize, usize)) -> &Vector3f {
        &self.data[index.0 + self.width * index.1]
    }
}

impl ops::IndexMut<(usize, usize)> for Bitmap {
    fn index_mut(&mut self, index: (usize, usize)) -> &mut Vector3f {
        &mut self.data[index.0 + self.width * index.1]
    }
}

impl Bitmap {
    pub fn new(width: usize, height: usize) -> Self {
        Self { data: vec![Vector3f::zeros(); width * height],
               width,
               height }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn pixels(&self) -> &[Vector3f] {
        &self.data
    }

    pub fn clear(&mut self) {
        for pixel in self.data.iter_mut() {
            *pixel = Vector3f::zeros();
        }
    }

    pub fn raw_copy(&self) -> Vec<(Float, Float, Float)> {
        let mut raw_copy = vec![(0.0, 0.0, 0.0); self.width * self.height];
        for i in 0..self.height {
            for j in 0..self.width {
                let index = i * self.width + j;
                raw_copy[index].0 = self.data[index][0];
                raw_copy[index].1 = self.data[index][1];
                raw_copy[index].2 = self.data[index][2];
            }
        }

        raw_copy
    }
}

pub fn tone_map(r: Vector3f) -> Vector3f {
    r.map(|x| x.clamp(0.0, 1.0))
}

pub fn gamma_correction(r: Vector3f, gamma: Float) -> Vector3f {
    r.map(|x| x.powf(1.0 / gamma))
}

/// The final correction pass applied before presentation.
pub fn apply_correction(r: Vector3f) -> Vector3f {
    gamma_correction(tone_map(r), 2.2)
}

/* Test for Bitmap */
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bitmap_basic_functions() {
        let mut bitmap = Bitmap::new(64, 32);
        assert_eq!(bitmap.width(), 64);
        assert_eq!(bitmap.height(), 32);
        assert!(!bitmap.is_empty());

        bitmap[(5, 6)] = Vector3f::new(1.0, 0.5, 0.6);
        assert!((bitmap[(5, 6)][0] - 1.0).abs() < 1e-6);
        assert!((bitmap[(2, 6)][0] - 0.0).abs() < 1e-6);

        bitmap.clear();
        assert!((bitmap[(5, 6)][1] - 0.0).abs() < 1e-6);
    }

    #[test]
    fn test_apply_correction() {
        let corrected = apply_correction(Vector3f::new(4.0, 0.0, 1.0));
        assert!((corrected[0] - 1.0).abs() < 1e-6);
        assert!((corrected[1] - 0.0).abs() < 1e-6);
        assert!((corrected[2] - 1.0).abs() < 1e-6);

        let half = apply_correction(Vector3f::new(0.5, 0.5, 0.5));
        assert!((half[0] - 0.5f32.powf(1.0 / 2.2)).abs() < 1e-6);
    }
}
