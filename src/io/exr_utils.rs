/* Copyright 2026 @Yuchen Wong */

use crate::math::bitmap::Bitmap;

use exr::prelude::*;

// Write EXR Image to file
pub fn write_exr_to_file(image: &Bitmap, file_path: &str) {
    log::info!("Starting writing openexr image: {}.", file_path);

    let pixels = image.raw_copy();
    let width = image.width();
    let result = write_rgb_file(
        file_path,
        image.width(),
        image.height(),
        |x, y| {
            let (r, g, b) = pixels[x + y * width];
            (r, g, b)
        },
    );

    match result {
        Ok(()) => log::info!(
            "OpenEXR written, width = {}, height = {}.",
            image.width(), image.height()),
        Err(error) => log::error!("Failed to write {}: {}.", file_path, error),
    }
}
