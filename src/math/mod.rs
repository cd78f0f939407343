// Copyright 2026 @TwoCookingMice

pub mod aabb;
pub mod aabb4;
pub mod bitmap;
pub mod clipped_geometric;
pub mod constants;
pub mod ray;
pub mod warp;
