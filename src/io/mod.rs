// Copyright 2026 @TwoCookingMice

pub mod exr_utils;
