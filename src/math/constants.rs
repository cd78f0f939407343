/* Copyright 2026 @Yuchen Wong */

use crate::na;

pub type Float = f32;
pub type Int = i32;
pub type UInt = u32;

pub type Vector2f = na::Vector2<Float>;
pub type Vector3f = na::Vector3<Float>;
pub type Vector4f = na::Vector4<Float>;

pub const EPSILON: Float = 5e-5;
pub const PI: Float = 3.14159265359;
pub const INV_PI: Float = 0.31830988618;
pub const DEG_TO_RAD: Float = PI / 180.0;
pub const RAD_TO_DEG: Float = 180.0 / PI;
