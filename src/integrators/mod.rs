// Copyright @yucwang 2026

pub mod mlt;
pub mod path_tracer;
