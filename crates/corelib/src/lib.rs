//! Core types: math re-exports, camera state and projection.

pub use glam::{Mat4, Vec3, Vec4, vec3};

pub mod camera;
