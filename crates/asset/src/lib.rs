//! Asset loading/parsers (meshes, textures, shaders).
//! PLY triangle meshes, RGBA8 textures flipped to a bottom-left origin,
//! and WGSL shader sources.

pub mod mesh;
pub mod ply;
pub mod shader;
pub mod texture;
