//! Renderer: backend capability trait, wgpu + recording backends,
//! textured meshes and the viewer state driven once per frame.

use asset::mesh::MeshVertex;
use bytemuck::{Pod, Zeroable};
use wgpu::{VertexBufferLayout, VertexStepMode};

pub mod backend;
pub mod error;
pub mod mesh;
pub mod recording;
pub mod scene;
pub mod viewer;
pub mod wgpu_backend;

#[cfg(test)]
mod test_support;

pub use backend::RenderBackend;
pub use error::{RenderError, RenderResult};
pub use mesh::TexturedMesh;
pub use recording::RecordingBackend;
pub use scene::{COTTAGE_SCENE, SceneEntry};
pub use viewer::{LoopState, Viewer};
pub use wgpu_backend::WgpuBackend;

/// Vertex: position + texture coordinate, 20-byte stride.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub pos: [f32; 3],
    pub uv: [f32; 2],
}

impl Vertex {
    pub const LAYOUT: VertexBufferLayout<'static> = VertexBufferLayout {
        array_stride: std::mem::size_of::<Vertex>() as u64,
        step_mode: VertexStepMode::Vertex,
        attributes: &wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x2],
    };
}

impl From<MeshVertex> for Vertex {
    fn from(v: MeshVertex) -> Self {
        Self {
            pos: v.position,
            uv: v.uv,
        }
    }
}
