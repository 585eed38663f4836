//! Capability interface between the viewer and a graphics API.
//!
//! The viewer only ever creates a program, static buffers and sampled
//! textures, then issues indexed draws between `begin_frame` and `end_frame`.
//! Resources are owned by the caller and released when dropped.

use asset::{shader::ShaderSources, texture::TextureData};
use glam::Mat4;

use crate::error::RenderResult;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferKind {
    Vertex,
    /// `u32` triangle-list indices.
    Index,
}

/// Static buffer contents uploaded once at creation.
#[derive(Clone, Copy, Debug)]
pub struct BufferDesc<'a> {
    pub label: &'a str,
    pub kind: BufferKind,
    pub contents: &'a [u8],
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AddressMode {
    Repeat,
    ClampToEdge,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterMode {
    Nearest,
    Linear,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SamplerDesc {
    pub address_u: AddressMode,
    pub address_v: AddressMode,
    pub mag_filter: FilterMode,
    pub min_filter: FilterMode,
    pub mipmap_filter: FilterMode,
}

impl SamplerDesc {
    /// Repeat on both axes, linear magnification, trilinear minification.
    pub const TRILINEAR_REPEAT: Self = Self {
        address_u: AddressMode::Repeat,
        address_v: AddressMode::Repeat,
        mag_filter: FilterMode::Linear,
        min_filter: FilterMode::Linear,
        mipmap_filter: FilterMode::Linear,
    };
}

/// 2D RGBA8 texture with its complete mip chain (level 0 first).
#[derive(Clone, Copy, Debug)]
pub struct TextureDesc<'a> {
    pub label: &'a str,
    pub levels: &'a [TextureData],
    pub sampler: SamplerDesc,
}

/// One indexed triangle draw over `0..index_count`, texture bound to unit 0.
pub struct DrawIndexed<'a, B: RenderBackend + ?Sized> {
    pub program: &'a B::Program,
    pub mvp: &'a Mat4,
    pub texture: &'a B::Texture,
    pub vertices: &'a B::Buffer,
    pub indices: &'a B::Buffer,
    pub index_count: u32,
}

pub trait RenderBackend {
    type Buffer;
    type Texture;
    type Program;

    fn name(&self) -> &'static str;

    /// Compile and link the vertex/fragment pair. Failure is fatal to startup.
    fn create_program(
        &mut self,
        label: &str,
        sources: &ShaderSources,
    ) -> RenderResult<Self::Program>;

    fn create_buffer(&mut self, desc: &BufferDesc<'_>) -> RenderResult<Self::Buffer>;

    fn create_texture(&mut self, desc: &TextureDesc<'_>) -> RenderResult<Self::Texture>;

    /// Start a frame; the color and depth targets are cleared when it ends.
    fn begin_frame(&mut self);

    fn draw_indexed(&mut self, draw: DrawIndexed<'_, Self>);

    /// Submit everything drawn since `begin_frame` and present.
    fn end_frame(&mut self) -> RenderResult<()>;

    /// Errors reported by the graphics API so far.
    fn error_count(&self) -> usize;
}
