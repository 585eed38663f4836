//! Recording backend: no GPU, just a log of what the viewer asked for.
//!
//! Every resource handle holds a reference to a shared ledger and removes
//! itself from the live counts when dropped, so tests can check both
//! allocation and release. API misuse (drawing outside a frame, binding a
//! buffer of the wrong kind, drawing past the end of an index buffer) is
//! recorded as an error instead of panicking.

use std::sync::Arc;

use asset::shader::ShaderSources;
use glam::Mat4;
use parking_lot::Mutex;

use crate::backend::{
    BufferDesc, BufferKind, DrawIndexed, RenderBackend, SamplerDesc, TextureDesc,
};
use crate::error::{RenderError, RenderResult};

/// Resources currently alive, by kind.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LiveResources {
    pub vertex_buffers: usize,
    pub index_buffers: usize,
    pub textures: usize,
    pub programs: usize,
}

impl LiveResources {
    pub fn total(&self) -> usize {
        self.vertex_buffers + self.index_buffers + self.textures + self.programs
    }
}

type Ledger = Arc<Mutex<LiveResources>>;

#[derive(Debug)]
pub struct RecordedBuffer {
    id: u64,
    kind: BufferKind,
    len: usize,
    ledger: Ledger,
}

impl RecordedBuffer {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Drop for RecordedBuffer {
    fn drop(&mut self) {
        let mut live = self.ledger.lock();
        match self.kind {
            BufferKind::Vertex => live.vertex_buffers -= 1,
            BufferKind::Index => live.index_buffers -= 1,
        }
    }
}

#[derive(Debug)]
pub struct RecordedTexture {
    id: u64,
    label: String,
    width: u32,
    height: u32,
    mip_levels: u32,
    sampler: SamplerDesc,
    ledger: Ledger,
}

impl RecordedTexture {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn mip_levels(&self) -> u32 {
        self.mip_levels
    }

    pub fn sampler(&self) -> SamplerDesc {
        self.sampler
    }
}

impl Drop for RecordedTexture {
    fn drop(&mut self) {
        self.ledger.lock().textures -= 1;
    }
}

#[derive(Debug)]
pub struct RecordedProgram {
    id: u64,
    ledger: Ledger,
}

impl RecordedProgram {
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Drop for RecordedProgram {
    fn drop(&mut self) {
        self.ledger.lock().programs -= 1;
    }
}

/// One recorded indexed draw.
#[derive(Clone, Debug, PartialEq)]
pub struct DrawCall {
    pub program: u64,
    pub texture: String,
    pub vertex_buffer: u64,
    pub index_buffer: u64,
    pub index_count: u32,
    pub mvp: Mat4,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RecordedFrame {
    pub draws: Vec<DrawCall>,
}

#[derive(Debug, Default)]
pub struct RecordingBackend {
    ledger: Ledger,
    next_id: u64,
    frames: Vec<RecordedFrame>,
    current: Option<RecordedFrame>,
    errors: Vec<String>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn live(&self) -> LiveResources {
        *self.ledger.lock()
    }

    /// Completed frames, oldest first.
    pub fn frames(&self) -> &[RecordedFrame] {
        &self.frames
    }

    pub fn last_frame(&self) -> Option<&RecordedFrame> {
        self.frames.last()
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn error(&mut self, message: String) {
        log::warn!("RecordingBackend: {message}");
        self.errors.push(message);
    }
}

impl RenderBackend for RecordingBackend {
    type Buffer = RecordedBuffer;
    type Texture = RecordedTexture;
    type Program = RecordedProgram;

    fn name(&self) -> &'static str {
        "Recording Backend"
    }

    /// Checks only that the entry points the pipeline links against exist.
    fn create_program(&mut self, label: &str, sources: &ShaderSources) -> RenderResult<RecordedProgram> {
        for (stage, source, entry) in [
            ("vertex", &sources.vertex, "fn vs_main"),
            ("fragment", &sources.fragment, "fn fs_main"),
        ] {
            if !source.contains(entry) {
                return Err(RenderError::Shader {
                    label: label.to_owned(),
                    message: format!("{stage} stage has no '{entry}' entry point"),
                });
            }
        }
        self.ledger.lock().programs += 1;
        Ok(RecordedProgram {
            id: self.next_id(),
            ledger: self.ledger.clone(),
        })
    }

    fn create_buffer(&mut self, desc: &BufferDesc<'_>) -> RenderResult<RecordedBuffer> {
        log::trace!(
            "RecordingBackend: creating {:?} buffer {:?} (size: {})",
            desc.kind,
            desc.label,
            desc.contents.len()
        );
        if desc.contents.is_empty() {
            return Err(RenderError::resource("buffer", desc.label, "empty contents"));
        }
        if desc.kind == BufferKind::Index && desc.contents.len() % 4 != 0 {
            return Err(RenderError::resource(
                "buffer",
                desc.label,
                "index data is not a whole number of u32",
            ));
        }
        {
            let mut live = self.ledger.lock();
            match desc.kind {
                BufferKind::Vertex => live.vertex_buffers += 1,
                BufferKind::Index => live.index_buffers += 1,
            }
        }
        Ok(RecordedBuffer {
            id: self.next_id(),
            kind: desc.kind,
            len: desc.contents.len(),
            ledger: self.ledger.clone(),
        })
    }

    fn create_texture(&mut self, desc: &TextureDesc<'_>) -> RenderResult<RecordedTexture> {
        let base = desc
            .levels
            .first()
            .ok_or_else(|| RenderError::resource("texture", desc.label, "no mip levels"))?;
        if let Some(level) = desc.levels.iter().position(|l| !l.is_valid()) {
            return Err(RenderError::resource(
                "texture",
                desc.label,
                format!("mip level {level} has inconsistent data"),
            ));
        }
        log::trace!(
            "RecordingBackend: creating texture {:?} ({}x{}, {} levels)",
            desc.label,
            base.width,
            base.height,
            desc.levels.len()
        );
        self.ledger.lock().textures += 1;
        Ok(RecordedTexture {
            id: self.next_id(),
            label: desc.label.to_owned(),
            width: base.width,
            height: base.height,
            mip_levels: desc.levels.len() as u32,
            sampler: desc.sampler,
            ledger: self.ledger.clone(),
        })
    }

    fn begin_frame(&mut self) {
        if self.current.is_some() {
            self.error("begin_frame called inside an open frame".into());
        }
        self.current = Some(RecordedFrame::default());
    }

    fn draw_indexed(&mut self, draw: DrawIndexed<'_, Self>) {
        if draw.vertices.kind != BufferKind::Vertex {
            self.error(format!("buffer {} bound as vertex buffer", draw.vertices.id));
            return;
        }
        if draw.indices.kind != BufferKind::Index {
            self.error(format!("buffer {} bound as index buffer", draw.indices.id));
            return;
        }
        if draw.index_count as usize * 4 > draw.indices.len {
            self.error(format!(
                "draw of {} indices overruns index buffer {} ({} bytes)",
                draw.index_count, draw.indices.id, draw.indices.len
            ));
            return;
        }
        let call = DrawCall {
            program: draw.program.id,
            texture: draw.texture.label.clone(),
            vertex_buffer: draw.vertices.id,
            index_buffer: draw.indices.id,
            index_count: draw.index_count,
            mvp: *draw.mvp,
        };
        match self.current.as_mut() {
            Some(frame) => frame.draws.push(call),
            None => self.error("draw_indexed outside of a frame".into()),
        }
    }

    fn end_frame(&mut self) -> RenderResult<()> {
        match self.current.take() {
            Some(frame) => self.frames.push(frame),
            None => self.error("end_frame without begin_frame".into()),
        }
        Ok(())
    }

    fn error_count(&self) -> usize {
        self.errors.len()
    }
}
