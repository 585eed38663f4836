//! Application state and the per-frame update.

use std::path::Path;

use anyhow::Result;
use asset::shader::ShaderSources;
use corelib::camera::{CameraInput, CameraState};

use crate::backend::RenderBackend;
use crate::error::RenderResult;
use crate::mesh::TexturedMesh;
use crate::scene::{FRAGMENT_SHADER, SceneEntry, VERTEX_SHADER, load_scene};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopState {
    Running,
    /// The window was closed; no further frames are rendered.
    Terminated,
}

/// Everything the viewer owns. Scene resources are declared before the
/// backend so they are released first.
pub struct Viewer<B: RenderBackend> {
    scene: Vec<TexturedMesh<B>>,
    program: B::Program,
    camera: CameraState,
    state: LoopState,
    frames: u64,
    backend: B,
}

impl<B: RenderBackend> Viewer<B> {
    /// Build the shader program and every scene mesh. Any failure is fatal.
    pub fn load(mut backend: B, asset_root: &Path, entries: &[SceneEntry]) -> Result<Self> {
        let shaders = ShaderSources::load(
            asset_root.join(VERTEX_SHADER),
            asset_root.join(FRAGMENT_SHADER),
        )?;
        let program = backend.create_program("scene", &shaders)?;
        let scene = load_scene(&mut backend, asset_root, entries)?;
        Ok(Self::new(backend, program, scene))
    }

    pub fn new(backend: B, program: B::Program, scene: Vec<TexturedMesh<B>>) -> Self {
        Self {
            scene,
            program,
            camera: CameraState::default(),
            state: LoopState::Running,
            frames: 0,
            backend,
        }
    }

    /// One loop iteration: move the camera, then clear, draw every mesh in
    /// order and present. Does nothing once terminated.
    pub fn frame(&mut self, input: CameraInput) -> RenderResult<()> {
        if self.state == LoopState::Terminated {
            return Ok(());
        }

        self.camera.update(input);
        let mvp = self.camera.proj_view();

        self.backend.begin_frame();
        for mesh in &self.scene {
            mesh.draw(&mut self.backend, &mvp, &self.program);
        }
        self.backend.end_frame()?;

        self.frames += 1;
        Ok(())
    }

    /// Window-close signal.
    pub fn close(&mut self) {
        if self.state == LoopState::Running {
            log::info!("Viewer terminated after {} frames", self.frames);
        }
        self.state = LoopState::Terminated;
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == LoopState::Running
    }

    pub fn camera(&self) -> &CameraState {
        &self.camera
    }

    pub fn scene(&self) -> &[TexturedMesh<B>] {
        &self.scene
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }
}
