//! Fixed scene manifest and loading.

use std::path::Path;

use anyhow::Result;

use crate::backend::RenderBackend;
use crate::mesh::TexturedMesh;

pub const VERTEX_SHADER: &str = "shaders/shader.vert.wgsl";
pub const FRAGMENT_SHADER: &str = "shaders/shader.frag.wgsl";

/// Geometry/image pair, relative to the asset root.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SceneEntry {
    pub geometry: &'static str,
    pub image: &'static str,
}

const fn entry(geometry: &'static str, image: &'static str) -> SceneEntry {
    SceneEntry { geometry, image }
}

/// The cottage interior, in draw order.
pub const COTTAGE_SCENE: [SceneEntry; 10] = [
    entry("assets/meshes/Walls.ply", "assets/textures/walls.bmp"),
    entry("assets/meshes/WoodObjects.ply", "assets/textures/woodobjects.bmp"),
    entry("assets/meshes/Table.ply", "assets/textures/table.bmp"),
    entry("assets/meshes/WindowBG.ply", "assets/textures/windowbg.bmp"),
    entry("assets/meshes/Patio.ply", "assets/textures/patio.bmp"),
    entry("assets/meshes/Floor.ply", "assets/textures/floor.bmp"),
    entry("assets/meshes/Bottles.ply", "assets/textures/bottles.bmp"),
    entry("assets/meshes/DoorBG.ply", "assets/textures/doorbg.bmp"),
    entry("assets/meshes/MetalObjects.ply", "assets/textures/metalobjects.bmp"),
    entry("assets/meshes/Curtains.ply", "assets/textures/curtains.bmp"),
];

/// Load every entry in order. The first failure aborts the whole scene.
pub fn load_scene<B: RenderBackend>(
    backend: &mut B,
    root: &Path,
    entries: &[SceneEntry],
) -> Result<Vec<TexturedMesh<B>>> {
    let scene = entries
        .iter()
        .map(|e| TexturedMesh::load(backend, root.join(e.geometry), root.join(e.image)))
        .collect::<Result<Vec<_>>>()?;
    log::info!("Scene loaded: {} meshes", scene.len());
    Ok(scene)
}
