//! On-disk fixtures shared by the renderer tests.

use std::fs;
use std::path::{Path, PathBuf};

use asset::shader::ShaderSources;
use image::{Rgba, RgbaImage};

use crate::backend::RenderBackend;
use crate::recording::{RecordedProgram, RecordingBackend};
use crate::scene::{FRAGMENT_SHADER, SceneEntry, VERTEX_SHADER};

pub(crate) const VERTEX_WGSL: &str = include_str!("../../../shaders/shader.vert.wgsl");
pub(crate) const FRAGMENT_WGSL: &str = include_str!("../../../shaders/shader.frag.wgsl");

const TRIANGLE_PLY: &str = "ply
format ascii 1.0
element vertex 3
property float x
property float y
property float z
property float nx
property float ny
property float nz
property float s
property float t
element face 1
property list uchar uint vertex_indices
end_header
0 0 0 0 0 1 0 0
1 0 0 0 0 1 1 0
0 1 0 0 0 1 0 1
3 0 1 2
";

pub(crate) fn sources() -> ShaderSources {
    ShaderSources {
        vertex: VERTEX_WGSL.to_owned(),
        fragment: FRAGMENT_WGSL.to_owned(),
    }
}

pub(crate) fn program(backend: &mut RecordingBackend) -> RecordedProgram {
    backend.create_program("test", &sources()).unwrap()
}

fn write_file(path: &Path, contents: &[u8]) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, contents).unwrap();
}

fn write_image(path: &Path) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    RgbaImage::from_fn(4, 2, |x, _| Rgba([(x * 60) as u8, 90, 30, 255]))
        .save(path)
        .unwrap();
}

/// Write `<name>.ply` and `<image>.bmp` into `dir`.
pub(crate) fn write_pair(dir: &Path, name: &str, image: &str) -> (PathBuf, PathBuf) {
    let geometry = dir.join(format!("{name}.ply"));
    let texture = dir.join(format!("{image}.bmp"));
    write_file(&geometry, TRIANGLE_PLY.as_bytes());
    write_image(&texture);
    (geometry, texture)
}

pub(crate) fn write_shaders(root: &Path) {
    write_file(&root.join(VERTEX_SHADER), VERTEX_WGSL.as_bytes());
    write_file(&root.join(FRAGMENT_SHADER), FRAGMENT_WGSL.as_bytes());
}

pub(crate) fn write_scene(root: &Path, entries: &[SceneEntry]) {
    for e in entries {
        write_file(&root.join(e.geometry), TRIANGLE_PLY.as_bytes());
        write_image(&root.join(e.image));
    }
}
