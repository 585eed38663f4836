//! Shader source files (WGSL) read at startup.

use std::{fs, path::Path};

use anyhow::{Context, Result};

/// Vertex and fragment stage sources of the single scene program.
#[derive(Clone, Debug)]
pub struct ShaderSources {
    pub vertex: String,
    pub fragment: String,
}

impl ShaderSources {
    pub fn load(vertex_path: impl AsRef<Path>, fragment_path: impl AsRef<Path>) -> Result<Self> {
        let vertex = read_stage(vertex_path.as_ref())?;
        let fragment = read_stage(fragment_path.as_ref())?;
        Ok(Self { vertex, fragment })
    }
}

fn read_stage(path: &Path) -> Result<String> {
    let source = fs::read_to_string(path)
        .with_context(|| format!("Failed to read shader {}", path.display()))?;
    log::debug!("Read shader {:?} ({} bytes)", path, source.len());
    Ok(source)
}
