//! Textured mesh: one vertex buffer, one index buffer, one texture.

use std::path::Path;

use anyhow::{Context, Result, anyhow};
use asset::{mesh::MeshData, ply, texture::TextureData};
use glam::Mat4;

use crate::Vertex;
use crate::backend::{BufferDesc, BufferKind, DrawIndexed, RenderBackend, SamplerDesc, TextureDesc};

/// GPU-resident mesh. Resources live exactly as long as this value.
pub struct TexturedMesh<B: RenderBackend> {
    label: String,
    vertex_buffer: B::Buffer,
    index_buffer: B::Buffer,
    texture: B::Texture,
    index_count: u32,
}

impl<B: RenderBackend> TexturedMesh<B> {
    /// Load a PLY mesh and its image from disk and upload both.
    pub fn load(
        backend: &mut B,
        geometry_path: impl AsRef<Path>,
        image_path: impl AsRef<Path>,
    ) -> Result<Self> {
        let geometry_path = geometry_path.as_ref();
        let mesh = ply::load_ply_from_path(geometry_path)?;
        let texture = TextureData::load_flipped(image_path)?;
        let label = geometry_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| geometry_path.display().to_string());
        Self::from_data(backend, &label, &mesh, &texture)
            .with_context(|| format!("Failed to upload mesh {}", geometry_path.display()))
    }

    /// Upload already-decoded geometry and texture.
    pub fn from_data(
        backend: &mut B,
        label: &str,
        mesh: &MeshData,
        texture: &TextureData,
    ) -> Result<Self> {
        mesh.validate()?;
        let index_count = u32::try_from(mesh.indices.len())
            .map_err(|_| anyhow!("Too many indices in mesh '{label}'"))?;
        let vertices: Vec<Vertex> = mesh.vertices.iter().copied().map(Vertex::from).collect();

        let vertex_buffer = backend.create_buffer(&BufferDesc {
            label: &format!("{label} VB"),
            kind: BufferKind::Vertex,
            contents: bytemuck::cast_slice(&vertices),
        })?;
        let index_buffer = backend.create_buffer(&BufferDesc {
            label: &format!("{label} IB"),
            kind: BufferKind::Index,
            contents: bytemuck::cast_slice(&mesh.indices),
        })?;

        let levels = texture.mip_chain()?;
        let texture = backend.create_texture(&TextureDesc {
            label,
            levels: &levels,
            sampler: SamplerDesc::TRILINEAR_REPEAT,
        })?;

        log::debug!(
            "Mesh '{}' on {}: {} vertices, {} indices, {} mip levels",
            label,
            backend.name(),
            vertices.len(),
            index_count,
            levels.len()
        );

        Ok(Self {
            label: label.to_owned(),
            vertex_buffer,
            index_buffer,
            texture,
            index_count,
        })
    }

    /// Bind program, MVP, texture (unit 0) and buffers; draw every index once.
    pub fn draw(&self, backend: &mut B, mvp: &Mat4, program: &B::Program) {
        backend.draw_indexed(DrawIndexed {
            program,
            mvp,
            texture: &self.texture,
            vertices: &self.vertex_buffer,
            indices: &self.index_buffer,
            index_count: self.index_count,
        });
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    pub fn texture(&self) -> &B::Texture {
        &self.texture
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::RecordingBackend;
    use crate::test_support;
    use asset::mesh::{GeometryError, MeshVertex};

    fn quad() -> MeshData {
        MeshData::new(
            vec![
                MeshVertex::new([0.0, 0.0, 0.0], [0.0, 0.0]),
                MeshVertex::new([1.0, 0.0, 0.0], [1.0, 0.0]),
                MeshVertex::new([1.0, 1.0, 0.0], [1.0, 1.0]),
                MeshVertex::new([0.0, 1.0, 0.0], [0.0, 1.0]),
            ],
            vec![0, 1, 2, 0, 2, 3],
        )
    }

    #[test]
    fn construction_allocates_one_of_each() {
        let mut backend = RecordingBackend::new();
        let mesh = TexturedMesh::from_data(
            &mut backend,
            "quad",
            &quad(),
            &TextureData::create_test_texture(32),
        )
        .unwrap();

        let live = backend.live();
        assert_eq!(live.vertex_buffers, 1);
        assert_eq!(live.index_buffers, 1);
        assert_eq!(live.textures, 1);
        assert_eq!(mesh.index_count(), 6);
        assert_eq!(mesh.texture().mip_levels(), 6);
        assert_eq!(mesh.texture().sampler(), SamplerDesc::TRILINEAR_REPEAT);

        drop(mesh);
        assert_eq!(backend.live().total(), 0);
    }

    #[test]
    fn many_meshes_do_not_leak() {
        let mut backend = RecordingBackend::new();
        for _ in 0..50 {
            let mesh = TexturedMesh::from_data(
                &mut backend,
                "quad",
                &quad(),
                &TextureData::create_test_texture(4),
            )
            .unwrap();
            assert_eq!(backend.live().total(), 3);
            drop(mesh);
        }
        assert_eq!(backend.live().total(), 0);
    }

    #[test]
    fn invalid_geometry_allocates_nothing() {
        let mut backend = RecordingBackend::new();
        let mut bad = quad();
        bad.indices[5] = 9;
        let err = TexturedMesh::from_data(
            &mut backend,
            "bad",
            &bad,
            &TextureData::create_test_texture(4),
        )
        .err()
        .unwrap();
        assert!(matches!(
            err.downcast_ref::<GeometryError>(),
            Some(GeometryError::IndexOutOfRange { index: 9, .. })
        ));
        assert_eq!(backend.live().total(), 0);
    }

    #[test]
    fn draw_records_single_indexed_call() {
        let mut backend = RecordingBackend::new();
        let program = test_support::program(&mut backend);
        let mesh = TexturedMesh::from_data(
            &mut backend,
            "quad",
            &quad(),
            &TextureData::create_test_texture(4),
        )
        .unwrap();
        let mvp = Mat4::from_translation(glam::vec3(1.0, 2.0, 3.0));

        backend.begin_frame();
        mesh.draw(&mut backend, &mvp, &program);
        backend.end_frame().unwrap();

        let frame = backend.last_frame().unwrap();
        assert_eq!(frame.draws.len(), 1);
        let call = &frame.draws[0];
        assert_eq!(call.index_count, 6);
        assert_eq!(call.mvp, mvp);
        assert_eq!(call.texture, "quad");
        assert_eq!(call.program, program.id());
        assert_eq!(backend.error_count(), 0);
    }

    #[test]
    fn load_reads_files_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let (geometry, image) = test_support::write_pair(dir.path(), "Table", "table");
        let mut backend = RecordingBackend::new();

        let mesh = TexturedMesh::load(&mut backend, &geometry, &image).unwrap();
        assert_eq!(mesh.label(), "Table");
        assert_eq!(mesh.index_count(), 3);
        assert_eq!(mesh.texture().size(), (4, 2));
    }

    #[test]
    fn load_fails_on_missing_image() {
        let dir = tempfile::tempdir().unwrap();
        let (geometry, _) = test_support::write_pair(dir.path(), "Table", "table");
        let mut backend = RecordingBackend::new();

        let result = TexturedMesh::load(&mut backend, &geometry, dir.path().join("missing.bmp"));
        assert!(result.is_err());
        assert_eq!(backend.live().total(), 0);
    }
}
