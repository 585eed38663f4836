//! CPU-side mesh representation used by loaders.

use thiserror::Error;

/// Vertex with position/uv. Values are in object space.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub uv: [f32; 2],
}

impl MeshVertex {
    pub fn new(position: [f32; 3], uv: [f32; 2]) -> Self {
        Self { position, uv }
    }
}

/// Geometry that loaded syntactically but cannot be drawn as a triangle list.
#[derive(Debug, Error, PartialEq)]
pub enum GeometryError {
    #[error("face {face} has {arity} indices; only triangles are supported")]
    NonTriangularFace { face: usize, arity: usize },
    #[error("index {index} at position {position} is out of range (vertex count {vertex_count})")]
    IndexOutOfRange {
        index: u32,
        position: usize,
        vertex_count: usize,
    },
    #[error("vertex element has {found} scalar properties, at least {required} are needed")]
    MissingVertexAttributes { found: usize, required: usize },
    #[error("element '{element}' declares {count} records, at most {max} are supported")]
    TooManyRecords {
        element: String,
        count: usize,
        max: usize,
    },
    #[error("index count {0} is not a multiple of 3")]
    DanglingIndices(usize),
    #[error("mesh contains no triangles")]
    Empty,
}

/// Indexed triangle mesh with tightly-packed vertices.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshData {
    pub vertices: Vec<MeshVertex>,
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn new(vertices: Vec<MeshVertex>, indices: Vec<u32>) -> Self {
        Self { vertices, indices }
    }

    /// Returns `true` if both vertex and index buffers are non-empty.
    pub fn is_valid(&self) -> bool {
        !self.vertices.is_empty() && !self.indices.is_empty()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Check the triangle-list invariants: whole triangles only, every index
    /// addresses an existing vertex.
    pub fn validate(&self) -> Result<(), GeometryError> {
        if !self.is_valid() {
            return Err(GeometryError::Empty);
        }
        if self.indices.len() % 3 != 0 {
            return Err(GeometryError::DanglingIndices(self.indices.len()));
        }
        let vertex_count = self.vertices.len();
        if let Some((position, &index)) = self
            .indices
            .iter()
            .enumerate()
            .find(|&(_, &i)| i as usize >= vertex_count)
        {
            return Err(GeometryError::IndexOutOfRange {
                index,
                position,
                vertex_count,
            });
        }
        Ok(())
    }
}
