//! PLY (polygon file format) loader producing triangle-list mesh data.
//!
//! Decoding is handled by `ply-rs-bw`, so ascii and both binary encodings are
//! accepted. Only the position (properties 1-3) and texture coordinates
//! (properties 7-8) of each vertex are kept, whatever they are named; the
//! attributes in between (normals) are dropped. Faces must already be
//! triangles.

use std::{
    fs::File,
    io::{self, BufRead, BufReader},
    path::Path,
};

use anyhow::{Context, Result, anyhow, bail};
use ply_rs_bw::parser::Parser;
use ply_rs_bw::ply::{DefaultElement, ElementDef, Header, Property, PropertyDef, PropertyType};

use crate::mesh::{GeometryError, MeshData, MeshVertex};

const REQUIRED_VERTEX_FIELDS: usize = 8;
const POSITION_FIELDS: [usize; 3] = [0, 1, 2];
const UV_FIELDS: [usize; 2] = [6, 7];

/// Record counts past these cannot be addressed with 32-bit indices.
const MAX_RECORDS: usize = u32::MAX as usize;
const MAX_FACES: usize = MAX_RECORDS / 3;

/// Load a PLY mesh from a file path.
pub fn load_ply_from_path(path: impl AsRef<Path>) -> Result<MeshData> {
    let path = path.as_ref();
    let file = File::open(path)
        .with_context(|| format!("Failed to open PLY file: {}", path.display()))?;
    let mesh = load_ply_from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to load PLY file: {}", path.display()))?;
    log::info!(
        "Loaded mesh {:?}: {} vertices, {} triangles",
        path,
        mesh.vertices.len(),
        mesh.triangle_count()
    );
    Ok(mesh)
}

/// Load a PLY mesh from a [`BufRead`] implementation.
pub fn load_ply_from_reader<R: BufRead>(mut reader: R) -> Result<MeshData> {
    let parser = Parser::<DefaultElement>::new();
    let header = parser
        .read_header(&mut reader)
        .context("Failed to parse PLY header")?;
    log::trace!(
        "PLY header: {:?}, elements {:?}",
        header.encoding,
        header
            .elements
            .values()
            .map(|e| (e.name.as_str(), e.count))
            .collect::<Vec<_>>()
    );

    check_record_counts(&header)?;
    let vertex_fields = vertex_fields(element_def(&header, "vertex")?)?;
    let index_list = index_list_name(element_def(&header, "face")?)?;

    let payload = parser
        .read_payload(&mut reader, &header)
        .context("Failed to read PLY body")?;
    let records = |name: &str| {
        payload
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| anyhow!("PLY body has no '{name}' records"))
    };
    let vertices = read_vertices(records("vertex")?, &vertex_fields)?;
    let indices = read_faces(records("face")?, index_list)?;

    let mesh = MeshData::new(vertices, indices);
    mesh.validate()?;
    Ok(mesh)
}

/// Convenience helper to parse an ascii PLY string literal.
pub fn load_ply_from_str(contents: &str) -> Result<MeshData> {
    load_ply_from_reader(io::Cursor::new(contents))
}

fn element_def<'h>(header: &'h Header, name: &str) -> Result<&'h ElementDef> {
    header
        .elements
        .get(name)
        .ok_or_else(|| anyhow!("PLY header declares no '{name}' element"))
}

/// Reject header counts before any record is read.
fn check_record_counts(header: &Header) -> Result<()> {
    for element in header.elements.values() {
        let max = if element.name == "face" {
            MAX_FACES
        } else {
            MAX_RECORDS
        };
        if element.count > max {
            return Err(GeometryError::TooManyRecords {
                element: element.name.clone(),
                count: element.count,
                max,
            }
            .into());
        }
    }
    Ok(())
}

/// Names of the position and uv properties, picked by declaration order.
fn vertex_fields(element: &ElementDef) -> Result<Vec<&str>> {
    let properties: Vec<_> = element.properties.values().collect();
    if properties.len() < REQUIRED_VERTEX_FIELDS {
        return Err(GeometryError::MissingVertexAttributes {
            found: properties.len(),
            required: REQUIRED_VERTEX_FIELDS,
        }
        .into());
    }
    POSITION_FIELDS
        .iter()
        .chain(UV_FIELDS.iter())
        .map(|&field| {
            let property = properties[field];
            match property.data_type {
                PropertyType::Scalar(_) => Ok(property.name.as_str()),
                PropertyType::List(..) => {
                    bail!("Vertex property '{}' must be a scalar", property.name)
                }
            }
        })
        .collect()
}

fn index_list_name(element: &ElementDef) -> Result<&str> {
    let is_list = |p: &&PropertyDef| matches!(p.data_type, PropertyType::List(..));
    element
        .properties
        .values()
        .filter(is_list)
        .find(|p| p.name == "vertex_indices" || p.name == "vertex_index")
        .or_else(|| element.properties.values().find(is_list))
        .map(|p| p.name.as_str())
        .ok_or_else(|| anyhow!("Face element has no vertex index list"))
}

fn read_vertices(records: &[DefaultElement], fields: &[&str]) -> Result<Vec<MeshVertex>> {
    records
        .iter()
        .enumerate()
        .map(|(n, record)| {
            let mut values = [0f32; 5];
            for (value, name) in values.iter_mut().zip(fields) {
                *value = record
                    .get(*name)
                    .and_then(scalar_f32)
                    .ok_or_else(|| anyhow!("Vertex {n} has no numeric '{name}' property"))?;
            }
            let [x, y, z, u, v] = values;
            Ok(MeshVertex::new([x, y, z], [u, v]))
        })
        .collect()
}

fn read_faces(records: &[DefaultElement], index_list: &str) -> Result<Vec<u32>> {
    let mut indices = Vec::with_capacity(records.len() * 3);
    for (face, record) in records.iter().enumerate() {
        let list = record
            .get(index_list)
            .and_then(list_indices)
            .ok_or_else(|| anyhow!("Face {face} has no integer '{index_list}' list"))?;
        if list.len() != 3 {
            return Err(GeometryError::NonTriangularFace {
                face,
                arity: list.len(),
            }
            .into());
        }
        for value in list {
            let index = u32::try_from(value)
                .map_err(|_| anyhow!("Invalid vertex index {value} in face {face}"))?;
            indices.push(index);
        }
    }
    Ok(indices)
}

fn scalar_f32(property: &Property) -> Option<f32> {
    Some(match *property {
        Property::Float(v) => v,
        Property::Double(v) => v as f32,
        Property::Int(v) => v as f32,
        Property::UInt(v) => v as f32,
        Property::Short(v) => f32::from(v),
        Property::UShort(v) => f32::from(v),
        Property::Char(v) => f32::from(v),
        Property::UChar(v) => f32::from(v),
        _ => return None,
    })
}

fn list_indices(property: &Property) -> Option<Vec<i64>> {
    Some(match property {
        Property::ListChar(v) => v.iter().map(|&i| i64::from(i)).collect(),
        Property::ListUChar(v) => v.iter().map(|&i| i64::from(i)).collect(),
        Property::ListShort(v) => v.iter().map(|&i| i64::from(i)).collect(),
        Property::ListUShort(v) => v.iter().map(|&i| i64::from(i)).collect(),
        Property::ListInt(v) => v.iter().map(|&i| i64::from(i)).collect(),
        Property::ListUInt(v) => v.iter().map(|&i| i64::from(i)).collect(),
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER_8: &str = "property float x\n\
        property float y\n\
        property float z\n\
        property float nx\n\
        property float ny\n\
        property float nz\n\
        property float s\n\
        property float t\n";

    fn ascii_ply(vertices: &[&str], faces: &[&str]) -> String {
        format!(
            "ply\nformat ascii 1.0\ncomment exported by a test\nelement vertex {}\n{}element face {}\nproperty list uchar int vertex_indices\nend_header\n{}\n{}\n",
            vertices.len(),
            HEADER_8,
            faces.len(),
            vertices.join("\n"),
            faces.join("\n"),
        )
    }

    fn geometry_error(err: &anyhow::Error) -> Option<&GeometryError> {
        err.chain().find_map(|e| e.downcast_ref::<GeometryError>())
    }

    #[test]
    fn parse_ascii_quad() {
        let src = ascii_ply(
            &[
                "0 0 0 0 0 1 0 0",
                "1 0 0 0 0 1 1 0",
                "1 1 0 0 0 1 1 1",
                "0 1 0 0 0 1 0 1",
            ],
            &["3 0 1 2", "3 0 2 3"],
        );
        let mesh = load_ply_from_str(&src).expect("parse quad");
        assert_eq!(mesh.vertices.len(), 4);
        assert_eq!(mesh.indices, vec![0, 1, 2, 0, 2, 3]);
        assert_eq!(mesh.vertices[2].position, [1.0, 1.0, 0.0]);
        assert_eq!(mesh.vertices[2].uv, [1.0, 1.0]);
        assert_eq!(mesh.indices.len() % 3, 0);
        assert!(mesh.indices.iter().all(|&i| (i as usize) < mesh.vertices.len()));
    }

    #[test]
    fn normals_are_discarded() {
        let src = ascii_ply(
            &[
                "0 0 0 0.1 0.2 0.3 0.25 0.75",
                "1 0 0 0.4 0.5 0.6 0.5 0.5",
                "0 1 0 0.7 0.8 0.9 0.75 0.25",
            ],
            &["3 0 1 2"],
        );
        let mesh = load_ply_from_str(&src).expect("parse triangle");
        assert_eq!(mesh.vertices[0].uv, [0.25, 0.75]);
        assert_eq!(mesh.vertices[2].uv, [0.75, 0.25]);
    }

    #[test]
    fn quad_face_fails_fast() {
        let src = ascii_ply(
            &[
                "0 0 0 0 0 1 0 0",
                "1 0 0 0 0 1 1 0",
                "1 1 0 0 0 1 1 1",
                "0 1 0 0 0 1 0 1",
            ],
            &["3 0 1 2", "4 0 1 2 3"],
        );
        let err = load_ply_from_str(&src).unwrap_err();
        assert_eq!(
            geometry_error(&err),
            Some(&GeometryError::NonTriangularFace { face: 1, arity: 4 })
        );
    }

    #[test]
    fn out_of_range_index_is_rejected() {
        let src = ascii_ply(
            &["0 0 0 0 0 1 0 0", "1 0 0 0 0 1 1 0", "0 1 0 0 0 1 0 1"],
            &["3 0 1 7"],
        );
        let err = load_ply_from_str(&src).unwrap_err();
        assert!(matches!(
            geometry_error(&err),
            Some(GeometryError::IndexOutOfRange { index: 7, .. })
        ));
    }

    #[test]
    fn too_few_vertex_properties_is_rejected() {
        let src = "ply\nformat ascii 1.0\nelement vertex 1\nproperty float x\nproperty float y\nproperty float z\nend_header\n0 0 0\n";
        let err = load_ply_from_str(src).unwrap_err();
        assert_eq!(
            geometry_error(&err),
            Some(&GeometryError::MissingVertexAttributes { found: 3, required: 8 })
        );
    }

    #[test]
    fn unknown_elements_are_skipped() {
        let src = format!(
            "ply\nformat ascii 1.0\nelement vertex 3\n{HEADER_8}element face 1\nproperty list uchar uint vertex_index\nelement edge 2\nproperty int vertex1\nproperty int vertex2\nend_header\n\
             0 0 0 0 0 1 0 0\n1 0 0 0 0 1 1 0\n0 1 0 0 0 1 0 1\n3 2 1 0\n0 1\n1 2\n"
        );
        let mesh = load_ply_from_str(&src).expect("parse with edges");
        assert_eq!(mesh.indices, vec![2, 1, 0]);
    }

    #[test]
    fn huge_face_count_is_an_error() {
        let src = format!(
            "ply\nformat ascii 1.0\nelement vertex 3\n{HEADER_8}element face 6148914691236517206\nproperty list uchar int vertex_indices\nend_header\n\
             0 0 0 0 0 1 0 0\n1 0 0 0 0 1 1 0\n0 1 0 0 0 1 0 1\n3 0 1 2\n"
        );
        let err = load_ply_from_str(&src).unwrap_err();
        assert!(matches!(
            geometry_error(&err),
            Some(GeometryError::TooManyRecords { count: 6148914691236517206, .. })
        ));
    }

    #[test]
    fn huge_vertex_count_is_an_error() {
        let src = format!(
            "ply\nformat binary_little_endian 1.0\nelement vertex 18446744073709551615\n{HEADER_8}element face 1\nproperty list uchar int vertex_indices\nend_header\n"
        );
        assert!(load_ply_from_str(&src).is_err());
    }

    #[test]
    fn fields_are_selected_by_position() {
        let src = "ply\nformat ascii 1.0\nelement vertex 3\n\
            property float px\nproperty float py\nproperty float pz\n\
            property uchar red\nproperty uchar green\nproperty uchar blue\n\
            property double u\nproperty double v\n\
            element face 1\nproperty list uchar ushort vertex_indices\nend_header\n\
            0 0 0 255 0 0 0 0\n1 0 0 0 255 0 0.5 0\n0 2 0 0 0 255 0 0.5\n3 0 1 2\n";
        let mesh = load_ply_from_str(src).expect("parse renamed fields");
        assert_eq!(mesh.vertices[2].position, [0.0, 2.0, 0.0]);
        assert_eq!(mesh.vertices[1].uv, [0.5, 0.0]);
    }

    #[test]
    fn missing_face_element_is_rejected() {
        let src = format!(
            "ply\nformat ascii 1.0\nelement vertex 1\n{HEADER_8}end_header\n0 0 0 0 0 1 0 0\n"
        );
        assert!(load_ply_from_str(&src).is_err());
    }

    #[test]
    fn missing_magic_is_rejected() {
        assert!(load_ply_from_str("format ascii 1.0\nend_header\n").is_err());
    }

    fn binary_triangle(big_endian: bool) -> Vec<u8> {
        let format = if big_endian {
            "binary_big_endian"
        } else {
            "binary_little_endian"
        };
        let mut bytes = format!(
            "ply\nformat {format} 1.0\nelement vertex 3\n{HEADER_8}element face 1\nproperty list uchar int vertex_indices\nend_header\n"
        )
        .into_bytes();
        let vertices: [[f32; 8]; 3] = [
            [0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0],
            [2.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 0.0],
            [0.0, 3.0, 0.0, 0.0, 0.0, 1.0, 0.0, 1.0],
        ];
        for value in vertices.iter().flatten() {
            let encoded = if big_endian {
                value.to_be_bytes()
            } else {
                value.to_le_bytes()
            };
            bytes.extend_from_slice(&encoded);
        }
        bytes.push(3);
        for index in [0i32, 1, 2] {
            let encoded = if big_endian {
                index.to_be_bytes()
            } else {
                index.to_le_bytes()
            };
            bytes.extend_from_slice(&encoded);
        }
        bytes
    }

    #[test]
    fn parse_binary_little_endian() {
        let mesh = load_ply_from_reader(io::Cursor::new(binary_triangle(false))).expect("parse");
        assert_eq!(mesh.indices, vec![0, 1, 2]);
        assert_eq!(mesh.vertices[1].position, [2.0, 0.0, 0.0]);
        assert_eq!(mesh.vertices[2].uv, [0.0, 1.0]);
    }

    #[test]
    fn parse_binary_big_endian() {
        let mesh = load_ply_from_reader(io::Cursor::new(binary_triangle(true))).expect("parse");
        assert_eq!(mesh.vertices[2].position, [0.0, 3.0, 0.0]);
        assert_eq!(mesh.vertices[1].uv, [1.0, 0.0]);
    }

    #[test]
    fn truncated_binary_body_is_an_error() {
        let mut bytes = binary_triangle(false);
        bytes.truncate(bytes.len() - 2);
        assert!(load_ply_from_reader(io::Cursor::new(bytes)).is_err());
    }

    #[test]
    fn load_from_path_reports_missing_file() {
        let err = load_ply_from_path("/nonexistent/Walls.ply").unwrap_err();
        assert!(err.to_string().contains("Walls.ply"));
    }
}
