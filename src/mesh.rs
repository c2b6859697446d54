//! Triangle mesh input of the tree builder.
//!
//! The builder only sees meshes through [`TriangleMesh`]. Positions must already be
//! normalized into the unit cube, [`MeshData::normalize`] does that for owned meshes
//! and returns the [`LocalFrame`] needed to map queries and results between the two spaces.

use std::{fs, path::Path};

use indexmap::IndexMap;
use thiserror::Error;

use crate::geometry::{FloatType, LocalBox, LocalPoint, Triangle, WorldBox, WorldPoint};

/// Indexed triangle mesh as seen by the builder.
pub trait TriangleMesh {
    fn triangle_count(&self) -> usize;
    fn position_count(&self) -> usize;

    /// Vertex indices of a triangle, `index < triangle_count()`.
    fn triangle(&self, index: usize) -> Triangle<u32>;

    /// Position of a vertex, `index < position_count()`.
    fn position(&self, index: u32) -> LocalPoint;
}

#[derive(Debug, Error)]
pub enum MeshError {
    #[error("Failed to read file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse file: {0}")]
    ParseError(#[from] wavefront_obj::ParseError),

    #[error("Index buffer length {0} is not a multiple of 3")]
    InvalidIndexCount(usize),

    #[error("Position stride {0} is smaller than 3")]
    InvalidStride(usize),
}

/// Borrowed mesh over an index buffer and a strided position buffer.
#[derive(Copy, Clone, Debug)]
pub struct StridedMesh<'a> {
    indices: &'a [u32],
    positions: &'a [FloatType],
    stride: usize,
}

impl<'a> StridedMesh<'a> {
    /// `stride` is the distance between consecutive positions, in floats.
    /// The last position doesn't need to be padded to the full stride.
    pub fn new(
        indices: &'a [u32],
        positions: &'a [FloatType],
        stride: usize,
    ) -> Result<Self, MeshError> {
        if indices.len() % 3 != 0 {
            return Err(MeshError::InvalidIndexCount(indices.len()));
        }
        if stride < 3 {
            return Err(MeshError::InvalidStride(stride));
        }
        Ok(StridedMesh {
            indices,
            positions,
            stride,
        })
    }
}

impl TriangleMesh for StridedMesh<'_> {
    fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    fn position_count(&self) -> usize {
        if self.positions.len() < 3 {
            0
        } else {
            (self.positions.len() - 3) / self.stride + 1
        }
    }

    fn triangle(&self, index: usize) -> Triangle<u32> {
        let i = &self.indices[3 * index..3 * index + 3];
        Triangle::new(i[0], i[1], i[2])
    }

    fn position(&self, index: u32) -> LocalPoint {
        let start = index as usize * self.stride;
        LocalPoint::from_slice(&self.positions[start..start + 3])
    }
}

/// Owned indexed triangle mesh.
#[derive(Clone, Debug, Default)]
pub struct MeshData {
    pub positions: Vec<LocalPoint>,
    pub triangles: Vec<Triangle<u32>>,
}

impl MeshData {
    pub fn from_obj(p: impl AsRef<Path>) -> Result<MeshData, MeshError> {
        let content = fs::read_to_string(p)?;
        let parsed = wavefront_obj::obj::parse(content)?;

        Ok(Self::load_obj(parsed))
    }

    fn load_obj(obj: wavefront_obj::obj::ObjSet) -> MeshData {
        let mut triangles = Vec::new();
        // Keyed by (object, vertex) so that only the used positions are kept
        let mut positions = IndexMap::new();
        let mut skipped = 0usize;

        for (object_index, o) in obj.objects.into_iter().enumerate() {
            for geometry in o.geometry {
                for shape in geometry.shapes {
                    let wavefront_obj::obj::Primitive::Triangle(a, b, c) = shape.primitive else {
                        skipped += 1;
                        continue;
                    };

                    let mut handle_vertex = |vtindex: (usize, Option<usize>, Option<usize>)| {
                        let entry = positions.entry((object_index, vtindex.0));
                        let index = entry.index() as u32;
                        entry.or_insert_with(|| {
                            let vertex = &o.vertices[vtindex.0];
                            LocalPoint::new(vertex.x as f32, vertex.y as f32, vertex.z as f32)
                        });
                        index
                    };

                    let a = handle_vertex(a);
                    let b = handle_vertex(b);
                    let c = handle_vertex(c);

                    triangles.push(Triangle::new(a, b, c));
                }
            }
        }

        if skipped > 0 {
            log::warn!("Skipped {skipped} non-triangle primitives");
        }

        MeshData {
            positions: positions.into_values().collect(),
            triangles,
        }
    }

    pub fn bounding_box(&self) -> Option<LocalBox> {
        LocalBox::from_points(&self.positions)
    }

    /// Uniformly scales and translates the positions into the unit cube.
    /// The longest side of the bounding box ends up with length 1, the other sides keep proportions.
    pub fn normalize(&mut self) -> LocalFrame {
        let Some(bounds) = self.bounding_box() else {
            return LocalFrame::identity();
        };
        let extent = bounds.size().max();
        let frame = LocalFrame {
            origin: bounds.min,
            scale: if extent > 0.0 { extent } else { 1.0 },
        };

        for p in self.positions.iter_mut() {
            // Clamping only removes rounding errors of the division
            *p = frame.to_local(p).map(|x| x.clamp(0.0, 1.0));
        }

        frame
    }
}

impl TriangleMesh for MeshData {
    fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    fn position_count(&self) -> usize {
        self.positions.len()
    }

    fn triangle(&self, index: usize) -> Triangle<u32> {
        self.triangles[index]
    }

    fn position(&self, index: u32) -> LocalPoint {
        self.positions[index as usize]
    }
}

/// Uniform scale and translation between the caller's world space and the tree's local space.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct LocalFrame {
    /// World position of the local origin
    pub origin: WorldPoint,
    /// Length of the local unit in world units
    pub scale: FloatType,
}

impl LocalFrame {
    pub fn identity() -> Self {
        LocalFrame {
            origin: WorldPoint::origin(),
            scale: 1.0,
        }
    }

    pub fn to_local(&self, p: &WorldPoint) -> LocalPoint {
        LocalPoint::from((p - self.origin) / self.scale)
    }

    pub fn to_world(&self, p: &LocalPoint) -> WorldPoint {
        self.origin + p.coords * self.scale
    }

    pub fn box_to_local(&self, b: &WorldBox) -> LocalBox {
        b.map(|p| self.to_local(p))
    }

    /// Converts a point delivered to query visitors (local space multiplied by `scale`) to world space.
    pub fn scaled_to_world(&self, p: &WorldPoint) -> WorldPoint {
        self.origin + p.coords
    }
}
