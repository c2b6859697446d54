//! Quantized bounding interval hierarchy over a static triangle mesh.
//!
//! The tree lives in the unit cube. Node bounds, split planes and vertices are
//! stored as 16 bit fixed point, rounded so that the stored bounds never shrink.
//! Left children are stored right after their parent, only the right child
//! index is kept in the node.

mod box_query;
mod building;
mod node;
mod packed_triangle;
mod quantization;
mod ray_query;
mod serialization;
mod statistics;
mod traversal;

pub use building::{BuildError, Options};
pub use node::{CompressedNode, Node};
pub use packed_triangle::PackedTriangle;
pub use quantization::{
    QUANTIZED_MAX, QuantizedBox, QuantizedPoint, dequantize, quantize_max, quantize_min,
    quantize_nearest,
};
pub use ray_query::{ClosestHit, RayHit};
pub use serialization::{Blob, LoadError, SaveError};
pub use statistics::TreeStatistics;

use index_vec::{IndexSlice, IndexVec};

use crate::geometry::{LocalBox, LocalPoint, Triangle};

/// Deepest tree that the builder produces and the loader accepts.
/// Traversal stacks have a fixed capacity derived from it.
pub const MAX_TREE_DEPTH: usize = 64;

index_vec::define_index_type! {
    pub struct NodeIdx = u32;
    MAX_INDEX = CompressedNode::MAX_INDEX as usize;
    IMPL_RAW_CONVERSIONS = true;
}

index_vec::define_index_type! {
    pub struct TriangleIdx = u32;
    IMPL_RAW_CONVERSIONS = true;
}

index_vec::define_index_type! {
    pub struct VertexIdx = u32;
    IMPL_RAW_CONVERSIONS = true;
}

/// Owned tree, immutable after construction.
#[derive(Clone, Debug)]
pub struct Bih {
    bounds: LocalBox,
    depth: u32,

    nodes: IndexVec<NodeIdx, CompressedNode>,
    triangles: IndexVec<TriangleIdx, PackedTriangle>,
    vertices: IndexVec<VertexIdx, QuantizedPoint>,
}

/// Borrowed tree, either from [`Bih`] or from a serialized blob.
/// All queries run on views.
#[derive(Copy, Clone, Debug)]
pub struct BihView<'a> {
    bounds: LocalBox,
    depth: u32,

    nodes: &'a IndexSlice<NodeIdx, [CompressedNode]>,
    triangles: &'a IndexSlice<TriangleIdx, [PackedTriangle]>,
    vertices: &'a IndexSlice<VertexIdx, [QuantizedPoint]>,
}

impl Bih {
    pub fn view(&self) -> BihView<'_> {
        BihView {
            bounds: self.bounds,
            depth: self.depth,
            nodes: &self.nodes,
            triangles: &self.triangles,
            vertices: &self.vertices,
        }
    }
}

impl<'a> BihView<'a> {
    /// Bounding box of the input geometry, before quantization.
    pub fn bounds(&self) -> &LocalBox {
        &self.bounds
    }

    /// Number of edges on the longest path from the root to a leaf.
    pub fn depth(&self) -> usize {
        self.depth as usize
    }

    pub fn root(&self) -> NodeIdx {
        NodeIdx::from_raw(0)
    }

    pub fn nodes(&self) -> &'a IndexSlice<NodeIdx, [CompressedNode]> {
        self.nodes
    }

    pub fn node(&self, index: NodeIdx) -> &'a CompressedNode {
        &self.nodes[index]
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Vertex indices of a triangle in the tree's triangle order.
    pub fn triangle_indices(&self, index: TriangleIdx) -> Triangle<VertexIdx> {
        self.triangles[index].unpack()
    }

    pub fn vertex(&self, index: VertexIdx) -> LocalPoint {
        self.vertices[index].dequantize()
    }

    /// Stored (dequantized) geometry of a triangle, exactly what queries test against.
    pub fn triangle(&self, index: TriangleIdx) -> Triangle<LocalPoint> {
        self.triangle_indices(index).map(|i| self.vertex(*i))
    }

    /// Copies the view into an owned tree.
    pub fn to_bih(&self) -> Bih {
        Bih {
            bounds: self.bounds,
            depth: self.depth,
            nodes: self.nodes.to_owned(),
            triangles: self.triangles.to_owned(),
            vertices: self.vertices.to_owned(),
        }
    }
}
