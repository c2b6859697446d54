use std::{collections::TryReserveError, ops::Range};

use index_vec::IndexVec;
use thiserror::Error;

use super::{
    Bih, CompressedNode, MAX_TREE_DEPTH, NodeIdx, PackedTriangle, QuantizedPoint, TriangleIdx,
    VertexIdx, quantize_max, quantize_min, traversal::BoundedStack,
};
use crate::{
    geometry::{EPSILON, LocalBox, LocalPoint, Triangle},
    mesh::TriangleMesh,
};

#[derive(Clone, Debug, PartialEq, Eq, bon::Builder)]
pub struct Options {
    /// Ranges with at most this many triangles become leaves
    #[builder(default = 4)]
    pub max_triangles_per_leaf: usize,

    /// Ranges at this depth become leaves regardless of their size.
    /// Must not exceed [`MAX_TREE_DEPTH`].
    #[builder(default = 32)]
    pub max_tree_depth: usize,

    /// Material (part id) stored in every leaf
    #[builder(default)]
    pub material: u16,
}

impl Default for Options {
    fn default() -> Self {
        Options::builder().build()
    }
}

impl Options {
    fn validate(&self) -> Result<(), BuildError> {
        if self.max_triangles_per_leaf == 0 {
            return Err(BuildError::InvalidOptions("max_triangles_per_leaf must be positive"));
        }
        if self.max_triangles_per_leaf > usize::from(u16::MAX) {
            return Err(BuildError::InvalidOptions(
                "max_triangles_per_leaf must fit into 16 bits",
            ));
        }
        if self.max_tree_depth > MAX_TREE_DEPTH {
            return Err(BuildError::InvalidOptions("max_tree_depth is too large"));
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Mesh contains no triangles")]
    EmptyMesh,

    #[error("Invalid build options: {0}")]
    InvalidOptions(&'static str),

    #[error("Mesh has {0} triangles, at most {max} are supported", max = u32::MAX)]
    TooManyTriangles(usize),

    #[error("Triangle {triangle} references vertex {vertex}, but the mesh has {count} vertices")]
    VertexIndexOutOfRange {
        triangle: usize,
        vertex: u32,
        count: usize,
    },

    #[error(
        "Mesh has {0} vertices, at most {max} are supported",
        max = PackedTriangle::MAX_VERTEX_COUNT
    )]
    TooManyVertices(usize),

    #[error("Vertex {index} at {position:?} is outside of the unit cube")]
    VertexOutOfUnitCube { index: u32, position: LocalPoint },

    #[error("Leaf with {0} triangles doesn't fit into a node, increase max_tree_depth")]
    LeafTooLarge(usize),

    #[error("Tree needs more than {max} nodes", max = CompressedNode::MAX_INDEX)]
    TooManyNodes,

    #[error("Out of memory: {0}")]
    OutOfMemory(#[from] TryReserveError),
}

/// Bounds and centroid of a single input triangle.
#[derive(Copy, Clone, Debug)]
struct Primitive {
    bounds: LocalBox,
    centroid: LocalPoint,
    indices: Triangle<u32>,
}

/// Triangle range waiting to be turned into a node.
#[derive(Clone, Debug)]
struct WorkItem {
    bounds: LocalBox,
    range: Range<usize>,
    parent: Option<NodeIdx>,
    depth: usize,
}

struct Builder<'a> {
    options: &'a Options,

    primitives: Vec<Primitive>,
    /// Permutation of `primitives`, partitioned in place
    order: Vec<u32>,

    nodes: IndexVec<NodeIdx, CompressedNode>,
    /// Number of children emitted so far, the second one is the right child
    pending_children: IndexVec<NodeIdx, u8>,

    depth: usize,
    leaf_count: usize,
}

impl Bih {
    /// Builds the tree over a mesh whose positions lie in the unit cube.
    pub fn build(mesh: &impl TriangleMesh, options: &Options) -> Result<Bih, BuildError> {
        options.validate()?;

        let triangle_count = mesh.triangle_count();
        if triangle_count == 0 {
            return Err(BuildError::EmptyMesh);
        }
        if u32::try_from(triangle_count).is_err() {
            return Err(BuildError::TooManyTriangles(triangle_count));
        }
        let position_count = mesh.position_count();
        if position_count > PackedTriangle::MAX_VERTEX_COUNT {
            return Err(BuildError::TooManyVertices(position_count));
        }

        let (primitives, bounds) = collect_primitives(mesh)?;

        let mut builder = Builder {
            options,
            order: Vec::new(),
            primitives,
            nodes: IndexVec::new(),
            pending_children: IndexVec::new(),
            depth: 0,
            leaf_count: 0,
        };
        builder.order.try_reserve_exact(triangle_count)?;
        builder.order.extend(0..triangle_count as u32);
        builder.build_nodes(bounds)?;

        let mut triangles = IndexVec::<TriangleIdx, _>::new();
        triangles.raw.try_reserve_exact(triangle_count)?;
        triangles.extend(builder.order.iter().map(|&i| {
            let indices = builder.primitives[i as usize].indices;
            PackedTriangle::new(indices.map(|v| VertexIdx::from_raw(*v)))
        }));

        let mut vertices = IndexVec::<VertexIdx, _>::new();
        vertices.raw.try_reserve_exact(position_count)?;
        vertices.extend(
            (0..position_count as u32).map(|i| QuantizedPoint::round_nearest(&mesh.position(i))),
        );

        log::debug!(
            "Built tree over {} triangles: {} nodes ({} leaves), depth {}",
            triangle_count,
            builder.nodes.len(),
            builder.leaf_count,
            builder.depth
        );

        Ok(Bih {
            bounds,
            depth: builder.depth as u32,
            nodes: builder.nodes,
            triangles,
            vertices,
        })
    }
}

/// Validates the input triangles and computes their bounds and centroids,
/// together with the bounding box of the whole mesh.
fn collect_primitives(mesh: &impl TriangleMesh) -> Result<(Vec<Primitive>, LocalBox), BuildError> {
    let triangle_count = mesh.triangle_count();
    let position_count = mesh.position_count();

    let mut primitives = Vec::new();
    primitives.try_reserve_exact(triangle_count)?;
    let mut scene_bounds = LocalBox::empty();

    for triangle in 0..triangle_count {
        let indices = mesh.triangle(triangle);
        for &vertex in indices.iter() {
            if vertex as usize >= position_count {
                return Err(BuildError::VertexIndexOutOfRange {
                    triangle,
                    vertex,
                    count: position_count,
                });
            }
        }

        let points = indices.map(|i| mesh.position(*i));
        for (&index, position) in indices.iter().zip(points.iter()) {
            if !is_in_unit_cube(position) {
                return Err(BuildError::VertexOutOfUnitCube {
                    index,
                    position: *position,
                });
            }
        }

        let bounds = points.bounding_box();
        scene_bounds = scene_bounds.union(&bounds);
        primitives.push(Primitive {
            bounds,
            centroid: points.centroid(),
            indices,
        });
    }

    Ok((primitives, scene_bounds))
}

fn is_in_unit_cube(p: &LocalPoint) -> bool {
    p.iter().all(|x| (-EPSILON..=1.0 + EPSILON).contains(x))
}

impl Builder<'_> {
    fn build_nodes(&mut self, bounds: LocalBox) -> Result<(), BuildError> {
        let mut stack = BoundedStack::new();
        stack.push(WorkItem {
            bounds,
            range: 0..self.order.len(),
            parent: None,
            depth: 0,
        });

        while let Some(item) = stack.pop() {
            let count = item.range.len();
            self.depth = self.depth.max(item.depth);

            if count <= self.options.max_triangles_per_leaf
                || item.depth >= self.options.max_tree_depth
            {
                let count = u16::try_from(count).map_err(|_| BuildError::LeafTooLarge(count))?;
                self.push_node(
                    CompressedNode::new_leaf(
                        TriangleIdx::from_usize(item.range.start),
                        count,
                        self.options.material,
                    ),
                    item.parent,
                )?;
                self.leaf_count += 1;
                continue;
            }

            let axis = item.bounds.longest_axis();
            let split = item.bounds.center()[axis.index()];

            let mut middle = self.partition(&item.range, axis.index(), split);
            if middle == item.range.start || middle == item.range.end {
                // All centroids on one side, split the range in half instead
                middle = item.range.start + count / 2;
            }

            let left_range = item.range.start..middle;
            let right_range = middle..item.range.end;
            let left_bounds = self.range_bounds(&left_range);
            let right_bounds = self.range_bounds(&right_range);

            let index = self.push_node(
                CompressedNode::new_internal(
                    axis,
                    quantize_max(left_bounds.max[axis.index()]),
                    quantize_min(right_bounds.min[axis.index()]),
                ),
                item.parent,
            )?;

            // Left is pushed last to become the next node
            stack.push(WorkItem {
                bounds: right_bounds,
                range: right_range,
                parent: Some(index),
                depth: item.depth + 1,
            });
            stack.push(WorkItem {
                bounds: left_bounds,
                range: left_range,
                parent: Some(index),
                depth: item.depth + 1,
            });
        }

        Ok(())
    }

    /// Appends a node and links it to its parent.
    fn push_node(
        &mut self,
        node: CompressedNode,
        parent: Option<NodeIdx>,
    ) -> Result<NodeIdx, BuildError> {
        if self.nodes.len() > CompressedNode::MAX_INDEX as usize {
            return Err(BuildError::TooManyNodes);
        }
        self.nodes.raw.try_reserve(1)?;
        self.pending_children.raw.try_reserve(1)?;

        let index = self.nodes.push(node);
        self.pending_children.push(0);

        if let Some(parent) = parent {
            let emitted = &mut self.pending_children[parent];
            *emitted += 1;
            if *emitted == 2 {
                self.nodes[parent].set_right_child_index(index);
            }
        }

        Ok(index)
    }

    /// Reorders the range so that primitives with centroid below `split` come first.
    /// Returns the index of the first primitive of the second part.
    fn partition(&mut self, range: &Range<usize>, axis: usize, split: f32) -> usize {
        let order = &mut self.order[range.clone()];
        let mut middle = 0;
        for i in 0..order.len() {
            if self.primitives[order[i] as usize].centroid[axis] < split {
                order.swap(i, middle);
                middle += 1;
            }
        }
        range.start + middle
    }

    fn range_bounds(&self, range: &Range<usize>) -> LocalBox {
        self.order[range.clone()]
            .iter()
            .fold(LocalBox::empty(), |acc, &i| acc.union(&self.primitives[i as usize].bounds))
    }
}
