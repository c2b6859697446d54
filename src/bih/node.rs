use std::ops::Range;

use bytemuck::{Pod, Zeroable};

use super::{NodeIdx, TriangleIdx};
use crate::geometry::Axis;

/// Tree node as stored in memory and in serialized blobs.
///
/// The tag holds the split axis + 1 in its low two bits (zero for leaves)
/// and the right child index in the remaining 30 bits. The left child of an
/// internal node is always the next node, so its index is not stored.
///
/// Payload of internal nodes: `split_left_max | split_right_min << 16`, 0.
/// Payload of leaves: first triangle, `count | material << 16`.
#[repr(C)]
#[derive(Copy, Clone, PartialEq, Eq, Pod, Zeroable)]
pub struct CompressedNode {
    tag: u32,
    payload: [u32; 2],
}

/// Decoded form of [`CompressedNode`]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Node {
    Internal {
        axis: Axis,
        /// Maximum of the left child along the axis
        split_left_max: u16,
        /// Minimum of the right child along the axis
        split_right_min: u16,
        /// None only while the tree is being built
        right_child: Option<NodeIdx>,
    },
    Leaf {
        first_triangle: TriangleIdx,
        count: u16,
        material: u16,
    },
}

impl CompressedNode {
    const AXIS_BITS: u32 = 2;
    const AXIS_MASK: u32 = (1 << Self::AXIS_BITS) - 1;
    const HALF_BITS: u32 = 16;
    const HALF_MASK: u32 = (1 << Self::HALF_BITS) - 1;

    /// Right child index 0 can never occur (right child of node i is > i + 1),
    /// so it marks a right child that wasn't assigned yet.
    const UNSET_RIGHT_CHILD: u32 = 0;

    pub const MAX_INDEX: u32 = u32::MAX >> Self::AXIS_BITS;

    /// Internal node without the right child index set.
    pub fn new_internal(axis: Axis, split_left_max: u16, split_right_min: u16) -> Self {
        CompressedNode {
            tag: Self::UNSET_RIGHT_CHILD << Self::AXIS_BITS | (axis as u32 + 1),
            payload: [
                u32::from(split_left_max) | u32::from(split_right_min) << Self::HALF_BITS,
                0,
            ],
        }
    }

    /// Panics if count is zero
    pub fn new_leaf(first_triangle: TriangleIdx, count: u16, material: u16) -> Self {
        assert!(count > 0, "Leaf must contain at least one triangle");
        CompressedNode {
            tag: 0,
            payload: [
                first_triangle.raw(),
                u32::from(count) | u32::from(material) << Self::HALF_BITS,
            ],
        }
    }

    pub fn is_internal(&self) -> bool {
        self.tag & Self::AXIS_MASK != 0
    }

    pub fn is_leaf(&self) -> bool {
        !self.is_internal()
    }

    /// Split axis of an internal node, None for leaves.
    pub fn split_axis(&self) -> Option<Axis> {
        match self.tag & Self::AXIS_MASK {
            0 => None,
            encoded => Axis::from_index(encoded as usize - 1),
        }
    }

    /// Right child of an internal node, None for leaves or if not set yet.
    pub fn right_child_index(&self) -> Option<NodeIdx> {
        if self.is_leaf() {
            return None;
        }
        match self.tag >> Self::AXIS_BITS {
            Self::UNSET_RIGHT_CHILD => None,
            index => Some(NodeIdx::from_raw(index)),
        }
    }

    /// Panics if called on a leaf or if the index doesn't fit
    pub fn set_right_child_index(&mut self, index: NodeIdx) {
        assert!(self.is_internal(), "Only internal nodes have children");
        assert!(index.raw() <= Self::MAX_INDEX);
        assert!(index.raw() != Self::UNSET_RIGHT_CHILD);
        self.tag = index.raw() << Self::AXIS_BITS | (self.tag & Self::AXIS_MASK);
    }

    /// Triangle range of a leaf, None for internal nodes.
    pub fn leaf_range(&self) -> Option<Range<TriangleIdx>> {
        if self.is_internal() {
            return None;
        }
        let first = self.payload[0] as usize;
        let count = (self.payload[1] & Self::HALF_MASK) as usize;
        Some(TriangleIdx::from_usize(first)..TriangleIdx::from_usize(first + count))
    }

    /// Material of a leaf, None for internal nodes.
    pub fn material(&self) -> Option<u16> {
        self.is_leaf().then(|| (self.payload[1] >> Self::HALF_BITS) as u16)
    }

    pub fn decode(&self) -> Node {
        match self.split_axis() {
            Some(axis) => Node::Internal {
                axis,
                split_left_max: (self.payload[0] & Self::HALF_MASK) as u16,
                split_right_min: (self.payload[0] >> Self::HALF_BITS) as u16,
                right_child: self.right_child_index(),
            },
            None => Node::Leaf {
                first_triangle: TriangleIdx::from_raw(self.payload[0]),
                count: (self.payload[1] & Self::HALF_MASK) as u16,
                material: (self.payload[1] >> Self::HALF_BITS) as u16,
            },
        }
    }
}

impl Node {
    pub fn encode(&self) -> CompressedNode {
        match *self {
            Node::Internal {
                axis,
                split_left_max,
                split_right_min,
                right_child,
            } => {
                let mut node = CompressedNode::new_internal(axis, split_left_max, split_right_min);
                if let Some(right_child) = right_child {
                    node.set_right_child_index(right_child);
                }
                node
            }
            Node::Leaf {
                first_triangle,
                count,
                material,
            } => CompressedNode::new_leaf(first_triangle, count, material),
        }
    }
}

impl std::fmt::Debug for CompressedNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompressedNode")
            .field("tag", &self.tag)
            .field("payload", &self.payload)
            .field("<decoded>", &self.decode())
            .finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use assert2::{assert, let_assert};
    use test_strategy::proptest;

    #[test]
    fn size_is_twelve_bytes() {
        assert!(std::mem::size_of::<CompressedNode>() == 12);
    }

    #[proptest]
    fn internal_construction(
        #[strategy(0usize..3)] axis_index: usize,
        split_left_max: u16,
        split_right_min: u16,
        #[strategy(1u32..=CompressedNode::MAX_INDEX)] right_child: u32,
    ) {
        let axis = Axis::from_index(axis_index).unwrap();
        let mut node = CompressedNode::new_internal(axis, split_left_max, split_right_min);
        assert!(node.is_internal());
        assert!(node.right_child_index() == None);

        node.set_right_child_index(NodeIdx::from_raw(right_child));
        assert!(node.split_axis() == Some(axis));
        assert!(node.leaf_range() == None);
        let_assert!(
            Node::Internal {
                axis: decoded_axis,
                split_left_max: decoded_left,
                split_right_min: decoded_right,
                right_child: Some(decoded_child),
            } = node.decode()
        );
        assert!(decoded_axis == axis);
        assert!(decoded_left == split_left_max);
        assert!(decoded_right == split_right_min);
        assert!(decoded_child.raw() == right_child);
        assert!(node.decode().encode() == node);
    }

    #[proptest]
    fn leaf_construction(
        #[strategy(0u32..=u32::MAX - u32::from(u16::MAX))] first_triangle: u32,
        #[strategy(1u16..)] count: u16,
        material: u16,
    ) {
        let node = CompressedNode::new_leaf(TriangleIdx::from_raw(first_triangle), count, material);
        assert!(node.is_leaf());
        assert!(node.split_axis() == None);
        assert!(node.right_child_index() == None);

        let_assert!(Some(range) = node.leaf_range());
        assert!(range.start.raw() == first_triangle);
        assert!(range.end.index() - range.start.index() == count as usize);
        assert!(node.material() == Some(material));
        assert!(
            node.decode()
                == Node::Leaf {
                    first_triangle: TriangleIdx::from_raw(first_triangle),
                    count,
                    material
                }
        );
        assert!(node.decode().encode() == node);
    }

    #[test]
    fn zeroed_node_is_leaf() {
        assert!(CompressedNode::zeroed().is_leaf());
    }

    #[test]
    #[should_panic]
    fn leaf_with_zero_count() {
        CompressedNode::new_leaf(TriangleIdx::from_raw(0), 0, 0);
    }

    #[test]
    #[should_panic]
    fn right_child_on_leaf() {
        CompressedNode::new_leaf(TriangleIdx::from_raw(0), 1, 0)
            .set_right_child_index(NodeIdx::from_raw(5));
    }

    #[test]
    #[should_panic]
    fn right_child_index_out_of_range() {
        CompressedNode::new_internal(Axis::X, 0, 0)
            .set_right_child_index(NodeIdx::from_raw(CompressedNode::MAX_INDEX + 1));
    }
}
