use std::ops::Range;

use arrayvec::ArrayVec;

use super::{BihView, MAX_TREE_DEPTH, Node, NodeIdx, QuantizedBox, TriangleIdx};
use crate::geometry::Axis;

/// Depth first walks push both children and pop one, so the stack never holds
/// more than depth + 1 items.
const STACK_CAPACITY: usize = MAX_TREE_DEPTH + 2;

/// Fixed capacity stack used by the builder and by all traversals.
pub(crate) struct BoundedStack<T> {
    items: ArrayVec<T, STACK_CAPACITY>,
}

impl<T> BoundedStack<T> {
    pub fn new() -> Self {
        BoundedStack {
            items: ArrayVec::new(),
        }
    }

    /// Panics if the stack is full, which only happens for trees deeper than `MAX_TREE_DEPTH`.
    pub fn push(&mut self, item: T) {
        if self.items.try_push(item).is_err() {
            panic!("Tree traversal stack overflow (capacity {STACK_CAPACITY})");
        }
    }

    pub fn pop(&mut self) -> Option<T> {
        self.items.pop()
    }
}

/// Boxes of the left and right child, derived from the parent box and the split planes.
pub(crate) fn child_boxes(
    node_box: &QuantizedBox,
    axis: Axis,
    split_left_max: u16,
    split_right_min: u16,
) -> [QuantizedBox; 2] {
    let mut left = *node_box;
    left.max = left.max.with(axis, split_left_max.min(node_box.max[axis]));

    let mut right = *node_box;
    right.min = right.min.with(axis, split_right_min.max(node_box.min[axis]));

    [left, right]
}

pub(crate) fn triangle_range(range: Range<TriangleIdx>) -> impl Iterator<Item = TriangleIdx> {
    (range.start.index()..range.end.index()).map(TriangleIdx::from_usize)
}

impl BihView<'_> {
    /// Quantized box of the root, containing all stored geometry.
    pub fn root_box(&self) -> QuantizedBox {
        QuantizedBox::round_out(&self.bounds)
    }

    /// Depth first walk over the nodes whose boxes pass `enter`.
    /// `leaf` gets the triangle range and material of every leaf reached.
    pub(crate) fn traverse(
        &self,
        mut enter: impl FnMut(&QuantizedBox) -> bool,
        mut leaf: impl FnMut(Range<TriangleIdx>, u16),
    ) {
        let root_box = self.root_box();
        if !enter(&root_box) {
            return;
        }

        let mut stack = BoundedStack::new();
        stack.push((self.root(), root_box));

        while let Some((index, node_box)) = stack.pop() {
            match self.nodes[index].decode() {
                Node::Internal {
                    axis,
                    split_left_max,
                    split_right_min,
                    right_child,
                } => {
                    let [left_box, right_box] =
                        child_boxes(&node_box, axis, split_left_max, split_right_min);

                    if let Some(right_child) = right_child {
                        if enter(&right_box) {
                            stack.push((right_child, right_box));
                        }
                    }
                    if enter(&left_box) {
                        stack.push((index + 1, left_box));
                    }
                }
                Node::Leaf {
                    first_triangle,
                    count,
                    material,
                } => leaf(first_triangle..first_triangle + count as usize, material),
            }
        }
    }
}

/// Walks every node depth first, without any culling.
/// Calls `f` with the node index, its depth and its box.
pub(crate) fn for_each_node(view: &BihView, mut f: impl FnMut(NodeIdx, usize, &QuantizedBox)) {
    let mut stack = BoundedStack::new();
    stack.push((view.root(), 0usize, view.root_box()));

    while let Some((index, depth, node_box)) = stack.pop() {
        f(index, depth, &node_box);
        if let Node::Internal {
            axis,
            split_left_max,
            split_right_min,
            right_child: Some(right_child),
        } = view.node(index).decode()
        {
            let [left_box, right_box] =
                child_boxes(&node_box, axis, split_left_max, split_right_min);
            stack.push((right_child, depth + 1, right_box));
            stack.push((index + 1, depth + 1, left_box));
        }
    }
}
