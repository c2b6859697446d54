use std::{fmt, io};

use super::{
    BihView, Node, NodeIdx, QuantizedBox,
    traversal::{for_each_node, triangle_range},
};
use crate::util::Stats;

/// Shape summary of a tree.
#[derive(Clone, Debug, PartialEq)]
pub struct TreeStatistics {
    pub node_count: usize,
    pub leaf_count: usize,
    pub triangle_count: usize,
    pub vertex_count: usize,
    /// Depth of the leaves
    pub leaf_depth: Stats,
    /// Triangle count of the leaves
    pub leaf_fill: Stats,
}

impl BihView<'_> {
    pub fn statistics(&self) -> TreeStatistics {
        let mut leaf_depth = Stats::default();
        let mut leaf_fill = Stats::default();

        for_each_node(self, |index, depth, _| {
            if let Some(range) = self.node(index).leaf_range() {
                leaf_depth.add_sample(depth);
                leaf_fill.add_sample(range.end.index() - range.start.index());
            }
        });

        TreeStatistics {
            node_count: self.node_count(),
            leaf_count: leaf_fill.count,
            triangle_count: self.triangle_count(),
            vertex_count: self.vertex_count(),
            leaf_depth,
            leaf_fill,
        }
    }

    /// Writes the tree structure with node boxes and leaf triangles, one line per item.
    pub fn print_tree(&self, out: &mut impl io::Write) -> io::Result<()> {
        let mut result = Ok(());
        for_each_node(self, |index, depth, node_box| {
            if result.is_ok() {
                result = self.print_node(out, index, depth, node_box);
            }
        });
        result
    }

    fn print_node(
        &self,
        out: &mut impl io::Write,
        index: NodeIdx,
        depth: usize,
        node_box: &QuantizedBox,
    ) -> io::Result<()> {
        let indent = "  ".repeat(depth);
        let node_box = node_box.dequantize();

        match self.node(index).decode() {
            Node::Internal {
                axis,
                split_left_max,
                split_right_min,
                ..
            } => writeln!(
                out,
                "{indent}- I{}: {:?}-{:?}, split {:?} {}/{}",
                index.index(),
                node_box.min,
                node_box.max,
                axis,
                split_left_max,
                split_right_min
            ),
            Node::Leaf {
                first_triangle,
                count,
                material,
            } => {
                writeln!(
                    out,
                    "{indent}- L{}: {:?}-{:?}, material {}",
                    index.index(),
                    node_box.min,
                    node_box.max,
                    material
                )?;
                for triangle in triangle_range(first_triangle..first_triangle + count as usize) {
                    let t = self.triangle(triangle);
                    writeln!(out, "{indent}  {:?}, {:?}, {:?}", t[0], t[1], t[2])?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for TreeStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Nodes: {} ({} leaves)", self.node_count, self.leaf_count)?;
        writeln!(f, "Triangles: {}, vertices: {}", self.triangle_count, self.vertex_count)?;
        writeln!(f, "Leaf depth: {}", self.leaf_depth)?;
        write!(f, "Leaf fill: {}", self.leaf_fill)
    }
}

#[cfg(test)]
mod test {
    use crate::{
        bih::{Bih, Options},
        mesh::StridedMesh,
    };

    use assert2::assert;

    fn example() -> Bih {
        let indices = (0..16u32).flat_map(|i| [3 * i, 3 * i + 1, 3 * i + 2]).collect::<Vec<_>>();
        let positions = (0..16)
            .flat_map(|i| {
                let x = i as f32 / 16.0;
                [x, 0.0, 0.0, x + 0.01, 0.0, 0.0, x, 0.01, 0.0]
            })
            .collect::<Vec<_>>();
        let mesh = StridedMesh::new(&indices, &positions, 3).unwrap();
        Bih::build(&mesh, &Options::builder().max_triangles_per_leaf(2).build()).unwrap()
    }

    #[test]
    fn statistics_of_balanced_tree() {
        let bih = example();
        let stats = bih.view().statistics();

        assert!(stats.triangle_count == 16);
        assert!(stats.vertex_count == 48);
        assert!(stats.leaf_count == 8);
        assert!(stats.node_count == 15);
        assert!(stats.leaf_fill.min == 2 && stats.leaf_fill.max == 2);
        assert!(stats.leaf_depth.min == 3 && stats.leaf_depth.max == 3);
        assert!(bih.view().depth() == 3);

        let text = stats.to_string();
        assert!(text.contains("Nodes: 15 (8 leaves)"));
    }

    #[test]
    fn print_lists_every_node_and_triangle() {
        let bih = example();
        let mut out = Vec::new();
        bih.view().print_tree(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.lines().filter(|l| l.trim_start().starts_with("- I")).count() == 7);
        assert!(text.lines().filter(|l| l.trim_start().starts_with("- L")).count() == 8);
        assert!(text.lines().count() == 15 + 16);
        assert!(text.starts_with("- I0:"));
    }
}
