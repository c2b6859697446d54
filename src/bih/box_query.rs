use super::{BihView, QuantizedBox, TriangleIdx, traversal::triangle_range};
use crate::geometry::{FloatType, LocalBox, LocalPoint, Triangle, WorldPoint};

impl BihView<'_> {
    /// Calls `visitor` for every triangle that overlaps or touches the query box.
    ///
    /// The query is in the tree's local space. The visitor gets the triangle
    /// vertices multiplied by `scale`, the part id of the leaf and the index of
    /// the triangle in the tree.
    pub fn query_box(
        &self,
        query: &LocalBox,
        scale: FloatType,
        mut visitor: impl FnMut(&Triangle<WorldPoint>, u16, TriangleIdx),
    ) {
        if query.is_empty() {
            return;
        }

        let quantized_query = QuantizedBox::round_out(query);
        self.traverse(
            |node_box| node_box.intersects(&quantized_query),
            |range, material| {
                for index in triangle_range(range) {
                    let triangle = self.triangle(index);
                    if triangle.overlaps_box(query) {
                        visitor(&scale_triangle(&triangle, scale), material, index);
                    }
                }
            },
        );
    }

    /// Indices of all triangles overlapping the query box, in traversal order.
    pub fn collect_box(&self, query: &LocalBox) -> Vec<TriangleIdx> {
        let mut result = Vec::new();
        self.query_box(query, 1.0, |_, _, index| result.push(index));
        result
    }
}

pub(super) fn scale_triangle(
    triangle: &Triangle<LocalPoint>,
    scale: FloatType,
) -> Triangle<WorldPoint> {
    triangle.map(|p| WorldPoint::from(p.coords * scale))
}
