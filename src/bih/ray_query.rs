use super::{
    BihView, Node, QuantizedBox, TriangleIdx,
    box_query::scale_triangle,
    traversal::{BoundedStack, child_boxes, triangle_range},
};
use crate::geometry::{
    BarycentricCoordinates, FloatType, Ray, RayIntersectionExt as _, Triangle, WorldPoint,
};

/// Margin added around node boxes and the ray segment before culling,
/// covers rounding errors of the ray and slab arithmetic.
const CULLING_MARGIN: FloatType = 2e-5;

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RayHit {
    /// Distance along the ray in local space
    pub t: FloatType,
    pub uv: BarycentricCoordinates,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ClosestHit {
    pub triangle_index: TriangleIdx,
    pub part_id: u16,
    pub hit: RayHit,
}

impl BihView<'_> {
    /// Calls `visitor` for every triangle hit by the ray segment, in no particular order.
    /// Vertices passed to the visitor are multiplied by `scale`, `RayHit::t` stays in local space.
    pub fn query_ray(
        &self,
        ray: &Ray,
        scale: FloatType,
        mut visitor: impl FnMut(&Triangle<WorldPoint>, u16, TriangleIdx, &RayHit),
    ) {
        let segment_box = segment_box(ray);
        self.traverse(
            |node_box| node_box.intersects(&segment_box) && node_entry(ray, node_box).is_some(),
            |range, material| {
                for index in triangle_range(range) {
                    let triangle = self.triangle(index);
                    if let Some((t, uv)) = triangle.intersect(ray) {
                        visitor(
                            &scale_triangle(&triangle, scale),
                            material,
                            index,
                            &RayHit { t, uv },
                        );
                    }
                }
            },
        );
    }

    /// Nearest hit along the ray segment.
    /// Visits closer children first and skips nodes that start beyond the best hit so far.
    pub fn closest_ray_hit(&self, ray: &Ray) -> Option<ClosestHit> {
        let segment_box = segment_box(ray);
        let enter = |node_box: &QuantizedBox| {
            if node_box.intersects(&segment_box) {
                node_entry(ray, node_box)
            } else {
                None
            }
        };

        let root_box = self.root_box();
        let root_t = enter(&root_box)?;

        let mut best: Option<ClosestHit> = None;
        let mut stack = BoundedStack::new();
        stack.push((self.root(), root_box, root_t));

        while let Some((index, node_box, entry_t)) = stack.pop() {
            let best_t = best.map_or(ray.max_distance, |b| b.hit.t);
            if entry_t > best_t {
                continue;
            }

            match self.nodes[index].decode() {
                Node::Internal {
                    axis,
                    split_left_max,
                    split_right_min,
                    right_child,
                } => {
                    let [left_box, right_box] =
                        child_boxes(&node_box, axis, split_left_max, split_right_min);
                    let left = enter(&left_box).map(|t| (index + 1, left_box, t));
                    let right = right_child.and_then(|right_child| {
                        enter(&right_box).map(|t| (right_child, right_box, t))
                    });

                    // Nearer child goes on top of the stack
                    match (left, right) {
                        (Some(left), Some(right)) if right.2 < left.2 => {
                            stack.push(left);
                            stack.push(right);
                        }
                        (left, right) => {
                            right.into_iter().for_each(|item| stack.push(item));
                            left.into_iter().for_each(|item| stack.push(item));
                        }
                    }
                }
                Node::Leaf {
                    first_triangle,
                    count,
                    material,
                } => {
                    let range = first_triangle..first_triangle + count as usize;
                    for triangle_index in triangle_range(range) {
                        let Some((t, uv)) = self.triangle(triangle_index).intersect(ray) else {
                            continue;
                        };
                        if best.is_none_or(|b| t < b.hit.t) {
                            best = Some(ClosestHit {
                                triangle_index,
                                part_id: material,
                                hit: RayHit { t, uv },
                            });
                        }
                    }
                }
            }
        }

        best
    }
}

/// Quantized bounds of the ray segment.
fn segment_box(ray: &Ray) -> QuantizedBox {
    QuantizedBox::round_out(&ray.bounding_box().inflate(CULLING_MARGIN))
}

/// Distance along the ray where it enters the node box, None if the segment misses it.
fn node_entry(ray: &Ray, node_box: &QuantizedBox) -> Option<FloatType> {
    let (t1, t2) = node_box.dequantize().inflate(CULLING_MARGIN).intersect(ray);
    let t1 = t1.max(0.0);
    let t2 = t2.min(ray.max_distance);
    (t1 <= t2).then_some(t1)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        bih::{Bih, Options},
        geometry::{LocalBox, LocalPoint, LocalVector},
        mesh::StridedMesh,
    };

    use assert2::{assert, let_assert};

    /// Ten parallel squares along the x axis, each made of two triangles.
    fn slices() -> Bih {
        let mut indices = Vec::new();
        let mut positions = Vec::new();
        for i in 0..10u32 {
            let x = 0.05 + i as FloatType * 0.1;
            positions.extend([x, 0.0, 0.0, x, 1.0, 0.0, x, 1.0, 1.0, x, 0.0, 1.0]);
            indices.extend([4 * i, 4 * i + 1, 4 * i + 2, 4 * i, 4 * i + 2, 4 * i + 3]);
        }
        let mesh = StridedMesh::new(&indices, &positions, 3).unwrap();
        Bih::build(&mesh, &Options::builder().max_triangles_per_leaf(2).build()).unwrap()
    }

    #[test]
    fn ray_hits_every_slice() {
        let bih = slices();
        let ray = Ray::new(LocalPoint::new(-1.0, 0.3, 0.6), LocalVector::x(), FloatType::INFINITY);

        let mut hits = Vec::new();
        bih.view().query_ray(&ray, 2.0, |triangle, _, _, hit| {
            assert!((triangle[0].x / 2.0 - ray.point_at(hit.t).x).abs() < 1e-4);
            hits.push(hit.t);
        });
        hits.sort_by(FloatType::total_cmp);

        assert!(hits.len() == 10);
        for (i, t) in hits.iter().enumerate() {
            assert!((t - (1.05 + i as FloatType * 0.1)).abs() < 1e-4);
        }
    }

    #[test]
    fn closest_hit_from_both_sides() {
        let bih = slices();
        let view = bih.view();

        let forward =
            Ray::new(LocalPoint::new(-1.0, 0.3, 0.6), LocalVector::x(), FloatType::INFINITY);
        let_assert!(Some(hit) = view.closest_ray_hit(&forward));
        assert!((forward.point_at(hit.hit.t).x - 0.05).abs() < 1e-4);

        let backward =
            Ray::new(LocalPoint::new(2.0, 0.3, 0.6), -LocalVector::x(), FloatType::INFINITY);
        let_assert!(Some(hit) = view.closest_ray_hit(&backward));
        assert!((backward.point_at(hit.hit.t).x - 0.95).abs() < 1e-4);
    }

    #[test]
    fn segment_ends_before_geometry() {
        let bih = slices();
        let ray = Ray::new(LocalPoint::new(-1.0, 0.3, 0.6), LocalVector::x(), 1.0);
        assert!(bih.view().closest_ray_hit(&ray).is_none());

        let mut count = 0;
        bih.view().query_ray(&ray, 1.0, |_, _, _, _| count += 1);
        assert!(count == 0);
    }

    #[test]
    fn parallel_ray_misses() {
        let bih = slices();
        let ray = Ray::new(LocalPoint::new(0.1, 0.3, -1.0), LocalVector::z(), FloatType::INFINITY);
        assert!(bih.view().closest_ray_hit(&ray).is_none());
    }

    #[test]
    fn node_entry_is_clipped_to_segment() {
        let node_box = QuantizedBox::round_out(&LocalBox::new(
            LocalPoint::origin(),
            LocalPoint::new(1.0, 1.0, 1.0),
        ));
        let inside = Ray::new(LocalPoint::new(0.5, 0.5, 0.5), LocalVector::x(), 10.0);
        let_assert!(Some(t) = node_entry(&inside, &node_box));
        assert!(t == 0.0);

        let outside = Ray::new(LocalPoint::new(-1.0, 0.5, 0.5), LocalVector::x(), 10.0);
        let_assert!(Some(t) = node_entry(&outside, &node_box));
        assert!((t - 1.0).abs() < 1e-4);

        let short = Ray::new(LocalPoint::new(-1.0, 0.5, 0.5), LocalVector::x(), 0.5);
        assert!(node_entry(&short, &node_box).is_none());
    }
}
