use super::{BarycentricCoordinates, FloatType, LocalPoint, Ray, Triangle};

impl Triangle<LocalPoint> {
    /// Calculates ray intersection with the (two sided) triangle.
    /// Returns distance along the ray and barycentric uv coordinates of the hit,
    /// hits outside of the ray segment `0..=max_distance` are ignored.
    /// Adapted from https://en.wikipedia.org/wiki/M%C3%B6ller%E2%80%93Trumbore_intersection_algorithm#Rust_implementation
    pub fn intersect(&self, ray: &Ray) -> Option<(FloatType, BarycentricCoordinates)> {
        let [e1, e2] = self.edges();

        let ray_cross_e2 = ray.direction.cross(&e2);
        let det = e1.dot(&ray_cross_e2);

        let inv_det = 1.0 / det; // May be infinite
        let s = ray.origin - self[0];
        let u = inv_det * s.dot(&ray_cross_e2);

        let s_cross_e1 = s.cross(&e1);
        let v = inv_det * ray.direction.dot(&s_cross_e1);
        let t = inv_det * e2.dot(&s_cross_e1);

        // NaNs from a parallel ray fail all of the comparisons
        if u >= 0.0 && v >= 0.0 && u + v <= 1.0 && t >= 0.0 && t <= ray.max_distance {
            Some((t, BarycentricCoordinates { u, v }))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::geometry::LocalVector;

    use assert2::{assert, let_assert};
    use test_case::test_case;

    fn triangle() -> Triangle<LocalPoint> {
        Triangle::new(
            LocalPoint::new(0.0, 0.0, 0.5),
            LocalPoint::new(1.0, 0.0, 0.5),
            LocalPoint::new(0.0, 1.0, 0.5),
        )
    }

    #[test_case(1.0 ; "from_front")]
    #[test_case(-1.0 ; "from_back")]
    fn hit_both_sides(direction: FloatType) {
        let ray = Ray::new(
            LocalPoint::new(0.25, 0.25, 0.5 - direction * 0.5),
            LocalVector::new(0.0, 0.0, direction),
            1.0,
        );
        let_assert!(Some((t, uv)) = triangle().intersect(&ray));
        assert!((t - 0.5).abs() < 1e-6);
        assert!((uv.interpolate_triangle(&triangle()) - ray.point_at(t)).norm() < 1e-6);
    }

    #[test]
    fn miss_outside() {
        let ray = Ray::new(LocalPoint::new(0.75, 0.75, 0.0), LocalVector::z(), 1.0);
        assert!(triangle().intersect(&ray).is_none());
    }

    #[test]
    fn miss_behind_origin() {
        let ray = Ray::new(LocalPoint::new(0.25, 0.25, 1.0), LocalVector::z(), 1.0);
        assert!(triangle().intersect(&ray).is_none());
    }

    #[test]
    fn miss_beyond_max_distance() {
        let ray = Ray::new(LocalPoint::new(0.25, 0.25, 0.0), LocalVector::z(), 0.25);
        assert!(triangle().intersect(&ray).is_none());
    }

    #[test]
    fn parallel_ray_misses() {
        let ray = Ray::new(LocalPoint::new(-1.0, 0.25, 0.5), LocalVector::x(), 10.0);
        assert!(triangle().intersect(&ray).is_none());
    }
}
