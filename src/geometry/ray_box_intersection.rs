use super::{FloatType, LocalBox, Ray};

pub trait RayIntersectionExt {
    /// Calculate first and last ray intersection with the box
    fn intersect(&self, ray: &Ray) -> (FloatType, FloatType);
}

impl RayIntersectionExt for LocalBox {
    /// Calculates intersection of the infinite line of the ray with the box.
    /// Returns minimum and maximum distance along the ray, ray intersects if min <= max.
    fn intersect(&self, ray: &Ray) -> (FloatType, FloatType) {
        // Componentwise distances along the ray to the box's min and max corners
        // The multiplication is NAN if the ray is starting inside the slab bounding plane
        // and is parallel to it. In this case we replace it with +-infinity, so that the range becomes infinite
        let to_box_min = (self.min - ray.origin)
            .component_mul(&ray.inv_direction)
            .map(|x| if x.is_nan() { FloatType::NEG_INFINITY } else { x });
        let to_box_max = (self.max - ray.origin)
            .component_mul(&ray.inv_direction)
            .map(|x| if x.is_nan() { FloatType::INFINITY } else { x });

        // Correctly ordered (min_t <= max_t)
        let componentwise_min_t = to_box_min.zip_map(&to_box_max, FloatType::min);
        let componentwise_max_t = to_box_min.zip_map(&to_box_max, FloatType::max);

        (componentwise_min_t.max(), componentwise_max_t.min())
    }
}

#[cfg(test)]
mod test {
    use assert2::assert;
    use test_case::test_case;
    use test_strategy::proptest;

    use super::*;
    use crate::geometry::{
        LocalPoint, LocalVector,
        test::{UnitBoxWrapper, UnitPointWrapper, unit_float},
    };

    fn middle_box() -> LocalBox {
        LocalBox::new(LocalPoint::new(0.25, 0.25, 0.25), LocalPoint::new(0.75, 0.75, 0.75))
    }

    /// Any point of the box lies within the returned interval of a line passing through it.
    #[proptest]
    fn interval_contains_box_points(
        b: UnitBoxWrapper,
        #[strategy(unit_float())] u: FloatType,
        #[strategy(unit_float())] v: FloatType,
        #[strategy(unit_float())] w: FloatType,
        from: UnitPointWrapper,
    ) {
        let inside = b.min + (b.max - b.min).component_mul(&LocalVector::new(u, v, w));
        let origin = LocalPoint::from(from.coords * 4.0 - LocalVector::repeat(1.5));
        let offset = inside - origin;
        proptest::prop_assume!(offset.norm() > 1e-3);

        let (t1, t2) = b.intersect(&Ray::new(origin, offset, FloatType::INFINITY));
        let t = offset.norm();

        assert!(t1 <= t + 1e-4);
        assert!(t2 >= t - 1e-4);
    }

    #[test]
    fn axis_aligned_hit() {
        let ray = Ray::new(LocalPoint::new(0.0, 0.5, 0.5), LocalVector::x(), FloatType::INFINITY);
        assert!(middle_box().intersect(&ray) == (0.25, 0.75));
    }

    #[test]
    fn origin_inside_gives_negative_entry() {
        let ray = Ray::new(LocalPoint::new(0.5, 0.5, 0.5), -LocalVector::y(), FloatType::INFINITY);
        let (t1, t2) = middle_box().intersect(&ray);
        assert!(t1 == -0.25);
        assert!(t2 == 0.25);
    }

    /// Rays on a face plane of the box still count as hits.
    #[test]
    fn grazing_face() {
        let ray = Ray::new(LocalPoint::new(0.25, 0.5, 0.0), LocalVector::z(), FloatType::INFINITY);
        let (t1, t2) = middle_box().intersect(&ray);
        assert!(t1 == 0.25);
        assert!(t2 == 0.75);
    }

    #[test_case(LocalPoint::new(0.1, 0.5, 0.5), LocalVector::y() ; "parallel_below_x_slab")]
    #[test_case(LocalPoint::new(0.9, 0.5, 0.5), LocalVector::z() ; "parallel_above_x_slab")]
    #[test_case(LocalPoint::new(0.5, 0.0, 1.0), LocalVector::new(0.0, 1.0, 1.0) ; "diagonal_past_edge")]
    #[test_case(LocalPoint::new(0.0, 0.0, 0.0), LocalVector::new(1.0, -1.0, 0.0) ; "away_from_corner")]
    fn misses(origin: LocalPoint, direction: LocalVector) {
        let (t1, t2) = middle_box().intersect(&Ray::new(origin, direction, FloatType::INFINITY));
        assert!(t1 > t2);
    }
}
