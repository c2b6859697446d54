use std::ops::Sub;

use nalgebra::{ClosedAddAssign, ClosedDivAssign, Point, Scalar};
use num_traits::One;

use super::{Axis, FloatType, LocalPoint, LocalVector};

#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct AABB<Point> {
    pub min: Point,
    pub max: Point,
}

impl<Point> AABB<Point> {
    pub fn new(min: Point, max: Point) -> AABB<Point> {
        AABB { min, max }
    }

    pub fn map<Point2, F: FnMut(&Point) -> Point2>(&self, mut f: F) -> AABB<Point2> {
        AABB {
            min: f(&self.min),
            max: f(&self.max),
        }
    }
}

impl<Point: Sub + Copy> AABB<Point> {
    pub fn size(&self) -> Point::Output {
        self.max - self.min
    }
}

impl<T: Scalar + ClosedAddAssign + ClosedDivAssign + One, const D: usize> AABB<Point<T, D>> {
    pub fn center(&self) -> Point<T, D> {
        let two = T::one() + T::one();
        let avg_coords = (&self.min.coords + &self.max.coords) / two;
        Point::from(avg_coords)
    }
}

impl AABB<LocalPoint> {
    /// Box that contains nothing and is the identity for `union`.
    pub fn empty() -> Self {
        AABB {
            min: LocalPoint::from(LocalVector::repeat(FloatType::INFINITY)),
            max: LocalPoint::from(LocalVector::repeat(FloatType::NEG_INFINITY)),
        }
    }

    /// Smallest box containing all the points, None if the iterator is empty.
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a LocalPoint>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = *iter.next()?;
        Some(iter.fold(AABB::new(first, first), |acc, p| acc.grow(p)))
    }

    pub fn grow(&self, p: &LocalPoint) -> Self {
        AABB {
            min: self.min.inf(p),
            max: self.max.sup(p),
        }
    }

    pub fn union(&self, other: &Self) -> Self {
        AABB {
            min: self.min.inf(&other.min),
            max: self.max.sup(&other.max),
        }
    }

    /// True if the box contains no points, also when any coordinate is NaN.
    pub fn is_empty(&self) -> bool {
        !(0..3).all(|i| self.min[i] <= self.max[i])
    }

    /// Closed intersection test, boxes that only touch intersect.
    pub fn intersects(&self, other: &Self) -> bool {
        (0..3).all(|i| self.min[i] <= other.max[i] && other.min[i] <= self.max[i])
    }

    pub fn contains_point(&self, p: &LocalPoint) -> bool {
        (0..3).all(|i| self.min[i] <= p[i] && p[i] <= self.max[i])
    }

    pub fn contains(&self, other: &Self) -> bool {
        self.contains_point(&other.min) && self.contains_point(&other.max)
    }

    /// Axis with the largest extent, ties prefer the lower axis.
    pub fn longest_axis(&self) -> Axis {
        let size = self.size();
        let mut best = Axis::X;
        for axis in [Axis::Y, Axis::Z] {
            if size[axis.index()] > size[best.index()] {
                best = axis;
            }
        }
        best
    }

    /// Box grown by `margin` in every direction.
    pub fn inflate(&self, margin: FloatType) -> Self {
        let margin = LocalVector::repeat(margin);
        AABB {
            min: self.min - margin,
            max: self.max + margin,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::geometry::LocalBox;

    use assert2::assert;
    use test_case::test_case;

    fn unit_box() -> LocalBox {
        LocalBox::new(LocalPoint::new(0.0, 0.0, 0.0), LocalPoint::new(1.0, 1.0, 1.0))
    }

    #[test]
    fn from_points() {
        let points = [
            LocalPoint::new(0.5, 0.1, 0.9),
            LocalPoint::new(0.2, 0.7, 0.3),
            LocalPoint::new(0.4, 0.4, 0.4),
        ];
        let b = LocalBox::from_points(&points).unwrap();
        assert!(b.min == LocalPoint::new(0.2, 0.1, 0.3));
        assert!(b.max == LocalPoint::new(0.5, 0.7, 0.9));
    }

    #[test]
    fn from_points_empty() {
        assert!(LocalBox::from_points(&[]).is_none());
    }

    #[test]
    fn empty_is_union_identity() {
        let b = unit_box();
        assert!(LocalBox::empty().is_empty());
        assert!(LocalBox::empty().union(&b) == b);
    }

    #[test]
    fn nan_box_is_empty() {
        let b = LocalBox::new(
            LocalPoint::new(FloatType::NAN, 0.0, 0.0),
            LocalPoint::new(1.0, 1.0, 1.0),
        );
        assert!(b.is_empty());
    }

    #[test_case([1.0, 0.0, 0.0], [2.0, 1.0, 1.0], true ; "touching_face")]
    #[test_case([1.0, 1.0, 1.0], [1.0, 1.0, 1.0], true ; "touching_corner_point")]
    #[test_case([0.25, 0.25, 0.25], [0.75, 0.75, 0.75], true ; "contained")]
    #[test_case([1.001, 0.0, 0.0], [2.0, 1.0, 1.0], false ; "separated_x")]
    #[test_case([0.0, -1.0, 0.0], [1.0, -0.001, 1.0], false ; "separated_y")]
    fn intersects(min: [FloatType; 3], max: [FloatType; 3], expected: bool) {
        let other = LocalBox::new(min.into(), max.into());
        assert!(unit_box().intersects(&other) == expected);
        assert!(other.intersects(&unit_box()) == expected);
    }

    #[test_case([1.0, 1.0, 1.0], Axis::X ; "cube_prefers_x")]
    #[test_case([1.0, 2.0, 1.0], Axis::Y ; "tall")]
    #[test_case([1.0, 2.0, 2.0], Axis::Y ; "tie_prefers_lower")]
    #[test_case([0.0, 0.0, 3.0], Axis::Z ; "deep")]
    fn longest_axis(max: [FloatType; 3], expected: Axis) {
        let b = LocalBox::new(LocalPoint::origin(), max.into());
        assert!(b.longest_axis() == expected);
    }

    #[test]
    fn center_and_size() {
        let b = LocalBox::new(LocalPoint::new(0.0, 1.0, 2.0), LocalPoint::new(2.0, 2.0, 2.0));
        assert!(b.center() == LocalPoint::new(1.0, 1.5, 2.0));
        assert!(b.size() == LocalVector::new(2.0, 1.0, 0.0));
    }

    #[test]
    fn inflate_contains_original() {
        let b = unit_box();
        assert!(b.inflate(0.1).contains(&b));
        assert!(!b.contains(&b.inflate(0.1)));
    }
}
