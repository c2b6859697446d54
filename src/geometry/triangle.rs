use std::ops::{Index, IndexMut};

use super::{FloatType, LocalBox, LocalPoint, LocalVector};

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Triangle<Point>([Point; 3]);

impl<Point> Triangle<Point> {
    pub fn new(a: Point, b: Point, c: Point) -> Triangle<Point> {
        Triangle([a, b, c])
    }

    pub fn iter<'a>(&'a self) -> impl Iterator<Item = &'a Point> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        3
    }

    pub fn map<Point2, F: FnMut(&Point) -> Point2>(&self, mut f: F) -> Triangle<Point2> {
        Triangle([f(&self[0]), f(&self[1]), f(&self[2])])
    }

    pub fn into_array(self) -> [Point; 3] {
        self.0
    }
}

impl<Point> From<[Point; 3]> for Triangle<Point> {
    fn from(value: [Point; 3]) -> Self {
        Triangle(value)
    }
}

impl<Point> Index<usize> for Triangle<Point> {
    type Output = Point;

    fn index(&self, index: usize) -> &Self::Output {
        &self.0[index]
    }
}

impl<Point> IndexMut<usize> for Triangle<Point> {
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.0[index]
    }
}

impl Triangle<LocalPoint> {
    pub fn centroid(&self) -> LocalPoint {
        let sum = self.iter().map(|p| p.coords).sum::<LocalVector>();
        LocalPoint::from(sum / (self.len() as FloatType))
    }

    pub fn bounding_box(&self) -> LocalBox {
        LocalBox::new(
            self[0].inf(&self[1]).inf(&self[2]),
            self[0].sup(&self[1]).sup(&self[2]),
        )
    }

    /// Returns edge vectors, coming from self[0]
    pub fn edges(&self) -> [LocalVector; 2] {
        [self[1] - self[0], self[2] - self[0]]
    }

    /// Returns a normal vector of the triangle, not normalized.
    pub fn normal(&self) -> LocalVector {
        let [e1, e2] = self.edges();
        e1.cross(&e2)
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct BarycentricCoordinates {
    pub u: FloatType,
    pub v: FloatType,
}

impl BarycentricCoordinates {
    /// Point on the triangle corresponding to these coordinates.
    pub fn interpolate_triangle(&self, triangle: &Triangle<LocalPoint>) -> LocalPoint {
        let w = 1.0 - self.u - self.v;
        LocalPoint::from(
            triangle[0].coords * w + triangle[1].coords * self.u + triangle[2].coords * self.v,
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use assert2::assert;

    fn example() -> Triangle<LocalPoint> {
        Triangle::new(
            LocalPoint::new(0.0, 0.0, 0.0),
            LocalPoint::new(0.75, 0.0, 0.0),
            LocalPoint::new(0.0, 0.75, 0.25),
        )
    }

    #[test]
    fn centroid() {
        assert!(example().centroid() == LocalPoint::new(0.25, 0.25, 0.25 / 3.0));
    }

    #[test]
    fn bounding_box() {
        let b = example().bounding_box();
        assert!(b.min == LocalPoint::new(0.0, 0.0, 0.0));
        assert!(b.max == LocalPoint::new(0.75, 0.75, 0.25));
    }

    #[test]
    fn normal_direction() {
        let n = example().normal();
        assert!(n.x == 0.0);
        assert!(n.z > 0.0);
        assert!(n.dot(&example().edges()[0]) == 0.0);
    }

    #[test]
    fn interpolate_vertices() {
        let t = example();
        let at = |u, v| BarycentricCoordinates { u, v }.interpolate_triangle(&t);
        assert!(at(0.0, 0.0) == t[0]);
        assert!(at(1.0, 0.0) == t[1]);
        assert!(at(0.0, 1.0) == t[2]);
    }

    #[test]
    fn map_indices() {
        let indices = Triangle::new(1u32, 2, 3);
        let doubled = indices.map(|i| i * 2);
        assert!(doubled.into_array() == [2, 4, 6]);
    }
}
