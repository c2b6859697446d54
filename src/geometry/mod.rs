mod aabb;
mod ray_box_intersection;
mod ray_triangle_intersection;
mod triangle;
mod triangle_box_overlap;

pub use aabb::AABB;
pub use ray_box_intersection::RayIntersectionExt;
pub use triangle::{BarycentricCoordinates, Triangle};

use assert2::assert;

pub type FloatType = f32;
pub const EPSILON: FloatType = 1e-6;

/// Point in the tree's local space, normally inside the unit cube.
pub type LocalPoint = nalgebra::Point3<FloatType>;
pub type LocalVector = nalgebra::Vector3<FloatType>;
pub type LocalBox = AABB<LocalPoint>;

/// Point in the space of the caller, local space scaled uniformly.
pub type WorldPoint = nalgebra::Point3<FloatType>;
pub type WorldBox = AABB<WorldPoint>;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Axis {
    X = 0,
    Y = 1,
    Z = 2,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Axis> {
        Self::ALL.get(index).copied()
    }
}

/// Ray segment starting at `origin` and ending `max_distance` along `direction`.
#[derive(Copy, Clone, Debug)]
pub struct Ray {
    pub origin: LocalPoint,
    /// Normalized direction of the ray
    pub direction: LocalVector,

    /// Componentwise inverse of the ray direction
    /// Zeros in direction get turned into positive infinity regardless of the sign of the zero
    pub inv_direction: LocalVector,

    /// Length of the segment, may be infinite
    pub max_distance: FloatType,
}

impl Ray {
    /// Panics if the direction is zero or the distance is negative.
    pub fn new(origin: LocalPoint, direction: LocalVector, max_distance: FloatType) -> Ray {
        let norm = direction.norm();
        assert!(norm > 0.0, "Ray direction must be non-zero");
        assert!(max_distance >= 0.0);

        let direction = direction / norm;
        let inv_direction = direction.map(|x| if x == 0.0 { FloatType::INFINITY } else { 1.0 / x });

        Ray {
            origin,
            direction,
            inv_direction,
            max_distance,
        }
    }

    /// Ray going from `from` to `to`.
    pub fn between(from: LocalPoint, to: LocalPoint) -> Ray {
        let offset = to - from;
        Ray::new(from, offset, offset.norm())
    }

    pub fn point_at(&self, distance: FloatType) -> LocalPoint {
        self.origin + self.direction * distance
    }

    /// Bounding box of the whole segment.
    /// Axes along which the ray doesn't move stay flat even for infinite segments.
    pub fn bounding_box(&self) -> LocalBox {
        let end = LocalPoint::from(self.origin.coords.zip_map(&self.direction, |o, d| {
            if d == 0.0 { o } else { o + d * self.max_distance }
        }));
        LocalBox::new(self.origin.inf(&end), self.origin.sup(&end))
    }
}
