use bytemuck::{Pod, Zeroable};

use super::VertexIdx;
use crate::geometry::Triangle;

/// Three vertex indices packed into 21, 21 and 22 bits of a u64.
#[repr(transparent)]
#[derive(Copy, Clone, PartialEq, Eq, Hash, Pod, Zeroable)]
pub struct PackedTriangle(u64);

impl PackedTriangle {
    const FIRST_BITS: u32 = 21;
    const SECOND_BITS: u32 = 21;
    const THIRD_BITS: u32 = 64 - Self::FIRST_BITS - Self::SECOND_BITS;

    const FIRST_MASK: u64 = (1 << Self::FIRST_BITS) - 1;
    const SECOND_MASK: u64 = (1 << Self::SECOND_BITS) - 1;

    /// Number of vertices addressable by all three fields.
    pub const MAX_VERTEX_COUNT: usize = 1 << Self::FIRST_BITS;

    /// Panics if any index doesn't fit its field
    pub fn new(indices: Triangle<VertexIdx>) -> Self {
        let Some(packed) = Self::try_new(indices) else {
            panic!("Vertex indices {indices:?} don't fit a packed triangle");
        };
        packed
    }

    pub fn try_new(indices: Triangle<VertexIdx>) -> Option<Self> {
        let [a, b, c] = indices.into_array().map(|i| i.raw() as u64);
        if a >> Self::FIRST_BITS != 0 || b >> Self::SECOND_BITS != 0 || c >> Self::THIRD_BITS != 0 {
            return None;
        }
        Some(PackedTriangle(
            a | b << Self::FIRST_BITS | c << (Self::FIRST_BITS + Self::SECOND_BITS),
        ))
    }

    pub fn unpack(&self) -> Triangle<VertexIdx> {
        let a = self.0 & Self::FIRST_MASK;
        let b = (self.0 >> Self::FIRST_BITS) & Self::SECOND_MASK;
        let c = self.0 >> (Self::FIRST_BITS + Self::SECOND_BITS);
        Triangle::new(a, b, c).map(|i| VertexIdx::from_raw(*i as u32))
    }
}

impl std::fmt::Debug for PackedTriangle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let [a, b, c] = self.unpack().into_array();
        write!(f, "PackedTriangle({}, {}, {})", a.raw(), b.raw(), c.raw())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use assert2::{assert, let_assert};
    use test_strategy::proptest;

    fn indices(a: u32, b: u32, c: u32) -> Triangle<VertexIdx> {
        Triangle::new(a, b, c).map(|i| VertexIdx::from_raw(*i))
    }

    #[proptest]
    fn round_trip(
        #[strategy(0u32..(1 << 21))] a: u32,
        #[strategy(0u32..(1 << 21))] b: u32,
        #[strategy(0u32..(1 << 22))] c: u32,
    ) {
        let_assert!(Some(packed) = PackedTriangle::try_new(indices(a, b, c)));
        assert!(packed.unpack() == indices(a, b, c));
    }

    #[test]
    fn field_layout() {
        let packed = PackedTriangle::new(indices(1, 2, 3));
        assert!(packed.0 == 1 | 2 << 21 | 3 << 42);
    }

    #[test]
    fn largest_indices() {
        let max = indices((1 << 21) - 1, (1 << 21) - 1, (1 << 22) - 1);
        assert!(PackedTriangle::new(max).0 == u64::MAX);
        assert!(PackedTriangle::new(max).unpack() == max);
    }

    #[test]
    fn out_of_range() {
        assert!(PackedTriangle::try_new(indices(1 << 21, 0, 0)).is_none());
        assert!(PackedTriangle::try_new(indices(0, 1 << 21, 0)).is_none());
        assert!(PackedTriangle::try_new(indices(0, 0, 1 << 22)).is_none());
    }

    #[test]
    #[should_panic]
    fn new_out_of_range() {
        PackedTriangle::new(indices(0, 0, 1 << 22));
    }
}
