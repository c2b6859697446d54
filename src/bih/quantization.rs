//! Conversion between unit cube coordinates and 16 bit fixed point.
//!
//! Bounds are always rounded outwards (minimum down, maximum up), so the
//! quantized box of anything is never smaller than the real one. Queries rely
//! on this to never miss a triangle. Vertices use rounding to nearest, which
//! always lands between the two conservative roundings.

use std::ops::Index;

use bytemuck::{Pod, Zeroable};

use crate::geometry::{AABB, Axis, FloatType, LocalBox, LocalPoint};

pub const QUANTIZED_MAX: u16 = u16::MAX;

// f32 has 24 bits of mantissa, so the multiplication is exact in f64
const SCALE: f64 = QUANTIZED_MAX as f64;

fn quantize_with(x: FloatType, rounding: impl Fn(f64) -> f64, nan_value: u16) -> u16 {
    if x.is_nan() {
        nan_value
    } else {
        rounding(f64::from(x).clamp(0.0, 1.0) * SCALE) as u16
    }
}

/// Largest value whose dequantized form is not above `x`.
pub fn quantize_min(x: FloatType) -> u16 {
    quantize_with(x, f64::floor, 0)
}

/// Smallest value whose dequantized form is not below `x`.
pub fn quantize_max(x: FloatType) -> u16 {
    quantize_with(x, f64::ceil, QUANTIZED_MAX)
}

pub fn quantize_nearest(x: FloatType) -> u16 {
    quantize_with(x, f64::round, 0)
}

/// Correctly rounded, so the ordering with the original value is preserved.
pub fn dequantize(q: u16) -> FloatType {
    FloatType::from(q) / FloatType::from(QUANTIZED_MAX)
}

/// Point of the unit cube in fixed point.
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
pub struct QuantizedPoint(pub [u16; 3]);

impl QuantizedPoint {
    fn quantize(p: &LocalPoint, f: impl Fn(FloatType) -> u16) -> Self {
        QuantizedPoint([f(p.x), f(p.y), f(p.z)])
    }

    pub fn round_down(p: &LocalPoint) -> Self {
        Self::quantize(p, quantize_min)
    }

    pub fn round_up(p: &LocalPoint) -> Self {
        Self::quantize(p, quantize_max)
    }

    pub fn round_nearest(p: &LocalPoint) -> Self {
        Self::quantize(p, quantize_nearest)
    }

    pub fn dequantize(&self) -> LocalPoint {
        LocalPoint::new(dequantize(self.0[0]), dequantize(self.0[1]), dequantize(self.0[2]))
    }

    pub fn with(mut self, axis: Axis, value: u16) -> Self {
        self.0[axis.index()] = value;
        self
    }
}

impl Index<Axis> for QuantizedPoint {
    type Output = u16;

    fn index(&self, axis: Axis) -> &u16 {
        &self.0[axis.index()]
    }
}

pub type QuantizedBox = AABB<QuantizedPoint>;

impl QuantizedBox {
    /// Quantizes the box so that the result contains the whole input box.
    pub fn round_out(b: &LocalBox) -> Self {
        AABB {
            min: QuantizedPoint::round_down(&b.min),
            max: QuantizedPoint::round_up(&b.max),
        }
    }

    pub fn dequantize(&self) -> LocalBox {
        self.map(QuantizedPoint::dequantize)
    }

    /// Closed intersection test, boxes that only touch intersect.
    pub fn intersects(&self, other: &Self) -> bool {
        Axis::ALL.into_iter().all(|axis| {
            self.min[axis] <= other.max[axis] && other.min[axis] <= self.max[axis]
        })
    }

    pub fn contains_point(&self, p: &QuantizedPoint) -> bool {
        Axis::ALL
            .into_iter()
            .all(|axis| self.min[axis] <= p[axis] && p[axis] <= self.max[axis])
    }
}
