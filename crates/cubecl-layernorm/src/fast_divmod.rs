use cubecl_core as cubecl;
use cubecl_core::prelude::*;

/// Precalculated division by a fixed `u32` divisor.
///
/// The values are computed once on the host so that each unit can divide its absolute position
/// by the cube size with a multiply-high, an add and a shift instead of an integer division.
///
/// Implementation based on ONNX:
/// <https://github.com/microsoft/onnxruntime/blob/main/onnxruntime/core/providers/cuda/shared_inc/fast_divmod.h>
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FastDivmod {
    divisor: u32,
    multiplier: u32,
    shift: u32,
}

impl FastDivmod {
    /// Largest dividend for which [div](FastDivmod::div) is exact.
    ///
    /// The high half of the product is added to the dividend in 32 bits on the device.
    pub const MAX_DIVIDEND: u32 = i32::MAX as u32;

    pub fn new(divisor: u32) -> Self {
        assert!(divisor != 0, "FastDivmod can't divide by zero");

        let shift = divisor.next_power_of_two().trailing_zeros();
        let divisor_64 = divisor as u64;
        let multiplier = ((1u64 << 32) * ((1u64 << shift) - divisor_64)) / divisor_64 + 1;

        Self {
            divisor,
            multiplier: multiplier as u32,
            shift,
        }
    }

    pub fn divisor(&self) -> u32 {
        self.divisor
    }

    /// Value to pass as the `multiplier` of [fast_div].
    pub fn multiplier(&self) -> u32 {
        self.multiplier
    }

    /// Value to pass as the `shift` of [fast_div].
    pub fn shift(&self) -> u32 {
        self.shift
    }

    pub fn div(&self, dividend: u32) -> u32 {
        debug_assert!(dividend <= Self::MAX_DIVIDEND);
        let high = ((dividend as u64 * self.multiplier as u64) >> 32) as u32;
        (high + dividend) >> self.shift
    }

    pub fn modulo(&self, dividend: u32) -> u32 {
        dividend - self.div(dividend) * self.divisor
    }

    pub fn div_mod(&self, dividend: u32) -> (u32, u32) {
        let quotient = self.div(dividend);
        (quotient, dividend - quotient * self.divisor)
    }
}

/// Divide `dividend` using the parameters of a [FastDivmod].
#[cube]
pub fn fast_div(dividend: u32, multiplier: u32, shift: u32) -> u32 {
    let high = mul_hi(dividend, multiplier);
    (high + dividend) >> shift
}

/// High 32 bits of the 64 bits product, built from 16 bits partial products so it doesn't need
/// 64 bits integers on the device.
#[cube]
fn mul_hi(lhs: u32, rhs: u32) -> u32 {
    let mask = 0xFFFFu32;
    let lhs_low = lhs & mask;
    let lhs_high = lhs >> 16;
    let rhs_low = rhs & mask;
    let rhs_high = rhs >> 16;

    let low_low = lhs_low * rhs_low;
    let high_low = lhs_high * rhs_low;
    let low_high = lhs_low * rhs_high;
    let high_high = lhs_high * rhs_high;

    let carry = (low_low >> 16) + (high_low & mask) + (low_high & mask);

    high_high + (high_low >> 16) + (low_high >> 16) + (carry >> 16)
}
