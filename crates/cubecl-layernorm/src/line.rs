use cubecl_core as cubecl;
use cubecl_core::prelude::*;

use crate::BlockReduceOp;

/// A function applied independently to every lane of a line.
#[cube]
pub trait LaneMap<F: Float>: Send + Sync + 'static {
    fn apply(value: F) -> F;
}

/// `1 / sqrt(x)`.
#[derive(Debug)]
pub struct InverseSqrt;

#[cube]
impl<F: Float> LaneMap<F> for InverseSqrt {
    fn apply(value: F) -> F {
        F::new(1.0) / F::sqrt(value)
    }
}

/// Apply `M` to each lane of `value`.
///
/// The output has the same line size as the input, so a scalar (line size 1) stays a scalar.
#[cube]
pub fn line_transform<F: Float, M: LaneMap<F>>(value: Line<F>) -> Line<F> {
    let mut output = Line::<F>::empty(value.size());

    #[unroll]
    for k in 0..value.size() {
        output[k] = M::apply(value[k]);
    }

    output
}

/// Fold the lanes of `value` from left to right into a scalar, starting from the identity of
/// `Op`.
///
/// With a line size of 1 this is the lane itself.
#[cube]
pub fn line_fold<N: Numeric, Op: BlockReduceOp<N>>(value: Line<N>) -> N {
    let mut folded = Op::init();

    #[unroll]
    for k in 0..value.size() {
        folded = Op::fold(folded, value[k]);
    }

    folded
}
