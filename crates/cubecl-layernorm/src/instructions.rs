use cubecl_core as cubecl;
use cubecl_core::prelude::*;

/// An associative operator together with its identity, used to combine the contributions of
/// every unit within a cube.
///
/// Lines are combined lane by lane with [combine](BlockReduceOp::combine) during the tree
/// reduction, then the lanes of the final line are folded into a scalar with
/// [fold](BlockReduceOp::fold).
#[cube]
pub trait BlockReduceOp<N: Numeric>: Send + Sync + 'static {
    /// The identity as a scalar, used as the starting point of a lane fold.
    fn init() -> N;

    /// The identity as a line, contributed by masked units.
    fn identity(#[comptime] line_size: u32) -> Line<N>;

    fn combine(lhs: Line<N>, rhs: Line<N>) -> Line<N>;

    fn fold(accumulator: N, lane: N) -> N;
}

/// A [BlockReduceOp] for every numeric type, so kernels can be generic over the operator.
pub trait BlockReduce: Send + Sync + 'static {
    type Op<N: Numeric>: BlockReduceOp<N>;
}

#[derive(Debug)]
pub struct SumOp;

impl BlockReduce for SumOp {
    type Op<N: Numeric> = Self;
}

#[cube]
impl<N: Numeric> BlockReduceOp<N> for SumOp {
    fn init() -> N {
        N::from_int(0)
    }

    fn identity(#[comptime] line_size: u32) -> Line<N> {
        Line::empty(line_size).fill(N::from_int(0))
    }

    fn combine(lhs: Line<N>, rhs: Line<N>) -> Line<N> {
        lhs + rhs
    }

    fn fold(accumulator: N, lane: N) -> N {
        accumulator + lane
    }
}

#[derive(Debug)]
pub struct ProdOp;

impl BlockReduce for ProdOp {
    type Op<N: Numeric> = Self;
}

#[cube]
impl<N: Numeric> BlockReduceOp<N> for ProdOp {
    fn init() -> N {
        N::from_int(1)
    }

    fn identity(#[comptime] line_size: u32) -> Line<N> {
        Line::empty(line_size).fill(N::from_int(1))
    }

    fn combine(lhs: Line<N>, rhs: Line<N>) -> Line<N> {
        lhs * rhs
    }

    fn fold(accumulator: N, lane: N) -> N {
        accumulator * lane
    }
}

#[derive(Debug)]
pub struct MaxOp;

impl BlockReduce for MaxOp {
    type Op<N: Numeric> = Self;
}

#[cube]
impl<N: Numeric> BlockReduceOp<N> for MaxOp {
    fn init() -> N {
        N::min_value()
    }

    fn identity(#[comptime] line_size: u32) -> Line<N> {
        Line::empty(line_size).fill(N::min_value())
    }

    fn combine(lhs: Line<N>, rhs: Line<N>) -> Line<N> {
        select_many(lhs.less_than(rhs), rhs, lhs)
    }

    fn fold(accumulator: N, lane: N) -> N {
        select(accumulator < lane, lane, accumulator)
    }
}

#[derive(Debug)]
pub struct MinOp;

impl BlockReduce for MinOp {
    type Op<N: Numeric> = Self;
}

#[cube]
impl<N: Numeric> BlockReduceOp<N> for MinOp {
    fn init() -> N {
        N::max_value()
    }

    fn identity(#[comptime] line_size: u32) -> Line<N> {
        Line::empty(line_size).fill(N::max_value())
    }

    fn combine(lhs: Line<N>, rhs: Line<N>) -> Line<N> {
        select_many(lhs.less_than(rhs), lhs, rhs)
    }

    fn fold(accumulator: N, lane: N) -> N {
        select(lane < accumulator, lane, accumulator)
    }
}
