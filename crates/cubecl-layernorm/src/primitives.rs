use cubecl_core as cubecl;
use cubecl_core::prelude::*;

use crate::{line_fold, BlockReduceOp};

/// Use all units within a cube to reduce one value per unit and broadcast the scalar outcome
/// back to every unit.
///
/// Only the units with `UNIT_POS < num_active` contribute `value`, the others contribute the
/// identity of `Op`. The per unit values are fused inplace in shared memory like this, with
/// padding when `CUBE_DIM` is not a power of 2:
///
/// ```ignored
///
///     0   1   2   3   4   5   6   7
///     |   |   |   |   |   |   |   |
///     +---+   +---+   +---+   +---+
///     |       |       |       |
///     +-------+       +-------+
///     |               |
///     +---------------+
///     |
///     *
///
/// ```
///
/// The lanes of the fused line are then folded with `Op` into a single scalar.
///
/// Every unit of the cube must call this function, since it synchronizes the whole cube.
/// `CUBE_DIM` must be at most `max_group_size`.
#[cube]
pub fn block_reduce<N: Numeric, Op: BlockReduceOp<N>>(
    value: Line<N>,
    num_active: u32,
    #[comptime] max_group_size: u32,
) -> N {
    let line_size = value.size();
    let mut accumulator = SharedMemory::<N>::new_lined(max_group_size, line_size);

    if UNIT_POS < num_active {
        accumulator[UNIT_POS] = value;
    } else {
        accumulator[UNIT_POS] = Op::identity(line_size);
    }
    sync_units();

    let mut num_remaining_items = CUBE_DIM;
    let mut jump = 1u32;
    while num_remaining_items > 1 {
        let destination = jump * 2 * UNIT_POS;
        let origin = jump * (2 * UNIT_POS + 1);
        if UNIT_POS < num_remaining_items / 2 {
            let fused = Op::combine(accumulator[destination], accumulator[origin]);
            accumulator[destination] = fused;
        }
        num_remaining_items = (num_remaining_items + 1) / 2;
        jump *= 2;
        sync_units();
    }

    let result = accumulator[0];
    sync_units();

    line_fold::<N, Op>(result)
}
