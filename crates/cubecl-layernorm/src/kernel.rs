use cubecl_core as cubecl;
use cubecl_core::prelude::*;
use derive_new::new;

use crate::{block_reduce, fast_div, line_transform, InverseSqrt, LayerNormLaunch, SumOp};

/// Launch the layernorm kernel. This function assumes that all parameters are already validated.
/// See the main entrypoint `layernorm_with_strategy` in `lib.rs` for an example how to call this
/// function with the appropriate assumptions.
pub(crate) fn launch_layernorm<Run: Runtime, F: Float>(
    client: &ComputeClient<Run::Server, Run::Channel>,
    input: TensorHandleRef<Run>,
    output: TensorHandleRef<Run>,
    launch: &LayerNormLaunch,
    epsilon: f32,
    max_group_size: u32,
) {
    let params = LayerNormParams::new(max_group_size, launch.line_size());

    unsafe {
        layernorm_kernel::launch_unchecked::<F, Run>(
            client,
            launch.cube_count(),
            launch.cube_dim(),
            input.as_tensor_arg(params.line_size as u8),
            output.as_tensor_arg(params.line_size as u8),
            ScalarArg::new(launch.num_groups),
            ScalarArg::new(launch.divmod.multiplier()),
            ScalarArg::new(launch.divmod.shift()),
            ScalarArg::new(launch.reduction_elements),
            ScalarArg::new(epsilon),
            params,
        );
    }
}

#[derive(new, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct LayerNormParams {
    /// Size of the shared buffer of each reduction, an upper bound of `CUBE_DIM`.
    max_group_size: u32,
    line_size: u32,
}

/// Normalize every group of `relements` contiguous values to zero mean and unit variance.
///
/// Each cube handles one group and each unit one line of it. Units past the end of the group
/// still take part in both reductions since those synchronize the whole cube. Cubes past the
/// last group, which pad a 2-D cube count, exit as a whole.
#[cube(launch_unchecked)]
fn layernorm_kernel<F: Float>(
    input: &Tensor<Line<F>>,
    output: &mut Tensor<Line<F>>,
    num_groups: u32,
    group_multiplier: u32,
    group_shift: u32,
    relements: u32,
    epsilon: f32,
    #[comptime] params: LayerNormParams,
) {
    let line_size = params.line_size;
    let lines_per_group = relements / line_size;

    let group = fast_div(ABSOLUTE_POS, group_multiplier, group_shift);
    if group >= num_groups {
        terminate!();
    }

    let index = group * lines_per_group + UNIT_POS;
    let in_range = UNIT_POS < lines_per_group;

    let mut x = Line::empty(line_size).fill(F::new(0.0));
    if in_range {
        x = input[index];
    }

    let count = F::cast_from(relements);

    let mean = block_reduce::<F, SumOp>(x, lines_per_group, params.max_group_size) / count;
    let centered = x - Line::empty(line_size).fill(mean);

    let mean_sq = block_reduce::<F, SumOp>(
        centered * centered,
        lines_per_group,
        params.max_group_size,
    ) / count;
    let variance = Line::empty(line_size).fill(mean_sq + F::cast_from(epsilon));

    if in_range {
        output[index] = centered * line_transform::<F, InverseSqrt>(variance);
    }
}
