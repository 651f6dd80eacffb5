//! Layer normalization kernels for CubeCL.
//!
//! Every group of consecutive values along the last dimension of a tensor is normalized to zero
//! mean and unit variance by a single cube. The reductions over the group are done in shared
//! memory with [block_reduce].

mod config;
mod error;
mod fast_divmod;
mod instructions;
mod kernel;
mod line;
mod primitives;
mod reference;
mod settings;
mod strategy;

pub use config::*;
pub use error::*;
pub use fast_divmod::*;
pub use instructions::*;
pub use line::*;
pub use primitives::*;
pub use reference::*;
pub use settings::*;
pub use strategy::*;


use cubecl_core::prelude::*;

use kernel::launch_layernorm;

/// Entry point for layernorm.
///
/// Normalizes `input` along its last dimension into `output`. Both tensors must share the same
/// contiguous shape. The kernel is picked from the reduction dimension, see
/// [LayerNormStrategy::select].
pub fn layernorm<R: Runtime, F: Float>(
    client: &ComputeClient<R::Server, R::Channel>,
    input: TensorHandleRef<R>,
    output: TensorHandleRef<R>,
    settings: &LayerNormSettings,
) -> Result<(), LayerNormError> {
    layernorm_with_strategy::<R, F>(client, input, output, settings, None)
}

/// Same as [layernorm], but uses `strategy` instead of selecting one when provided.
///
/// The strategy is still checked against the shape and rejected if its kernel can't hold a whole
/// group in a cube.
pub fn layernorm_with_strategy<R: Runtime, F: Float>(
    client: &ComputeClient<R::Server, R::Channel>,
    input: TensorHandleRef<R>,
    output: TensorHandleRef<R>,
    settings: &LayerNormSettings,
    strategy: Option<LayerNormStrategy>,
) -> Result<(), LayerNormError> {
    settings.validate()?;
    validate_tensors(&input, &output)?;

    let reduction_dim = *input.shape.last().ok_or(LayerNormError::InvalidRank)?;
    if reduction_dim == 0 || input.shape.contains(&0) {
        return Ok(());
    }

    let strategy = match strategy {
        Some(strategy) => strategy.validate(reduction_dim, settings)?,
        None => LayerNormStrategy::select(reduction_dim, settings)?,
    };
    check_line_size(
        strategy.line_size(),
        R::supported_line_sizes().iter().cloned(),
    )?;
    let launch = LayerNormLaunch::new(input.shape, strategy, settings)?;

    log::debug!(
        "Launching layernorm with {:?}: {} groups of {} elements, {} lines on {} units",
        launch.strategy,
        launch.num_groups,
        launch.reduction_elements,
        launch.lines_per_group,
        launch.group_size,
    );

    launch_layernorm::<R, F>(
        client,
        input,
        output,
        &launch,
        settings.epsilon,
        settings.max_group_size,
    );

    Ok(())
}

fn validate_tensors<R: Runtime>(
    input: &TensorHandleRef<R>,
    output: &TensorHandleRef<R>,
) -> Result<(), LayerNormError> {
    if input.shape.is_empty() {
        return Err(LayerNormError::InvalidRank);
    }
    if input.shape != output.shape {
        return Err(LayerNormError::ShapeMismatch {
            input: input.shape.to_vec(),
            output: output.shape.to_vec(),
        });
    }
    for strides in [input.strides, output.strides] {
        if !is_contiguous(input.shape, strides) {
            return Err(LayerNormError::NonContiguous {
                strides: strides.to_vec(),
            });
        }
    }

    Ok(())
}

/// Reject line sizes the runtime can't pack.
fn check_line_size(
    line_size: u32,
    mut supported_line_sizes: impl Iterator<Item = u8>,
) -> Result<(), LayerNormError> {
    if supported_line_sizes.any(|supported| supported as u32 == line_size) {
        Ok(())
    } else {
        Err(LayerNormError::UnsupportedLineSize { line_size })
    }
}

/// Whether a tensor is laid out in row-major order without gaps.
///
/// Dimensions of size 1 can have any stride.
pub fn is_contiguous(shape: &[usize], strides: &[usize]) -> bool {
    if shape.len() != strides.len() {
        return false;
    }

    let mut expected = 1;
    for (dim, stride) in shape.iter().zip(strides).rev() {
        if *dim != 1 && *stride != expected {
            return false;
        }
        expected *= dim;
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_major_tensors_are_contiguous() {
        assert!(is_contiguous(&[4], &[1]));
        assert!(is_contiguous(&[2, 3, 4], &[12, 4, 1]));
        assert!(is_contiguous(&[1, 8], &[1, 1]));
    }

    #[test]
    fn line_sizes_are_checked_against_the_runtime() {
        let wgpu_like = [4u8, 2, 1];

        assert!(check_line_size(4, wgpu_like.iter().cloned()).is_ok());
        assert!(check_line_size(1, wgpu_like.iter().cloned()).is_ok());
        assert_eq!(
            check_line_size(8, wgpu_like.iter().cloned()),
            Err(LayerNormError::UnsupportedLineSize { line_size: 8 })
        );
        assert_eq!(
            check_line_size(256, wgpu_like.iter().cloned()),
            Err(LayerNormError::UnsupportedLineSize { line_size: 256 })
        );
    }

    #[test]
    fn strided_tensors_are_not_contiguous() {
        assert!(!is_contiguous(&[2, 4], &[1, 2]));
        assert!(!is_contiguous(&[2, 4], &[8, 1]));
        assert!(!is_contiguous(&[2, 4], &[4]));
    }
}
