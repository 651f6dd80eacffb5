use serde::{Deserialize, Serialize};

use crate::{LayerNormError, LayerNormSettings};

/// Largest line size any runtime packs into a single value.
pub const MAX_LINE_SIZE: u32 = 16;

/// Whether `line_size` can describe a packed value: a power of two up to [MAX_LINE_SIZE].
pub fn is_valid_line_size(line_size: u32) -> bool {
    line_size.is_power_of_two() && line_size <= MAX_LINE_SIZE
}

/// Which instantiation of the layernorm kernel serves a shape.
///
/// Every normalization group must fit in a single cube, so each strategy only covers part of
/// the possible reduction dimensions.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, Serialize, Deserialize)]
pub enum LayerNormStrategy {
    /// Each unit handles a line of `line_size` consecutive elements.
    Vectorized { line_size: u32 },
    /// Each unit handles a single element.
    Scalar,
}

impl LayerNormStrategy {
    /// Select the strategy for a reduction dimension.
    ///
    /// The vectorized kernel is preferred whenever the dimension is a multiple of the vector
    /// width. Otherwise the scalar kernel is used for dimensions below the scalar limit.
    pub fn select(
        reduction_dim: usize,
        settings: &LayerNormSettings,
    ) -> Result<Self, LayerNormError> {
        let vectorized = LayerNormStrategy::Vectorized {
            line_size: settings.vector_width,
        };

        if reduction_dim % settings.vector_width as usize == 0 {
            return vectorized.validate(reduction_dim, settings);
        }

        if reduction_dim < settings.scalar_limit as usize {
            return LayerNormStrategy::Scalar.validate(reduction_dim, settings);
        }

        Err(unsupported(reduction_dim, settings))
    }

    /// Check that this strategy can serve the reduction dimension.
    pub fn validate(
        self,
        reduction_dim: usize,
        settings: &LayerNormSettings,
    ) -> Result<Self, LayerNormError> {
        if !is_valid_line_size(self.line_size()) {
            return Err(LayerNormError::UnsupportedLineSize {
                line_size: self.line_size(),
            });
        }

        let line_size = self.line_size() as usize;

        let supported = match self {
            LayerNormStrategy::Vectorized { .. } => reduction_dim % line_size == 0,
            LayerNormStrategy::Scalar => reduction_dim < settings.scalar_limit as usize,
        };

        if supported && reduction_dim / line_size <= settings.max_group_size as usize {
            Ok(self)
        } else {
            Err(unsupported(reduction_dim, settings))
        }
    }

    pub fn line_size(&self) -> u32 {
        match self {
            LayerNormStrategy::Vectorized { line_size } => *line_size,
            LayerNormStrategy::Scalar => 1,
        }
    }
}

fn unsupported(reduction_dim: usize, settings: &LayerNormSettings) -> LayerNormError {
    LayerNormError::UnsupportedShape {
        reduction_dim,
        max_group_size: settings.max_group_size,
    }
}
