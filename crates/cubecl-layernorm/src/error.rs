use core::fmt;

/// Reasons a layer normalization can't be launched.
///
/// All of these are detected on the host before anything is enqueued on the client.
#[derive(Clone, PartialEq, Eq)]
pub enum LayerNormError {
    /// No kernel instantiation can hold a whole normalization group in a single cube.
    UnsupportedShape {
        reduction_dim: usize,
        max_group_size: u32,
    },
    /// The line size isn't a power of two supported by the runtime.
    UnsupportedLineSize { line_size: u32 },
    /// Input and output tensors don't have the same shape.
    ShapeMismatch {
        input: Vec<usize>,
        output: Vec<usize>,
    },
    /// The tensor has no dimension to normalize.
    InvalidRank,
    /// The kernel reads each group as a contiguous run of lines.
    NonContiguous { strides: Vec<usize> },
    /// The settings would break a launch invariant.
    InvalidSettings(String),
}

impl fmt::Display for LayerNormError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayerNormError::UnsupportedShape {
                reduction_dim,
                max_group_size,
            } => write!(
                f,
                "No layernorm kernel for a reduction dimension of {reduction_dim}: \
                 it must either be vectorizable or fit in a cube of {max_group_size} units"
            ),
            LayerNormError::UnsupportedLineSize { line_size } => write!(
                f,
                "Line size {line_size} isn't supported, it must be a power of two accepted by the runtime"
            ),
            LayerNormError::ShapeMismatch { input, output } => write!(
                f,
                "Input and output tensors must share the same shape, got {input:?} and {output:?}"
            ),
            LayerNormError::InvalidRank => {
                write!(f, "Layernorm expects tensors with at least one dimension")
            }
            LayerNormError::NonContiguous { strides } => write!(
                f,
                "Layernorm expects contiguous row-major tensors, got strides {strides:?}"
            ),
            LayerNormError::InvalidSettings(reason) => {
                write!(f, "Invalid layernorm settings: {reason}")
            }
        }
    }
}

impl fmt::Debug for LayerNormError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

impl std::error::Error for LayerNormError {}
