use cubecl_core::prelude::*;

use crate::{FastDivmod, LayerNormError, LayerNormSettings, LayerNormStrategy};

/// Largest number of cubes along one dimension of a dispatch supported by every runtime.
pub const MAX_CUBE_COUNT_PER_DIM: u32 = u16::MAX as u32;

/// Number of units in a cube for a group of `reduction_elements` values.
///
/// Starts at `min_group_size` and doubles while it stays below both `reduction_elements` and
/// `max_group_size`. The result is always a power of two between the two bounds when both bounds
/// are powers of two.
pub fn compute_group_size(
    reduction_elements: u32,
    min_group_size: u32,
    max_group_size: u32,
) -> u32 {
    let mut group_size = min_group_size;
    while group_size < reduction_elements && group_size < max_group_size {
        group_size *= 2;
    }
    Ord::min(group_size, max_group_size)
}

/// Geometry of a layernorm launch: one cube per normalization group.
#[derive(Debug, Clone)]
pub struct LayerNormLaunch {
    pub strategy: LayerNormStrategy,
    /// Number of normalization groups, which is also the number of cubes.
    pub num_groups: u32,
    /// Number of scalar elements in a group.
    pub reduction_elements: u32,
    /// Number of lines in a group, which is also the number of active units per cube.
    pub lines_per_group: u32,
    pub group_size: u32,
    /// Recovers the group of a unit from its absolute position.
    pub divmod: FastDivmod,
}

impl LayerNormLaunch {
    /// Build the launch for a contiguous tensor of `shape` normalized along its last dimension.
    ///
    /// The strategy must already be validated for the last dimension.
    pub fn new(
        shape: &[usize],
        strategy: LayerNormStrategy,
        settings: &LayerNormSettings,
    ) -> Result<Self, LayerNormError> {
        let reduction_dim = *shape.last().ok_or(LayerNormError::InvalidRank)?;
        let num_elements: usize = shape.iter().product();
        let num_groups = num_elements.checked_div(reduction_dim).unwrap_or(0);

        let line_size = strategy.line_size();
        let reduction_elements = reduction_dim as u32;
        let lines_per_group = reduction_elements / line_size;
        let group_size = compute_group_size(
            lines_per_group,
            settings.min_group_size,
            settings.max_group_size,
        );

        assert!(
            lines_per_group <= group_size,
            "A group of {lines_per_group} lines doesn't fit in a cube of {group_size} units"
        );

        let unsupported = LayerNormError::UnsupportedShape {
            reduction_dim,
            max_group_size: settings.max_group_size,
        };
        let num_groups = u32::try_from(num_groups).map_err(|_| unsupported.clone())?;

        let launch = Self {
            strategy,
            num_groups,
            reduction_elements,
            lines_per_group,
            group_size,
            divmod: FastDivmod::new(group_size),
        };

        // Every absolute position, padding cubes included, must divide exactly.
        if launch.num_units() > FastDivmod::MAX_DIVIDEND as u64 + 1 {
            return Err(unsupported);
        }

        Ok(launch)
    }

    pub fn line_size(&self) -> u32 {
        self.strategy.line_size()
    }

    pub fn cube_dim(&self) -> CubeDim {
        CubeDim::new(self.group_size, 1, 1)
    }

    pub fn cube_count(&self) -> CubeCount {
        let (x, y) = self.cube_count_xy();
        CubeCount::Static(x, y, 1)
    }

    /// Cubes along x and y, one per group.
    ///
    /// Groups spill over the y dimension when they don't fit along x. The absolute position stays
    /// linear over `x * y` cubes, so the last `x * y - num_groups` cubes are padding.
    pub fn cube_count_xy(&self) -> (u32, u32) {
        if self.num_groups <= MAX_CUBE_COUNT_PER_DIM {
            return (Ord::max(self.num_groups, 1), 1);
        }

        let y = self.num_groups.div_ceil(MAX_CUBE_COUNT_PER_DIM);
        (self.num_groups.div_ceil(y), y)
    }

    /// Number of units in the launch, padding cubes included.
    pub fn num_units(&self) -> u64 {
        let (x, y) = self.cube_count_xy();
        x as u64 * y as u64 * self.group_size as u64
    }
}
