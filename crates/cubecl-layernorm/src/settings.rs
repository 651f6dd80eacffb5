use serde::{Deserialize, Serialize};

use crate::{is_valid_line_size, LayerNormError, MAX_LINE_SIZE};

/// Epsilon added to the variance before taking its inverse square root.
pub const DEFAULT_EPSILON: f32 = 1e-12;
/// Largest cube used by the kernel, which also bounds the shared memory of a reduction.
pub const DEFAULT_MAX_GROUP_SIZE: u32 = 256;
/// Smallest cube used by the kernel, one wavefront.
pub const DEFAULT_MIN_GROUP_SIZE: u32 = 64;
/// Line size of the vectorized kernel.
pub const DEFAULT_VECTOR_WIDTH: u32 = 4;
/// Reduction dimensions strictly below this value can use the scalar kernel.
pub const DEFAULT_SCALAR_LIMIT: u32 = 256;

/// Tunable constants of the layer normalization.
///
/// The defaults match the values the kernels were designed around. They can be loaded from the
/// `[layernorm]` table of a `cubecl.toml` file and overridden with `CUBECL_LAYERNORM_*`
/// environment variables.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LayerNormSettings {
    #[serde(default = "default_epsilon")]
    pub epsilon: f32,

    #[serde(default = "default_max_group_size")]
    pub max_group_size: u32,

    #[serde(default = "default_min_group_size")]
    pub min_group_size: u32,

    #[serde(default = "default_vector_width")]
    pub vector_width: u32,

    #[serde(default = "default_scalar_limit")]
    pub scalar_limit: u32,
}

fn default_epsilon() -> f32 {
    DEFAULT_EPSILON
}

fn default_max_group_size() -> u32 {
    DEFAULT_MAX_GROUP_SIZE
}

fn default_min_group_size() -> u32 {
    DEFAULT_MIN_GROUP_SIZE
}

fn default_vector_width() -> u32 {
    DEFAULT_VECTOR_WIDTH
}

fn default_scalar_limit() -> u32 {
    DEFAULT_SCALAR_LIMIT
}

impl Default for LayerNormSettings {
    fn default() -> Self {
        Self {
            epsilon: DEFAULT_EPSILON,
            max_group_size: DEFAULT_MAX_GROUP_SIZE,
            min_group_size: DEFAULT_MIN_GROUP_SIZE,
            vector_width: DEFAULT_VECTOR_WIDTH,
            scalar_limit: DEFAULT_SCALAR_LIMIT,
        }
    }
}

impl LayerNormSettings {
    /// Parse the settings from TOML.
    ///
    /// Both a bare table and a whole `cubecl.toml` with a `[layernorm]` table are accepted.
    /// Missing fields take their default value.
    pub fn from_toml(content: &str) -> Result<Self, LayerNormError> {
        let mut table: toml::Table = toml::from_str(content)
            .map_err(|err| LayerNormError::InvalidSettings(err.to_string()))?;

        let settings = match table.remove("layernorm") {
            Some(section) => section.try_into::<LayerNormSettings>(),
            None => toml::Value::Table(table).try_into::<LayerNormSettings>(),
        };

        settings.map_err(|err| LayerNormError::InvalidSettings(err.to_string()))
    }

    /// Load the settings of the closest `cubecl.toml` or `CubeCL.toml`, then apply the environment
    /// overrides.
    ///
    /// Traverses up the directory tree from the current directory. A file that can't be parsed is
    /// skipped with a warning. Returns the defaults when no file is found.
    pub fn load() -> Self {
        let settings = match std::env::current_dir() {
            Ok(dir) => Self::from_dir(dir),
            Err(_) => None,
        };

        settings.unwrap_or_default().override_from_env()
    }

    fn from_dir(mut dir: std::path::PathBuf) -> Option<Self> {
        loop {
            for name in ["cubecl.toml", "CubeCL.toml"] {
                if let Some(settings) = Self::from_file_path(dir.join(name)) {
                    return Some(settings);
                }
            }

            if !dir.pop() {
                return None;
            }
        }
    }

    // Loads the settings from a file path, `None` if there is no readable valid file.
    fn from_file_path(path: std::path::PathBuf) -> Option<Self> {
        let content = std::fs::read_to_string(&path).ok()?;

        match Self::from_toml(&content) {
            Ok(settings) => Some(settings),
            Err(err) => {
                log::warn!("Ignoring {}: {err}", path.display());
                None
            }
        }
    }

    /// Serialize the settings as a `[layernorm]` table.
    pub fn to_toml(&self) -> String {
        let mut table = toml::Table::new();
        table.insert(
            "layernorm".to_string(),
            toml::Value::try_from(self).expect("Settings should be serializable"),
        );
        toml::to_string_pretty(&table).expect("Settings should be serializable")
    }

    /// Overrides fields based on environment variables.
    ///
    /// Values that can't be parsed are ignored with a warning.
    pub fn override_from_env(mut self) -> Self {
        if let Some(epsilon) = env_override::<f32>("CUBECL_LAYERNORM_EPSILON") {
            self.epsilon = epsilon;
        }
        if let Some(size) = env_override::<u32>("CUBECL_LAYERNORM_MAX_GROUP_SIZE") {
            self.max_group_size = size;
        }
        if let Some(size) = env_override::<u32>("CUBECL_LAYERNORM_MIN_GROUP_SIZE") {
            self.min_group_size = size;
        }
        if let Some(width) = env_override::<u32>("CUBECL_LAYERNORM_VECTOR_WIDTH") {
            self.vector_width = width;
        }
        if let Some(limit) = env_override::<u32>("CUBECL_LAYERNORM_SCALAR_LIMIT") {
            self.scalar_limit = limit;
        }

        self
    }

    /// Check the settings can produce a valid launch.
    pub fn validate(&self) -> Result<(), LayerNormError> {
        let invalid = |reason: String| Err(LayerNormError::InvalidSettings(reason));

        if !self.epsilon.is_finite() || self.epsilon < 0.0 {
            return invalid(format!(
                "epsilon must be finite and non-negative, got {}",
                self.epsilon
            ));
        }
        if !self.max_group_size.is_power_of_two() {
            return invalid(format!(
                "max_group_size must be a power of two, got {}",
                self.max_group_size
            ));
        }
        if !self.min_group_size.is_power_of_two() || self.min_group_size > self.max_group_size {
            return invalid(format!(
                "min_group_size must be a power of two no larger than max_group_size ({}), got {}",
                self.max_group_size, self.min_group_size
            ));
        }
        if !is_valid_line_size(self.vector_width) {
            return invalid(format!(
                "vector_width must be a power of two no larger than {MAX_LINE_SIZE}, got {}",
                self.vector_width
            ));
        }

        Ok(())
    }
}

fn env_override<T: core::str::FromStr>(name: &str) -> Option<T> {
    let value = std::env::var(name).ok()?;
    match value.parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            log::warn!("Ignoring {name}={value}: can't be parsed");
            None
        }
    }
}
