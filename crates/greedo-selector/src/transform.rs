//! Distance transform applied to the quadratic distance D2
//!
//! ```text
//! transform(x) = α·√x + β·x,   α, β ∈ {0, 1}, not both 0
//! ```

use greedo_common::ConfigError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistanceTransform {
    linear: bool,
    quadratic: bool,
}

impl DistanceTransform {
    pub fn new(linear: bool, quadratic: bool) -> Result<Self, ConfigError> {
        if !linear && !quadratic {
            return Err(ConfigError::NoDistanceTransform);
        }
        Ok(Self { linear, quadratic })
    }

    /// √D2, the default
    pub fn linear() -> Self {
        Self {
            linear: true,
            quadratic: false,
        }
    }

    #[inline]
    pub fn apply(&self, d2: f64) -> f64 {
        let mut result = 0.0;
        if self.linear {
            result += d2.sqrt();
        }
        if self.quadratic {
            result += d2;
        }
        result
    }
}

impl Default for DistanceTransform {
    fn default() -> Self {
        Self::linear()
    }
}
