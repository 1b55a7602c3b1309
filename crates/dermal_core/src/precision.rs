//! Weight precision selection.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Precision for stored model weights.
///
/// Half precision halves the artifact footprint at a small accuracy cost;
/// it maps to the record system's half-precision settings at load time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    /// Full precision (f32).
    Full,
    /// Half precision (f16).
    Half,
}

impl Precision {
    /// Bytes per weight element at this precision.
    #[must_use]
    pub const fn bytes_per_elem(&self) -> usize {
        match self {
            Self::Full => 4,
            Self::Half => 2,
        }
    }
}

impl Default for Precision {
    fn default() -> Self {
        Self::Full
    }
}

impl std::str::FromStr for Precision {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "full" | "f32" | "float32" => Ok(Self::Full),
            "half" | "f16" | "float16" | "mixed" => Ok(Self::Half),
            other => Err(CoreError::InvalidConfig(format!(
                "unknown precision '{other}' (expected full|half)"
            ))),
        }
    }
}
