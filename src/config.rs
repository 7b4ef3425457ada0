//! Typed block configurations.
//!
//! Every block and stage has its own `serde` struct. Configurations are parsed
//! from a `serde_json::Value` mapping through [`BlockConfig::from_value`],
//! which reports missing mandatory keys by name before deserializing and
//! runs the type's own validation afterwards.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("'{block}': missing mandatory key '{key}'")]
    MissingKey {
        block: &'static str,
        key: &'static str,
    },

    #[error("'{block}': invalid configuration: {source}")]
    InvalidValue {
        block: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("len of {first} ({first_len}) and {second} ({second_len}) do not match")]
    LengthMismatch {
        first: &'static str,
        first_len: usize,
        second: &'static str,
        second_len: usize,
    },

    #[error("'{block}': filters must not be empty")]
    EmptyFilters { block: &'static str },

    #[error("'{block}': {reason}")]
    InvalidParameter { block: &'static str, reason: String },

    #[error("'{0}': configuration must be a mapping")]
    NotAMapping(&'static str),

    #[error("Unknown block '{0}'")]
    UnknownBlock(String),
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// A stride or pool size given either as a scalar (`2`) or a pair (`[2, 1]`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Pair {
    Scalar(usize),
    Tuple(usize, usize),
}

impl Pair {
    /// Normalized `(rows, cols)` form.
    pub fn dims(self) -> (usize, usize) {
        match self {
            Pair::Scalar(v) => (v, v),
            Pair::Tuple(a, b) => (a, b),
        }
    }

    pub fn is_unit(self) -> bool {
        self.dims() == (1, 1)
    }

    pub(crate) fn check_nonzero(self, block: &'static str, what: &str) -> ConfigResult<()> {
        let (a, b) = self.dims();
        if a == 0 || b == 0 {
            return Err(ConfigError::InvalidParameter {
                block,
                reason: format!("{what} must be positive, got {self:?}"),
            });
        }
        Ok(())
    }
}

impl Default for Pair {
    fn default() -> Self {
        Pair::Scalar(1)
    }
}

impl From<usize> for Pair {
    fn from(v: usize) -> Self {
        Pair::Scalar(v)
    }
}

impl From<(usize, usize)> for Pair {
    fn from((a, b): (usize, usize)) -> Self {
        Pair::Tuple(a, b)
    }
}

/// A configuration type that can be read from a JSON-like mapping.
pub trait BlockConfig: DeserializeOwned {
    /// Block name used in error messages.
    const NAME: &'static str;
    /// Keys that must be present in the mapping.
    const REQUIRED: &'static [&'static str];

    /// Checks constraints serde cannot express.
    fn validate(&self, block: &'static str) -> ConfigResult<()>;

    fn from_value(value: &Value) -> ConfigResult<Self> {
        Self::from_named_value(Self::NAME, value)
    }

    /// Same as [`from_value`](Self::from_value), reporting errors under `block`.
    /// Used when one configuration type serves several blocks.
    fn from_named_value(block: &'static str, value: &Value) -> ConfigResult<Self> {
        let map = value.as_object().ok_or(ConfigError::NotAMapping(block))?;
        if let Some(key) = Self::REQUIRED.iter().find(|key| !map.contains_key(**key)) {
            return Err(ConfigError::MissingKey { block, key: *key });
        }
        let config: Self = serde_json::from_value(value.clone())
            .map_err(|source| ConfigError::InvalidValue { block, source })?;
        config.validate(block)?;
        Ok(config)
    }
}

pub(crate) fn check_positive(block: &'static str, what: &str, value: usize) -> ConfigResult<()> {
    if value == 0 {
        return Err(ConfigError::InvalidParameter {
            block,
            reason: format!("{what} must be positive"),
        });
    }
    Ok(())
}

pub(crate) fn check_rate(block: &'static str, rate: f32) -> ConfigResult<()> {
    if !(0.0..1.0).contains(&rate) {
        return Err(ConfigError::InvalidParameter {
            block,
            reason: format!("dropout_rate must be in [0, 1), got {rate}"),
        });
    }
    Ok(())
}
