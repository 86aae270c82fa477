//! Settings of an estimation run, read from a TOML file.
//!
//! Every field is optional in the file; missing fields take the defaults in
//! [`crate::consts`].
//!
//! ```toml
//! k = 3
//! d = 2
//! max_iter = 50
//! min_group_size = 5
//! seed = 1337
//! dump_path = "traffic.dump"
//! ```
use crate::consts::{
    DEFAULT_D, DEFAULT_K, DEFAULT_MAX_ITER, DEFAULT_MIN_GROUP_SIZE,
};
use crate::error::{Error, Result};
use crate::fit::EmConfig;
use crate::logging::LogFormat;
use serde::Deserialize;
use std::path::{Path, PathBuf};

fn default_k() -> usize {
    DEFAULT_K
}

fn default_d() -> usize {
    DEFAULT_D
}

fn default_max_iter() -> usize {
    DEFAULT_MAX_ITER
}

fn default_min_group_size() -> usize {
    DEFAULT_MIN_GROUP_SIZE
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EstimateConfig {
    /// Number of mixture components
    #[serde(default = "default_k")]
    pub k: usize,
    /// Dimension of every observation
    #[serde(default = "default_d")]
    pub d: usize,
    /// Maximum number of EM iterations
    #[serde(default = "default_max_iter")]
    pub max_iter: usize,
    /// Run exactly `max_iter` iterations, ignoring convergence
    #[serde(default)]
    pub fixed_iter: bool,
    /// Groups with fewer observations are discarded
    #[serde(default = "default_min_group_size")]
    pub min_group_size: usize,
    /// Seed of the initial parameter draw. Unseeded runs use entropy.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Read observations from this binary dump instead of text input
    #[serde(default)]
    pub dump_path: Option<PathBuf>,
    #[serde(default)]
    pub log_format: LogFormat,
}

impl Default for EstimateConfig {
    fn default() -> Self {
        EstimateConfig {
            k: DEFAULT_K,
            d: DEFAULT_D,
            max_iter: DEFAULT_MAX_ITER,
            fixed_iter: false,
            min_group_size: DEFAULT_MIN_GROUP_SIZE,
            seed: None,
            dump_path: None,
            log_format: LogFormat::Human,
        }
    }
}

impl EstimateConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: EstimateConfig = toml::from_str(text)
            .map_err(|err| Error::Config(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and validate a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|err| {
            Error::Config(format!("reading {}: {}", path.display(), err))
        })?;
        Self::from_toml_str(&text)
    }

    /// Reject settings no model can be built from
    pub fn validate(&self) -> Result<()> {
        if self.k == 0 {
            Err(Error::Config("k must be positive".into()))
        } else if self.d == 0 {
            Err(Error::Config("d must be positive".into()))
        } else {
            Ok(())
        }
    }

    /// Iteration settings for [`crate::fit::fit`]
    pub fn em_config(&self) -> EmConfig {
        EmConfig {
            max_iter: self.max_iter,
            fixed_iter: self.fixed_iter,
            ..EmConfig::default()
        }
    }
}
