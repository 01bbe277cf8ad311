//! Prover configuration

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::matcher::DuplicatePolicy;

/// Environment variable overriding the circuit build directory
pub const BUILD_DIR_ENV: &str = "NFC_ZK_BUILD_DIR";

/// Build directory used when nothing else is configured
pub const DEFAULT_BUILD_DIR: &str = "./circuits/build";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZkConfig {
    /// Directory holding the per-circuit assets
    #[serde(default = "default_build_dir")]
    pub build_dir: PathBuf,
    #[serde(default)]
    pub duplicate_policy: DuplicatePolicy,
    /// Prove independent conditions concurrently
    #[serde(default = "default_parallel")]
    pub parallel: bool,
}

fn default_build_dir() -> PathBuf {
    PathBuf::from(DEFAULT_BUILD_DIR)
}

fn default_parallel() -> bool {
    cfg!(feature = "parallel")
}

impl Default for ZkConfig {
    fn default() -> Self {
        Self {
            build_dir: default_build_dir(),
            duplicate_policy: DuplicatePolicy::default(),
            parallel: default_parallel(),
        }
    }
}

impl ZkConfig {
    /// Load from a JSON file; missing keys take their defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading configuration from: {}", path.display());
        Ok(serde_json::from_str(&fs::read_to_string(path)?)?)
    }

    /// Defaults, with the build directory taken from `NFC_ZK_BUILD_DIR` if set
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(dir) = std::env::var_os(BUILD_DIR_ENV).filter(|dir| !dir.is_empty()) {
            config.build_dir = PathBuf::from(dir);
        }
        config
    }
}
