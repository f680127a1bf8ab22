//! Harness configuration: describes the simulated host and output formatting.
//!
//! ```toml
//! [host]
//! memory_limit = 1048576
//! functions = ["add_notification"]
//!
//! [host.faults]
//! fail_allocation_at = 2
//! fail_calls = false
//!
//! [output]
//! pretty = false
//! ```
//!
//! Every field is optional; an empty file yields [`HarnessConfig::default`].

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use finplug_core::host::memory::DEFAULT_MEMORY_LIMIT;
use finplug_core::host::FaultPlan;
use finplug_core::notify::ADD_NOTIFICATION_FN;
use finplug_core::MemoryHost;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    pub host: HostConfig,
    pub output: OutputConfig,
}

impl HarnessConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }
}

/// The simulated host a plugin runs against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Bytes of linear memory available for staging.
    pub memory_limit: u64,
    /// Host functions the plugin may resolve by name.
    pub functions: Vec<String>,
    pub faults: FaultConfig,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            memory_limit: DEFAULT_MEMORY_LIMIT,
            functions: vec![ADD_NOTIFICATION_FN.to_string()],
            faults: FaultConfig::default(),
        }
    }
}

impl HostConfig {
    /// A fresh host with `input` as the invocation envelope.
    pub fn build_host(&self, input: impl Into<Vec<u8>>) -> MemoryHost {
        MemoryHost::new(input)
            .with_memory_limit(self.memory_limit)
            .with_functions(self.functions.iter().cloned())
            .with_faults(self.faults.to_plan())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FaultConfig {
    /// Fail the N-th allocation (1-based).
    pub fail_allocation_at: Option<usize>,
    pub fail_calls: bool,
}

impl FaultConfig {
    pub fn to_plan(&self) -> FaultPlan {
        FaultPlan {
            fail_allocation_at: self.fail_allocation_at,
            fail_calls: self.fail_calls,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Pretty-print JSON produced by the reference plugins.
    pub pretty: bool,
}
