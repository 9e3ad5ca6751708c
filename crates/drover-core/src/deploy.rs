//! Per-cluster deployment intent and configuration

use std::fmt;

use indexmap::IndexMap;
use semver::Version;
use serde::{Deserialize, Serialize};

/// Per-cluster intent inside a `Manifest`: which version runs there, with
/// what configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploySpec {
    pub version: Version,

    /// A guide to the number of instances; the scheduler may briefly run
    /// more or fewer while converging.
    #[serde(default = "default_instances")]
    pub num_instances: u32,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub resources: IndexMap<String, String>,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub env: IndexMap<String, String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<Volume>,
}

fn default_instances() -> u32 {
    1
}

impl Default for DeploySpec {
    fn default() -> Self {
        Self {
            version: Version::new(0, 0, 0),
            num_instances: default_instances(),
            resources: IndexMap::new(),
            env: IndexMap::new(),
            volumes: Vec::new(),
        }
    }
}

/// The fully merged configuration carried by a flattened `Deployment`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployConfig {
    pub num_instances: u32,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub resources: IndexMap<String, String>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub env: IndexMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<Volume>,
}

/// A host/container mount. Order within a spec is significant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Volume {
    pub host: String,
    pub container: String,
    pub mode: VolumeMode,
}

impl Volume {
    pub fn new(host: impl Into<String>, container: impl Into<String>, mode: VolumeMode) -> Self {
        Self {
            host: host.into(),
            container: container.into(),
            mode,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VolumeMode {
    #[default]
    Ro,
    Rw,
}

impl fmt::Display for VolumeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VolumeMode::Ro => write!(f, "RO"),
            VolumeMode::Rw => write!(f, "RW"),
        }
    }
}
