//! Core error types

use thiserror::Error;

use crate::source::ManifestId;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("no repository found in {input:?}")]
    MissingRepo { input: String },

    #[error("no version found in {input:?} (did find repo: {repo:?})")]
    MissingVersion { input: String, repo: String },

    #[error("three parts found (includes a version?) in a source location: {input:?}")]
    IncludesVersion { input: String },

    #[error("cannot parse {input:?}: divides into {chunks} chunk(s)")]
    AmbiguousName { input: String, chunks: usize },

    #[error("invalid version: {0}")]
    Version(#[from] semver::Error),

    #[error("manifest {0} is already defined")]
    DuplicateManifest(ManifestId),

    #[error("cluster {0:?} is not described in defs.yaml")]
    UnknownCluster(String),

    #[error("invalid manifest: {0}")]
    InvalidManifest(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;
