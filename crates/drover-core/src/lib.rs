//! Drover Core - Core types for the multi-cluster deployment reconciler
//!
//! This crate provides the foundational types used throughout Drover:
//! - `SourceLocation` / `SourceId` / `ManifestId`: the identity algebra
//! - `Manifest` / `DeploySpec`: the declarative deployment model (the GDM)
//! - `State`: the whole Global Deployment Manifest with cluster definitions
//! - `Deployment`: the flattened per-cluster projection consumed by the
//!   diff engine
//! - `expand`: the GDM-to-deployments expansion

pub mod source;
pub mod manifest;
pub mod deploy;
pub mod deployment;
pub mod state;
pub mod expand;
pub mod error;

pub use source::{EntityName, ManifestId, SourceId, SourceLocation, parse_entity};
pub use manifest::{Manifest, ManifestKind, Manifests, SpecDefaults};
pub use deploy::{DeployConfig, DeploySpec, Volume, VolumeMode};
pub use deployment::{
    ArtifactKind, BuildArtifact, Deployable, DeployablePair, Deployment, DeploymentId,
    DeploymentPair, Deployments,
};
pub use state::{Cluster, Defs, State, User};
pub use expand::expand;
pub use error::CoreError;
