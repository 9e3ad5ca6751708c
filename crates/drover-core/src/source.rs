//! Source identity and version algebra
//!
//! Every piece of software Drover manages is identified by where its code
//! lives: a repository URL plus an offset directory within that repository
//! (`SourceLocation`), optionally pinned to an exact semver snapshot
//! (`SourceId`). A `ManifestId` adds a flavor so two manifests may share a
//! location.
//!
//! The string form is `repo[,version][,dir]`. The comma delimiter can be
//! overridden by starting the string with any non-ASCII-letter character,
//! which is then consumed and used as the delimiter for the rest:
//! `:github.com/a/b:1.0.0:server`. Inputs are NFC-normalized before
//! parsing; formatting always uses the comma.

use std::fmt;

use semver::Version;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use unicode_normalization::UnicodeNormalization;

use crate::error::{CoreError, Result};

/// Delimiter used when formatting, and when parsing strings that start
/// with an ASCII letter.
pub const DEFAULT_DELIMITER: char = ',';

/// Separator between a manifest's source location and its flavor.
const FLAVOR_SEPARATOR: char = '~';

/// The identity of a codebase: a repository plus a directory within it.
///
/// An empty `dir` means the repository root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct SourceLocation {
    pub repo: String,
    pub dir: String,
}

/// A `SourceLocation` pinned to an exact version.
///
/// The build-metadata segment of the version is the revision identifier.
/// It takes no part in version precedence but two `SourceId`s with
/// different build metadata are not equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceId {
    pub location: SourceLocation,
    pub version: Version,
}

/// Identifies a logical piece of software: a location plus an optional
/// flavor. String form: `repo[,dir][~flavor]`.
///
/// Because `~` separates the flavor, it cannot serve as a custom leading
/// delimiter in a manifest id string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ManifestId {
    pub source: SourceLocation,
    pub flavor: String,
}

/// Result of the generic parse entry point: either kind of source name.
#[derive(Debug, Clone, PartialEq)]
pub enum EntityName {
    Location(SourceLocation),
    Id(SourceId),
}

/// NFC-normalize, detect the delimiter, and split into chunks.
fn chunks_of(input: &str) -> Result<Vec<String>> {
    let normalized: String = input.nfc().collect();
    let mut chars = normalized.chars();
    let first = chars.next().ok_or_else(|| CoreError::MissingRepo {
        input: input.to_string(),
    })?;
    let (delim, rest) = if first.is_ascii_alphabetic() {
        (DEFAULT_DELIMITER, normalized.as_str())
    } else {
        (first, chars.as_str())
    };
    Ok(rest.split(delim).map(str::to_string).collect())
}

impl SourceLocation {
    pub fn new(repo: impl Into<String>, dir: impl Into<String>) -> Self {
        Self {
            repo: repo.into(),
            dir: dir.into(),
        }
    }

    /// Parse `repo[,dir]`. Three chunks mean the caller passed a versioned
    /// name where a plain location was expected.
    pub fn parse(input: &str) -> Result<Self> {
        let chunks = chunks_of(input)?;
        Self::from_chunks(input, &chunks)
    }

    fn from_chunks(input: &str, chunks: &[String]) -> Result<Self> {
        if chunks.len() > 2 {
            return Err(CoreError::IncludesVersion {
                input: input.to_string(),
            });
        }
        if chunks[0].is_empty() {
            return Err(CoreError::MissingRepo {
                input: input.to_string(),
            });
        }
        Ok(Self {
            repo: chunks[0].clone(),
            dir: chunks.get(1).cloned().unwrap_or_default(),
        })
    }

    /// Pin this location to a version.
    pub fn at_version(&self, version: Version) -> SourceId {
        SourceId {
            location: self.clone(),
            version,
        }
    }
}

impl SourceId {
    pub fn new(repo: impl Into<String>, dir: impl Into<String>, version: Version) -> Self {
        Self {
            location: SourceLocation::new(repo, dir),
            version,
        }
    }

    /// Parse `repo,version[,dir]`.
    pub fn parse(input: &str) -> Result<Self> {
        let chunks = chunks_of(input)?;
        Self::from_chunks(input, &chunks)
    }

    fn from_chunks(input: &str, chunks: &[String]) -> Result<Self> {
        if chunks[0].is_empty() {
            return Err(CoreError::MissingRepo {
                input: input.to_string(),
            });
        }
        if chunks.len() < 2 {
            return Err(CoreError::MissingVersion {
                input: input.to_string(),
                repo: chunks[0].clone(),
            });
        }
        Ok(Self {
            location: SourceLocation {
                repo: chunks[0].clone(),
                dir: chunks.get(2).cloned().unwrap_or_default(),
            },
            version: Version::parse(&chunks[1])?,
        })
    }

    /// The revision identifier carried in the version's build metadata.
    pub fn revision_id(&self) -> &str {
        self.version.build.as_str()
    }

    /// `major.minor.patch[-pre]`, without build metadata. Suitable as an
    /// image tag.
    pub fn tag_name(&self) -> String {
        let mut tag = format!(
            "{}.{}.{}",
            self.version.major, self.version.minor, self.version.patch
        );
        if !self.version.pre.is_empty() {
            tag.push('-');
            tag.push_str(self.version.pre.as_str());
        }
        tag
    }

    /// Precedence comparison per semver 2.0: build metadata is ignored.
    pub fn version_precedence(&self, other: &SourceId) -> std::cmp::Ordering {
        self.version.cmp_precedence(&other.version)
    }
}

impl Default for SourceId {
    fn default() -> Self {
        Self {
            location: SourceLocation::default(),
            version: Version::new(0, 0, 0),
        }
    }
}

impl ManifestId {
    pub fn new(source: SourceLocation, flavor: impl Into<String>) -> Self {
        Self {
            source,
            flavor: flavor.into(),
        }
    }

    /// Parse `repo[,dir][~flavor]`.
    pub fn parse(input: &str) -> Result<Self> {
        let normalized: String = input.nfc().collect();
        let (location, flavor) = match normalized.rsplit_once(FLAVOR_SEPARATOR) {
            Some((loc, flavor)) => (loc.to_string(), flavor.to_string()),
            None => (normalized, String::new()),
        };
        Ok(Self {
            source: SourceLocation::parse(&location)?,
            flavor,
        })
    }
}

/// Generic entry point: two chunks are a `SourceLocation`, three are a
/// `SourceId`, anything else cannot be named.
pub fn parse_entity(input: &str) -> Result<EntityName> {
    let chunks = chunks_of(input)?;
    match chunks.len() {
        2 => SourceLocation::from_chunks(input, &chunks).map(EntityName::Location),
        3 => SourceId::from_chunks(input, &chunks).map(EntityName::Id),
        n => Err(CoreError::AmbiguousName {
            input: input.to_string(),
            chunks: n,
        }),
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.dir.is_empty() {
            write!(f, "{}", self.repo)
        } else {
            write!(f, "{}{}{}", self.repo, DEFAULT_DELIMITER, self.dir)
        }
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.location.dir.is_empty() {
            write!(f, "{}{}{}", self.location.repo, DEFAULT_DELIMITER, self.version)
        } else {
            write!(
                f,
                "{}{}{}{}{}",
                self.location.repo, DEFAULT_DELIMITER, self.version, DEFAULT_DELIMITER, self.location.dir
            )
        }
    }
}

impl fmt::Display for ManifestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.flavor.is_empty() {
            write!(f, "{}", self.source)
        } else {
            write!(f, "{}{}{}", self.source, FLAVOR_SEPARATOR, self.flavor)
        }
    }
}

// The identities serialize through their string forms so manifests read
// naturally on disk, the same way versions do.

impl Serialize for SourceLocation {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for SourceLocation {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        SourceLocation::parse(&s).map_err(serde::de::Error::custom)
    }
}

impl Serialize for SourceId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for SourceId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        SourceId::parse(&s).map_err(serde::de::Error::custom)
    }
}

impl Serialize for ManifestId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ManifestId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        ManifestId::parse(&s).map_err(serde::de::Error::custom)
    }
}
