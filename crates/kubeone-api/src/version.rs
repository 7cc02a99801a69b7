//! Kubernetes release versions, as used in the `versions.kubernetes` field.
//!
//! Manifests carry the version as a free-form string. Several defaulting
//! decisions (control plane taints, external cloud controller managers) depend
//! on the minor version, so the string is parsed into a [`KubernetesVersion`]
//! wherever such a decision is made.
use std::{cmp::Ordering, fmt::Display, str::FromStr};

use snafu::{ResultExt, Snafu, ensure};

#[derive(Debug, Snafu)]
pub enum ParseKubernetesVersionError {
    #[snafu(display("Kubernetes version must not be empty"))]
    Empty,

    #[snafu(display("failed to parse {input:?} as semantic version"))]
    ParseSemanticVersion {
        source: semver::Error,
        input: String,
    },
}

/// A Kubernetes release version with the `(v)<MAJOR>.<MINOR>.<PATCH>` format,
/// for example `1.29.3` or `v1.30.0`.
///
/// The leading `v` is accepted but not preserved, [`Display`] always renders
/// the version without it.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct KubernetesVersion(semver::Version);

impl FromStr for KubernetesVersion {
    type Err = ParseKubernetesVersionError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let trimmed = input.trim();
        ensure!(!trimmed.is_empty(), EmptySnafu);

        let version = semver::Version::parse(trimmed.strip_prefix('v').unwrap_or(trimmed))
            .context(ParseSemanticVersionSnafu { input })?;

        Ok(Self(version))
    }
}

impl Display for KubernetesVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl PartialOrd for KubernetesVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for KubernetesVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

impl KubernetesVersion {
    pub fn major(&self) -> u64 {
        self.0.major
    }

    pub fn minor(&self) -> u64 {
        self.0.minor
    }

    /// Returns `true` if this version is `<major>.<minor>` or any later
    /// release. Patch levels and pre-releases of that minor version count as
    /// the minor version itself.
    pub fn is_at_least(&self, major: u64, minor: u64) -> bool {
        (self.0.major, self.0.minor) >= (major, minor)
    }
}
