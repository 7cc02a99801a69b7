//! Versioned `KubeOneCluster` manifests and their conversion from and into the
//! canonical [`KubeOneCluster`] model.
//!
//! Every supported schema revision lives in its own module and implements
//! [`ManifestRevision`]. The [`Revision`] registry selects the revision based
//! on the `apiVersion`/`kind` pair of a document before anything else is
//! decoded, unknown pairs are rejected right away.
//!
//! ```
//! use kubeone_api::manifest::{self, Revision};
//!
//! let cluster = manifest::from_yaml(
//!     "apiVersion: kubeone.k8c.io/v1beta2\nkind: KubeOneCluster\ncloudProvider:\n  hetzner: {}\n",
//! )
//! .expect("manifest must convert");
//!
//! let yaml = manifest::to_yaml(&cluster, Revision::V1Beta1).expect("cluster must convert");
//! assert!(yaml.contains("apiVersion: kubeone.k8c.io/v1beta1"));
//! ```
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use snafu::{ResultExt, Snafu, ensure};
use strum::{Display, EnumIter, EnumString};
use tracing::instrument;

use crate::{
    api::KubeOneCluster,
    yaml::{self, SerializeOptions},
};

mod one_of;
pub mod v1alpha1;
pub mod v1beta1;
pub mod v1beta2;

use one_of::OneOf;

/// The API group shared by all revisions.
pub const API_GROUP: &str = "kubeone.k8c.io";

/// The only kind this crate converts.
pub const KIND: &str = "KubeOneCluster";

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to read apiVersion and kind of the manifest"))]
    ParseTypeMeta { source: serde_yaml::Error },

    #[snafu(display("the manifest has kind {kind:?}, but only {KIND:?} is supported"))]
    UnsupportedKind { kind: String },

    #[snafu(display(
        "the manifest has apiVersion {api_version:?}, which is not a known {API_GROUP} revision"
    ))]
    UnsupportedApiVersion { api_version: String },

    #[snafu(display("failed to decode {revision} manifest"))]
    DeserializeManifest {
        source: serde_yaml::Error,
        revision: Revision,
    },

    #[snafu(display("failed to write {revision} manifest"))]
    SerializeManifest {
        source: yaml::Error,
        revision: Revision,
    },

    #[snafu(display("exactly one of {choices} must be set in {field}, but none is"))]
    NoVariantSelected {
        field: &'static str,
        choices: String,
    },

    #[snafu(display("only one of {variants:?} may be set in {field}"))]
    MultipleVariantsSelected {
        field: &'static str,
        variants: Vec<&'static str>,
    },

    #[snafu(display("{name:?} is not a valid value for {field}, expected one of {choices}"))]
    UnknownVariantName {
        field: &'static str,
        name: String,
        choices: String,
    },

    #[snafu(display("{field} {variant:?} cannot be expressed in a {revision} manifest"))]
    UnsupportedVariant {
        field: &'static str,
        variant: String,
        revision: Revision,
    },

    #[snafu(display(
        "host {host:?} uses custom taints, which cannot be expressed in a {revision} manifest"
    ))]
    UnsupportedTaints { host: String, revision: Revision },

    #[snafu(display(
        "{field} is set to a non-default value, which cannot be expressed in a {revision} manifest"
    ))]
    UnrepresentableField {
        field: &'static str,
        revision: Revision,
    },
}

/// The `apiVersion` and `kind` of a manifest, which together select the
/// [`Revision`] used to decode the rest of the document.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct TypeMeta {
    pub api_version: String,
    pub kind: String,
}

impl TypeMeta {
    /// Reads only the discriminator pair, every other key of the document is
    /// ignored at this stage.
    pub fn from_yaml(input: &str) -> Result<Self> {
        serde_yaml::from_str(input).context(ParseTypeMetaSnafu)
    }
}

/// The registry of supported schema revisions.
#[derive(Clone, Copy, Debug, Default, Display, EnumIter, EnumString, Eq, Hash, PartialEq)]
pub enum Revision {
    #[strum(serialize = "v1alpha1")]
    V1Alpha1,

    #[strum(serialize = "v1beta1")]
    V1Beta1,

    #[default]
    #[strum(serialize = "v1beta2")]
    V1Beta2,
}

impl Revision {
    /// The full `apiVersion`, for example `kubeone.k8c.io/v1beta2`.
    pub fn api_version(self) -> String {
        format!("{API_GROUP}/{self}")
    }

    /// Looks up the revision registered for the given discriminator pair.
    pub fn from_type_meta(type_meta: &TypeMeta) -> Result<Self> {
        ensure!(
            type_meta.kind == KIND,
            UnsupportedKindSnafu {
                kind: &type_meta.kind
            }
        );

        type_meta
            .api_version
            .split_once('/')
            .filter(|(group, _)| *group == API_GROUP)
            .and_then(|(_, version)| version.parse().ok())
            .ok_or_else(|| {
                UnsupportedApiVersionSnafu {
                    api_version: &type_meta.api_version,
                }
                .build()
            })
    }

    /// Decodes `input` as a manifest of this revision and converts it into the
    /// canonical model.
    pub fn to_canonical(self, input: &str) -> Result<KubeOneCluster> {
        match self {
            Self::V1Alpha1 => decode::<v1alpha1::KubeOneCluster>(input),
            Self::V1Beta1 => decode::<v1beta1::KubeOneCluster>(input),
            Self::V1Beta2 => decode::<v1beta2::KubeOneCluster>(input),
        }
    }

    /// Converts the canonical model into a manifest of this revision and
    /// writes it as YAML.
    pub fn from_canonical(self, cluster: &KubeOneCluster) -> Result<String> {
        match self {
            Self::V1Alpha1 => encode::<v1alpha1::KubeOneCluster>(cluster),
            Self::V1Beta1 => encode::<v1beta1::KubeOneCluster>(cluster),
            Self::V1Beta2 => encode::<v1beta2::KubeOneCluster>(cluster),
        }
    }
}

/// A schema revision of the `KubeOneCluster` manifest.
///
/// Implementors are the top-level manifest types of each revision. Both
/// directions must be free of side effects, conversions never consult the
/// environment.
pub trait ManifestRevision: Serialize + DeserializeOwned {
    const REVISION: Revision;

    /// Converts the manifest into the canonical model. Fields which moved in
    /// later revisions are migrated here.
    fn into_canonical(self) -> Result<KubeOneCluster>;

    /// Converts the canonical model into a manifest of this revision. State
    /// which cannot be expressed losslessly is rejected.
    fn from_canonical(cluster: &KubeOneCluster) -> Result<Self>;
}

/// Converts a YAML manifest of any supported revision into the canonical model.
#[instrument(skip(input))]
pub fn from_yaml(input: &str) -> Result<KubeOneCluster> {
    let type_meta = TypeMeta::from_yaml(input)?;
    let revision = Revision::from_type_meta(&type_meta)?;
    tracing::debug!(%revision, "Converting manifest into the canonical model");

    revision.to_canonical(input)
}

/// Converts the canonical model into a YAML manifest of the given revision.
#[instrument(skip(cluster))]
pub fn to_yaml(cluster: &KubeOneCluster, revision: Revision) -> Result<String> {
    revision.from_canonical(cluster)
}

fn decode<M: ManifestRevision>(input: &str) -> Result<KubeOneCluster> {
    let manifest: M = serde_yaml::from_str(input).context(DeserializeManifestSnafu {
        revision: M::REVISION,
    })?;

    manifest.into_canonical()
}

fn encode<M: ManifestRevision>(cluster: &KubeOneCluster) -> Result<String> {
    let manifest = M::from_canonical(cluster)?;

    yaml::to_string(&manifest, &SerializeOptions::default()).context(SerializeManifestSnafu {
        revision: M::REVISION,
    })
}

/// Rejects canonical state that a revision has no field for, unless the state
/// is unset or equal to what defaulting would produce anyway.
fn ensure_representable<T: PartialEq>(
    value: Option<&T>,
    default: &T,
    field: &'static str,
    revision: Revision,
) -> Result<()> {
    ensure!(
        value.is_none_or(|value| value == default),
        UnrepresentableFieldSnafu { field, revision }
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn type_meta(api_version: &str, kind: &str) -> TypeMeta {
        TypeMeta {
            api_version: api_version.to_owned(),
            kind: kind.to_owned(),
        }
    }

    #[rstest]
    #[case("kubeone.k8c.io/v1alpha1", Revision::V1Alpha1)]
    #[case("kubeone.k8c.io/v1beta1", Revision::V1Beta1)]
    #[case("kubeone.k8c.io/v1beta2", Revision::V1Beta2)]
    fn known_revisions(#[case] api_version: &str, #[case] expected: Revision) {
        let revision = Revision::from_type_meta(&type_meta(api_version, KIND))
            .expect("revision must be registered");
        assert_eq!(revision, expected);
        assert_eq!(revision.api_version(), api_version);
    }

    #[rstest]
    #[case("kubeone.k8c.io/v1beta3")]
    #[case("kubeone.io/v1beta2")]
    #[case("v1beta2")]
    #[case("")]
    fn unknown_revisions(#[case] api_version: &str) {
        let err = Revision::from_type_meta(&type_meta(api_version, KIND))
            .expect_err("revision must not be registered");
        assert!(matches!(err, Error::UnsupportedApiVersion { .. }));
    }

    #[test]
    fn unknown_kind() {
        let err = Revision::from_type_meta(&type_meta("kubeone.k8c.io/v1beta2", "Cluster"))
            .expect_err("kind must be rejected");
        assert!(matches!(err, Error::UnsupportedKind { kind } if kind == "Cluster"));
    }

    #[test]
    fn unknown_revision_rejected_before_decoding() {
        // The body would not decode in any revision, the discriminator check
        // has to fail first.
        let err = from_yaml("apiVersion: kubeone.k8c.io/v2\nkind: KubeOneCluster\nhosts: 42\n")
            .expect_err("manifest must be rejected");
        assert!(matches!(err, Error::UnsupportedApiVersion { .. }));
    }

    #[test]
    fn representable_when_unset_or_default() {
        ensure_representable(None, &3, "replicas", Revision::V1Alpha1)
            .expect("unset value is representable");
        ensure_representable(Some(&3), &3, "replicas", Revision::V1Alpha1)
            .expect("default value is representable");
        ensure_representable(Some(&4), &3, "replicas", Revision::V1Alpha1)
            .expect_err("custom value is not representable");
    }
}
