//! The normalization pipeline: conversion, infrastructure merge, defaulting
//! and validation, in this order.
use std::{
    fs,
    path::{Path, PathBuf},
};

use snafu::{ResultExt, Snafu};
use tracing::{info, instrument};

#[cfg(feature = "clap")]
use crate::cli::NormalizeOptions;
use crate::{
    api::KubeOneCluster,
    credentials::{self, Credentials},
    defaults::apply_defaults,
    infra::{self, InfraDocument},
    manifest, validation,
};

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to read the manifest {path:?}"))]
    ReadManifest {
        source: std::io::Error,
        path: PathBuf,
    },

    #[snafu(display("failed to read the discovery document {path:?}"))]
    ReadDiscoveryDocument {
        source: std::io::Error,
        path: PathBuf,
    },

    #[snafu(display("failed to load the discovery document {path:?}"))]
    ParseDiscoveryDocument { source: infra::Error, path: PathBuf },

    #[snafu(display("failed to convert the manifest"))]
    ConvertManifest { source: manifest::Error },

    #[snafu(display("failed to merge the discovered infrastructure state"))]
    MergeInfrastructureState { source: infra::Error },

    #[snafu(display("the normalized configuration is invalid"))]
    ValidateCluster { source: validation::Errors },

    #[snafu(display("failed to resolve the cloud provider credentials"))]
    ResolveCredentials { source: credentials::Error },

    #[snafu(display("failed to write the normalized manifest"))]
    WriteManifest { source: manifest::Error },
}

/// Everything a run of the pipeline produces for a tool.
#[derive(Debug, PartialEq)]
pub struct Normalized {
    pub cluster: KubeOneCluster,

    /// The normalized cluster as a manifest of the requested revision.
    pub manifest: String,

    pub credentials: Credentials,
}

/// Normalizes the manifest given as YAML, optionally completed with a
/// discovery document.
#[instrument(skip_all)]
pub fn load(manifest: &str, document: Option<&InfraDocument>) -> Result<KubeOneCluster> {
    let mut cluster = manifest::from_yaml(manifest).context(ConvertManifestSnafu)?;

    if let Some(document) = document {
        infra::merge_infrastructure_state(&mut cluster, document)
            .context(MergeInfrastructureStateSnafu)?;
    }

    apply_defaults(&mut cluster);
    validation::validate_cluster(&cluster).context(ValidateClusterSnafu)?;

    info!(
        cluster.name = %cluster.name,
        hosts = cluster.hosts().count(),
        "Cluster configuration normalized"
    );
    Ok(cluster)
}

/// Like [`load`], but reads the manifest and the discovery document from
/// disk.
#[instrument]
pub fn load_from_files(manifest: &Path, document: Option<&Path>) -> Result<KubeOneCluster> {
    let input = fs::read_to_string(manifest).context(ReadManifestSnafu { path: manifest })?;
    let document = document.map(read_discovery_document).transpose()?;

    load(&input, document.as_ref())
}

/// Runs the pipeline as configured on the command line: the normalized
/// cluster is written in the requested revision and the credentials of its
/// cloud provider are resolved.
#[cfg(feature = "clap")]
#[instrument(skip(options))]
pub fn load_from_options(options: &NormalizeOptions) -> Result<Normalized> {
    let cluster = load_from_files(&options.manifest, options.tfjson.as_deref())?;
    let manifest =
        manifest::to_yaml(&cluster, options.output_revision).context(WriteManifestSnafu)?;
    let credentials = credentials::resolve(
        &cluster.cloud_provider.provider,
        options.credentials.as_deref(),
        options.credentials_type,
    )
    .context(ResolveCredentialsSnafu)?;

    Ok(Normalized {
        cluster,
        manifest,
        credentials,
    })
}

fn read_discovery_document(path: &Path) -> Result<InfraDocument> {
    let input = fs::read_to_string(path).context(ReadDiscoveryDocumentSnafu { path })?;
    let is_yaml = path
        .extension()
        .is_some_and(|extension| extension == "yaml" || extension == "yml");

    let document = if is_yaml {
        InfraDocument::from_yaml(&input)
    } else {
        InfraDocument::from_json(&input)
    };
    document.context(ParseDiscoveryDocumentSnafu { path })
}
