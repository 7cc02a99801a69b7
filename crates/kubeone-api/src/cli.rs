//! Command line options for tools running the normalization pipeline.
//!
//! ```
//! use clap::Parser;
//! use kubeone_api::cli::NormalizeOptions;
//!
//! #[derive(clap::Parser)]
//! #[command(name = "kubeone-normalize", author, version)]
//! struct Opts {
//!     #[command(flatten)]
//!     normalize: NormalizeOptions,
//! }
//!
//! let opts = Opts::parse_from(["kubeone-normalize", "--manifest", "kubeone.yaml"]);
//! assert_eq!(opts.normalize.manifest.to_str(), Some("kubeone.yaml"));
//! ```
use std::path::PathBuf;

use clap::Args;

use crate::{
    credentials::CredentialsType,
    logging::{self, LogFormat},
    manifest::Revision,
};

/// The environment variable holding the log filter directives.
pub const LOG_ENV: &str = "KUBEONE_LOG";

#[derive(Debug, PartialEq, Eq, Args)]
pub struct NormalizeOptions {
    /// Path to the KubeOneCluster manifest
    #[arg(long, short = 'm', value_name = "FILE", env = "KUBEONE_MANIFEST")]
    pub manifest: PathBuf,

    /// Path to the infrastructure discovery document, the output of `terraform output -json`
    ///
    /// Files ending in `.yaml` or `.yml` are read as YAML, everything else as JSON.
    #[arg(long, short = 't', value_name = "FILE", env = "KUBEONE_TFJSON")]
    pub tfjson: Option<PathBuf>,

    /// Path to a YAML file with cloud provider credentials
    #[arg(long, short = 'c', value_name = "FILE", env = "KUBEONE_CREDENTIALS")]
    pub credentials: Option<PathBuf>,

    /// The consumer to resolve credentials for
    #[arg(long, env = "KUBEONE_CREDENTIALS_TYPE", value_enum, default_value_t)]
    pub credentials_type: CredentialsType,

    /// Schema revision of the normalized manifest
    #[arg(long, env = "KUBEONE_OUTPUT_REVISION", default_value_t)]
    pub output_revision: Revision,

    /// Format of the log output
    #[arg(long, env = "KUBEONE_LOG_FORMAT", value_enum, default_value_t)]
    pub log_format: LogFormat,
}

impl NormalizeOptions {
    /// Installs the global subscriber in the selected [`LogFormat`], filtered
    /// by the `KUBEONE_LOG` environment variable.
    pub fn initialize_logging(&self, app_name: &str) -> Result<(), logging::Error> {
        logging::initialize_logging(LOG_ENV, app_name, self.log_format)
    }
}
