//! Resolves the credentials of the selected cloud provider from the
//! environment and an optional credentials file.
//!
//! Every component running in the cluster can get its own credentials: a
//! variable prefixed with `CCM_`, `MC_` or `OSM_` is preferred over the plain
//! one when resolving for the cloud controller manager, the machine-controller
//! or the operating-system-manager respectively.
//!
//! ```
//! use kubeone_api::{
//!     api::{CloudProvider, HetznerSpec},
//!     credentials::{CredentialsType, Source, resolve_from},
//! };
//!
//! let source = Source::new([
//!     ("HCLOUD_TOKEN".to_owned(), "shared".to_owned()),
//!     ("MC_HCLOUD_TOKEN".to_owned(), "workers-only".to_owned()),
//! ]);
//! let provider = CloudProvider::Hetzner(HetznerSpec::default());
//!
//! let credentials = resolve_from(&source, &provider, CredentialsType::MachineController).unwrap();
//! assert_eq!(credentials["HCLOUD_TOKEN"], "workers-only");
//! ```
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use base64::{Engine, engine::general_purpose::STANDARD};
use itertools::Itertools;
use snafu::{Snafu, ensure};
use strum::{Display, EnumIter, EnumString};
use tracing::{instrument, warn};

use crate::api::{CloudProvider, CloudProviderKind};

mod aws;
mod source;

pub use source::Source;

type Result<T, E = Error> = std::result::Result<T, E>;

/// The resolved variables, keyed by their plain (unprefixed) name.
pub type Credentials = BTreeMap<String, String>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to read the credentials file {path:?}"))]
    ReadCredentialsFile {
        source: std::io::Error,
        path: PathBuf,
    },

    #[snafu(display("failed to parse the credentials file {path:?}, expected a map of strings"))]
    ParseCredentialsFile {
        source: serde_yaml::Error,
        path: PathBuf,
    },

    #[snafu(display("failed to read the AWS shared credentials file {path:?}"))]
    ReadAwsSharedCredentials {
        source: std::io::Error,
        path: PathBuf,
    },

    #[snafu(display("the {provider} credentials are incomplete, missing {}", variables.join(", ")))]
    MissingVariables {
        provider: CloudProviderKind,
        variables: Vec<&'static str>,
    },

    #[snafu(display(
        "the {provider} credentials must use either {} or {}, not both",
        first.join(" + "),
        second.join(" + ")
    ))]
    ConflictingCredentials {
        provider: CloudProviderKind,
        first: Vec<&'static str>,
        second: Vec<&'static str>,
    },
}

/// The consumer the credentials are resolved for.
#[derive(Clone, Copy, Debug, Default, Display, EnumIter, EnumString, Eq, PartialEq)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[strum(serialize_all = "kebab-case")]
pub enum CredentialsType {
    #[default]
    Universal,
    Ccm,
    #[strum(to_string = "machine-controller", serialize = "mc")]
    #[cfg_attr(feature = "clap", value(alias = "mc"))]
    MachineController,
    #[strum(to_string = "operating-system-manager", serialize = "osm")]
    #[cfg_attr(feature = "clap", value(alias = "osm"))]
    OperatingSystemManager,
}

impl CredentialsType {
    /// The prefix of the variables scoped to this consumer.
    pub fn prefix(self) -> Option<&'static str> {
        match self {
            Self::Universal => None,
            Self::Ccm => Some("CCM"),
            Self::MachineController => Some("MC"),
            Self::OperatingSystemManager => Some("OSM"),
        }
    }
}

const AWS_ACCESS_KEY_ID: &str = "AWS_ACCESS_KEY_ID";
const AWS_SECRET_ACCESS_KEY: &str = "AWS_SECRET_ACCESS_KEY";

const AZURE: &[&str] = &[
    "ARM_CLIENT_ID",
    "ARM_CLIENT_SECRET",
    "ARM_TENANT_ID",
    "ARM_SUBSCRIPTION_ID",
];
const DIGITALOCEAN_TOKEN: &str = "DIGITALOCEAN_TOKEN";
const GOOGLE_CREDENTIALS: &str = "GOOGLE_CREDENTIALS";
const HCLOUD_TOKEN: &str = "HCLOUD_TOKEN";
const KUBEVIRT_KUBECONFIG: &str = "KUBEVIRT_KUBECONFIG";

const NUTANIX: &[&str] = &[
    "NUTANIX_ENDPOINT",
    "NUTANIX_PORT",
    "NUTANIX_USERNAME",
    "NUTANIX_PASSWORD",
    "NUTANIX_CLUSTER_NAME",
];
const NUTANIX_OPTIONAL: &[&str] = &[
    "NUTANIX_INSECURE",
    "NUTANIX_PROXY_URL",
    "NUTANIX_PE_ENDPOINT",
    "NUTANIX_PE_USERNAME",
    "NUTANIX_PE_PASSWORD",
];

const OPENSTACK: &[&str] = &["OS_AUTH_URL", "OS_REGION_NAME"];
const OPENSTACK_APPLICATION_CREDENTIALS: &[&str] = &[
    "OS_APPLICATION_CREDENTIAL_ID",
    "OS_APPLICATION_CREDENTIAL_SECRET",
];
const OPENSTACK_USER: &[&str] = &["OS_USERNAME", "OS_PASSWORD"];
const OPENSTACK_DOMAIN_NAME: &str = "OS_DOMAIN_NAME";
const OPENSTACK_TENANT: &[&str] = &["OS_TENANT_ID", "OS_TENANT_NAME"];
const OPENSTACK_TENANT_CHOICE: &str = "OS_TENANT_ID or OS_TENANT_NAME";

/// Current and legacy name of each Equinix Metal variable.
const EQUINIX_METAL: &[(&str, &str)] = &[
    ("METAL_AUTH_TOKEN", "PACKET_API_KEY"),
    ("METAL_PROJECT_ID", "PACKET_PROJECT_ID"),
];

const VSPHERE: &[&str] = &["VSPHERE_SERVER", "VSPHERE_USER", "VSPHERE_PASSWORD"];

const VCD: &[&str] = &["VCD_URL", "VCD_ORG", "VCD_VDC"];
const VCD_API_TOKEN: &[&str] = &["VCD_API_TOKEN"];
const VCD_USER: &[&str] = &["VCD_USER", "VCD_PASSWORD"];
const VCD_ALLOW_UNVERIFIED_SSL: &str = "VCD_ALLOW_UNVERIFIED_SSL";

/// Resolves the credentials of `provider` from the process environment and
/// the optional credentials file.
#[instrument(skip(provider), fields(provider = %provider.kind()))]
pub fn resolve(
    provider: &CloudProvider,
    credentials_file: Option<&Path>,
    credentials_type: CredentialsType,
) -> Result<Credentials> {
    let mut source = Source::from_environment();
    if let Some(path) = credentials_file {
        source = source.with_credentials_file(path)?;
    }

    resolve_from(&source, provider, credentials_type)
}

/// Resolves the credentials of `provider` from the given `source`.
pub fn resolve_from(
    source: &Source,
    provider: &CloudProvider,
    credentials_type: CredentialsType,
) -> Result<Credentials> {
    let mut resolver = Resolver {
        source,
        credentials_type,
        provider: provider.kind(),
        credentials: Credentials::new(),
    };

    match provider {
        CloudProvider::Aws(_) => resolver.aws()?,
        CloudProvider::Azure(_) => resolver.required(AZURE)?,
        CloudProvider::DigitalOcean(_) => resolver.required(&[DIGITALOCEAN_TOKEN])?,
        CloudProvider::Gce(_) => resolver.gce()?,
        CloudProvider::Hetzner(_) => resolver.required(&[HCLOUD_TOKEN])?,
        CloudProvider::Nutanix(_) => {
            resolver.required(NUTANIX)?;
            resolver.optional(NUTANIX_OPTIONAL);
        }
        CloudProvider::OpenStack(_) => resolver.openstack()?,
        CloudProvider::EquinixMetal(_) => resolver.equinix_metal()?,
        CloudProvider::VSphere(_) => resolver.required(VSPHERE)?,
        CloudProvider::VmwareCloudDirector(_) => resolver.vmware_cloud_director()?,
        CloudProvider::Kubevirt(_) => resolver.required(&[KUBEVIRT_KUBECONFIG])?,
        CloudProvider::None(_) => {}
    }

    Ok(resolver.credentials)
}

struct Resolver<'a> {
    source: &'a Source,
    credentials_type: CredentialsType,
    provider: CloudProviderKind,
    credentials: Credentials,
}

impl Resolver<'_> {
    fn lookup(&self, name: &str) -> Option<String> {
        self.source.lookup(name, self.credentials_type)
    }

    fn is_set(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    fn required(&mut self, names: &[&'static str]) -> Result<()> {
        let mut missing = Vec::new();
        for &name in names {
            match self.lookup(name) {
                Some(value) => {
                    self.credentials.insert(name.to_owned(), value);
                }
                None => missing.push(name),
            }
        }

        ensure!(
            missing.is_empty(),
            MissingVariablesSnafu {
                provider: self.provider,
                variables: missing,
            }
        );
        Ok(())
    }

    fn optional(&mut self, names: &[&str]) {
        for &name in names {
            if let Some(value) = self.lookup(name) {
                self.credentials.insert(name.to_owned(), value);
            }
        }
    }

    /// Picks one of two mutually exclusive sets of variables. The `first` set
    /// is used as soon as any of its variables is present.
    fn either(&mut self, first: &[&'static str], second: &[&'static str]) -> Result<bool> {
        let uses_first = first.iter().any(|name| self.is_set(name));
        let uses_second = second.iter().any(|name| self.is_set(name));
        ensure!(
            !(uses_first && uses_second),
            ConflictingCredentialsSnafu {
                provider: self.provider,
                first: first.to_vec(),
                second: second.to_vec(),
            }
        );

        self.required(if uses_first { first } else { second })?;
        Ok(uses_first)
    }

    /// The key pair is taken from one place only: the variables when both are
    /// set, otherwise the shared credentials profile when it holds both.
    fn aws(&mut self) -> Result<()> {
        let (access_key_id, secret_access_key) =
            match (self.lookup(AWS_ACCESS_KEY_ID), self.lookup(AWS_SECRET_ACCESS_KEY)) {
                (Some(access_key_id), Some(secret_access_key)) => {
                    (Some(access_key_id), Some(secret_access_key))
                }
                partial => match self.source.aws_shared_credentials()? {
                    Some(aws::SharedCredentials {
                        access_key_id: Some(access_key_id),
                        secret_access_key: Some(secret_access_key),
                    }) => (Some(access_key_id), Some(secret_access_key)),
                    _ => partial,
                },
            };

        let missing = [
            (AWS_ACCESS_KEY_ID, access_key_id),
            (AWS_SECRET_ACCESS_KEY, secret_access_key),
        ]
        .into_iter()
        .filter_map(|(name, value)| match value {
            Some(value) => {
                self.credentials.insert(name.to_owned(), value);
                None
            }
            None => Some(name),
        })
        .collect_vec();

        ensure!(
            missing.is_empty(),
            MissingVariablesSnafu {
                provider: self.provider,
                variables: missing,
            }
        );
        Ok(())
    }

    /// The service account JSON is handed on base64 encoded.
    fn gce(&mut self) -> Result<()> {
        self.required(&[GOOGLE_CREDENTIALS])?;
        if let Some(service_account) = self.credentials.get_mut(GOOGLE_CREDENTIALS) {
            *service_account = STANDARD.encode(service_account.as_bytes());
        }

        Ok(())
    }

    fn openstack(&mut self) -> Result<()> {
        self.required(OPENSTACK)?;

        let application_credentials =
            self.either(OPENSTACK_APPLICATION_CREDENTIALS, OPENSTACK_USER)?;
        if !application_credentials {
            self.required(&[OPENSTACK_DOMAIN_NAME])?;
            self.optional(OPENSTACK_TENANT);
            ensure!(
                OPENSTACK_TENANT
                    .iter()
                    .any(|name| self.credentials.contains_key(*name)),
                MissingVariablesSnafu {
                    provider: self.provider,
                    variables: vec![OPENSTACK_TENANT_CHOICE],
                }
            );
        }

        Ok(())
    }

    fn equinix_metal(&mut self) -> Result<()> {
        let mut missing = Vec::new();
        for &(name, legacy) in EQUINIX_METAL {
            let value = self.lookup(name).or_else(|| {
                let value = self.lookup(legacy)?;
                warn!(
                    variable = legacy,
                    replacement = name,
                    "Using deprecated Packet credentials variable"
                );
                Some(value)
            });

            match value {
                Some(value) => {
                    self.credentials.insert(name.to_owned(), value);
                }
                None => missing.push(name),
            }
        }

        ensure!(
            missing.is_empty(),
            MissingVariablesSnafu {
                provider: self.provider,
                variables: missing,
            }
        );
        Ok(())
    }

    fn vmware_cloud_director(&mut self) -> Result<()> {
        self.required(VCD)?;
        self.either(VCD_API_TOKEN, VCD_USER)?;
        self.optional(&[VCD_ALLOW_UNVERIFIED_SSL]);

        Ok(())
    }
}
