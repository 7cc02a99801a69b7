//! Structural checks on a defaulted cluster configuration.
//!
//! The naming rules are adapted from Kubernetes, see
//! apimachinery/pkg/util/validation/validation.go in the Kubernetes source.

use std::{collections::BTreeSet, fmt::Display, sync::LazyLock};

use const_format::concatcp;
use itertools::Itertools;
use regex::Regex;
use snafu::Snafu;

use crate::api::{HostConfig, KubeOneCluster};

/// Minimal length required by RFC 1123 is 63. Up to 255 allowed, unsupported by k8s.
const RFC_1123_LABEL_MAX_LENGTH: usize = 63;
pub const RFC_1123_LABEL_FMT: &str = "[a-z0-9]([-a-z0-9]*[a-z0-9])?";
const RFC_1123_LABEL_ERROR_MSG: &str = "a lowercase RFC 1123 label must consist of lower case alphanumeric characters or '-', and must start and end with an alphanumeric character";

/// This is a subdomain's max length in DNS (RFC 1123)
const RFC_1123_SUBDOMAIN_MAX_LENGTH: usize = 253;
const RFC_1123_SUBDOMAIN_FMT: &str =
    concatcp!(RFC_1123_LABEL_FMT, "(\\.", RFC_1123_LABEL_FMT, ")*");
const RFC_1123_SUBDOMAIN_ERROR_MSG: &str = "a lowercase RFC 1123 subdomain must consist of lower case alphanumeric characters, '-' or '.', and must start and end with an alphanumeric character";

static RFC_1123_LABEL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!("^{RFC_1123_LABEL_FMT}$")).expect("failed to compile RFC 1123 label regex")
});

static RFC_1123_SUBDOMAIN_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!("^{RFC_1123_SUBDOMAIN_FMT}$"))
        .expect("failed to compile RFC 1123 subdomain regex")
});

type Result<T = (), E = Errors> = std::result::Result<T, E>;

/// A collection of errors discovered during validation.
#[derive(Debug)]
pub struct Errors(Vec<Error>);

impl Errors {
    pub fn iter(&self) -> impl Iterator<Item = &Error> {
        self.0.iter()
    }
}

impl Display for Errors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, error) in self.0.iter().enumerate() {
            let prefix = match i {
                0 => "",
                _ => ", ",
            };
            write!(f, "{prefix}{error}")?;
        }
        Ok(())
    }
}
impl std::error::Error for Errors {}

/// A single validation error.
#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(transparent)]
    Regex { source: RegexError },

    #[snafu(display("input is {length} bytes long but must be no more than {max_length}"))]
    TooLong { length: usize, max_length: usize },

    #[snafu(display("{field} is invalid: {source}"))]
    InvalidField { field: String, source: Errors },

    #[snafu(display("{field} must not be empty"))]
    Empty { field: String },

    #[snafu(display("at least one control plane host is required"))]
    NoControlPlaneHosts,

    #[snafu(display("exactly one control plane host must be the leader, found {count}"))]
    LeaderCount { count: usize },

    #[snafu(display("host IDs must be numbered contiguously from 0, found [{ids}]"))]
    NonContiguousHostIds { ids: String },

    #[snafu(display("{field} needs a public or a private address"))]
    MissingAddress { field: String },

    #[snafu(display("the dynamic worker pool name {name:?} is used more than once"))]
    DuplicateWorkerPool { name: String },
}

#[derive(Debug)]
pub struct RegexError {
    /// The primary error message.
    msg: &'static str,

    /// The regex that the input must match.
    regex: &'static str,

    /// Examples of valid inputs (if non-empty).
    examples: &'static [&'static str],
}

impl Display for RegexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let Self {
            msg,
            regex,
            examples,
        } = self;
        write!(f, "{msg} (")?;
        for (i, example) in examples.iter().enumerate() {
            let prefix = match i {
                0 => "e.g.",
                _ => "or",
            };
            write!(f, "{prefix} {example:?}, ")?;
        }
        write!(f, "regex used for validation is {regex:?})")
    }
}

impl std::error::Error for RegexError {}

/// Returns [`Ok`] if `value`'s length fits within `max_length`.
fn validate_str_length(value: &str, max_length: usize) -> Result<(), Error> {
    if value.len() > max_length {
        TooLongSnafu {
            length: value.len(),
            max_length,
        }
        .fail()
    } else {
        Ok(())
    }
}

/// Returns [`Ok`] if `value` matches `regex`.
fn validate_str_regex(
    value: &str,
    regex: &'static Regex,
    error_msg: &'static str,
    examples: &'static [&'static str],
) -> Result<(), Error> {
    if regex.is_match(value) {
        Ok(())
    } else {
        Err(RegexError {
            msg: error_msg,
            regex: regex
                .as_str()
                // Clean up start/end-of-line markers
                .trim_start_matches('^')
                .trim_end_matches('$'),
            examples,
        }
        .into())
    }
}

/// Returns [`Ok`] if *all* validations are [`Ok`], otherwise returns all errors.
fn validate_all(validations: impl IntoIterator<Item = Result<(), Error>>) -> Result {
    let errors = validations
        .into_iter()
        .filter_map(|res| res.err())
        .collect::<Vec<_>>();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(Errors(errors))
    }
}

/// Tests for a lowercase RFC 1123 label, used for the cluster name.
pub fn is_rfc_1123_label(value: &str) -> Result {
    validate_all([
        validate_str_length(value, RFC_1123_LABEL_MAX_LENGTH),
        validate_str_regex(
            value,
            &RFC_1123_LABEL_REGEX,
            RFC_1123_LABEL_ERROR_MSG,
            &["demo", "prod-eu-1"],
        ),
    ])
}

/// Tests for a lowercase RFC 1123 subdomain, used for host and pool names.
pub fn is_rfc_1123_subdomain(value: &str) -> Result {
    validate_all([
        validate_str_length(value, RFC_1123_SUBDOMAIN_MAX_LENGTH),
        validate_str_regex(
            value,
            &RFC_1123_SUBDOMAIN_REGEX,
            RFC_1123_SUBDOMAIN_ERROR_MSG,
            &["cp-0", "cp-0.example.com"],
        ),
    ])
}

fn field(field: impl Into<String>, result: Result) -> Result<(), Error> {
    result.map_err(|source| Error::InvalidField {
        field: field.into(),
        source,
    })
}

/// Validates a defaulted cluster configuration and returns all problems at
/// once.
pub fn validate_cluster(cluster: &KubeOneCluster) -> Result {
    let mut errors = Vec::new();

    if cluster.name.is_empty() {
        errors.push(Error::Empty {
            field: "name".to_owned(),
        });
    } else {
        errors.extend(field("name", is_rfc_1123_label(&cluster.name)).err());
    }

    if cluster.control_plane.hosts.is_empty() {
        errors.push(Error::NoControlPlaneHosts);
    } else {
        let count = cluster
            .control_plane
            .hosts
            .iter()
            .filter(|host| host.is_leader)
            .count();
        if count != 1 {
            errors.push(Error::LeaderCount { count });
        }
    }

    let ids: Vec<usize> = cluster.hosts().map(|host| host.id).collect();
    if ids.iter().copied().ne(0..ids.len()) {
        errors.push(Error::NonContiguousHostIds {
            ids: ids.iter().join(", "),
        });
    }

    let hosts = cluster
        .control_plane
        .hosts
        .iter()
        .enumerate()
        .map(|(index, host)| (format!("controlPlane.hosts[{index}]"), host))
        .chain(
            cluster
                .static_workers
                .hosts
                .iter()
                .enumerate()
                .map(|(index, host)| (format!("staticWorkers.hosts[{index}]"), host)),
        );
    for (path, host) in hosts {
        errors.extend(validate_host(&path, host));
    }

    if cluster.versions.kubernetes.is_empty() {
        errors.push(Error::Empty {
            field: "versions.kubernetes".to_owned(),
        });
    }

    let mut pool_names = BTreeSet::new();
    for (index, pool) in cluster.dynamic_workers.iter().enumerate() {
        if !pool_names.insert(pool.name.as_str()) {
            errors.push(Error::DuplicateWorkerPool {
                name: pool.name.clone(),
            });
        }
        errors.extend(
            field(
                format!("dynamicWorkers[{index}].name"),
                is_rfc_1123_subdomain(&pool.name),
            )
            .err(),
        );
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(Errors(errors))
    }
}

fn validate_host(path: &str, host: &HostConfig) -> Vec<Error> {
    let mut errors = Vec::new();

    if host.reachable_address().is_empty() {
        errors.push(Error::MissingAddress {
            field: path.to_owned(),
        });
    }

    if !host.hostname.is_empty() {
        errors.extend(
            field(
                format!("{path}.hostname"),
                is_rfc_1123_subdomain(&host.hostname),
            )
            .err(),
        );
    }

    errors
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::api::{ControlPlaneConfig, DynamicWorkerConfig, VersionConfig};

    fn valid_cluster() -> KubeOneCluster {
        KubeOneCluster {
            name: "demo".to_owned(),
            versions: VersionConfig {
                kubernetes: "1.30.2".to_owned(),
            },
            control_plane: ControlPlaneConfig {
                hosts: vec![
                    HostConfig {
                        id: 0,
                        public_address: "1.1.1.1".to_owned(),
                        hostname: "cp-0".to_owned(),
                        is_leader: true,
                        ..Default::default()
                    },
                    HostConfig {
                        id: 1,
                        private_address: "10.0.0.2".to_owned(),
                        ..Default::default()
                    },
                ],
            },
            ..Default::default()
        }
    }

    #[rstest]
    #[case("demo", true)]
    #[case("prod-eu-1", true)]
    #[case("Demo", false)]
    #[case("-demo", false)]
    #[case("demo.example", false)]
    #[case(&"a".repeat(64), false)]
    fn rfc_1123_label(#[case] value: &str, #[case] valid: bool) {
        assert_eq!(is_rfc_1123_label(value).is_ok(), valid);
    }

    #[rstest]
    #[case("cp-0.example.com", true)]
    #[case("cp_0", false)]
    #[case("cp-0.", false)]
    fn rfc_1123_subdomain(#[case] value: &str, #[case] valid: bool) {
        assert_eq!(is_rfc_1123_subdomain(value).is_ok(), valid);
    }

    #[test]
    fn valid() {
        assert!(validate_cluster(&valid_cluster()).is_ok());
    }

    #[test]
    fn all_errors_are_reported() {
        let mut cluster = valid_cluster();
        cluster.name = "Demo_Cluster".to_owned();
        cluster.control_plane.hosts[0].is_leader = false;
        cluster.control_plane.hosts[1].id = 3;
        cluster.control_plane.hosts[1].private_address.clear();
        cluster.dynamic_workers = vec![
            DynamicWorkerConfig {
                name: "pool".to_owned(),
                ..Default::default()
            },
            DynamicWorkerConfig {
                name: "pool".to_owned(),
                ..Default::default()
            },
        ];

        let errors = validate_cluster(&cluster).expect_err("cluster must be invalid");
        let errors: Vec<_> = errors.iter().collect();

        assert_eq!(errors.len(), 5, "{errors:?}");
        assert!(matches!(errors[0], Error::InvalidField { field, .. } if field == "name"));
        assert!(matches!(errors[1], Error::LeaderCount { count: 0 }));
        assert!(matches!(errors[2], Error::NonContiguousHostIds { ids } if ids == "0, 3"));
        assert!(
            matches!(errors[3], Error::MissingAddress { field } if field == "controlPlane.hosts[1]")
        );
        assert!(matches!(errors[4], Error::DuplicateWorkerPool { name } if name == "pool"));
    }

    #[test]
    fn no_control_plane_hosts() {
        let mut cluster = valid_cluster();
        cluster.control_plane.hosts.clear();

        let errors = validate_cluster(&cluster).expect_err("cluster must be invalid");
        assert!(
            errors
                .iter()
                .any(|error| matches!(error, Error::NoControlPlaneHosts))
        );
    }

    #[test]
    fn error_message_names_the_field() {
        let mut cluster = valid_cluster();
        cluster.control_plane.hosts[0].hostname = "CP_0".to_owned();

        let errors = validate_cluster(&cluster).expect_err("cluster must be invalid");
        assert!(
            errors
                .to_string()
                .starts_with("controlPlane.hosts[0].hostname is invalid: a lowercase RFC 1123 subdomain")
        );
    }
}
