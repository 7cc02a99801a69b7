//! Normalization of KubeOne cluster configurations.
//!
//! A `KubeOneCluster` manifest of any supported schema revision is converted
//! into the canonical [`api::KubeOneCluster`], completed with the facts of an
//! infrastructure discovery document, defaulted and validated. The
//! [`pipeline`] module runs all steps in order.
//!
//! ## Crate Features
//!
//! - `default` enables `clap`.
//! - `clap` enables the [`cli`] module with options for clap-based CLIs.

pub mod api;
#[cfg(feature = "clap")]
pub mod cli;
pub mod credentials;
pub mod defaults;
pub mod infra;
pub mod logging;
pub mod manifest;
pub mod pipeline;
pub mod validation;
pub mod version;
pub mod yaml;

// External re-exports
pub use k8s_openapi;
