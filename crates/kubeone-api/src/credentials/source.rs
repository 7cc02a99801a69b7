use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use snafu::ResultExt;

use crate::credentials::{
    CredentialsType, ParseCredentialsFileSnafu, ReadCredentialsFileSnafu, Result, aws,
};

const AWS_SHARED_CREDENTIALS_FILE: &str = "AWS_SHARED_CREDENTIALS_FILE";

/// Where credentials are looked up: a snapshot of the environment plus the
/// optional credentials file.
///
/// Empty values are treated as if the variable was not set at all.
#[derive(Clone, Debug, Default)]
pub struct Source {
    environment: BTreeMap<String, String>,
    file: BTreeMap<String, String>,
    aws_shared_credentials_file: Option<PathBuf>,
}

impl Source {
    /// Builds a source from the given variables, without looking at the
    /// process environment or the home directory.
    pub fn new(environment: impl IntoIterator<Item = (String, String)>) -> Self {
        let environment: BTreeMap<_, _> = environment.into_iter().collect();
        let aws_shared_credentials_file = environment
            .get(AWS_SHARED_CREDENTIALS_FILE)
            .filter(|path| !path.is_empty())
            .map(PathBuf::from);

        Self {
            environment,
            file: BTreeMap::new(),
            aws_shared_credentials_file,
        }
    }

    /// Snapshots the process environment. The AWS shared credentials file
    /// defaults to `~/.aws/credentials`.
    pub fn from_environment() -> Self {
        let mut source = Self::new(std::env::vars());
        if source.aws_shared_credentials_file.is_none() {
            source.aws_shared_credentials_file =
                dirs::home_dir().map(|home| home.join(".aws").join("credentials"));
        }

        source
    }

    /// Adds the keys of a flat YAML credentials file, e.g.
    ///
    /// ```yaml
    /// HCLOUD_TOKEN: "..."
    /// CCM_HCLOUD_TOKEN: "..."
    /// ```
    pub fn with_credentials_file(mut self, path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).context(ReadCredentialsFileSnafu { path })?;
        self.file = serde_yaml::from_str::<Option<BTreeMap<String, String>>>(&content)
            .context(ParseCredentialsFileSnafu { path })?
            .unwrap_or_default();

        Ok(self)
    }

    /// Looks up `name`, preferring the variant scoped to `credentials_type`
    /// over the plain one and the environment over the credentials file.
    pub fn lookup(&self, name: &str, credentials_type: CredentialsType) -> Option<String> {
        let scoped = credentials_type
            .prefix()
            .map(|prefix| format!("{prefix}_{name}"));

        scoped
            .iter()
            .map(String::as_str)
            .chain([name])
            .find_map(|key| self.environment(key).or_else(|| self.file(key)))
            .map(str::to_owned)
    }

    /// Reads a variable from the environment only.
    pub fn environment(&self, name: &str) -> Option<&str> {
        non_empty(self.environment.get(name))
    }

    fn file(&self, name: &str) -> Option<&str> {
        non_empty(self.file.get(name))
    }

    pub(super) fn aws_shared_credentials(&self) -> Result<Option<aws::SharedCredentials>> {
        let Some(path) = &self.aws_shared_credentials_file else {
            return Ok(None);
        };

        let profile = self.environment("AWS_PROFILE").unwrap_or(aws::DEFAULT_PROFILE);
        aws::read_shared_credentials(path, profile)
    }
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|value| !value.is_empty())
}
