//! Reads the AWS shared credentials file, usually `~/.aws/credentials`.
use std::{fs, io, path::Path};

use snafu::ResultExt;

use crate::credentials::{ReadAwsSharedCredentialsSnafu, Result};

pub(super) const DEFAULT_PROFILE: &str = "default";

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub(super) struct SharedCredentials {
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
}

/// Returns the keys of `profile`, or [`None`] if the file or the profile
/// does not exist.
pub(super) fn read_shared_credentials(
    path: &Path,
    profile: &str,
) -> Result<Option<SharedCredentials>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(error) if error.kind() == io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "No AWS shared credentials file found");
            return Ok(None);
        }
        Err(error) => return Err(error).context(ReadAwsSharedCredentialsSnafu { path }),
    };

    Ok(parse_profile(&content, profile))
}

/// A minimal INI reader, it understands `[section]` headers, `key = value`
/// pairs and `#`/`;` comments, which is all the credentials file uses.
fn parse_profile(content: &str, profile: &str) -> Option<SharedCredentials> {
    let mut credentials = None;
    let mut in_profile = false;

    for line in content.lines().map(str::trim) {
        if line.is_empty() || line.starts_with(['#', ';']) {
            continue;
        }

        if let Some(section) = line
            .strip_prefix('[')
            .and_then(|line| line.strip_suffix(']'))
        {
            in_profile = section.trim() == profile;
            if in_profile {
                credentials.get_or_insert_with(SharedCredentials::default);
            }
            continue;
        }

        if !in_profile {
            continue;
        }
        let (Some(credentials), Some((key, value))) = (credentials.as_mut(), line.split_once('='))
        else {
            continue;
        };

        let value = Some(value.trim().to_owned()).filter(|value| !value.is_empty());
        match key.trim() {
            "aws_access_key_id" => credentials.access_key_id = value,
            "aws_secret_access_key" => credentials.secret_access_key = value,
            _ => {}
        }
    }

    credentials
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;

    const CREDENTIALS: &str = indoc! {"
        # managed by the AWS CLI
        [default]
        aws_access_key_id = AKIADEFAULT
        aws_secret_access_key = default-secret

        [staging]
        aws_access_key_id=AKIASTAGING
        region = eu-central-1
        ; no secret here
    "};

    #[test]
    fn default_profile() {
        assert_eq!(
            parse_profile(CREDENTIALS, DEFAULT_PROFILE),
            Some(SharedCredentials {
                access_key_id: Some("AKIADEFAULT".to_owned()),
                secret_access_key: Some("default-secret".to_owned()),
            })
        );
    }

    #[test]
    fn named_profile() {
        assert_eq!(
            parse_profile(CREDENTIALS, "staging"),
            Some(SharedCredentials {
                access_key_id: Some("AKIASTAGING".to_owned()),
                secret_access_key: None,
            })
        );
    }

    #[test]
    fn unknown_profile() {
        assert_eq!(parse_profile(CREDENTIALS, "production"), None);
    }

    #[test]
    fn missing_file() {
        let credentials = read_shared_credentials(Path::new("/does/not/exist"), DEFAULT_PROFILE)
            .expect("a missing file is not an error");

        assert_eq!(credentials, None);
    }
}
