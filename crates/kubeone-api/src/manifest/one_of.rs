use itertools::Itertools;
use snafu::ensure;

use crate::manifest::{MultipleVariantsSelectedSnafu, NoVariantSelectedSnafu, Result};

/// Collects the candidates of a "one-of" section, where a manifest expresses a
/// tagged union as a set of optional fields of which exactly one must be set.
///
/// This is the only place where the exactly-one rule is enforced, all
/// revisions build their closed enums through it.
pub(super) struct OneOf<T> {
    field: &'static str,
    choices: Vec<&'static str>,
    selected: Vec<(&'static str, T)>,
}

impl<T> OneOf<T> {
    pub(super) fn new(field: &'static str) -> Self {
        Self {
            field,
            choices: Vec::new(),
            selected: Vec::new(),
        }
    }

    /// Registers the candidate `name`. If `value` is set, `convert` turns it
    /// into the selected variant.
    pub(super) fn with<V>(
        mut self,
        name: &'static str,
        value: Option<V>,
        convert: impl FnOnce(V) -> T,
    ) -> Self {
        self.choices.push(name);
        if let Some(value) = value {
            self.selected.push((name, convert(value)));
        }
        self
    }

    /// Returns the selected variant, or [`None`] if no candidate is set.
    pub(super) fn optional(mut self) -> Result<Option<T>> {
        ensure!(
            self.selected.len() <= 1,
            MultipleVariantsSelectedSnafu {
                field: self.field,
                variants: self.selected.iter().map(|(name, _)| *name).collect::<Vec<_>>(),
            }
        );

        Ok(self.selected.pop().map(|(_, value)| value))
    }

    /// Returns the selected variant and fails if no candidate is set.
    pub(super) fn required(self) -> Result<T> {
        let field = self.field;
        let choices = self.choices.iter().join(", ");

        self.optional()?
            .ok_or_else(|| NoVariantSelectedSnafu { field, choices }.build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::Error;

    fn runtime(docker: Option<()>, containerd: Option<()>) -> OneOf<&'static str> {
        OneOf::new("containerRuntime")
            .with("docker", docker, |()| "docker")
            .with("containerd", containerd, |()| "containerd")
    }

    #[test]
    fn single_candidate() {
        let selected = runtime(None, Some(())).required().expect("one candidate is set");
        assert_eq!(selected, "containerd");
    }

    #[test]
    fn no_candidate() {
        assert_eq!(runtime(None, None).optional().expect("nothing is set"), None);

        let err = runtime(None, None).required().expect_err("a candidate is required");
        assert!(
            matches!(&err, Error::NoVariantSelected { field: "containerRuntime", choices } if choices == "docker, containerd"),
            "{err:?}"
        );
    }

    #[test]
    fn multiple_candidates() {
        let err = runtime(Some(()), Some(()))
            .optional()
            .expect_err("only one candidate may be set");
        assert!(
            matches!(&err, Error::MultipleVariantsSelected { variants, .. } if *variants == ["docker", "containerd"]),
            "{err:?}"
        );
    }
}
