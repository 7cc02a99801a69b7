use std::collections::BTreeMap;

/// A value which can be completed from discovered infrastructure state.
///
/// Unlike defaulting, both sides may hold real data here. The value in `self`
/// was authored by the user and always wins, `discovered` is only used while
/// `self` is still zero (empty, [`None`] or `null`).
///
/// ```
/// use kubeone_api::infra::fill::FillIfZero;
///
/// let mut region = String::new();
/// region.fill_if_zero(&"eu-central-1".to_owned());
/// assert_eq!(region, "eu-central-1");
///
/// region.fill_if_zero(&"us-east-1".to_owned());
/// assert_eq!(region, "eu-central-1");
/// ```
pub trait FillIfZero {
    fn fill_if_zero(&mut self, discovered: &Self);
}

impl FillIfZero for String {
    fn fill_if_zero(&mut self, discovered: &Self) {
        if self.is_empty() {
            self.clone_from(discovered);
        }
    }
}

impl<T: Clone> FillIfZero for Option<T> {
    fn fill_if_zero(&mut self, discovered: &Self) {
        if self.is_none() {
            self.clone_from(discovered);
        }
    }
}

/// Lists are taken as a whole, they are never merged element by element.
impl<T: Clone> FillIfZero for Vec<T> {
    fn fill_if_zero(&mut self, discovered: &Self) {
        if self.is_empty() {
            self.clone_from(discovered);
        }
    }
}

/// Maps are completed key by key, existing keys keep their value.
impl<K: Ord + Clone, V: Clone> FillIfZero for BTreeMap<K, V> {
    fn fill_if_zero(&mut self, discovered: &Self) {
        for (key, value) in discovered {
            self.entry(key.clone()).or_insert_with(|| value.clone());
        }
    }
}

impl FillIfZero for serde_json::Value {
    fn fill_if_zero(&mut self, discovered: &Self) {
        if self.is_null() {
            self.clone_from(discovered);
        }
    }
}
