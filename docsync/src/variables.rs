//! Remembered path variables for one module instance

use std::collections::BTreeMap;

/// Placeholder name -> value
pub type PathVariables = BTreeMap<String, String>;

/// Last-known placeholder values of a module.
///
/// Filled by every open that supplies variables and emptied only by a close
/// that tears the module down.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathVariableStore {
    vars: PathVariables,
}

impl PathVariableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shallow union: incoming keys overwrite, absent keys are untouched.
    pub fn merge<I, K, V>(&mut self, vars: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.vars
            .extend(vars.into_iter().map(|(k, v)| (k.into(), v.into())));
    }

    pub fn clear(&mut self) {
        self.vars.clear();
    }

    pub fn snapshot(&self) -> PathVariables {
        self.vars.clone()
    }

    pub fn as_map(&self) -> &PathVariables {
        &self.vars
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_overwrites_and_keeps() {
        let mut store = PathVariableStore::new();
        store.merge([("name", "Luca"), ("kind", "pets")]);
        store.merge([("name", "Mesqueeb")]);

        assert_eq!(store.get("name"), Some("Mesqueeb"));
        assert_eq!(store.get("kind"), Some("pets"));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_clear() {
        let mut store = PathVariableStore::new();
        store.merge([("name", "Luca")]);
        store.clear();
        assert!(store.is_empty());
        assert_eq!(store.snapshot(), PathVariables::new());
    }
}
