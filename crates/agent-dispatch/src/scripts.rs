//! Catalog of scripts the agent can execute.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors raised by a script catalog.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScriptCatalogError {
    /// A script with the same namespace exists.
    #[error("script '{0}' already exists")]
    DuplicateScript(String),
    /// The namespace is empty.
    #[error("script namespace must not be empty")]
    EmptyNamespace,
}

/// A stored script.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Script {
    /// Unique key of the script, e.g. `fs.readJson`.
    pub namespace: String,
    /// What the script does.
    pub description: String,
    /// Description of the arguments it expects.
    pub arguments: String,
    /// Source code.
    pub code: String,
}

impl Script {
    /// Creates a script with the namespace and code.
    pub fn new(namespace: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            code: code.into(),
            ..Self::default()
        }
    }

    /// Sets the description.
    #[inline]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the arguments description.
    #[inline]
    pub fn with_arguments(mut self, arguments: impl Into<String>) -> Self {
        self.arguments = arguments.into();
        self
    }
}

/// A lookup of scripts by namespace.
pub trait ScriptCatalog: Send + Sync {
    /// Returns the script with the namespace.
    fn get_script_by_name(&self, namespace: &str) -> Option<Script>;

    /// Stores a new script. Stored scripts are immutable.
    fn add_script(&mut self, script: Script) -> Result<(), ScriptCatalogError>;

    /// Returns the scripts whose namespace or description matches every word of the query.
    fn search(&self, query: &str) -> Vec<Script>;
}

/// In-memory script catalog.
#[derive(Debug, Clone, Default)]
pub struct Scripts {
    scripts: BTreeMap<String, Script>,
}

impl Scripts {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of scripts.
    #[inline]
    pub fn len(&self) -> usize {
        self.scripts.len()
    }

    /// Returns `true` if the catalog is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.scripts.is_empty()
    }
}

impl ScriptCatalog for Scripts {
    fn get_script_by_name(&self, namespace: &str) -> Option<Script> {
        self.scripts.get(namespace).cloned()
    }

    fn add_script(&mut self, script: Script) -> Result<(), ScriptCatalogError> {
        if script.namespace.trim().is_empty() {
            return Err(ScriptCatalogError::EmptyNamespace);
        }
        if self.scripts.contains_key(&script.namespace) {
            return Err(ScriptCatalogError::DuplicateScript(script.namespace));
        }
        tracing::debug!(namespace = %script.namespace, "script added");
        self.scripts.insert(script.namespace.clone(), script);
        Ok(())
    }

    fn search(&self, query: &str) -> Vec<Script> {
        let words = query
            .split_whitespace()
            .map(str::to_lowercase)
            .collect::<Vec<_>>();
        self.scripts
            .values()
            .filter(|script| {
                let haystack = format!("{} {}", script.namespace, script.description).to_lowercase();
                words.iter().all(|word| haystack.contains(word.as_str()))
            })
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_stores_immutable_scripts() {
        let mut scripts = Scripts::new();
        scripts
            .add_script(Script::new("math.inc", "return x + 1"))
            .unwrap();
        assert_eq!(
            scripts.add_script(Script::new("math.inc", "return x")),
            Err(ScriptCatalogError::DuplicateScript("math.inc".to_owned()))
        );
        assert_eq!(
            scripts.add_script(Script::new(" ", "return 1")),
            Err(ScriptCatalogError::EmptyNamespace)
        );
        assert_eq!(
            scripts.get_script_by_name("math.inc").map(|script| script.code),
            Some("return x + 1".to_owned())
        );
        assert!(scripts.get_script_by_name("math.dec").is_none());
    }

    #[test]
    fn it_searches_namespaces_and_descriptions() {
        let mut scripts = Scripts::new();
        scripts
            .add_script(Script::new("fs.readJson", "").with_description("Read a JSON file"))
            .unwrap();
        scripts
            .add_script(Script::new("math.sum", "").with_description("Sum numbers"))
            .unwrap();
        let found = scripts.search("json READ");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].namespace, "fs.readJson");
        assert_eq!(scripts.search("").len(), 2);
    }
}
