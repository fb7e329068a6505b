//! Function registry for managing available capabilities.

use crate::{
    function::AgentFunction,
    functions::{CreateScript, ExecuteScript, ReadFile, ReadVar, WriteFile},
};
use serde::Serialize;
use serde_json::Value;
use std::{fmt, sync::Arc};
use thiserror::Error;

/// Errors raised while registering functions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// A function with the same name exists.
    #[error("function '{0}' is already registered")]
    DuplicateFunction(String),
}

/// Definition of a function advertised to the model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionDefinition {
    /// Function name.
    pub name: String,
    /// Function description.
    pub description: String,
    /// JSON Schema of the parameters.
    pub parameters: Value,
}

/// Registry for managing available functions.
///
/// Functions keep their registration order, which is also the order of the
/// definitions advertised to the model.
#[derive(Default, Clone)]
pub struct FunctionRegistry {
    /// Registered functions in order
    functions: Vec<Arc<dyn AgentFunction>>,
}

impl FunctionRegistry {
    /// Create a new function registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the built-in functions.
    pub fn with_defaults() -> Self {
        let functions: Vec<Arc<dyn AgentFunction>> = vec![
            Arc::new(ExecuteScript),
            Arc::new(ReadVar),
            Arc::new(CreateScript),
            Arc::new(ReadFile),
            Arc::new(WriteFile),
        ];
        Self { functions }
    }

    /// Register a function.
    ///
    /// # Arguments
    /// * `function` - Function implementation
    ///
    /// # Returns
    /// * `Result<(), RegistryError>` - Success or error
    pub fn register<F: AgentFunction + 'static>(&mut self, function: F) -> Result<(), RegistryError> {
        let name = function.name();
        if self.contains(name) {
            return Err(RegistryError::DuplicateFunction(name.to_owned()));
        }
        tracing::debug!(function = name, "function registered");
        self.functions.push(Arc::new(function));
        Ok(())
    }

    /// Get a function by name.
    ///
    /// # Arguments
    /// * `name` - Function name
    ///
    /// # Returns
    /// * `Option<Arc<dyn AgentFunction>>` - Function if found
    pub fn get(&self, name: &str) -> Option<Arc<dyn AgentFunction>> {
        self.functions
            .iter()
            .find(|function| function.name() == name)
            .cloned()
    }

    /// Check if a function is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.functions.iter().any(|function| function.name() == name)
    }

    /// Get the definitions of all functions in registration order.
    pub fn definitions(&self) -> Vec<FunctionDefinition> {
        self.functions
            .iter()
            .map(|function| FunctionDefinition {
                name: function.name().to_owned(),
                description: function.description().to_owned(),
                parameters: function.parameters(),
            })
            .collect()
    }

    /// Get the number of registered functions.
    #[inline]
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    /// Check if the registry is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.functions.iter().map(|function| function.name()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{context::AgentContext, function::CapabilityResult};
    use serde_json::json;

    struct Echo;

    #[async_trait::async_trait]
    impl AgentFunction for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echo the arguments."
        }

        fn parameters(&self) -> Value {
            json!({"type": "object", "properties": {}})
        }

        async fn execute(&self, _context: &mut AgentContext, _arguments: Value) -> CapabilityResult {
            Err("not implemented".to_owned())
        }
    }

    #[test]
    fn it_registers_functions_in_order() {
        let mut registry = FunctionRegistry::with_defaults();
        assert_eq!(registry.len(), 5);
        registry.register(Echo).unwrap();
        assert!(registry.contains("echo"));
        assert!(registry.get("echo").is_some());
        assert!(registry.get("missing").is_none());

        let names = registry
            .definitions()
            .into_iter()
            .map(|definition| definition.name)
            .collect::<Vec<_>>();
        assert_eq!(
            names,
            ["executeScript", "readVar", "createScript", "readFile", "writeFile", "echo"]
        );
    }

    #[test]
    fn it_rejects_duplicates() {
        let mut registry = FunctionRegistry::new();
        assert!(registry.is_empty());
        registry.register(Echo).unwrap();
        assert_eq!(
            registry.register(Echo),
            Err(RegistryError::DuplicateFunction("echo".to_owned()))
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn it_describes_parameters() {
        let registry = FunctionRegistry::with_defaults();
        for definition in registry.definitions() {
            assert_eq!(definition.parameters["type"], "object", "{}", definition.name);
            assert_eq!(definition.parameters["additionalProperties"], false);
        }
    }
}
