use super::{object_schema, parse_params};
use crate::{
    context::AgentContext,
    error::Failure,
    evaluator::{EvalOutcome, GlobalVar},
    function::{AgentFunction, CapabilityResult, FunctionOutput},
    resolver::resolve_arguments,
};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;

const NAME: &str = "executeScript";

/// Runs a script from the catalog and optionally stores its result.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecuteScript;

#[derive(Debug, Deserialize)]
struct ExecuteScriptParams {
    namespace: String,
    #[serde(default)]
    arguments: Value,
    #[serde(default, alias = "result")]
    variable: Option<String>,
}

impl ExecuteScriptParams {
    /// Returns the raw argument string.
    fn raw_arguments(&self) -> Option<String> {
        match &self.arguments {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            value => Some(value.to_string()),
        }
    }

    fn variable(&self) -> Option<&str> {
        self.variable.as_deref().filter(|name| !name.is_empty())
    }
}

#[async_trait::async_trait]
impl AgentFunction for ExecuteScript {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Execute a script."
    }

    fn parameters(&self) -> Value {
        object_schema(
            json!({
                "namespace": {
                    "type": "string",
                    "description": "Namespace of the script to execute",
                },
                "arguments": {
                    "type": "string",
                    "description": "JSON-formatted arguments to pass into the script being executed. \
                        You can replace a value with a variable by using {{varName}} syntax.",
                },
                "variable": {
                    "type": "string",
                    "description": "The name of a variable to store the script's result in",
                },
            }),
            &["namespace", "arguments"],
        )
    }

    async fn execute(&self, context: &mut AgentContext, arguments: Value) -> CapabilityResult {
        let renderer = context.renderer();
        let params = match parse_params::<ExecuteScriptParams>(NAME, &arguments) {
            Ok(params) => params,
            Err(failure) => {
                let heading = format!("Error calling '{NAME}'");
                let title = format!("{NAME} failed to execute!");
                return Ok(renderer.failure(NAME, &arguments, title, &heading, failure));
            }
        };
        let namespace = params.namespace.as_str();
        let fail = |failure: Failure| -> FunctionOutput {
            let heading = format!("Error executing script '{namespace}'");
            let title = format!("'{namespace}' script failed to execute!");
            renderer.failure(NAME, &arguments, title, &heading, failure)
        };

        let Some(script) = context.scripts.get_script_by_name(namespace) else {
            return Ok(fail(Failure::NotFound(format!(
                "Script '{namespace}' not found!"
            ))));
        };
        let raw_arguments = params.raw_arguments();
        let args = match resolve_arguments(raw_arguments.as_deref(), &context.variables) {
            Ok(args) => args,
            Err(err) => {
                tracing::debug!(namespace, error = %err, "script arguments rejected");
                return Ok(fail(Failure::InvalidArguments(format!(
                    "Invalid arguments provided for script {namespace}: '{}' is not valid JSON!",
                    raw_arguments.unwrap_or_default()
                ))));
            }
        };
        let globals = args
            .iter()
            .map(|(name, value)| GlobalVar::from_value(name, value))
            .collect::<Vec<_>>();

        let evaluator = Arc::clone(&context.evaluator);
        match evaluator.evaluate(&script.code, &globals).await {
            EvalOutcome::Completed(value) => {
                let variable = params.variable();
                if let (Some(variable), Some(value)) = (variable, &value) {
                    context.variables.set(variable, value);
                }
                let result = value.map(|value| value.to_string());
                let message = renderer.script_output(variable, result.as_deref());
                let title = format!("Executed '{namespace}' script.");
                Ok(renderer.success(NAME, &arguments, title, message, result))
            }
            EvalOutcome::Thrown(error) => Ok(fail(Failure::ExecutionFailed(error))),
            EvalOutcome::Failed(error) => Ok(fail(Failure::EvaluatorFailure(error))),
        }
    }
}
