use super::{object_schema, parse_params};
use crate::{
    context::AgentContext,
    error::Failure,
    function::{AgentFunction, CapabilityResult},
    scripts::Script,
};
use serde::Deserialize;
use serde_json::{Value, json};

const NAME: &str = "createScript";

/// Namespace prefix reserved for built-in agent functions.
const RESERVED_PREFIX: &str = "agent.";

/// Validates a script and adds it to the catalog.
#[derive(Debug, Clone, Copy, Default)]
pub struct CreateScript;

#[derive(Debug, Deserialize)]
struct CreateScriptParams {
    namespace: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    arguments: String,
    code: String,
}

#[async_trait::async_trait]
impl AgentFunction for CreateScript {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Create a script to be used by executeScript."
    }

    fn parameters(&self) -> Value {
        object_schema(
            json!({
                "namespace": {
                    "type": "string",
                    "description": "The namespace of the script, e.g. fs.readFile",
                },
                "description": {
                    "type": "string",
                    "description": "The detailed description of the script",
                },
                "arguments": {
                    "type": "string",
                    "description": "The arguments of the script, e.g. { path: string, encoding: string }",
                },
                "code": {
                    "type": "string",
                    "description": "The code of the script, which may return a value",
                },
            }),
            &["namespace", "description", "arguments", "code"],
        )
    }

    async fn execute(&self, context: &mut AgentContext, arguments: Value) -> CapabilityResult {
        let renderer = context.renderer();
        let params = parse_params::<CreateScriptParams>(NAME, &arguments);
        let namespace = params
            .as_ref()
            .map(|params| params.namespace.clone())
            .unwrap_or_default();
        let failure = match params {
            Ok(params) if params.namespace.contains(RESERVED_PREFIX) => {
                Failure::InvalidArguments(format!(
                    "Cannot create a script with namespace '{}': the '{RESERVED_PREFIX}' prefix is reserved.",
                    params.namespace
                ))
            }
            Ok(params) => match context.evaluator.check_syntax(&params.code) {
                Err(err) => Failure::InvalidArguments(format!(
                    "Script '{}' has invalid code: {err}",
                    params.namespace
                )),
                Ok(()) => {
                    let script = Script {
                        namespace: params.namespace,
                        description: params.description,
                        arguments: params.arguments,
                        code: params.code,
                    };
                    match context.scripts.add_script(script) {
                        Ok(()) => {
                            let message = format!("Created the script '{namespace}'.");
                            let title = format!("Created '{namespace}' script.");
                            return Ok(renderer.success(NAME, &arguments, title, message, None));
                        }
                        Err(err) => Failure::InvalidArguments(err.to_string()),
                    }
                }
            },
            Err(failure) => failure,
        };
        let heading = format!("Error creating script '{namespace}'");
        let title = format!("Failed to create '{namespace}' script!");
        Ok(renderer.failure(NAME, &arguments, title, &heading, failure))
    }
}
