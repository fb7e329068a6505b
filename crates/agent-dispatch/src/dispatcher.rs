//! Dispatching of model-emitted function calls.

use crate::{
    context::AgentContext,
    error::DispatchError,
    function::FunctionOutput,
    prompts,
    registry::FunctionRegistry,
    render::{Renderer, pretty_arguments},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A function call emitted by the model.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct FunctionCall {
    /// Function name.
    pub name: Option<String>,
    /// Raw argument string.
    pub arguments: Option<String>,
}

impl FunctionCall {
    /// Creates a new instance.
    pub fn new(name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            arguments: Some(arguments.into()),
        }
    }
}

/// Summary of a dispatched function call.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchSummary {
    /// Model-readable summary of the call and its outcome.
    pub text: String,
    /// Rendered outcome of the capability.
    pub output: FunctionOutput,
}

/// Dispatches a function call against the registry.
///
/// On success the transcript pair of the call is appended to the context's chat
/// before the summary is returned.
pub async fn dispatch(
    name: Option<&str>,
    arguments: Option<&str>,
    context: &mut AgentContext,
    registry: &FunctionRegistry,
) -> Result<DispatchSummary, DispatchError> {
    let result = dispatch_inner(name, arguments, context, registry).await;
    if let Err(err) = &result {
        tracing::warn!(function = err.function_name(), error = %err, "function call rejected");
    }
    result
}

/// Dispatches a [`FunctionCall`] against the registry.
pub async fn dispatch_call(
    call: &FunctionCall,
    context: &mut AgentContext,
    registry: &FunctionRegistry,
) -> Result<DispatchSummary, DispatchError> {
    dispatch(
        call.name.as_deref(),
        call.arguments.as_deref(),
        context,
        registry,
    )
    .await
}

async fn dispatch_inner(
    name: Option<&str>,
    arguments: Option<&str>,
    context: &mut AgentContext,
    registry: &FunctionRegistry,
) -> Result<DispatchSummary, DispatchError> {
    let Some(name) = name.filter(|name| !name.is_empty()) else {
        return Err(DispatchError::UndefinedFunctionName);
    };
    let Some(function) = registry.get(name) else {
        return Err(DispatchError::FunctionNotFound {
            name: name.to_owned(),
        });
    };
    let Some(raw_arguments) = arguments.filter(|arguments| !arguments.is_empty()) else {
        return Err(DispatchError::UndefinedFunctionArguments {
            name: name.to_owned(),
        });
    };
    let renderer = context.renderer();
    let parsed_arguments = serde_json::from_str::<Value>(raw_arguments).map_err(|err| {
        DispatchError::UnparsableFunctionArguments {
            name: name.to_owned(),
            arguments: renderer.error_text(raw_arguments).into_owned(),
            reason: renderer.error_text(&err.to_string()).into_owned(),
        }
    })?;

    tracing::info!(function = name, "dispatching function call");
    let output = function
        .execute(context, parsed_arguments.clone())
        .await
        .map_err(|message| DispatchError::CapabilityExecutionFailed {
            name: name.to_owned(),
            message: renderer.error_text(&message).into_owned(),
            arguments: renderer.error_text(raw_arguments).into_owned(),
        })?;
    context.chat.append_pair(output.transcript.clone());

    let text = summarize(name, &parsed_arguments, &output, &renderer);
    tracing::info!(
        function = name,
        success = output.is_success(),
        "function call finished"
    );
    Ok(DispatchSummary { text, output })
}

/// Formats the summary according to the function identity.
fn summarize(name: &str, arguments: &Value, output: &FunctionOutput, renderer: &Renderer) -> String {
    let mut text = prompts::function_call_header(name, &pretty_arguments(arguments));
    let message = output.message();
    if !output.is_success() {
        text.push_str(message);
        return text;
    }
    match name {
        "executeScript" => {
            let variable = arguments
                .get("variable")
                .or_else(|| arguments.get("result"))
                .and_then(Value::as_str)
                .filter(|variable| !variable.is_empty());
            if let (Some(variable), Some(result)) = (variable, output.result.as_deref()) {
                let preview = renderer.preview(result);
                text.push_str(&format!(
                    "Result stored into variable: `{{{{{variable}}}}}`. Preview: `{preview}`\n"
                ));
            }
            text.push_str(message);
        }
        "readVar" => {
            let variable = arguments.get("name").and_then(Value::as_str).unwrap_or_default();
            text.push_str(&prompts::read_var_output(variable, message));
        }
        _ => text.push_str(&prompts::other_function_output(message)),
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        function::{AgentFunction, CapabilityResult},
        render::TRUNCATION_MARKER,
        scripts::Script,
        transcript::Role,
    };
    use serde_json::json;

    struct Broken;

    struct Verbose;

    #[async_trait::async_trait]
    impl AgentFunction for Verbose {
        fn name(&self) -> &str {
            "verbose"
        }

        fn description(&self) -> &str {
            "Faults with a long message."
        }

        fn parameters(&self) -> Value {
            json!({"type": "object"})
        }

        async fn execute(&self, _context: &mut AgentContext, _arguments: Value) -> CapabilityResult {
            Err("x".repeat(10_000))
        }
    }

    #[async_trait::async_trait]
    impl AgentFunction for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        fn description(&self) -> &str {
            "Always faults."
        }

        fn parameters(&self) -> Value {
            json!({"type": "object"})
        }

        async fn execute(&self, _context: &mut AgentContext, _arguments: Value) -> CapabilityResult {
            Err("disk on fire".to_owned())
        }
    }

    #[tokio::test]
    async fn it_validates_calls() {
        let registry = FunctionRegistry::with_defaults();
        let mut context = AgentContext::default();

        let err = dispatch(None, Some("{}"), &mut context, &registry).await.unwrap_err();
        assert_eq!(err, DispatchError::UndefinedFunctionName);

        let err = dispatch(Some("fly"), Some("{}"), &mut context, &registry)
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::FunctionNotFound { .. }));

        let err = dispatch(Some("readVar"), None, &mut context, &registry)
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::UndefinedFunctionArguments { .. }));

        let err = dispatch(Some("readVar"), Some("{name: 'y'}"), &mut context, &registry)
            .await
            .unwrap_err();
        let DispatchError::UnparsableFunctionArguments { arguments, .. } = &err else {
            panic!("unexpected error: {err:?}");
        };
        assert_eq!(arguments, "{name: 'y'}");
        assert!(err.to_string().contains("Try again with valid JSON arguments."));
        assert!(context.chat.is_empty());
    }

    #[tokio::test]
    async fn it_wraps_internal_faults() {
        let mut registry = FunctionRegistry::new();
        registry.register(Broken).unwrap();
        let mut context = AgentContext::default();
        let err = dispatch(Some("broken"), Some("{}"), &mut context, &registry)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            DispatchError::CapabilityExecutionFailed {
                name: "broken".to_owned(),
                message: "disk on fire".to_owned(),
                arguments: "{}".to_owned(),
            }
        );
        assert!(context.chat.is_empty());
    }

    #[tokio::test]
    async fn it_bounds_dispatch_errors() {
        let mut registry = FunctionRegistry::with_defaults();
        registry.register(Verbose).unwrap();
        let mut context = AgentContext::default();

        let arguments = format!("{{\"name\": \"{}", "y".repeat(10_000));
        let err = dispatch(Some("readVar"), Some(&arguments), &mut context, &registry)
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::UnparsableFunctionArguments { .. }));
        assert!(err.to_string().len() < 1_000);

        let err = dispatch(Some("verbose"), Some("{}"), &mut context, &registry)
            .await
            .unwrap_err();
        let DispatchError::CapabilityExecutionFailed { message, .. } = &err else {
            panic!("unexpected error: {err:?}");
        };
        assert_eq!(message.chars().count(), 300 + TRUNCATION_MARKER.len());
        assert!(err.to_string().len() < 1_000);
    }

    #[tokio::test]
    async fn it_summarizes_script_results() {
        let registry = FunctionRegistry::with_defaults();
        let mut context = AgentContext::default();
        context
            .scripts
            .add_script(Script::new("greet", "return 'hi ' + who"))
            .unwrap();
        let call = FunctionCall::new(
            "executeScript",
            r#"{"namespace": "greet", "arguments": "{who: 'bob'}", "variable": "g"}"#,
        );
        let summary = dispatch_call(&call, &mut context, &registry).await.unwrap();
        assert!(summary.text.starts_with("Function call: `executeScript({"));
        assert!(summary.text.contains("Result stored into variable: `{{g}}`. Preview: `\"hi bob\"`"));
        assert!(summary.text.contains("Result stored in variable: {{g}}"));

        let messages = context.chat.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::FunctionCall);
        assert_eq!(messages[1].role, Role::FunctionResult);
    }

    #[tokio::test]
    async fn it_routes_summaries_by_function() {
        let registry = FunctionRegistry::with_defaults();
        let mut context = AgentContext::default();
        context.variables.set("g", &json!([1, 2]));

        let summary = dispatch(Some("readVar"), Some(r#"{"name": "g"}"#), &mut context, &registry)
            .await
            .unwrap();
        assert!(summary.text.ends_with("## Variable {{g}}\n```\n[1,2]\n```"));

        let summary = dispatch(
            Some("writeFile"),
            Some(r#"{"path": "a.txt", "data": "x"}"#),
            &mut context,
            &registry,
        )
        .await
        .unwrap();
        assert!(summary.text.ends_with("```\nWritten data to file 'a.txt'.\n```"));
        assert_eq!(context.chat.len(), 4);

        let summary = dispatch(Some("readVar"), Some(r#"{"name": "nope"}"#), &mut context, &registry)
            .await
            .unwrap();
        assert!(!summary.output.is_success());
        assert!(!summary.text.contains("## Variable"));
        assert!(summary.text.ends_with(
            "Error reading variable 'nope'\n```\nVariable 'nope' not found!\n```"
        ));
        assert_eq!(context.chat.len(), 6);
    }
}
