use agent_dispatch::{
    AgentConfig, AgentContext, DispatchError, Failure, FunctionRegistry, Script, dispatch,
    resolver::resolve_placeholders, render::TRUNCATION_MARKER,
};
use serde_json::json;

fn setup() -> (AgentContext, FunctionRegistry) {
    let mut context = AgentContext::default();
    context
        .scripts
        .add_script(Script::new("math.inc", "return x + 1"))
        .unwrap();
    context
        .scripts
        .add_script(Script::new("text.hi", "return 'hi'"))
        .unwrap();
    context
        .scripts
        .add_script(Script::new(
            "check.positive",
            "if (n <= 0) { throw new Error('n must be positive') }\nreturn n",
        ))
        .unwrap();
    (context, FunctionRegistry::with_defaults())
}

async fn execute_script(
    context: &mut AgentContext,
    registry: &FunctionRegistry,
    arguments: serde_json::Value,
) -> agent_dispatch::DispatchSummary {
    dispatch(
        Some("executeScript"),
        Some(&arguments.to_string()),
        context,
        registry,
    )
    .await
    .unwrap()
}

#[tokio::test]
async fn unknown_script_is_reported_as_not_found() {
    let (mut context, registry) = setup();
    let summary = execute_script(
        &mut context,
        &registry,
        json!({"namespace": "unknown", "arguments": "{}"}),
    )
    .await;
    assert!(summary.text.contains("not found"));
    assert!(matches!(summary.output.failure, Some(Failure::NotFound(_))));
    assert_eq!(context.chat.len(), 2);
}

#[tokio::test]
async fn malformed_script_arguments_are_named_in_the_summary() {
    let (mut context, registry) = setup();
    let summary = execute_script(
        &mut context,
        &registry,
        json!({"namespace": "math.inc", "arguments": "{bad json", "variable": "y"}),
    )
    .await;
    assert!(summary.text.contains("'{bad json' is not valid JSON!"));
    assert!(matches!(
        summary.output.failure,
        Some(Failure::InvalidArguments(_))
    ));
    assert!(context.variables.is_empty());
}

#[tokio::test]
async fn script_result_is_rendered_as_json() {
    let (mut context, registry) = setup();
    let summary = execute_script(
        &mut context,
        &registry,
        json!({"namespace": "math.inc", "arguments": "{x: 1}"}),
    )
    .await;
    assert_eq!(summary.output.result.as_deref(), Some("2"));
    assert!(summary.text.contains("JSON result:\n```\n2\n```"));
}

#[tokio::test]
async fn thrown_errors_render_a_failed_script_summary() {
    let (mut context, registry) = setup();
    let summary = execute_script(
        &mut context,
        &registry,
        json!({"namespace": "check.positive", "arguments": "{n: -1}", "variable": "n"}),
    )
    .await;
    assert_eq!(
        summary.output.failure,
        Some(Failure::ExecutionFailed("Error: n must be positive".to_owned()))
    );
    assert!(
        summary
            .text
            .contains("Error executing script 'check.positive'\n```\nError: n must be positive\n```")
    );
    assert_eq!(
        summary.output.output.title,
        "'check.positive' script failed to execute!"
    );
    assert!(!context.variables.contains("n"));
}

#[tokio::test]
async fn results_are_stored_in_variables() {
    let (mut context, registry) = setup();
    let summary = execute_script(
        &mut context,
        &registry,
        json!({"namespace": "text.hi", "arguments": "{}", "variable": "y"}),
    )
    .await;
    assert_eq!(context.variables.get_raw("y"), Some("\"hi\""));
    assert!(summary.text.contains("{{y}}"));
    assert_eq!(resolve_placeholders("say {{y}}", &context.variables), "say hi");
}

#[tokio::test]
async fn variables_flow_between_calls() {
    let (mut context, registry) = setup();
    execute_script(
        &mut context,
        &registry,
        json!({"namespace": "math.inc", "arguments": "{x: 41}", "variable": "answer"}),
    )
    .await;
    let summary = execute_script(
        &mut context,
        &registry,
        json!({"namespace": "math.inc", "arguments": "{x: \"{{answer}}\"}"}),
    )
    .await;
    // Placeholders are substituted as text inside string fields.
    assert_eq!(summary.output.result.as_deref(), Some("\"421\""));

    let summary = dispatch(
        Some("readVar"),
        Some(r#"{"name": "answer"}"#),
        &mut context,
        &registry,
    )
    .await
    .unwrap();
    assert!(summary.text.contains("## Variable {{answer}}\n```\n42\n```"));
    assert_eq!(context.chat.len(), 6);
}

#[tokio::test]
async fn created_scripts_can_be_executed() {
    let (mut context, registry) = setup();
    let create = json!({
        "namespace": "list.total",
        "description": "Sums the prices of the items",
        "arguments": "{ items: { price: number }[] }",
        "code": "let total = 0\nfor (const item of items) { total += item.price }\nreturn total",
    });
    dispatch(
        Some("createScript"),
        Some(&create.to_string()),
        &mut context,
        &registry,
    )
    .await
    .unwrap();
    let summary = execute_script(
        &mut context,
        &registry,
        json!({
            "namespace": "list.total",
            "arguments": "{items: [{price: 1.5}, {price: 2}]}",
            "variable": "total",
        }),
    )
    .await;
    assert!(summary.output.is_success());
    assert_eq!(context.variables.get("total"), Some(json!(3.5)));
}

#[tokio::test]
async fn long_results_are_truncated() {
    let config = AgentConfig::from_toml_str("[render]\nresult-limit = 50\n").unwrap();
    let mut context = AgentContext::new(config);
    context
        .scripts
        .add_script(Script::new("text.long", "return 'a'.repeat(500)"))
        .unwrap();
    let registry = FunctionRegistry::with_defaults();
    let summary = execute_script(
        &mut context,
        &registry,
        json!({"namespace": "text.long", "arguments": "{}", "variable": "long"}),
    )
    .await;
    let message = summary.output.message();
    assert!(message.starts_with("Preview of JSON result:"));
    let preview = message.lines().nth(2).unwrap();
    assert!(preview.ends_with(TRUNCATION_MARKER));
    assert!(preview.chars().count() <= 50 + TRUNCATION_MARKER.len());
    assert_eq!(context.variables.get("long").unwrap().as_str().unwrap().len(), 500);
}

#[tokio::test]
async fn runaway_scripts_fail_with_an_evaluator_error() {
    let config = AgentConfig::from_toml_str("[evaluator]\nmax-steps = 500\ntimeout = \"2s\"\n").unwrap();
    let mut context = AgentContext::new(config);
    context
        .scripts
        .add_script(Script::new("spin", "while (true) {}"))
        .unwrap();
    let registry = FunctionRegistry::with_defaults();
    let summary = execute_script(
        &mut context,
        &registry,
        json!({"namespace": "spin", "arguments": "{}", "variable": "v"}),
    )
    .await;
    assert!(matches!(
        summary.output.failure,
        Some(Failure::EvaluatorFailure(_))
    ));
    assert!(!context.variables.contains("v"));
}

#[tokio::test]
async fn invalid_calls_leave_no_trace() {
    let (mut context, registry) = setup();
    let err = dispatch(Some("executeScript"), Some("not json"), &mut context, &registry)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        DispatchError::UnparsableFunctionArguments { .. }
    ));
    assert!(context.chat.is_empty());
    assert!(context.variables.is_empty());
}

#[tokio::test]
async fn oversized_values_fail_with_an_evaluator_error() {
    let config = AgentConfig::from_toml_str("[evaluator]\nmax-value-size = 1024\n").unwrap();
    let mut context = AgentContext::new(config);
    context
        .scripts
        .add_script(Script::new("grow", "let s = 'x'\nwhile (true) { s = s + s }"))
        .unwrap();
    let registry = FunctionRegistry::with_defaults();
    let summary = execute_script(
        &mut context,
        &registry,
        json!({"namespace": "grow", "arguments": "{}", "variable": "s"}),
    )
    .await;
    assert!(matches!(
        &summary.output.failure,
        Some(Failure::EvaluatorFailure(message)) if message.contains("resource limit")
    ));
    assert!(summary.text.contains("Error executing script 'grow'\n```\n"));
    assert!(!context.variables.contains("s"));
}

#[tokio::test]
async fn deeply_nested_scripts_are_rejected() {
    let (mut context, registry) = setup();
    let code = format!("return {}1{}", "[".repeat(10_000), "]".repeat(10_000));
    let create = json!({
        "namespace": "deep",
        "description": "Too deep",
        "arguments": "{}",
        "code": code,
    });
    let summary = dispatch(
        Some("createScript"),
        Some(&create.to_string()),
        &mut context,
        &registry,
    )
    .await
    .unwrap();
    assert!(matches!(
        summary.output.failure,
        Some(Failure::InvalidArguments(_))
    ));
    assert!(summary.text.contains("Error creating script 'deep'\n```\n"));
    assert!(summary.text.contains("maximum nesting depth exceeded"));
}

#[tokio::test]
async fn failures_are_rendered_as_bounded_fenced_text() {
    let (mut context, registry) = setup();
    let summary = dispatch(
        Some("readVar"),
        Some(r#"{"name": "missing"}"#),
        &mut context,
        &registry,
    )
    .await
    .unwrap();
    assert!(summary.text.ends_with(
        "Error reading variable 'missing'\n```\nVariable 'missing' not found!\n```"
    ));

    let arguments = format!("{{\"path\": {}", "[".repeat(10_000));
    let err = dispatch(Some("readFile"), Some(&arguments), &mut context, &registry)
        .await
        .unwrap_err();
    assert!(err.to_string().len() < 1_000);
    assert_eq!(context.chat.len(), 2);
}
