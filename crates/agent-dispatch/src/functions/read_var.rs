use super::{object_schema, parse_params};
use crate::{
    context::AgentContext,
    error::Failure,
    function::{AgentFunction, CapabilityResult},
};
use serde::Deserialize;
use serde_json::{Value, json};

const NAME: &str = "readVar";

/// Reads the JSON value of a stored variable.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadVar;

#[derive(Debug, Deserialize)]
struct ReadVarParams {
    name: String,
}

#[async_trait::async_trait]
impl AgentFunction for ReadVar {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Read the value of a variable."
    }

    fn parameters(&self) -> Value {
        object_schema(
            json!({
                "name": {
                    "type": "string",
                    "description": "Name of the variable, without the curly braces",
                },
            }),
            &["name"],
        )
    }

    async fn execute(&self, context: &mut AgentContext, arguments: Value) -> CapabilityResult {
        let renderer = context.renderer();
        let params = parse_params::<ReadVarParams>(NAME, &arguments);
        let name = match &params {
            Ok(params) => params.name.trim().trim_matches(['{', '}']).to_owned(),
            Err(_) => String::new(),
        };
        let title_failed = format!("Failed to read '{name}' variable!");
        let failure = match params {
            Ok(_) => match context.variables.get_raw(&name) {
                Some(value) => {
                    let value = renderer.preview_result(value).into_owned();
                    let title = format!("Read '{name}' variable.");
                    return Ok(renderer.success(NAME, &arguments, title, value.clone(), Some(value)));
                }
                None => Failure::NotFound(format!("Variable '{name}' not found!")),
            },
            Err(failure) => failure,
        };
        let heading = format!("Error reading variable '{name}'");
        Ok(renderer.failure(NAME, &arguments, title_failed, &heading, failure))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn it_reads_variables() {
        let mut context = AgentContext::default();
        context.variables.set("y", &json!({"a": 1}));
        let output = ReadVar
            .execute(&mut context, json!({"name": "y"}))
            .await
            .unwrap();
        assert_eq!(output.message(), r#"{"a":1}"#);

        let output = ReadVar
            .execute(&mut context, json!({"name": "{{y}}"}))
            .await
            .unwrap();
        assert!(output.is_success());
    }

    #[tokio::test]
    async fn it_reports_missing_variables() {
        let mut context = AgentContext::default();
        let output = ReadVar
            .execute(&mut context, json!({"name": "nope"}))
            .await
            .unwrap();
        assert_eq!(
            output.failure,
            Some(Failure::NotFound("Variable 'nope' not found!".to_owned()))
        );
        assert_eq!(
            output.message(),
            "Error reading variable 'nope'\n```\nVariable 'nope' not found!\n```"
        );
    }
}
