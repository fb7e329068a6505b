use super::{check_encoding, object_schema, parse_params};
use crate::{
    context::AgentContext,
    error::Failure,
    function::{AgentFunction, CapabilityResult},
    workspace::WorkspaceError,
};
use serde::Deserialize;
use serde_json::{Value, json};

const NAME: &str = "writeFile";

/// Writes a text file to the workspace.
#[derive(Debug, Clone, Copy, Default)]
pub struct WriteFile;

#[derive(Debug, Deserialize)]
struct WriteFileParams {
    path: String,
    data: String,
    encoding: Option<String>,
}

#[async_trait::async_trait]
impl AgentFunction for WriteFile {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Write data to a file in the workspace."
    }

    fn parameters(&self) -> Value {
        object_schema(
            json!({
                "path": {
                    "type": "string",
                    "description": "Path of the file relative to the workspace",
                },
                "data": {
                    "type": "string",
                    "description": "Text to write",
                },
                "encoding": {
                    "type": "string",
                    "description": "Text encoding, defaults to utf-8",
                },
            }),
            &["path", "data"],
        )
    }

    async fn execute(&self, context: &mut AgentContext, arguments: Value) -> CapabilityResult {
        let renderer = context.renderer();
        let params = parse_params::<WriteFileParams>(NAME, &arguments);
        let path = params
            .as_ref()
            .map(|params| params.path.clone())
            .unwrap_or_default();
        let result = params.and_then(|params| {
            check_encoding(params.encoding.as_deref())?;
            context
                .workspace
                .write_file(&params.path, &params.data)
                .map_err(|err| match err {
                    WorkspaceError::OutsideWorkspace(_) => Failure::InvalidArguments(err.to_string()),
                    _ => Failure::ExecutionFailed(err.to_string()),
                })
        });
        match result {
            Ok(()) => {
                let message = format!("Written data to file '{path}'.");
                let title = format!("Wrote '{path}' file.");
                Ok(renderer.success(NAME, &arguments, title, message, None))
            }
            Err(failure) => {
                let heading = format!("Error writing file '{path}'");
                let title = format!("Failed to write '{path}' file!");
                Ok(renderer.failure(NAME, &arguments, title, &heading, failure))
            }
        }
    }
}
