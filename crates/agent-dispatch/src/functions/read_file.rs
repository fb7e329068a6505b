use super::{check_encoding, object_schema, parse_params};
use crate::{
    context::AgentContext,
    error::Failure,
    function::{AgentFunction, CapabilityResult},
    workspace::WorkspaceError,
};
use serde::Deserialize;
use serde_json::{Value, json};

const NAME: &str = "readFile";

/// Reads a text file of the workspace.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadFile;

#[derive(Debug, Deserialize)]
struct ReadFileParams {
    path: String,
    encoding: Option<String>,
}

#[async_trait::async_trait]
impl AgentFunction for ReadFile {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Read the data of a file in the workspace."
    }

    fn parameters(&self) -> Value {
        object_schema(
            json!({
                "path": {
                    "type": "string",
                    "description": "Path of the file relative to the workspace",
                },
                "encoding": {
                    "type": "string",
                    "description": "Text encoding, defaults to utf-8",
                },
            }),
            &["path"],
        )
    }

    async fn execute(&self, context: &mut AgentContext, arguments: Value) -> CapabilityResult {
        let renderer = context.renderer();
        let params = parse_params::<ReadFileParams>(NAME, &arguments);
        let path = params
            .as_ref()
            .map(|params| params.path.clone())
            .unwrap_or_default();
        let result = params.and_then(|params| {
            check_encoding(params.encoding.as_deref())?;
            context
                .workspace
                .read_file(&params.path)
                .map_err(|err| match err {
                    WorkspaceError::NotFound(_) => Failure::NotFound(err.to_string()),
                    WorkspaceError::OutsideWorkspace(_) => Failure::InvalidArguments(err.to_string()),
                    WorkspaceError::Io { .. } => Failure::ExecutionFailed(err.to_string()),
                })
        });
        match result {
            Ok(data) => {
                let data = renderer.preview_result(&data).into_owned();
                let title = format!("Read '{path}' file.");
                Ok(renderer.success(NAME, &arguments, title, data.clone(), Some(data)))
            }
            Err(failure) => {
                let heading = format!("Error reading file '{path}'");
                let title = format!("Failed to read '{path}' file!");
                Ok(renderer.failure(NAME, &arguments, title, &heading, failure))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn it_reads_workspace_files() {
        let mut context = AgentContext::default();
        context.workspace.write_file("a.txt", "hello").unwrap();
        let output = ReadFile
            .execute(&mut context, json!({"path": "a.txt"}))
            .await
            .unwrap();
        assert_eq!(output.message(), "hello");
        assert_eq!(output.output.title, "Read 'a.txt' file.");

        let output = ReadFile
            .execute(&mut context, json!({"path": "b.txt"}))
            .await
            .unwrap();
        assert!(matches!(output.failure, Some(Failure::NotFound(_))));
        assert!(output.message().starts_with("Error reading file 'b.txt'\n```\n"));

        let output = ReadFile
            .execute(&mut context, json!({"path": "a.txt", "encoding": "latin1"}))
            .await
            .unwrap();
        assert!(matches!(output.failure, Some(Failure::InvalidArguments(_))));
    }
}
