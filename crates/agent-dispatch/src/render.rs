//! Bounded, model-readable rendering of function results.

use crate::{
    config::RenderConfig,
    error::Failure,
    function::{AgentOutput, FunctionOutput, OutputKind},
    prompts,
    transcript::TranscriptPair,
};
use serde_json::Value;
use std::borrow::Cow;

/// Marker appended to truncated text.
pub const TRUNCATION_MARKER: &str = "...";

/// Cuts the text to at most `max` chars followed by the truncation marker.
///
/// Text within the limit is returned unchanged.
pub fn trim_text(text: &str, max: usize) -> Cow<'_, str> {
    match text.char_indices().nth(max) {
        Some((index, _)) => Cow::Owned(format!("{}{TRUNCATION_MARKER}", &text[..index])),
        None => Cow::Borrowed(text),
    }
}

/// Returns `true` if the serialized result stands for "no value".
pub fn is_empty_result(result: Option<&str>) -> bool {
    matches!(result, None | Some("" | "undefined" | "\"undefined\""))
}

/// Renders function outcomes with the configured limits.
#[derive(Debug, Clone, Copy, Default)]
pub struct Renderer {
    config: RenderConfig,
}

impl Renderer {
    /// Creates a new instance.
    #[inline]
    pub fn new(config: RenderConfig) -> Self {
        Self { config }
    }

    /// Renders the result of a script for the model.
    pub fn script_output(&self, variable: Option<&str>, result: Option<&str>) -> String {
        let stored = prompts::stored_result_in_var(variable);
        match result {
            Some(result) if !is_empty_result(Some(result)) => {
                if result.chars().count() > self.config.result_limit {
                    let preview = trim_text(result, self.config.result_limit);
                    format!("Preview of JSON result:\n```\n{preview}\n```\n{stored}")
                } else {
                    format!("JSON result:\n```\n{result}\n```\n{stored}")
                }
            }
            _ => "No result returned.".to_owned(),
        }
    }

    /// Renders a script failure for the model.
    #[inline]
    pub fn script_error(&self, namespace: &str, error: &str) -> String {
        self.error_block(&format!("Error executing script '{namespace}'"), error)
    }

    /// Renders an error as a fenced block under the heading.
    ///
    /// The error is trimmed to the error limit; an empty one reads "Unknown error".
    pub fn error_block(&self, heading: &str, error: &str) -> String {
        let error = if error.is_empty() {
            Cow::Borrowed("Unknown error")
        } else {
            self.error_text(error)
        };
        format!("{heading}\n```\n{error}\n```")
    }

    /// Returns the error text bounded by the error limit.
    #[inline]
    pub fn error_text<'a>(&self, text: &'a str) -> Cow<'a, str> {
        trim_text(text, self.config.error_limit)
    }

    /// Returns an inline preview of the text.
    #[inline]
    pub fn preview<'a>(&self, text: &'a str) -> Cow<'a, str> {
        trim_text(text, self.config.preview_limit)
    }

    /// Returns the result payload bounded by the result limit.
    #[inline]
    pub fn preview_result<'a>(&self, text: &'a str) -> Cow<'a, str> {
        trim_text(text, self.config.result_limit)
    }

    /// Builds a successful output.
    ///
    /// The `message` is what the model reads, `result` is the raw payload.
    pub fn success(
        &self,
        name: &str,
        arguments: &Value,
        title: impl Into<String>,
        message: String,
        result: Option<String>,
    ) -> FunctionOutput {
        let content =
            prompts::function_call_success_content(name, &pretty_arguments(arguments), &message);
        FunctionOutput {
            output: AgentOutput::new(OutputKind::Success, title, content),
            transcript: TranscriptPair::new(name, arguments, message),
            result,
            failure: None,
        }
    }

    /// Builds a failed output.
    ///
    /// The model reads the failure as a fenced error block under the `heading`.
    pub fn failure(
        &self,
        name: &str,
        arguments: &Value,
        title: impl Into<String>,
        heading: &str,
        failure: Failure,
    ) -> FunctionOutput {
        let message = self.error_block(heading, failure.message());
        let error = self.error_text(failure.message());
        let content =
            prompts::function_call_failed_content(name, &pretty_arguments(arguments), &error);
        tracing::warn!(function = name, kind = failure.kind(), "function reported a failure");
        FunctionOutput {
            output: AgentOutput::new(OutputKind::Error, title, content),
            transcript: TranscriptPair::new(name, arguments, message),
            result: None,
            failure: Some(failure),
        }
    }
}

/// Formats the arguments as indented JSON.
pub fn pretty_arguments(arguments: &Value) -> String {
    serde_json::to_string_pretty(arguments).unwrap_or_else(|_| arguments.to_string())
}
