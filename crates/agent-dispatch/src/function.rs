//! The capability interface exposed to the model.

use crate::{context::AgentContext, error::Failure, transcript::TranscriptPair};
use serde::Serialize;
use serde_json::Value;

/// Result of running a capability.
///
/// `Ok` carries the rendered outcome, which may itself describe a
/// capability-level [`Failure`]. `Err` carries an unexpected internal fault.
pub type CapabilityResult = Result<FunctionOutput, String>;

/// Trait for implementing capabilities callable by the model.
///
/// A capability is registered once and invoked with the session context
/// for every matching function call.
#[async_trait::async_trait]
pub trait AgentFunction: Send + Sync {
    /// Get the function name, unique within a registry.
    fn name(&self) -> &str;

    /// Get the function description.
    fn description(&self) -> &str;

    /// Get the JSON Schema of the function parameters.
    fn parameters(&self) -> Value;

    /// Execute the function with the parsed arguments.
    ///
    /// # Arguments
    /// * `context` - Session context
    /// * `arguments` - Parsed function arguments
    ///
    /// # Returns
    /// * `CapabilityResult` - Rendered outcome or an internal fault
    async fn execute(&self, context: &mut AgentContext, arguments: Value) -> CapabilityResult;
}

/// Kind of an agent output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputKind {
    /// The call succeeded.
    Success,
    /// The call failed.
    Error,
}

/// A titled output shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentOutput {
    /// Output kind.
    #[serde(rename = "type")]
    pub kind: OutputKind,
    /// Short title.
    pub title: String,
    /// Markdown content.
    pub content: String,
}

impl AgentOutput {
    /// Creates a new instance.
    pub fn new(kind: OutputKind, title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            content: content.into(),
        }
    }
}

/// Rendered outcome of a capability.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionOutput {
    /// Output for the user.
    pub output: AgentOutput,
    /// Transcript entries for the model.
    pub transcript: TranscriptPair,
    /// Raw result payload, if any.
    pub result: Option<String>,
    /// Capability-level failure, if any.
    pub failure: Option<Failure>,
}

impl FunctionOutput {
    /// Returns `true` if the capability reported no failure.
    #[inline]
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }

    /// Returns the text the model reads as the function result.
    #[inline]
    pub fn message(&self) -> &str {
        &self.transcript.result().content
    }
}
