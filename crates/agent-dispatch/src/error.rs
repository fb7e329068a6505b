//! Error types for function dispatch.

use crate::prompts;
use std::fmt;
use thiserror::Error;

/// Errors that stop a function call before or while its capability runs.
///
/// Every variant renders as model-readable text, so the caller can feed it back
/// into the conversation instead of aborting the session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// The model emitted a function call without a name.
    #[error("{}", prompts::undefined_function_name())]
    UndefinedFunctionName,
    /// The model emitted a function call without arguments.
    #[error("{}", prompts::undefined_function_args(.name))]
    UndefinedFunctionArguments {
        /// Function name.
        name: String,
    },
    /// No function with the given name is registered.
    #[error("{}", prompts::function_not_found(.name))]
    FunctionNotFound {
        /// Function name.
        name: String,
    },
    /// The raw arguments are not well-formed JSON.
    #[error("{}", prompts::unparsable_function_args(.name, .arguments, .reason))]
    UnparsableFunctionArguments {
        /// Function name.
        name: String,
        /// The offending argument string.
        arguments: String,
        /// Parser diagnostic.
        reason: String,
    },
    /// The capability hit an unexpected internal fault.
    #[error("{}", prompts::function_call_failed(.name, .message, .arguments))]
    CapabilityExecutionFailed {
        /// Function name.
        name: String,
        /// Fault message reported by the capability.
        message: String,
        /// The raw argument string of the call.
        arguments: String,
    },
}

impl DispatchError {
    /// Returns the name of the function involved, if any.
    pub fn function_name(&self) -> Option<&str> {
        match self {
            Self::UndefinedFunctionName => None,
            Self::UndefinedFunctionArguments { name }
            | Self::FunctionNotFound { name }
            | Self::UnparsableFunctionArguments { name, .. }
            | Self::CapabilityExecutionFailed { name, .. } => Some(name),
        }
    }
}

/// A failure reported by a capability that still produced a rendered outcome.
///
/// These are data: the rendered error text is appended to the transcript just
/// like a successful result, so the model can observe it and react.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Failure {
    /// A named entity (script, variable, file) does not exist.
    NotFound(String),
    /// The capability arguments could not be parsed or validated.
    InvalidArguments(String),
    /// The capability ran and signaled a logical failure, e.g. a script threw.
    ExecutionFailed(String),
    /// The evaluation engine itself failed: syntax error, timeout, resource exhaustion.
    EvaluatorFailure(String),
}

impl Failure {
    /// Returns the failure message.
    pub fn message(&self) -> &str {
        match self {
            Self::NotFound(msg)
            | Self::InvalidArguments(msg)
            | Self::ExecutionFailed(msg)
            | Self::EvaluatorFailure(msg) => msg,
        }
    }

    /// Returns the kind of the failure as a static string.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NotFound",
            Self::InvalidArguments(_) => "InvalidCapabilityArguments",
            Self::ExecutionFailed(_) => "CapabilityExecutionFailed",
            Self::EvaluatorFailure(_) => "EvaluatorFailure",
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind(), self.message())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_renders_dispatch_errors() {
        let err = DispatchError::FunctionNotFound {
            name: "fly".to_owned(),
        };
        assert!(err.to_string().contains("not found"));
        assert_eq!(err.function_name(), Some("fly"));
        assert_eq!(DispatchError::UndefinedFunctionName.function_name(), None);
    }

    #[test]
    fn it_formats_failures() {
        let failure = Failure::InvalidArguments("bad".to_owned());
        assert_eq!(failure.message(), "bad");
        assert_eq!(failure.to_string(), "InvalidCapabilityArguments: bad");
    }
}
