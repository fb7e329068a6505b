//! Script evaluation behind the [`Evaluator`] trait.
//!
//! The bundled [`ScriptEngine`] interprets a small JavaScript-like language.
//! Every evaluation runs in a fresh scope seeded only from its globals, so
//! nothing leaks between calls or back into the caller.

use crate::{Map, config::EvaluatorConfig};
use async_trait::async_trait;
use interpreter::{Completion, Limits};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

mod interpreter;
mod lexer;
mod parser;

/// Errors raised by the script engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScriptError {
    /// The source could not be parsed.
    #[error("SyntaxError: {message} (line {line})")]
    Syntax {
        /// Line of the offending token.
        line: usize,
        /// Parser diagnostic.
        message: String,
    },
    /// The step budget was exhausted.
    #[error("script exceeded the step limit of {0}")]
    StepLimit(u64),
    /// The wall-clock budget was exhausted.
    #[error("script timed out after {0:?}")]
    Timeout(Duration),
    /// A value outgrew the size or nesting limits.
    #[error("script exceeded the resource limit: {0}")]
    ResourceLimit(String),
    /// A global value is not valid JSON.
    #[error("invalid global `{name}`: {reason}")]
    InvalidGlobal {
        /// Name of the global.
        name: String,
        /// Decoder diagnostic.
        reason: String,
    },
    /// The evaluation task panicked or was cancelled.
    #[error("script engine aborted: {0}")]
    Aborted(String),
}

impl ScriptError {
    /// Creates a syntax error at the line.
    pub(crate) fn syntax(line: usize, message: impl Into<String>) -> Self {
        Self::Syntax {
            line,
            message: message.into(),
        }
    }
}

/// A named global made available to a script, holding a JSON-serialized value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalVar {
    /// Identifier visible to the script.
    pub name: String,
    /// JSON-serialized value.
    pub value: String,
}

impl GlobalVar {
    /// Creates a new instance.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Creates a global by serializing the value.
    pub fn from_value(name: impl Into<String>, value: &Value) -> Self {
        Self::new(name, value.to_string())
    }
}

/// Outcome of a single evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum EvalOutcome {
    /// The script finished; `None` stands for an undefined result.
    Completed(Option<Value>),
    /// The script threw; the payload is the error message.
    Thrown(String),
    /// The engine could not run the script to completion.
    Failed(String),
}

/// An engine which evaluates script sources.
#[async_trait]
pub trait Evaluator: Send + Sync {
    /// Evaluates the source as a function body with the globals in scope.
    async fn evaluate(&self, source: &str, globals: &[GlobalVar]) -> EvalOutcome;

    /// Checks that the source is syntactically valid.
    ///
    /// The error is a diagnostic for the model, e.g. `SyntaxError: ... (line 2)`.
    fn check_syntax(&self, source: &str) -> Result<(), String>;
}

/// The reference script engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScriptEngine {
    config: EvaluatorConfig,
}

impl ScriptEngine {
    /// Creates a new instance.
    #[inline]
    pub fn new(config: EvaluatorConfig) -> Self {
        Self { config }
    }

    /// Returns the engine settings.
    #[inline]
    pub fn config(&self) -> &EvaluatorConfig {
        &self.config
    }

    async fn run(&self, source: &str, globals: &[GlobalVar]) -> Result<Completion, ScriptError> {
        let mut scope = Map::new();
        for global in globals {
            let value = serde_json::from_str(&global.value).map_err(|err| {
                ScriptError::InvalidGlobal {
                    name: global.name.clone(),
                    reason: err.to_string(),
                }
            })?;
            scope.insert(global.name.clone(), value);
        }
        let limits = Limits {
            max_steps: self.config.max_steps,
            timeout: self.config.timeout,
            max_value_size: self.config.max_value_size,
        };
        let source = source.to_owned();
        let task = tokio::task::spawn_blocking(move || {
            let program = parser::parse(&source)?;
            interpreter::run(&program, scope, limits)
        });
        match tokio::time::timeout(limits.timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(err)) => Err(ScriptError::Aborted(err.to_string())),
            Err(_) => Err(ScriptError::Timeout(limits.timeout)),
        }
    }
}

#[async_trait]
impl Evaluator for ScriptEngine {
    async fn evaluate(&self, source: &str, globals: &[GlobalVar]) -> EvalOutcome {
        match self.run(source, globals).await {
            Ok(Completion::Value(value)) => EvalOutcome::Completed(value),
            Ok(Completion::Thrown(message)) => {
                tracing::debug!(error = %message, "script threw an error");
                EvalOutcome::Thrown(message)
            }
            Err(err) => {
                tracing::debug!(error = %err, "script evaluation failed");
                EvalOutcome::Failed(err.to_string())
            }
        }
    }

    fn check_syntax(&self, source: &str) -> Result<(), String> {
        parser::parse(source)
            .map(|_| ())
            .map_err(|err| err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn it_evaluates_with_globals() {
        let engine = ScriptEngine::default();
        let globals = [
            GlobalVar::from_value("x", &json!(1)),
            GlobalVar::new("name", r#""world""#),
        ];
        assert_eq!(
            engine.evaluate("return x + 1", &globals).await,
            EvalOutcome::Completed(Some(json!(2)))
        );
        assert_eq!(
            engine.evaluate("let greeting = 'hello '\ngreeting + name", &globals).await,
            EvalOutcome::Completed(Some(json!("hello world")))
        );
        assert_eq!(
            engine.evaluate("let unused = x", &globals).await,
            EvalOutcome::Completed(None)
        );
    }

    #[tokio::test]
    async fn it_isolates_evaluations() {
        let engine = ScriptEngine::default();
        let globals = [GlobalVar::from_value("list", &json!([1]))];
        let source = "list.push(2); return list";
        assert_eq!(
            engine.evaluate(source, &globals).await,
            EvalOutcome::Completed(Some(json!([1, 2])))
        );
        assert_eq!(
            engine.evaluate(source, &globals).await,
            EvalOutcome::Completed(Some(json!([1, 2])))
        );
        assert!(matches!(
            engine.evaluate("leaked", &[]).await,
            EvalOutcome::Thrown(message) if message.contains("not defined")
        ));
    }

    #[tokio::test]
    async fn it_reports_engine_failures() {
        let engine = ScriptEngine::default();
        assert!(matches!(
            engine.evaluate("return (1", &[]).await,
            EvalOutcome::Failed(message) if message.starts_with("SyntaxError")
        ));
        assert!(matches!(
            engine.evaluate("return x", &[GlobalVar::new("x", "{oops")]).await,
            EvalOutcome::Failed(message) if message.starts_with("invalid global `x`")
        ));

        let engine = ScriptEngine::new(EvaluatorConfig {
            max_steps: 1_000,
            ..EvaluatorConfig::default()
        });
        assert_eq!(
            engine.evaluate("while (true) {}", &[]).await,
            EvalOutcome::Failed("script exceeded the step limit of 1000".to_owned())
        );
    }

    fn nested_arrays(depth: usize) -> String {
        format!("return {}1{}", "[".repeat(depth), "]".repeat(depth))
    }

    #[tokio::test]
    async fn it_rejects_deep_nesting_without_overflowing() {
        let engine = ScriptEngine::default();
        let depth = parser::MAX_DEPTH - 3;
        let EvalOutcome::Completed(Some(mut value)) =
            engine.evaluate(&nested_arrays(depth), &[]).await
        else {
            panic!("deeply nested literal should evaluate");
        };
        for _ in 0..depth {
            value = value[0].take();
        }
        assert_eq!(value, json!(1));

        for depth in [parser::MAX_DEPTH - 1, parser::MAX_DEPTH * 100] {
            assert!(matches!(
                engine.evaluate(&nested_arrays(depth), &[]).await,
                EvalOutcome::Failed(message) if message.contains("maximum nesting depth exceeded")
            ));
            assert!(engine.check_syntax(&nested_arrays(depth)).is_err());
        }
    }

    #[tokio::test]
    async fn it_limits_value_sizes() {
        let engine = ScriptEngine::new(EvaluatorConfig {
            max_steps: 10,
            ..EvaluatorConfig::default()
        });
        assert!(matches!(
            engine.evaluate("let a = []; a[5000000] = 1; return a.length", &[]).await,
            EvalOutcome::Failed(message) if message.contains("resource limit")
        ));

        let engine = ScriptEngine::default();
        let doubling = "let s = 'x'; for (let i = 0; i < 40; i++) { s = s + s } return s.length";
        assert!(matches!(
            engine.evaluate(doubling, &[]).await,
            EvalOutcome::Failed(message) if message.contains("resource limit")
        ));
        let small = "let s = 'x'; for (let i = 0; i < 10; i++) { s = s + s } return s.length";
        assert_eq!(
            engine.evaluate(small, &[]).await,
            EvalOutcome::Completed(Some(json!(1024)))
        );
    }

    #[test]
    fn it_checks_syntax() {
        let engine = ScriptEngine::default();
        assert!(engine.check_syntax("return a.b + 1").is_ok());
        let err = engine.check_syntax("let = 1").unwrap_err();
        assert!(err.starts_with("SyntaxError"));
    }
}
