#![doc = include_str!("../README.md")]

pub mod config;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod evaluator;
pub mod function;
pub mod functions;
pub mod prompts;
pub mod registry;
pub mod render;
pub mod resolver;
pub mod scripts;
pub mod trace;
pub mod transcript;
pub mod variables;
pub mod workspace;

pub use config::AgentConfig;
pub use context::AgentContext;
pub use dispatcher::{DispatchSummary, FunctionCall, dispatch, dispatch_call};
pub use error::{DispatchError, Failure};
pub use evaluator::{EvalOutcome, Evaluator, GlobalVar, ScriptEngine};
pub use function::{AgentFunction, AgentOutput, CapabilityResult, FunctionOutput, OutputKind};
pub use registry::{FunctionDefinition, FunctionRegistry};
pub use scripts::{Script, ScriptCatalog, Scripts};
pub use transcript::{Chat, ChatMessage, Role, TranscriptPair};
pub use variables::VariableStore;
pub use workspace::{FsWorkspace, InMemoryWorkspace, Workspace};

/// A JSON key-value type.
pub type Map = serde_json::Map<String, serde_json::Value>;
