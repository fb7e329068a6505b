//! Session context shared by all function calls of a conversation.

use crate::{
    config::AgentConfig,
    evaluator::{Evaluator, ScriptEngine},
    render::Renderer,
    scripts::{ScriptCatalog, Scripts},
    transcript::Chat,
    variables::VariableStore,
    workspace::{InMemoryWorkspace, Workspace},
};
use std::{fmt, sync::Arc};

/// Collaborators owned by one conversation session.
///
/// The context is passed as `&mut` through every call, so a session processes
/// one function call at a time.
pub struct AgentContext {
    /// Variables written by earlier calls.
    pub variables: VariableStore,
    /// Script evaluator.
    pub evaluator: Arc<dyn Evaluator>,
    /// File workspace.
    pub workspace: Box<dyn Workspace>,
    /// Script catalog.
    pub scripts: Box<dyn ScriptCatalog>,
    /// Conversation transcript.
    pub chat: Chat,
    /// Agent configuration.
    pub config: AgentConfig,
}

impl AgentContext {
    /// Creates a context with in-memory collaborators and the reference evaluator.
    pub fn new(config: AgentConfig) -> Self {
        Self {
            variables: VariableStore::new(),
            evaluator: Arc::new(ScriptEngine::new(config.evaluator)),
            workspace: Box::new(InMemoryWorkspace::new()),
            scripts: Box::new(Scripts::new()),
            chat: Chat::new(),
            config,
        }
    }

    /// Replaces the evaluator.
    #[inline]
    pub fn with_evaluator(mut self, evaluator: Arc<dyn Evaluator>) -> Self {
        self.evaluator = evaluator;
        self
    }

    /// Replaces the workspace.
    #[inline]
    pub fn with_workspace(mut self, workspace: impl Workspace + 'static) -> Self {
        self.workspace = Box::new(workspace);
        self
    }

    /// Replaces the script catalog.
    #[inline]
    pub fn with_scripts(mut self, scripts: impl ScriptCatalog + 'static) -> Self {
        self.scripts = Box::new(scripts);
        self
    }

    /// Returns a renderer with the configured limits.
    #[inline]
    pub fn renderer(&self) -> Renderer {
        Renderer::new(self.config.render)
    }
}

impl Default for AgentContext {
    fn default() -> Self {
        Self::new(AgentConfig::default())
    }
}

impl fmt::Debug for AgentContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentContext")
            .field("variables", &self.variables)
            .field("chat", &self.chat)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
