use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::deferred::DeferredRef;
use crate::diagnostics::Diagnostic;
use crate::ir::BindingId;

/// A side effect requested by the template. Returned to the caller, never run here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Action {
    RunCommand {
        command: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cwd: Option<String>,
    },
    OpenUrl {
        url: String,
    },
    OpenFile {
        path: String,
        #[serde(default)]
        review: bool,
    },
}

/// Append-only state for the render step of one call.
#[derive(Debug, Default)]
pub struct RenderContext {
    pub(crate) diagnostics: Vec<Diagnostic>,
    pub(crate) actions: Vec<Action>,
    bindings: HashMap<String, BindingId>,
}

impl RenderContext {
    pub fn new(bindings: HashMap<String, BindingId>) -> Self {
        Self {
            diagnostics: Vec::new(),
            actions: Vec::new(),
            bindings,
        }
    }

    pub fn warn(&mut self, code: &str, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic::new(code, message));
    }

    pub fn push_diagnostic(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    pub fn push_action(&mut self, action: Action) {
        self.actions.push(action);
    }

    /// Reference to a hoisted binding by name, for render outputs that point at
    /// another element's data.
    pub fn deferred(&self, name: &str) -> Option<DeferredRef> {
        self.bindings.get(name).map(|id| DeferredRef::new(*id))
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn into_parts(self) -> (Vec<Diagnostic>, Vec<Action>) {
        (self.diagnostics, self.actions)
    }
}

/// Per-resolver buffer. Resolvers may run concurrently; each writes to its own
/// context and the buffers are merged in document order afterwards.
#[derive(Debug, Default)]
pub struct ResolveContext {
    pub(crate) diagnostics: Vec<Diagnostic>,
}

impl ResolveContext {
    pub fn warn(&mut self, code: &str, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic::new(code, message));
    }
}
