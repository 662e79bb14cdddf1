//! Component contract and registry
//!
//! A component is the behavior behind a tag: a props schema, an optional
//! resolver that produces data, and a render step. Components are looked up
//! through an explicit registry; imports map local names onto module exports
//! registered under `(source, export)`.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::context::{RenderContext, ResolveContext};
use crate::deferred::PropValue;
use crate::ir::{ImportDecl, ImportKind, Node};
use crate::schema::{Props, PropsSchema};

/// Children as handed to `render`.
pub enum Children<'a> {
    /// One entry per child node, already evaluated in document order.
    Rendered(Vec<String>),
    /// Unevaluated child nodes, for components that set `wants_raw_children`.
    Raw(&'a [Node]),
}

impl Children<'_> {
    /// Rendered children concatenated, or the raw children printed as markup.
    pub fn text(&self) -> String {
        match self {
            Children::Rendered(parts) => parts.concat(),
            Children::Raw(nodes) => crate::ir::to_source(nodes),
        }
    }

    /// Non-empty rendered children, trimmed. Raw children yield nothing.
    pub fn items(&self) -> Vec<&str> {
        match self {
            Children::Rendered(parts) => parts
                .iter()
                .map(|p| p.trim())
                .filter(|p| !p.is_empty())
                .collect(),
            Children::Raw(_) => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RenderOutput {
    Empty,
    Text(String),
    /// Nested markup, evaluated by the caller like any other element.
    Markup(Vec<Node>),
    /// A value, possibly holding deferred references, emitted as text once settled.
    Value(PropValue),
}

pub trait Component: Send + Sync {
    fn schema(&self) -> PropsSchema {
        PropsSchema::permissive()
    }

    fn has_resolver(&self) -> bool {
        false
    }

    /// Produce this element's data. Called at most once per element per render
    /// call, possibly on a worker thread, and only after every binding its
    /// props read has been resolved.
    fn resolve(&self, _props: &Props, _ctx: &mut ResolveContext) -> Result<Value, String> {
        Ok(Value::Null)
    }

    fn wants_raw_children(&self) -> bool {
        false
    }

    fn render(
        &self,
        props: &Props,
        resolved: Option<&Value>,
        children: Children<'_>,
        ctx: &mut RenderContext,
    ) -> Result<RenderOutput, String>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// REGISTRY
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Default)]
pub struct ComponentRegistry {
    components: HashMap<String, Arc<dyn Component>>,
    modules: HashMap<(String, String), Arc<dyn Component>>,
}

impl fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut tags: Vec<&String> = self.components.keys().collect();
        tags.sort();
        let mut modules: Vec<String> = self
            .modules
            .keys()
            .map(|(source, export)| format!("{}#{}", source, export))
            .collect();
        modules.sort();
        f.debug_struct("ComponentRegistry")
            .field("components", &tags)
            .field("modules", &modules)
            .finish()
    }
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tag: &str, component: impl Component + 'static) -> &mut Self {
        self.components.insert(tag.to_string(), Arc::new(component));
        self
    }

    /// Make `component` importable as `export` from `source`.
    pub fn register_module(
        &mut self,
        source: &str,
        export: &str,
        component: impl Component + 'static,
    ) -> &mut Self {
        self.modules
            .insert((source.to_string(), export.to_string()), Arc::new(component));
        self
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.components.contains_key(tag)
    }

    /// Resolve a tag: imported names first, then registered tags, then a
    /// case-insensitive match on registered tags.
    pub fn lookup(&self, tag: &str, imports: &[ImportDecl]) -> Option<Arc<dyn Component>> {
        if let Some(import) = imports.iter().find(|i| i.local == tag) {
            return self.module(&import.source, import.export_name());
        }

        if let Some((local, rest)) = tag.split_once('.') {
            if let Some(import) = imports.iter().find(|i| i.local == local) {
                let export = match &import.kind {
                    ImportKind::Default => rest.to_string(),
                    ImportKind::Named { export } => format!("{}.{}", export, rest),
                };
                return self.module(&import.source, &export);
            }
        }

        if let Some(component) = self.components.get(tag) {
            return Some(component.clone());
        }

        self.components
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(tag))
            .map(|(_, component)| component.clone())
    }

    fn module(&self, source: &str, export: &str) -> Option<Arc<dyn Component>> {
        self.modules
            .get(&(source.to_string(), export.to_string()))
            .cloned()
    }
}
