//! Engine
//!
//! Entry point tying the front end, the compiler passes, the evaluator and the
//! diagnostics policy together. One `render` call is one evaluation pass; the
//! engine itself only holds configuration and the compile cache.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::builtins::builtin_registry;
use crate::cache::CompileCache;
use crate::compile::{compile, CompileOptions};
use crate::component::ComponentRegistry;
use crate::context::Action;
use crate::diagnostics::{apply_policy, Diagnostic, DiagnosticRules, RenderError};
use crate::evaluate::{evaluate, EvaluationFailure};
use crate::ir::CompiledUnit;
use crate::parse::parse_template;
use crate::schema::Props;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RenderOptions {
    /// Warning codes to drop from the result.
    pub ignore_warnings: Vec<String>,
    /// Promote every remaining warning to an error and fail the call.
    pub throw_on_warnings: bool,
    /// Values visible to template expressions by name.
    pub context: Props,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderResult {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    pub errors: Vec<Diagnostic>,
    pub actions: Vec<Action>,
}

impl RenderResult {
    fn failed(errors: Vec<Diagnostic>) -> Self {
        Self {
            ok: false,
            text: None,
            errors,
            actions: Vec::new(),
        }
    }
}

#[derive(Debug)]
pub struct Engine {
    registry: ComponentRegistry,
    rules: DiagnosticRules,
    compile_options: CompileOptions,
    cache: CompileCache,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(builtin_registry())
    }
}

impl Engine {
    pub fn new(registry: ComponentRegistry) -> Self {
        Self {
            registry,
            rules: DiagnosticRules::default(),
            compile_options: CompileOptions::default(),
            cache: CompileCache::new(),
        }
    }

    pub fn with_rules(mut self, rules: DiagnosticRules) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_compile_options(mut self, options: CompileOptions) -> Self {
        self.compile_options = options;
        self.cache.clear();
        self
    }

    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ComponentRegistry {
        &mut self.registry
    }

    /// Parse and compile, reusing an earlier unit for identical source.
    pub fn compile(&self, source: &str) -> Result<Arc<CompiledUnit>, RenderError> {
        if let Some(unit) = self.cache.get(source) {
            debug!("compile cache hit");
            return Ok(unit);
        }
        let nodes = parse_template(source)?;
        let unit = Arc::new(compile(nodes, &self.compile_options)?);
        self.cache.set(source, unit.clone());
        Ok(unit)
    }

    pub fn render(&self, source: &str, options: &RenderOptions) -> RenderResult {
        match self.compile(source) {
            Ok(unit) => self.render_unit(&unit, options),
            Err(error) => {
                warn!(%error, "template failed to compile");
                RenderResult::failed(vec![error.to_diagnostic()])
            }
        }
    }

    pub fn render_unit(&self, unit: &CompiledUnit, options: &RenderOptions) -> RenderResult {
        let evaluation = match evaluate(unit, &self.registry, &options.context) {
            Ok(evaluation) => evaluation,
            Err(EvaluationFailure { error, diagnostics }) => {
                warn!(%error, kind = ?error.kind(), "render failed");
                let (_, mut errors) =
                    apply_policy(diagnostics, &options.ignore_warnings, options.throw_on_warnings);
                errors.push(error.to_diagnostic());
                return RenderResult::failed(errors);
            }
        };

        let mut diagnostics = evaluation.diagnostics;
        diagnostics.extend(self.rules.check(&evaluation.trace));

        let (failed, errors) =
            apply_policy(diagnostics, &options.ignore_warnings, options.throw_on_warnings);
        debug!(failed, diagnostics = errors.len(), "render complete");

        if failed {
            return RenderResult::failed(errors);
        }

        RenderResult {
            ok: true,
            text: Some(evaluation.text),
            errors,
            actions: evaluation.actions,
        }
    }
}
