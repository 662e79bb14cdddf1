//! # Markup Render Ground Truth
//!
//! ## Compilation
//!
//! 1. **Canonical Tree**: source is parsed into a node tree, then three passes
//!    rewrite it into a `CompiledUnit`: whitespace normalization, import
//!    elaboration and name hoisting. The passes commute; any order yields the
//!    same unit.
//!
//! 2. **Blocks**: text that opens with a newline and closes on a blank line is
//!    dedented into an opaque literal. Other text keeps inline handling.
//!
//! 3. **Hoisting**: a capitalized (non-structural) or dotted element with a
//!    `name` attribute becomes a binding. The site keeps a reference; later
//!    elements with the same name are dropped in favor of that reference.
//!
//! ## Evaluation
//!
//! 4. **Deferred Data**: an identifier naming a binding is a deferred
//!    reference. Member access extends its path; the path is walked only after
//!    the owner has resolved, and a missing segment is `undefined`, never an
//!    error.
//!
//! 5. **Ordering**: resolvers run in dependency waves and may run in parallel.
//!    Output, diagnostics and actions are always in document order.
//!
//! 6. **Once**: a binding is resolved and rendered once per call, however many
//!    times it is referenced.
//!
//! ## Results
//!
//! 7. **Policy**: warnings are returned alongside success unless ignored or
//!    escalated. Compile, validation and resolution errors always fail the call.
//!
//! 8. **Actions**: requested side effects are returned as data on success and
//!    never executed here.

#[cfg(feature = "napi")]
use napi_derive::napi;

pub mod builtins;
pub mod cache;
pub mod compile;
pub mod component;
pub mod context;
pub mod deferred;
pub mod diagnostics;
pub mod engine;
pub mod evaluate;
pub mod expr;
pub mod hoist;
pub mod imports;
pub mod ir;
pub mod parse;
pub mod schema;
pub mod scope;
pub mod visitor;
pub mod whitespace;

#[cfg(test)]
mod test_support;

#[cfg(test)]
mod parse_tests;
#[cfg(test)]
mod render_tests;

pub use builtins::builtin_registry;
pub use compile::{compile, CompileOptions, Pass};
pub use component::{Children, Component, ComponentRegistry, RenderOutput};
pub use context::{Action, RenderContext, ResolveContext};
pub use deferred::{DeferredRef, PathSegment, PropValue};
pub use diagnostics::{Diagnostic, DiagnosticRules, ErrorKind, RenderError, Severity};
pub use engine::{Engine, RenderOptions, RenderResult};
pub use ir::{CompiledUnit, Element, Node};
pub use parse::parse_template;
pub use schema::{FieldSchema, FieldType, Props, PropsSchema};

// ═══════════════════════════════════════════════════════════════════════════════
// NAPI EXPORTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(feature = "napi")]
lazy_static::lazy_static! {
    static ref NATIVE_ENGINE: Engine = Engine::default();
}

#[cfg(feature = "napi")]
#[napi]
pub fn render_template_native(
    source: String,
    options_json: Option<String>,
) -> napi::Result<serde_json::Value> {
    let options: RenderOptions = match options_json {
        Some(json) => serde_json::from_str(&json)
            .map_err(|e| napi::Error::from_reason(format!("Invalid render options: {}", e)))?,
        None => RenderOptions::default(),
    };
    let result = NATIVE_ENGINE.render(&source, &options);
    serde_json::to_value(result).map_err(|e| napi::Error::from_reason(e.to_string()))
}

#[cfg(feature = "napi")]
#[napi]
pub fn compile_template_native(source: String) -> napi::Result<serde_json::Value> {
    let unit = NATIVE_ENGINE
        .compile(&source)
        .map_err(|e| napi::Error::from_reason(e.to_string()))?;
    serde_json::to_value(unit.as_ref()).map_err(|e| napi::Error::from_reason(e.to_string()))
}
