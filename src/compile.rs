use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::diagnostics::RenderError;
use crate::hoist::hoist_names;
use crate::imports::elaborate_imports;
use crate::ir::{CompiledUnit, Element, ElementId, Node};
use crate::scope::Scope;
use crate::visitor::{walk_element, TemplateVisitor};
use crate::whitespace::normalize_whitespace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Pass {
    Whitespace,
    Imports,
    Hoisting,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompileOptions {
    /// The passes commute; the order only matters for tracing output.
    pub passes: Vec<Pass>,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            passes: vec![Pass::Whitespace, Pass::Imports, Pass::Hoisting],
        }
    }
}

/// Run the compiler passes over a parse tree and number the elements.
pub fn compile(nodes: Vec<Node>, options: &CompileOptions) -> Result<CompiledUnit, RenderError> {
    let mut unit = CompiledUnit::new(nodes);
    let mut scope = Scope::new();

    for pass in &options.passes {
        debug!(?pass, "running compiler pass");
        unit = match pass {
            Pass::Whitespace => normalize_whitespace(unit),
            Pass::Imports => elaborate_imports(unit)?,
            Pass::Hoisting => hoist_names(unit, &mut scope)?,
        };
    }

    assign_element_ids(&mut unit);
    Ok(unit)
}

// ═══════════════════════════════════════════════════════════════════════════════
// ELEMENT NUMBERING
// ═══════════════════════════════════════════════════════════════════════════════

struct IdAssigner {
    next: u32,
}

impl TemplateVisitor for IdAssigner {
    fn visit_element(&mut self, element: &mut Element) {
        element.id = ElementId(self.next);
        self.next += 1;
        walk_element(self, element);
    }
}

/// Pre-order over the body, then the binding elements.
pub fn assign_element_ids(unit: &mut CompiledUnit) -> u32 {
    let mut assigner = IdAssigner { next: 0 };
    assigner.visit_unit(unit);
    assigner.next
}
