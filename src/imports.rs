//! Import elaborator
//!
//! `<Import component="A, B" default="X" as="Y" from="./lib"/>` is a directive,
//! not output. It is removed from the tree and turned into import declarations
//! collected at the top of the unit, in the order the directives appear.

use std::collections::HashSet;

use tracing::debug;

use crate::diagnostics::RenderError;
use crate::ir::{AttributeValue, BindingId, CompiledUnit, Element, ImportDecl, ImportKind, Node};
use crate::scope::is_valid_identifier;

pub const IMPORT_TAG: &str = "Import";

pub fn is_import_directive(tag: &str) -> bool {
    tag.eq_ignore_ascii_case(IMPORT_TAG)
}

/// Expand one directive element into declarations.
pub fn elaborate_directive(element: &Element) -> Result<Vec<ImportDecl>, RenderError> {
    let source = static_value(element, "from")?.ok_or_else(|| RenderError::InvalidImport {
        reason: "missing required attribute 'from'".to_string(),
    })?;
    let component = static_value(element, "component")?;
    let default = static_value(element, "default")?;
    let alias = static_value(element, "as")?;

    if component.is_none() && default.is_none() {
        return Err(RenderError::InvalidImport {
            reason: format!(
                "import from \"{}\" needs a 'component' or 'default' attribute",
                source
            ),
        });
    }

    let mut decls = Vec::new();

    if let Some(component) = component {
        let names: Vec<&str> = component
            .split(',')
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .collect();
        if names.is_empty() {
            return Err(RenderError::InvalidImport {
                reason: "'component' lists no names".to_string(),
            });
        }
        let rename = if names.len() == 1 { alias } else { None };
        for &name in &names {
            let local = rename.unwrap_or(name);
            decls.push(ImportDecl {
                local: checked_local(local)?,
                source: source.to_string(),
                kind: ImportKind::Named {
                    export: name.to_string(),
                },
            });
        }
    }

    if let Some(default) = default {
        decls.push(ImportDecl {
            local: checked_local(default.trim())?,
            source: source.to_string(),
            kind: ImportKind::Default,
        });
    }

    Ok(decls)
}

fn static_value<'a>(element: &'a Element, name: &str) -> Result<Option<&'a str>, RenderError> {
    let found = element
        .attributes
        .iter()
        .find(|a| a.name.eq_ignore_ascii_case(name));
    match found.map(|a| &a.value) {
        None => Ok(None),
        Some(AttributeValue::Static(value)) => Ok(Some(value.as_str())),
        Some(AttributeValue::Dynamic(_)) => Err(RenderError::InvalidImport {
            reason: format!("attribute '{}' must be a static string", name),
        }),
    }
}

fn checked_local(name: &str) -> Result<String, RenderError> {
    if is_valid_identifier(name) {
        Ok(name.to_string())
    } else {
        Err(RenderError::InvalidImport {
            reason: format!("'{}' is not a valid local name", name),
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PASS
// ═══════════════════════════════════════════════════════════════════════════════

/// Walks in document order. Hoisted elements are entered at their first
/// reference site so the declaration order does not depend on whether names
/// were hoisted before or after this pass.
struct ImportElaborator {
    decls: Vec<ImportDecl>,
    entered: HashSet<BindingId>,
}

impl ImportElaborator {
    fn visit_children(
        &mut self,
        children: &mut Vec<Node>,
        unit: &mut CompiledUnit,
    ) -> Result<(), RenderError> {
        let taken = std::mem::take(children);
        for node in taken {
            match node {
                Node::Element(el) if is_import_directive(&el.tag) => {
                    self.decls.extend(elaborate_directive(&el)?);
                }
                Node::Element(mut el) => {
                    self.visit_children(&mut el.children, unit)?;
                    children.push(Node::Element(el));
                }
                Node::Reference(reference) => {
                    if self.entered.insert(reference.binding) {
                        self.visit_binding(reference.binding, unit)?;
                    }
                    children.push(Node::Reference(reference));
                }
                other => children.push(other),
            }
        }
        Ok(())
    }

    fn visit_binding(&mut self, id: BindingId, unit: &mut CompiledUnit) -> Result<(), RenderError> {
        let Some(index) = unit.bindings.iter().position(|b| b.id == id) else {
            return Ok(());
        };
        let mut children = std::mem::take(&mut unit.bindings[index].element.children);
        let result = self.visit_children(&mut children, unit);
        unit.bindings[index].element.children = children;
        result
    }
}

pub fn elaborate_imports(mut unit: CompiledUnit) -> Result<CompiledUnit, RenderError> {
    let mut pass = ImportElaborator {
        decls: Vec::new(),
        entered: HashSet::new(),
    };

    let mut body = std::mem::take(&mut unit.body);
    pass.visit_children(&mut body, &mut unit)?;
    unit.body = body;

    // Bindings never reached from the body still get their directives removed.
    let ids: Vec<BindingId> = unit.bindings.iter().map(|b| b.id).collect();
    for id in ids {
        if pass.entered.insert(id) {
            pass.visit_binding(id, &mut unit)?;
        }
    }

    debug!(count = pass.decls.len(), "import pass complete");
    unit.imports.extend(pass.decls);
    Ok(unit)
}
