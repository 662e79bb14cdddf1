//! Name hoister
//!
//! `<Fetch name="user" .../>` declares a binding. The element moves (minus its
//! `name` attribute) into the unit's binding list and a reference is left at
//! the site, so siblings can read `{user.field}` regardless of source order.

use tracing::debug;

use crate::diagnostics::RenderError;
use crate::imports::is_import_directive;
use crate::ir::{AttributeValue, Binding, BindingId, CompiledUnit, Element, Node, ReferenceNode};
use crate::scope::{is_valid_identifier, Scope, STRUCTURAL_TAGS};

pub const NAME_ATTRIBUTE: &str = "name";

/// Dotted tags always qualify; otherwise the tag must be capitalized and not
/// one of the structural tags.
pub fn is_hoistable_tag(tag: &str) -> bool {
    if tag.contains('.') {
        return true;
    }
    let capitalized = tag.chars().next().map(char::is_uppercase).unwrap_or(false);
    capitalized && !STRUCTURAL_TAGS.contains(tag)
}

struct NameHoister<'s> {
    scope: &'s mut Scope,
    bindings: Vec<Binding>,
    duplicates: usize,
}

impl NameHoister<'_> {
    fn visit_children(&mut self, children: &mut Vec<Node>) -> Result<(), RenderError> {
        let taken = std::mem::take(children);
        for node in taken {
            match node {
                Node::Element(mut el) => {
                    // Children first: inner declarations are hoisted before their parent.
                    self.visit_children(&mut el.children)?;
                    children.extend(self.visit_element(el)?);
                }
                other => children.push(other),
            }
        }
        Ok(())
    }

    fn visit_element(&mut self, mut el: Element) -> Result<Vec<Node>, RenderError> {
        if !is_hoistable_tag(&el.tag) {
            return Ok(vec![Node::Element(el)]);
        }

        let name = match el.attribute(NAME_ATTRIBUTE) {
            None => return Ok(vec![Node::Element(el)]),
            Some(AttributeValue::Static(name)) => name.trim().to_string(),
            Some(AttributeValue::Dynamic(expr)) => {
                return Err(RenderError::InvalidBindingName {
                    tag: el.tag.clone(),
                    name: expr.code.clone(),
                    reason: "binding names must be static".to_string(),
                });
            }
        };

        if !is_valid_identifier(&name) {
            return Err(RenderError::InvalidBindingName {
                tag: el.tag.clone(),
                name,
                reason: "expected an identifier that is not a reserved word".to_string(),
            });
        }

        let (id, fresh) = self.scope.declare(&name);
        let mut site = vec![Node::Reference(ReferenceNode {
            binding: id,
            name: name.clone(),
        })];
        if fresh {
            el.remove_attribute(NAME_ATTRIBUTE);
            self.bindings.push(Binding {
                id,
                name,
                element: el,
            });
        } else {
            // The duplicate is dropped, but its directives and inner
            // declarations stay at the site in pre-order.
            self.duplicates += 1;
            salvage(el.children, id, &mut site);
        }

        Ok(site)
    }
}

/// Collect import directives and references from a discarded subtree,
/// skipping references back to the binding being discarded.
fn salvage(nodes: Vec<Node>, discarded: BindingId, out: &mut Vec<Node>) {
    for node in nodes {
        match node {
            Node::Element(el) if is_import_directive(&el.tag) => out.push(Node::Element(el)),
            Node::Element(el) => salvage(el.children, discarded, out),
            Node::Reference(reference) if reference.binding != discarded => {
                out.push(Node::Reference(reference))
            }
            _ => {}
        }
    }
}

pub fn hoist_names(mut unit: CompiledUnit, scope: &mut Scope) -> Result<CompiledUnit, RenderError> {
    let mut pass = NameHoister {
        scope,
        bindings: Vec::new(),
        duplicates: 0,
    };

    pass.visit_children(&mut unit.body)?;
    for binding in &mut unit.bindings {
        pass.visit_children(&mut binding.element.children)?;
    }

    debug!(
        hoisted = pass.bindings.len(),
        duplicates = pass.duplicates,
        "hoisting pass complete"
    );
    unit.bindings.extend(pass.bindings);
    Ok(unit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eligible_tags() {
        assert!(is_hoistable_tag("Fetch"));
        assert!(is_hoistable_tag("lib.Card"));
        assert!(is_hoistable_tag("ns.fetch"));
        assert!(!is_hoistable_tag("Task"));
        assert!(!is_hoistable_tag("Import"));
        assert!(!is_hoistable_tag("div"));
    }

    #[test]
    fn test_first_occurrence_becomes_binding() {
        let unit = CompiledUnit::new(vec![Node::from(
            Element::new("Prompt")
                .with_child(Element::new("Producer").with_attr("name", "u"))
                .with_child(Element::new("Consumer").with_expr("value", "u.name").unwrap()),
        )]);

        let mut scope = Scope::new();
        let unit = hoist_names(unit, &mut scope).unwrap();

        assert_eq!(unit.bindings.len(), 1);
        let binding = &unit.bindings[0];
        assert_eq!(binding.name, "u");
        assert_eq!(binding.element.tag, "Producer");
        assert!(binding.element.attribute("name").is_none());

        let prompt = unit.body[0].as_element().unwrap();
        assert_eq!(
            prompt.children[0],
            Node::Reference(ReferenceNode {
                binding: BindingId(0),
                name: "u".to_string(),
            })
        );
        assert_eq!(prompt.children[1].as_element().unwrap().tag, "Consumer");
    }

    #[test]
    fn test_duplicate_names_share_one_binding() {
        let unit = CompiledUnit::new(vec![
            Node::from(Element::new("Producer").with_attr("name", "u")),
            Node::from(Element::new("Producer").with_attr("name", "u").with_attr("extra", "1")),
        ]);
        let unit = hoist_names(unit, &mut Scope::new()).unwrap();
        assert_eq!(unit.bindings.len(), 1);
        assert!(unit.bindings[0].element.attribute("extra").is_none());
        assert!(matches!(unit.body[0], Node::Reference(_)));
        assert_eq!(unit.body[0], unit.body[1]);
    }

    #[test]
    fn test_structural_and_unnamed_elements_stay() {
        let unit = CompiledUnit::new(vec![
            Node::from(Element::new("Section").with_attr("name", "intro")),
            Node::from(Element::new("Producer")),
        ]);
        let out = hoist_names(unit.clone(), &mut Scope::new()).unwrap();
        assert_eq!(out, unit);
    }

    #[test]
    fn test_invalid_names_are_rejected() {
        for name in ["1st", "my-name", "class"] {
            let unit =
                CompiledUnit::new(vec![Node::from(Element::new("Producer").with_attr("name", name))]);
            let err = hoist_names(unit, &mut Scope::new()).unwrap_err();
            assert!(matches!(err, RenderError::InvalidBindingName { .. }), "{}", name);
        }
    }

    #[test]
    fn test_nested_declarations_hoist_bottom_up() {
        let unit = CompiledUnit::new(vec![Node::from(
            Element::new("Outer")
                .with_attr("name", "outer")
                .with_child(Element::new("Inner").with_attr("name", "inner")),
        )]);
        let unit = hoist_names(unit, &mut Scope::new()).unwrap();
        assert_eq!(unit.bindings[0].name, "inner");
        assert_eq!(unit.bindings[1].name, "outer");
        assert!(matches!(
            unit.bindings[1].element.children[0],
            Node::Reference(_)
        ));
    }

    #[test]
    fn test_duplicate_keeps_directives_and_inner_declarations() {
        let unit = CompiledUnit::new(vec![
            Node::from(Element::new("Fetch").with_attr("name", "u")),
            Node::from(
                Element::new("Fetch")
                    .with_attr("name", "u")
                    .with_text("dropped")
                    .with_child(
                        Element::new("Import")
                            .with_attr("component", "Card")
                            .with_attr("from", "./ui"),
                    )
                    .with_child(Element::new("Badge").with_attr("name", "badge")),
            ),
        ]);
        let unit = hoist_names(unit, &mut Scope::new()).unwrap();

        let names: Vec<&str> = unit.bindings.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["u", "badge"]);
        assert_eq!(unit.body.len(), 4);
        assert_eq!(unit.body[0], unit.body[1]);
        assert_eq!(unit.body[2].as_element().unwrap().tag, "Import");
        assert!(matches!(
            &unit.body[3],
            Node::Reference(r) if r.name == "badge"
        ));
    }

    #[test]
    fn test_nested_duplicate_does_not_reference_itself() {
        let unit = CompiledUnit::new(vec![Node::from(
            Element::new("Fetch")
                .with_attr("name", "u")
                .with_child(Element::new("Fetch").with_attr("name", "u")),
        )]);
        let unit = hoist_names(unit, &mut Scope::new()).unwrap();
        assert_eq!(unit.bindings.len(), 1);
        assert_eq!(unit.body.len(), 1);
    }
}
