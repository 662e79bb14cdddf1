use crate::ir::{CompiledUnit, Element, ExpressionNode, LiteralNode, Node, ReferenceNode, TextNode};

/// The TemplateVisitor trait is the single traversal mechanism for compiled units.
///
/// Rules:
/// 1. Traversal order is fixed: the body first, then binding elements in declaration order.
/// 2. Implementers override `visit_*` methods to add behavior.
/// 3. Implementers MUST call `walk_*` functions to continue traversal unless pruning is intended.
/// 4. Passes that add or remove nodes do it in `visit_children`, where they own the list.
pub trait TemplateVisitor {
    fn visit_unit(&mut self, unit: &mut CompiledUnit) {
        walk_unit(self, unit);
    }

    fn visit_children(&mut self, children: &mut Vec<Node>) {
        walk_children(self, children);
    }

    fn visit_node(&mut self, node: &mut Node) {
        walk_node(self, node);
    }

    fn visit_element(&mut self, element: &mut Element) {
        walk_element(self, element);
    }

    fn visit_text(&mut self, _text: &mut TextNode) {
        // Leaf node, nothing to walk by default
    }

    fn visit_literal(&mut self, _literal: &mut LiteralNode) {}

    fn visit_expression(&mut self, _expression: &mut ExpressionNode) {}

    fn visit_reference(&mut self, _reference: &mut ReferenceNode) {}
}

pub fn walk_unit<V: TemplateVisitor + ?Sized>(visitor: &mut V, unit: &mut CompiledUnit) {
    visitor.visit_children(&mut unit.body);
    for binding in &mut unit.bindings {
        visitor.visit_element(&mut binding.element);
    }
}

pub fn walk_children<V: TemplateVisitor + ?Sized>(visitor: &mut V, children: &mut Vec<Node>) {
    for node in children {
        visitor.visit_node(node);
    }
}

pub fn walk_node<V: TemplateVisitor + ?Sized>(visitor: &mut V, node: &mut Node) {
    match node {
        Node::Element(el) => visitor.visit_element(el),
        Node::Text(t) => visitor.visit_text(t),
        Node::Literal(l) => visitor.visit_literal(l),
        Node::Expression(e) => visitor.visit_expression(e),
        Node::Reference(r) => visitor.visit_reference(r),
    }
}

pub fn walk_element<V: TemplateVisitor + ?Sized>(visitor: &mut V, element: &mut Element) {
    visitor.visit_children(&mut element.children);
}
