//! Template IR
//!
//! Owned tree types shared by the source front end, the compiler passes and
//! the evaluator. Passes consume a `CompiledUnit` and hand back a new one; no
//! pass keeps references into a tree it has already returned.

use serde::{Deserialize, Serialize};

use crate::diagnostics::RenderError;
use crate::expr::{parse_expression, Expr};

// ═══════════════════════════════════════════════════════════════════════════════
// IDENTIFIERS
// ═══════════════════════════════════════════════════════════════════════════════

/// Stable pre-order index of an element inside one compiled unit.
/// Assigned after every compiler pass has run; used as the resolution-cache key.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct ElementId(pub u32);

/// Identity of a hoisted binding, unique within one compiled unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BindingId(pub u32);

// ═══════════════════════════════════════════════════════════════════════════════
// NODES
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Node {
    Element(Element),
    /// Inline text, subject to the default inline whitespace handling.
    Text(TextNode),
    /// Dedented block text. Emitted verbatim.
    Literal(LiteralNode),
    /// `{expr}` in content position.
    Expression(ExpressionNode),
    /// Site of a hoisted binding.
    Reference(ReferenceNode),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextNode {
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiteralNode {
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpressionNode {
    pub expression: Expression,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceNode {
    pub binding: BindingId,
    pub name: String,
}

impl Node {
    pub fn text(value: impl Into<String>) -> Self {
        Node::Text(TextNode {
            value: value.into(),
        })
    }

    pub fn literal(value: impl Into<String>) -> Self {
        Node::Literal(LiteralNode {
            value: value.into(),
        })
    }

    pub fn expression(code: &str) -> Result<Self, RenderError> {
        Ok(Node::Expression(ExpressionNode {
            expression: Expression::parse(code)?,
        }))
    }

    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(el) => Some(el),
            _ => None,
        }
    }
}

impl From<Element> for Node {
    fn from(element: Element) -> Self {
        Node::Element(element)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ELEMENTS & ATTRIBUTES
// ═══════════════════════════════════════════════════════════════════════════════

/// An attribute or text expression: the authored code and its lowered form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expression {
    pub code: String,
    pub ast: Expr,
}

impl Expression {
    pub fn parse(code: &str) -> Result<Self, RenderError> {
        let ast = parse_expression(code).map_err(|reason| RenderError::InvalidExpression {
            code: code.to_string(),
            reason,
        })?;
        Ok(Self {
            code: code.to_string(),
            ast,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Static(String),
    Dynamic(Expression),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    pub value: AttributeValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    #[serde(default)]
    pub id: ElementId,
    pub tag: String,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
    #[serde(default)]
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            id: ElementId::default(),
            tag: tag.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push(Attribute {
            name: name.into(),
            value: AttributeValue::Static(value.into()),
        });
        self
    }

    pub fn with_expr(mut self, name: impl Into<String>, code: &str) -> Result<Self, RenderError> {
        self.attributes.push(Attribute {
            name: name.into(),
            value: AttributeValue::Dynamic(Expression::parse(code)?),
        });
        Ok(self)
    }

    pub fn with_child(mut self, child: impl Into<Node>) -> Self {
        self.children.push(child.into());
        self
    }

    pub fn with_text(self, text: impl Into<String>) -> Self {
        self.with_child(Node::text(text))
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| &a.value)
    }

    /// Value of a static attribute. Dynamic attributes yield `None`.
    pub fn static_attribute(&self, name: &str) -> Option<&str> {
        match self.attribute(name) {
            Some(AttributeValue::Static(value)) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn remove_attribute(&mut self, name: &str) -> Option<AttributeValue> {
        let index = self.attributes.iter().position(|a| a.name == name)?;
        Some(self.attributes.remove(index).value)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// DECLARATIONS & COMPILED UNIT
// ═══════════════════════════════════════════════════════════════════════════════

/// A hoisted, named invocation. The element is stored unevaluated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Binding {
    pub id: BindingId,
    pub name: String,
    pub element: Element,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ImportKind {
    Named { export: String },
    Default,
}

/// External binding produced by an `Import` directive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportDecl {
    pub local: String,
    pub source: String,
    #[serde(flatten)]
    pub kind: ImportKind,
}

impl ImportDecl {
    /// Export name looked up in the source module.
    pub fn export_name(&self) -> &str {
        match &self.kind {
            ImportKind::Named { export } => export,
            ImportKind::Default => "default",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledUnit {
    #[serde(default)]
    pub imports: Vec<ImportDecl>,
    #[serde(default)]
    pub bindings: Vec<Binding>,
    pub body: Vec<Node>,
}

impl CompiledUnit {
    pub fn new(body: Vec<Node>) -> Self {
        Self {
            imports: Vec::new(),
            bindings: Vec::new(),
            body,
        }
    }

    pub fn binding(&self, id: BindingId) -> Option<&Binding> {
        self.bindings.iter().find(|b| b.id == id)
    }

    pub fn binding_by_name(&self, name: &str) -> Option<&Binding> {
        self.bindings.iter().find(|b| b.name == name)
    }

    pub fn import(&self, local: &str) -> Option<&ImportDecl> {
        self.imports.iter().find(|i| i.local == local)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SOURCE PRINTING
// ═══════════════════════════════════════════════════════════════════════════════

/// Print nodes back as markup. Used for raw-children components and debugging.
pub fn to_source(nodes: &[Node]) -> String {
    let mut out = String::new();
    for node in nodes {
        write_node(node, &mut out);
    }
    out
}

fn write_node(node: &Node, out: &mut String) {
    match node {
        Node::Text(t) => out.push_str(&t.value),
        Node::Literal(l) => out.push_str(&l.value),
        Node::Expression(e) => {
            out.push('{');
            out.push_str(&e.expression.code);
            out.push('}');
        }
        Node::Reference(r) => {
            out.push('{');
            out.push_str(&r.name);
            out.push('}');
        }
        Node::Element(el) => {
            out.push('<');
            out.push_str(&el.tag);
            for attr in &el.attributes {
                out.push(' ');
                out.push_str(&attr.name);
                match &attr.value {
                    AttributeValue::Static(v) => {
                        out.push_str("=\"");
                        out.push_str(&v.replace('"', "&quot;"));
                        out.push('"');
                    }
                    AttributeValue::Dynamic(e) => {
                        out.push_str("={");
                        out.push_str(&e.code);
                        out.push('}');
                    }
                }
            }
            if el.children.is_empty() {
                out.push_str("/>");
            } else {
                out.push('>');
                for child in &el.children {
                    write_node(child, out);
                }
                out.push_str("</");
                out.push_str(&el.tag);
                out.push('>');
            }
        }
    }
}
