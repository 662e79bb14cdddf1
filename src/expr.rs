//! Expression layer
//!
//! Attribute and content expressions (`value={u.name}`, `{items[0]}`) are parsed
//! with oxc and lowered into a small owned tree. Only data-access forms are
//! accepted: literals, identifiers, member/index access (optional chaining
//! included), object/array/template literals, `+`, `??` and `||`. Anything else
//! is rejected at compile time.

use oxc_allocator::Allocator;
use oxc_ast::ast::{ChainElement, Expression, ObjectPropertyKind, PropertyKey};
use oxc_parser::Parser;
use oxc_span::SourceType;
use oxc_syntax::operator::{BinaryOperator, LogicalOperator, UnaryOperator};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Expr {
    Literal {
        value: Value,
    },
    Undefined,
    Identifier {
        name: String,
    },
    Member {
        object: Box<Expr>,
        property: String,
    },
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
    },
    Object {
        entries: Vec<(String, Expr)>,
    },
    Array {
        items: Vec<Expr>,
    },
    Template {
        parts: Vec<Expr>,
    },
    Add {
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// `a ?? b` when `nullish`, `a || b` otherwise.
    Fallback {
        value: Box<Expr>,
        fallback: Box<Expr>,
        nullish: bool,
    },
}

impl Expr {
    pub fn literal(value: impl Into<Value>) -> Self {
        Expr::Literal {
            value: value.into(),
        }
    }

    pub fn identifier(name: impl Into<String>) -> Self {
        Expr::Identifier { name: name.into() }
    }

    pub fn member(self, property: impl Into<String>) -> Self {
        Expr::Member {
            object: Box::new(self),
            property: property.into(),
        }
    }

    /// Free identifiers referenced by this expression, in first-use order.
    pub fn identifiers(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_identifiers(&mut out);
        out
    }

    fn collect_identifiers<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Expr::Identifier { name } => {
                if !out.contains(&name.as_str()) {
                    out.push(name);
                }
            }
            Expr::Member { object, .. } => object.collect_identifiers(out),
            Expr::Index { object, index } => {
                object.collect_identifiers(out);
                index.collect_identifiers(out);
            }
            Expr::Object { entries } => {
                for (_, value) in entries {
                    value.collect_identifiers(out);
                }
            }
            Expr::Array { items } | Expr::Template { parts: items } => {
                for item in items {
                    item.collect_identifiers(out);
                }
            }
            Expr::Add { left, right } => {
                left.collect_identifiers(out);
                right.collect_identifiers(out);
            }
            Expr::Fallback {
                value, fallback, ..
            } => {
                value.collect_identifiers(out);
                fallback.collect_identifiers(out);
            }
            Expr::Literal { .. } | Expr::Undefined => {}
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PARSING
// ═══════════════════════════════════════════════════════════════════════════════

pub fn parse_expression(code: &str) -> Result<Expr, String> {
    if code.trim().is_empty() {
        return Err("empty expression".to_string());
    }

    let allocator = Allocator::default();
    let source_type = SourceType::default().with_module(true).with_jsx(true);

    match Parser::new(&allocator, code, source_type).parse_expression() {
        Ok(expr) => lower(&expr),
        Err(errors) => Err(format!("Invalid expression syntax: {:?}", errors)),
    }
}

fn lower(expr: &Expression) -> Result<Expr, String> {
    match expr {
        Expression::StringLiteral(s) => Ok(Expr::literal(s.value.to_string())),
        Expression::NumericLiteral(n) => Ok(Expr::Literal {
            value: number_value(n.value),
        }),
        Expression::BooleanLiteral(b) => Ok(Expr::literal(b.value)),
        Expression::NullLiteral(_) => Ok(Expr::Literal { value: Value::Null }),
        Expression::Identifier(id) => {
            if id.name == "undefined" {
                Ok(Expr::Undefined)
            } else {
                Ok(Expr::identifier(id.name.to_string()))
            }
        }
        Expression::ParenthesizedExpression(paren) => lower(&paren.expression),
        Expression::StaticMemberExpression(member) => Ok(Expr::Member {
            object: Box::new(lower(&member.object)?),
            property: member.property.name.to_string(),
        }),
        Expression::ComputedMemberExpression(member) => Ok(Expr::Index {
            object: Box::new(lower(&member.object)?),
            index: Box::new(lower(&member.expression)?),
        }),
        Expression::ChainExpression(chain) => match &chain.expression {
            ChainElement::StaticMemberExpression(member) => Ok(Expr::Member {
                object: Box::new(lower(&member.object)?),
                property: member.property.name.to_string(),
            }),
            ChainElement::ComputedMemberExpression(member) => Ok(Expr::Index {
                object: Box::new(lower(&member.object)?),
                index: Box::new(lower(&member.expression)?),
            }),
            _ => Err("only property access is allowed in optional chains".to_string()),
        },
        Expression::ObjectExpression(obj) => {
            let mut entries = Vec::new();
            for prop in &obj.properties {
                match prop {
                    ObjectPropertyKind::ObjectProperty(p) => {
                        let key = match &p.key {
                            PropertyKey::StaticIdentifier(id) => id.name.to_string(),
                            PropertyKey::StringLiteral(s) => s.value.to_string(),
                            _ => return Err("object keys must be identifiers or strings".into()),
                        };
                        entries.push((key, lower(&p.value)?));
                    }
                    ObjectPropertyKind::SpreadProperty(_) => {
                        return Err("spread is not supported in template expressions".into());
                    }
                }
            }
            Ok(Expr::Object { entries })
        }
        Expression::ArrayExpression(arr) => {
            let mut items = Vec::new();
            for elem in &arr.elements {
                match elem.as_expression() {
                    Some(e) => items.push(lower(e)?),
                    None => return Err("array holes and spreads are not supported".into()),
                }
            }
            Ok(Expr::Array { items })
        }
        Expression::TemplateLiteral(tpl) => {
            let mut parts = Vec::new();
            for (i, quasi) in tpl.quasis.iter().enumerate() {
                let text = match &quasi.value.cooked {
                    Some(cooked) => cooked.to_string(),
                    None => quasi.value.raw.to_string(),
                };
                if !text.is_empty() {
                    parts.push(Expr::literal(text));
                }
                if let Some(e) = tpl.expressions.get(i) {
                    parts.push(lower(e)?);
                }
            }
            Ok(Expr::Template { parts })
        }
        Expression::UnaryExpression(unary) => {
            if unary.operator == UnaryOperator::UnaryNegation {
                if let Expression::NumericLiteral(n) = &unary.argument {
                    return Ok(Expr::Literal {
                        value: number_value(-n.value),
                    });
                }
            }
            Err("unary operators are not supported in template expressions".to_string())
        }
        Expression::BinaryExpression(bin) if bin.operator == BinaryOperator::Addition => {
            Ok(Expr::Add {
                left: Box::new(lower(&bin.left)?),
                right: Box::new(lower(&bin.right)?),
            })
        }
        Expression::LogicalExpression(logical) => {
            let nullish = match logical.operator {
                LogicalOperator::Coalesce => true,
                LogicalOperator::Or => false,
                _ => return Err("only `??` and `||` are supported".to_string()),
            };
            Ok(Expr::Fallback {
                value: Box::new(lower(&logical.left)?),
                fallback: Box::new(lower(&logical.right)?),
                nullish,
            })
        }
        _ => Err("unsupported expression; only data access is allowed".to_string()),
    }
}

/// Integral floats become JSON integers so `items[0]` and `{count: 2}` behave.
fn number_value(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_member_chain() {
        let expr = parse_expression("u.profile.name").unwrap();
        assert_eq!(
            expr,
            Expr::identifier("u").member("profile").member("name")
        );
        assert_eq!(expr.identifiers(), vec!["u"]);
    }

    #[test]
    fn test_computed_and_optional_access() {
        let expr = parse_expression("items?.[0]").unwrap();
        assert_eq!(
            expr,
            Expr::Index {
                object: Box::new(Expr::identifier("items")),
                index: Box::new(Expr::literal(0)),
            }
        );
    }

    #[test]
    fn test_object_and_array_literals() {
        let expr = parse_expression(r#"{ title: "x", tags: [a, 1.5, null] }"#).unwrap();
        match &expr {
            Expr::Object { entries } => {
                assert_eq!(entries.len(), 2);
                assert_eq!(entries[0].0, "title");
                assert_eq!(entries[0].1, Expr::literal("x"));
            }
            other => panic!("expected object, got {:?}", other),
        }
        assert_eq!(expr.identifiers(), vec!["a"]);
    }

    #[test]
    fn test_template_literal_parts() {
        let expr = parse_expression("`Hello ${user.name}!`").unwrap();
        assert_eq!(
            expr,
            Expr::Template {
                parts: vec![
                    Expr::literal("Hello "),
                    Expr::identifier("user").member("name"),
                    Expr::literal("!"),
                ]
            }
        );
    }

    #[test]
    fn test_fallbacks_and_literals() {
        assert_eq!(
            parse_expression("a ?? 'anon'").unwrap(),
            Expr::Fallback {
                value: Box::new(Expr::identifier("a")),
                fallback: Box::new(Expr::literal("anon")),
                nullish: true,
            }
        );
        assert_eq!(parse_expression("-3").unwrap(), Expr::literal(-3));
        assert_eq!(parse_expression("undefined").unwrap(), Expr::Undefined);
        assert_eq!(
            parse_expression("2.5").unwrap(),
            Expr::Literal { value: json!(2.5) }
        );
    }

    #[test]
    fn test_rejects_calls_and_syntax_errors() {
        assert!(parse_expression("fetch(url)").is_err());
        assert!(parse_expression("a * b").is_err());
        assert!(parse_expression("a.").is_err());
        assert!(parse_expression("   ").is_err());
    }
}
