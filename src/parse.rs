//! Parse Module
//!
//! Turns template source into the initial node tree. html5ever does the
//! tokenizing and tree building; a few pre-passes make template markup
//! survive an HTML5 parser:
//!
//! 1. `{expr}` in text and unquoted attribute position becomes a placeholder.
//! 2. Self-closing tags become open/close pairs (HTML5 ignores `/>`).
//! 3. Tags with capitals or dots get a marker attribute carrying their
//!    original spelling, since html5ever lowercases tag names.

use html5ever::parse_document;
use lazy_static::lazy_static;
use markup5ever_rcdom::{Handle, NodeData, RcDom};
use regex::Regex;
use std::collections::HashSet;
use tendril::TendrilSink;
use tracing::debug;

use crate::diagnostics::RenderError;
use crate::ir::{Attribute, AttributeValue, Element, Expression, Node};

const TAG_MARKER_ATTR: &str = "data-markup-tag";

lazy_static! {
    static ref EXPR_PLACEHOLDER_RE: Regex = Regex::new(r"__MARKUP_EXPR_(\d+)__").unwrap();

    static ref EXACT_PLACEHOLDER_RE: Regex = Regex::new(r"^__MARKUP_EXPR_(\d+)__$").unwrap();

    static ref SELF_CLOSING_RE: Regex =
        Regex::new(r"<([A-Za-z][A-Za-z0-9.\-]*)((?:\s[^>]*?)?)\s*/>").unwrap();

    static ref TAG_OPEN_RE: Regex =
        Regex::new(r"<([A-Za-z][A-Za-z0-9\-]*(?:\.[A-Za-z0-9\-]+)*)(\s|>)").unwrap();

    /// HTML void elements keep their self-closing form.
    static ref VOID_TAGS: HashSet<&'static str> = {
        let mut s = HashSet::new();
        for tag in [
            "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta",
            "param", "source", "track", "wbr",
        ] {
            s.insert(tag);
        }
        s
    };
}

// ═══════════════════════════════════════════════════════════════════════════════
// EXPRESSION NORMALIZATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Find the end of a balanced brace expression, handling strings and template literals.
/// Returns the index after the closing brace, or None if unbalanced.
fn find_balanced_brace_end(chars: &[char], start_index: usize) -> Option<usize> {
    let mut depth = 0;
    let mut i = start_index;
    let mut in_string: Option<char> = None;
    let mut in_template_literal = false;
    let mut template_brace_depth = 0;

    while i < chars.len() {
        let c = chars[i];

        if c == '\\' && i + 1 < chars.len() {
            i += 2;
            continue;
        }

        if in_string.is_some() {
            if Some(c) == in_string {
                in_string = None;
            }
            i += 1;
            continue;
        }

        if in_template_literal {
            if c == '`' && template_brace_depth == 0 {
                in_template_literal = false;
            } else if c == '$' && i + 1 < chars.len() && chars[i + 1] == '{' {
                template_brace_depth += 1;
                i += 2;
                continue;
            } else if c == '}' && template_brace_depth > 0 {
                template_brace_depth -= 1;
            }
            i += 1;
            continue;
        }

        match c {
            '"' | '\'' => in_string = Some(c),
            '`' => in_template_literal = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }

        i += 1;
    }

    None
}

/// Replace `{expr}` with placeholders so html5ever sees plain text and plain
/// attribute values. Braces inside quoted attribute values are left alone.
fn normalize_all_expressions(source: &str) -> (String, Vec<String>) {
    let chars: Vec<char> = source.chars().collect();
    let mut normalized = String::with_capacity(source.len());
    let mut expressions = Vec::new();
    let mut in_tag = false;
    let mut quote: Option<char> = None;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if in_tag {
            if let Some(q) = quote {
                if c == q {
                    quote = None;
                }
                normalized.push(c);
                i += 1;
                continue;
            }
            match c {
                '"' | '\'' => quote = Some(c),
                '>' => in_tag = false,
                _ => {}
            }
        } else if c == '<' {
            let next = chars.get(i + 1).copied().unwrap_or(' ');
            in_tag = next.is_ascii_alphabetic() || next == '/';
        }

        if c == '{' {
            if let Some(end) = find_balanced_brace_end(&chars, i) {
                let code: String = chars[i + 1..end - 1].iter().collect();
                normalized.push_str(&format!("__MARKUP_EXPR_{}__", expressions.len()));
                expressions.push(code.trim().to_string());
                i = end;
                continue;
            }
        }

        normalized.push(c);
        i += 1;
    }

    (normalized, expressions)
}

/// HTML5 treats `<Tag />` as an opening tag, which would swallow every
/// following sibling. Rewrite to an explicit pair.
fn convert_self_closing_tags(source: &str) -> String {
    SELF_CLOSING_RE
        .replace_all(source, |caps: &regex::Captures| {
            let name = &caps[1];
            if VOID_TAGS.contains(name.to_ascii_lowercase().as_str()) {
                return caps[0].to_string();
            }
            format!("<{}{}></{}>", name, caps[2].trim_end(), name)
        })
        .to_string()
}

/// Record the original spelling of tags html5ever would lowercase.
fn mark_tag_casing(source: &str) -> String {
    TAG_OPEN_RE
        .replace_all(source, |caps: &regex::Captures| {
            let name = &caps[1];
            let sep = &caps[2];
            if name.chars().any(|c| c.is_ascii_uppercase()) || name.contains('.') {
                format!("<{} {}=\"{}\"{}", name, TAG_MARKER_ATTR, name, sep)
            } else {
                caps[0].to_string()
            }
        })
        .to_string()
}

// ═══════════════════════════════════════════════════════════════════════════════
// NODE PARSING
// ═══════════════════════════════════════════════════════════════════════════════

fn placeholder_expression(index: &str, expressions: &[String]) -> Result<Expression, RenderError> {
    let code = index
        .parse::<usize>()
        .ok()
        .and_then(|i| expressions.get(i))
        .ok_or_else(|| RenderError::MalformedSource {
            reason: format!("dangling expression placeholder {}", index),
        })?;
    Expression::parse(code)
}

fn parse_dom_node(handle: &Handle, expressions: &[String]) -> Result<Vec<Node>, RenderError> {
    match &handle.data {
        NodeData::Text { contents } => {
            let text = contents.borrow().to_string();
            process_text_with_expressions(&text, expressions)
        }

        NodeData::Element { name, attrs, .. } => {
            let attributes = attrs.borrow();
            let mut tag = name.local.to_string();

            if let Some(marker) = attributes
                .iter()
                .find(|a| &*a.name.local == TAG_MARKER_ATTR)
            {
                tag = marker.value.to_string();
            }

            let mut element = Element::new(tag);
            for attr in attributes.iter() {
                let attr_name = attr.name.local.to_string();
                if attr_name == TAG_MARKER_ATTR {
                    continue;
                }
                let raw = attr.value.to_string();
                let value = match EXACT_PLACEHOLDER_RE.captures(&raw) {
                    Some(caps) => AttributeValue::Dynamic(placeholder_expression(&caps[1], expressions)?),
                    None => AttributeValue::Static(raw),
                };
                element.attributes.push(Attribute {
                    name: attr_name,
                    value,
                });
            }

            for child in handle.children.borrow().iter() {
                element.children.extend(parse_dom_node(child, expressions)?);
            }

            Ok(vec![Node::Element(element)])
        }

        NodeData::Document
        | NodeData::Doctype { .. }
        | NodeData::Comment { .. }
        | NodeData::ProcessingInstruction { .. } => Ok(vec![]),
    }
}

/// Split text around expression placeholders. Whitespace is kept; the
/// whitespace pass decides what survives.
fn process_text_with_expressions(text: &str, expressions: &[String]) -> Result<Vec<Node>, RenderError> {
    let mut nodes = Vec::new();
    let mut last_end = 0;

    for caps in EXPR_PLACEHOLDER_RE.captures_iter(text) {
        let Some(m) = caps.get(0) else { continue };

        if m.start() > last_end {
            nodes.push(Node::text(&text[last_end..m.start()]));
        }
        let expression = placeholder_expression(&caps[1], expressions)?;
        nodes.push(Node::Expression(crate::ir::ExpressionNode { expression }));
        last_end = m.end();
    }

    if last_end < text.len() {
        nodes.push(Node::text(&text[last_end..]));
    }

    Ok(nodes)
}

/// Collect top-level content, flattening the html/head/body wrappers the
/// HTML5 tree builder always adds.
fn collect_body_content(
    handle: &Handle,
    expressions: &[String],
    nodes: &mut Vec<Node>,
) -> Result<(), RenderError> {
    match &handle.data {
        NodeData::Document => {
            for child in handle.children.borrow().iter() {
                collect_body_content(child, expressions, nodes)?;
            }
        }
        NodeData::Element { name, attrs, .. } => {
            let tag: &str = &name.local;
            let is_marked = attrs
                .borrow()
                .iter()
                .any(|a| &*a.name.local == TAG_MARKER_ATTR);
            let is_wrapper = !is_marked && (tag == "html" || tag == "head" || tag == "body");
            if is_wrapper {
                for child in handle.children.borrow().iter() {
                    collect_body_content(child, expressions, nodes)?;
                }
            } else {
                nodes.extend(parse_dom_node(handle, expressions)?);
            }
        }
        NodeData::Text { .. } => nodes.extend(parse_dom_node(handle, expressions)?),
        _ => {}
    }
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════════
// MAIN PARSING FUNCTION
// ═══════════════════════════════════════════════════════════════════════════════

/// Parse template source into its initial node tree.
pub fn parse_template(source: &str) -> Result<Vec<Node>, RenderError> {
    // Step 1: Normalize expressions to placeholders
    let (normalized, expressions) = normalize_all_expressions(source);

    // Step 2: Convert self-closing tags
    let closed = convert_self_closing_tags(&normalized);

    // Step 3: Preserve tag casing (html5ever lowercases all tag names)
    let marked = mark_tag_casing(&closed);

    // Step 4: Parse with html5ever
    let dom = parse_document(RcDom::default(), Default::default())
        .from_utf8()
        .read_from(&mut marked.as_bytes())
        .map_err(|e| RenderError::MalformedSource {
            reason: format!("failed to parse markup: {}", e),
        })?;

    // Step 5: Convert DOM to nodes
    let mut nodes = Vec::new();
    collect_body_content(&dom.document, &expressions, &mut nodes)?;

    debug!(
        nodes = nodes.len(),
        expressions = expressions.len(),
        "parsed template"
    );
    Ok(nodes)
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
