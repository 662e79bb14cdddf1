//! Whitespace normalizer
//!
//! Text that opens with a newline and closes on a whitespace-only line is a
//! *block*: the author laid it out on its own lines and wants that layout kept.
//! Blocks are dedented into opaque `Literal` nodes. Everything else stays a
//! `Text` node and gets inline handling at evaluation time.

use tracing::debug;

use crate::ir::{CompiledUnit, Node};
use crate::visitor::{walk_children, TemplateVisitor};

/// True iff `text` starts with a newline and everything after its last newline
/// is whitespace.
pub fn is_block_significant(text: &str) -> bool {
    if !text.starts_with('\n') {
        return false;
    }
    match text.rfind('\n') {
        Some(last) => text[last + 1..].chars().all(char::is_whitespace),
        None => false,
    }
}

/// Strip leading/trailing blank lines and the common indentation.
/// Returns `None` when nothing but whitespace remains.
pub fn dedent(text: &str) -> Option<String> {
    let lines: Vec<&str> = text.split('\n').collect();
    let is_blank = |line: &&str| line.chars().all(char::is_whitespace);

    let start = lines.iter().position(|l| !is_blank(l))?;
    let end = lines.iter().rposition(|l| !is_blank(l))?;
    let lines = &lines[start..=end];

    let indent = lines
        .iter()
        .filter(|l| !is_blank(l))
        .map(|l| l.chars().take_while(|c| c.is_whitespace()).count())
        .min()
        .unwrap_or(0);

    let out: Vec<&str> = lines
        .iter()
        .map(|line| {
            if is_blank(line) {
                ""
            } else {
                strip_chars(line, indent)
            }
        })
        .collect();

    Some(out.join("\n"))
}

fn strip_chars(line: &str, count: usize) -> &str {
    match line.char_indices().nth(count) {
        Some((offset, _)) => &line[offset..],
        None => "",
    }
}

/// Inline handling for `Text` nodes: single-line text is kept as is; multi-line
/// text loses the whitespace around each line break, drops empty lines, and
/// joins the rest with one space.
pub fn collapse_inline(text: &str) -> String {
    if !text.contains('\n') {
        return text.to_string();
    }

    let lines: Vec<&str> = text.split('\n').collect();
    let last = lines.len() - 1;
    let mut kept = Vec::with_capacity(lines.len());

    for (i, line) in lines.iter().enumerate() {
        let mut line = *line;
        if i > 0 {
            line = line.trim_start();
        }
        if i < last {
            line = line.trim_end();
        }
        if !line.is_empty() {
            kept.push(line);
        }
    }

    kept.join(" ")
}

// ═══════════════════════════════════════════════════════════════════════════════
// PASS
// ═══════════════════════════════════════════════════════════════════════════════

struct WhitespaceNormalizer {
    rewritten: usize,
    dropped: usize,
}

impl TemplateVisitor for WhitespaceNormalizer {
    fn visit_children(&mut self, children: &mut Vec<Node>) {
        let taken = std::mem::take(children);
        for node in taken {
            match node {
                Node::Text(text) if is_block_significant(&text.value) => {
                    match dedent(&text.value) {
                        Some(value) => {
                            self.rewritten += 1;
                            children.push(Node::literal(value));
                        }
                        None => self.dropped += 1,
                    }
                }
                other => children.push(other),
            }
        }
        walk_children(self, children);
    }
}

pub fn normalize_whitespace(mut unit: CompiledUnit) -> CompiledUnit {
    let mut pass = WhitespaceNormalizer {
        rewritten: 0,
        dropped: 0,
    };
    pass.visit_unit(&mut unit);
    debug!(
        rewritten = pass.rewritten,
        dropped = pass.dropped,
        "whitespace pass complete"
    );
    unit
}
