use lazy_static::lazy_static;
use regex::Regex;
use std::collections::{HashMap, HashSet};

use crate::ir::BindingId;

lazy_static! {
    static ref IDENTIFIER_RE: Regex = Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$]*$").unwrap();

    /// Words that can never name a binding.
    pub static ref RESERVED_WORDS: HashSet<&'static str> = {
        let mut s = HashSet::new();
        for word in [
            "break", "case", "catch", "class", "const", "continue", "debugger", "default",
            "delete", "do", "else", "enum", "export", "extends", "false", "finally", "for",
            "function", "if", "import", "in", "instanceof", "new", "null", "return", "super",
            "switch", "this", "throw", "true", "try", "typeof", "var", "void", "while", "with",
            "yield", "let", "static", "implements", "interface", "package", "private",
            "protected", "public", "await", "undefined",
        ] {
            s.insert(word);
        }
        s
    };

    /// Capitalized tags that carry document structure. They are never hoisted,
    /// even when they carry a `name` attribute.
    pub static ref STRUCTURAL_TAGS: HashSet<&'static str> = {
        let mut s = HashSet::new();
        s.insert("Prompt");
        s.insert("Document");
        s.insert("Role");
        s.insert("Task");
        s.insert("Context");
        s.insert("Hint");
        s.insert("Example");
        s.insert("Section");
        s.insert("OutputFormat");
        s.insert("Reasoning");
        s.insert("Import");
        s.insert("Let");
        s
    };
}

pub fn is_valid_identifier(name: &str) -> bool {
    IDENTIFIER_RE.is_match(name) && !RESERVED_WORDS.contains(name)
}

/// Hoisting namespace of one compiled unit.
///
/// Handed explicitly to the hoisting pass; a name maps to exactly one binding
/// and re-declaring it returns the existing id.
#[derive(Debug, Default)]
pub struct Scope {
    names: HashMap<String, BindingId>,
    next_id: u32,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the binding for `name` and whether it was created by this call.
    pub fn declare(&mut self, name: &str) -> (BindingId, bool) {
        if let Some(id) = self.names.get(name) {
            return (*id, false);
        }
        let id = BindingId(self.next_id);
        self.next_id += 1;
        self.names.insert(name.to_string(), id);
        (id, true)
    }

    pub fn lookup(&self, name: &str) -> Option<BindingId> {
        self.names.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
