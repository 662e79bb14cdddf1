use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::schema::Props;

// ═══════════════════════════════════════════════════════════════════════════════
// DIAGNOSTIC CODES
// ═══════════════════════════════════════════════════════════════════════════════

pub const E_SOURCE: &str = "E-SOURCE";
pub const E_IMPORT_DIRECTIVE: &str = "E-IMPORT-DIRECTIVE";
pub const E_BINDING_NAME: &str = "E-BINDING-NAME";
pub const E_EXPRESSION: &str = "E-EXPRESSION";
pub const E_UNRESOLVED_IDENTIFIER: &str = "E-UNRESOLVED-IDENTIFIER";
pub const E_DANGLING_REFERENCE: &str = "E-DANGLING-REFERENCE";
pub const E_UNKNOWN_COMPONENT: &str = "E-UNKNOWN-COMPONENT";
pub const E_SCHEMA: &str = "E-SCHEMA";
pub const E_RESOLVE: &str = "E-RESOLVE";
pub const E_DEPENDENCY_CYCLE: &str = "E-DEPENDENCY-CYCLE";
pub const E_RENDER: &str = "E-RENDER";

pub const W_CONFLICTING_DIRECTIVES: &str = "W-CONFLICTING-DIRECTIVES";
pub const W_MISSING_ELEMENT: &str = "W-MISSING-ELEMENT";

/// Codes starting with this prefix are warnings.
pub const WARNING_PREFIX: &str = "W-";

/// Older warning codes that predate the `W-` prefix.
pub const LEGACY_WARNING_CODES: &[&str] = &["deprecated-attribute", "empty-binding"];

fn get_guarantee(code: &str) -> &'static str {
    match code {
        E_SOURCE => "Template source parses into a single element tree.",
        E_IMPORT_DIRECTIVE => {
            "Every Import directive names a source (`from`) and at least one of `component` or `default`."
        }
        E_BINDING_NAME => "Hoisted names are valid, non-reserved identifiers.",
        E_EXPRESSION => "Template expressions are restricted to data access.",
        E_UNRESOLVED_IDENTIFIER => {
            "Identifiers name a hoisted binding or a caller-supplied input value."
        }
        E_DANGLING_REFERENCE => "Every reference site points to a declared binding.",
        E_UNKNOWN_COMPONENT => "Every element tag resolves to a registered component.",
        E_SCHEMA => "Element attributes satisfy the component's props schema.",
        E_RESOLVE => "A producer's data is resolved before any consumer renders.",
        E_DEPENDENCY_CYCLE => "Producers do not depend on their own results.",
        E_RENDER => "Component render steps complete without failing.",
        W_CONFLICTING_DIRECTIVES => "Active directives do not contradict each other.",
        W_MISSING_ELEMENT => "Mandatory instruction elements are present.",
        _ => "",
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// DIAGNOSTIC
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

impl Severity {
    pub fn for_code(code: &str) -> Self {
        if code.starts_with(WARNING_PREFIX) || LEGACY_WARNING_CODES.contains(&code) {
            Severity::Warning
        } else {
            Severity::Error
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    pub code: String,
    pub message: String,
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub guarantee: String,
}

impl Diagnostic {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            severity: Severity::for_code(code),
            element: None,
            attribute: None,
            guarantee: get_guarantee(code).to_string(),
        }
    }

    pub fn on_element(mut self, element: impl Into<String>) -> Self {
        self.element = Some(element.into());
        self
    }

    pub fn on_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attribute = Some(attribute.into());
        self
    }

    pub fn is_warning(&self) -> bool {
        self.severity == Severity::Warning
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// HARD ERRORS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    Compile,
    Validation,
    Resolution,
}

/// Failures that abort a render call regardless of warning policy.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RenderError {
    #[error("Malformed template source: {reason}")]
    MalformedSource { reason: String },

    #[error("Invalid Import directive: {reason}")]
    InvalidImport { reason: String },

    #[error("Invalid binding name \"{name}\" on <{tag}>: {reason}")]
    InvalidBindingName {
        tag: String,
        name: String,
        reason: String,
    },

    #[error("Invalid expression `{code}`: {reason}")]
    InvalidExpression { code: String, reason: String },

    #[error("Unknown identifier '{name}' in `{code}`")]
    UnresolvedIdentifier { name: String, code: String },

    #[error("Reference to undeclared binding '{name}'")]
    DanglingReference { name: String },

    #[error("Unknown component <{tag}>")]
    UnknownComponent { tag: String },

    #[error("{element}: attribute '{attribute}' {constraint}")]
    Schema {
        element: String,
        attribute: String,
        constraint: String,
    },

    #[error("{element}: resolve failed: {message}")]
    Resolve { element: String, message: String },

    #[error("Circular dependency between producers: {}", elements.join(" → "))]
    DependencyCycle { elements: Vec<String> },

    #[error("{element}: render failed: {message}")]
    Render { element: String, message: String },
}

impl RenderError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RenderError::MalformedSource { .. }
            | RenderError::InvalidImport { .. }
            | RenderError::InvalidBindingName { .. }
            | RenderError::InvalidExpression { .. }
            | RenderError::UnresolvedIdentifier { .. }
            | RenderError::DanglingReference { .. } => ErrorKind::Compile,
            RenderError::UnknownComponent { .. } | RenderError::Schema { .. } => {
                ErrorKind::Validation
            }
            RenderError::Resolve { .. }
            | RenderError::DependencyCycle { .. }
            | RenderError::Render { .. } => ErrorKind::Resolution,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            RenderError::MalformedSource { .. } => E_SOURCE,
            RenderError::InvalidImport { .. } => E_IMPORT_DIRECTIVE,
            RenderError::InvalidBindingName { .. } => E_BINDING_NAME,
            RenderError::InvalidExpression { .. } => E_EXPRESSION,
            RenderError::UnresolvedIdentifier { .. } => E_UNRESOLVED_IDENTIFIER,
            RenderError::DanglingReference { .. } => E_DANGLING_REFERENCE,
            RenderError::UnknownComponent { .. } => E_UNKNOWN_COMPONENT,
            RenderError::Schema { .. } => E_SCHEMA,
            RenderError::Resolve { .. } => E_RESOLVE,
            RenderError::DependencyCycle { .. } => E_DEPENDENCY_CYCLE,
            RenderError::Render { .. } => E_RENDER,
        }
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        let diagnostic = Diagnostic::new(self.code(), self.to_string());
        match self {
            RenderError::InvalidImport { .. } => diagnostic.on_element("<Import>"),
            RenderError::InvalidBindingName { tag, .. } => {
                diagnostic.on_element(format!("<{}>", tag)).on_attribute("name")
            }
            RenderError::UnknownComponent { tag } => diagnostic.on_element(format!("<{}>", tag)),
            RenderError::Schema {
                element, attribute, ..
            } => diagnostic
                .on_element(element.clone())
                .on_attribute(attribute.clone()),
            RenderError::Resolve { element, .. } | RenderError::Render { element, .. } => {
                diagnostic.on_element(element.clone())
            }
            _ => diagnostic,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// POST-PASS RULES
// ═══════════════════════════════════════════════════════════════════════════════

/// One rendered element as seen by the whole-tree post-passes.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementTrace {
    pub tag: String,
    pub props: Props,
    pub depth: usize,
}

/// A directive is active when an element with `tag` rendered and, if `option`
/// is set, that prop is truthy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectiveMatch {
    pub tag: String,
    #[serde(default)]
    pub option: Option<String>,
}

impl DirectiveMatch {
    pub fn new(tag: &str, option: Option<&str>) -> Self {
        Self {
            tag: tag.to_string(),
            option: option.map(str::to_string),
        }
    }

    fn is_active(&self, trace: &[ElementTrace]) -> bool {
        trace.iter().any(|entry| {
            entry.tag == self.tag
                && match &self.option {
                    Some(option) => entry.props.get(option).map(is_truthy).unwrap_or(false),
                    None => true,
                }
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictRule {
    pub first: DirectiveMatch,
    pub second: DirectiveMatch,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequiredElementRule {
    pub tag: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DiagnosticRules {
    pub conflicts: Vec<ConflictRule>,
    pub required_elements: Vec<RequiredElementRule>,
}

impl Default for DiagnosticRules {
    fn default() -> Self {
        Self {
            conflicts: vec![ConflictRule {
                first: DirectiveMatch::new("OutputFormat", Some("strict")),
                second: DirectiveMatch::new("Reasoning", Some("show")),
                message: "Strict output format conflicts with showing intermediate reasoning; \
                          the reasoning text will break the required format."
                    .to_string(),
            }],
            required_elements: vec![RequiredElementRule {
                tag: "Task".to_string(),
                message: "No <Task> element found; the template never states what to do."
                    .to_string(),
            }],
        }
    }
}

impl DiagnosticRules {
    /// Rules with nothing enabled.
    pub fn none() -> Self {
        Self {
            conflicts: Vec::new(),
            required_elements: Vec::new(),
        }
    }

    /// Whole-tree checks run after evaluation, in rule order.
    pub fn check(&self, trace: &[ElementTrace]) -> Vec<Diagnostic> {
        let mut out = Vec::new();

        for rule in &self.conflicts {
            if rule.first.is_active(trace) && rule.second.is_active(trace) {
                out.push(
                    Diagnostic::new(W_CONFLICTING_DIRECTIVES, rule.message.clone()).on_element(
                        format!("<{}> + <{}>", rule.first.tag, rule.second.tag),
                    ),
                );
            }
        }

        for rule in &self.required_elements {
            if !trace.iter().any(|entry| entry.tag == rule.tag) {
                out.push(
                    Diagnostic::new(W_MISSING_ELEMENT, rule.message.clone())
                        .on_element(format!("<{}>", rule.tag)),
                );
            }
        }

        out
    }
}

pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// POLICY
// ═══════════════════════════════════════════════════════════════════════════════

/// Apply suppression and escalation. Returns whether the call failed and the
/// diagnostics to report.
pub fn apply_policy(
    diagnostics: Vec<Diagnostic>,
    ignore_warnings: &[String],
    throw_on_warnings: bool,
) -> (bool, Vec<Diagnostic>) {
    let mut failed = false;
    let mut out = Vec::with_capacity(diagnostics.len());

    for mut diagnostic in diagnostics {
        if diagnostic.is_warning() {
            if ignore_warnings.iter().any(|code| *code == diagnostic.code) {
                continue;
            }
            if throw_on_warnings {
                diagnostic.severity = Severity::Error;
            }
        }
        if diagnostic.severity == Severity::Error {
            failed = true;
        }
        out.push(diagnostic);
    }

    (failed, out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn trace(tag: &str, props: Value) -> ElementTrace {
        ElementTrace {
            tag: tag.to_string(),
            props: props.as_object().cloned().unwrap_or_default(),
            depth: 0,
        }
    }

    #[test]
    fn test_severity_from_code() {
        assert_eq!(Severity::for_code("W-ANYTHING"), Severity::Warning);
        assert_eq!(Severity::for_code("deprecated-attribute"), Severity::Warning);
        assert_eq!(Severity::for_code(E_SCHEMA), Severity::Error);
        assert_eq!(Severity::for_code("something-else"), Severity::Error);
    }

    #[test]
    fn test_conflict_requires_both_directives_active() {
        let rules = DiagnosticRules {
            required_elements: vec![],
            ..DiagnosticRules::default()
        };

        let both = vec![
            trace("OutputFormat", json!({"strict": true})),
            trace("Reasoning", json!({"show": true})),
        ];
        let diags = rules.check(&both);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].code, W_CONFLICTING_DIRECTIVES);

        let not_strict = vec![
            trace("OutputFormat", json!({"strict": false})),
            trace("Reasoning", json!({"show": true})),
        ];
        assert!(rules.check(&not_strict).is_empty());

        let hidden = vec![
            trace("OutputFormat", json!({"strict": true})),
            trace("Reasoning", json!({"show": false})),
        ];
        assert!(rules.check(&hidden).is_empty());
    }

    #[test]
    fn test_conflict_reported_once_for_repeated_directives() {
        let rules = DiagnosticRules::default();
        let entries = vec![
            trace("Task", json!({})),
            trace("OutputFormat", json!({"strict": true})),
            trace("OutputFormat", json!({"strict": true})),
            trace("Reasoning", json!({"show": true})),
        ];
        let diags = rules.check(&entries);
        assert_eq!(diags.len(), 1);
    }

    #[test]
    fn test_missing_required_element() {
        let rules = DiagnosticRules::default();
        let diags = rules.check(&[]);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].code, W_MISSING_ELEMENT);
        assert!(rules.check(&[trace("Task", json!({}))]).is_empty());
        assert!(DiagnosticRules::none().check(&[]).is_empty());
    }

    #[test]
    fn test_policy_ignore_and_escalate() {
        let diags = vec![
            Diagnostic::new("W-X", "x"),
            Diagnostic::new("W-Y", "y"),
        ];

        let (failed, kept) = apply_policy(diags.clone(), &["W-X".to_string()], false);
        assert!(!failed);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].code, "W-Y");

        let (failed, kept) = apply_policy(diags, &[], true);
        assert!(failed);
        assert!(kept.iter().all(|d| d.severity == Severity::Error));
    }

    #[test]
    fn test_ignore_list_does_not_hide_errors() {
        let diags = vec![Diagnostic::new(E_SCHEMA, "bad")];
        let (failed, kept) = apply_policy(diags, &[E_SCHEMA.to_string()], false);
        assert!(failed);
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn test_error_to_diagnostic_cites_element() {
        let err = RenderError::Schema {
            element: "<Value>".to_string(),
            attribute: "format".to_string(),
            constraint: "must be one of: text, json".to_string(),
        };
        let diag = err.to_diagnostic();
        assert_eq!(diag.code, E_SCHEMA);
        assert_eq!(diag.element.as_deref(), Some("<Value>"));
        assert_eq!(diag.attribute.as_deref(), Some("format"));
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
}
