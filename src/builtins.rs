//! Builtin component library
//!
//! The default registry: document sections, output directives, data producers,
//! layout helpers and action requests.

use serde_json::Value;

use crate::component::{Children, Component, ComponentRegistry, RenderOutput};
use crate::context::{Action, RenderContext, ResolveContext};
use crate::deferred::{display_value, resolve_path, PathSegment, PropValue};
use crate::hoist::NAME_ATTRIBUTE;
use crate::schema::{FieldSchema, FieldType, Props, PropsSchema};

pub const DEPRECATED_ATTRIBUTE: &str = "deprecated-attribute";
pub const EMPTY_BINDING: &str = "empty-binding";

pub fn builtin_registry() -> ComponentRegistry {
    let mut registry = ComponentRegistry::new();
    registry
        .register("Prompt", Passthrough)
        .register("Document", Passthrough)
        .register("Role", SectionBlock::titled("Role"))
        .register("Task", SectionBlock::titled("Task"))
        .register("Context", SectionBlock::titled("Context"))
        .register("Hint", SectionBlock::titled("Hint"))
        .register("Example", SectionBlock::titled("Example"))
        .register("Section", SectionBlock::untitled())
        .register("OutputFormat", OutputFormat)
        .register("Reasoning", Reasoning)
        .register("Data", Data)
        .register("Value", ValueOf)
        .register("List", List)
        .register("Verbatim", Verbatim)
        .register("RunCommand", RunCommand)
        .register("OpenUrl", OpenUrl)
        .register("OpenFile", OpenFile);
    registry
}

/// Structural tags are never hoisted, so a `name` on them is only a label.
fn structural_schema() -> PropsSchema {
    PropsSchema::strict().field(FieldSchema::new(NAME_ATTRIBUTE, FieldType::String))
}

fn str_prop<'p>(props: &'p Props, name: &str) -> Option<&'p str> {
    props.get(name).and_then(Value::as_str)
}

fn bool_prop(props: &Props, name: &str) -> bool {
    props.get(name).and_then(Value::as_bool).unwrap_or(false)
}

fn block(title: &str, body: &str) -> String {
    format!("# {}\n\n{}\n\n", title, body)
}

// ═══════════════════════════════════════════════════════════════════════════════
// SECTIONS
// ═══════════════════════════════════════════════════════════════════════════════

struct Passthrough;

impl Component for Passthrough {
    fn render(
        &self,
        _props: &Props,
        _resolved: Option<&Value>,
        children: Children<'_>,
        _ctx: &mut RenderContext,
    ) -> Result<RenderOutput, String> {
        Ok(RenderOutput::Text(children.text()))
    }
}

/// `# Title` followed by the trimmed body. Empty bodies render nothing.
struct SectionBlock {
    default_title: Option<&'static str>,
}

impl SectionBlock {
    fn titled(title: &'static str) -> Self {
        Self {
            default_title: Some(title),
        }
    }

    fn untitled() -> Self {
        Self {
            default_title: None,
        }
    }
}

impl Component for SectionBlock {
    fn schema(&self) -> PropsSchema {
        structural_schema().field(FieldSchema::new("title", FieldType::String))
    }

    fn render(
        &self,
        props: &Props,
        _resolved: Option<&Value>,
        children: Children<'_>,
        _ctx: &mut RenderContext,
    ) -> Result<RenderOutput, String> {
        let text = children.text();
        let body = text.trim();
        if body.is_empty() {
            return Ok(RenderOutput::Empty);
        }
        match str_prop(props, "title").or(self.default_title) {
            Some(title) => Ok(RenderOutput::Text(block(title, body))),
            None => Ok(RenderOutput::Text(format!("{}\n\n", body))),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// DIRECTIVES
// ═══════════════════════════════════════════════════════════════════════════════

struct OutputFormat;

impl Component for OutputFormat {
    fn schema(&self) -> PropsSchema {
        structural_schema()
            .field(
                FieldSchema::new("format", FieldType::String)
                    .choices(&["text", "markdown", "json", "yaml"])
                    .default_value("text"),
            )
            .field(FieldSchema::new("strict", FieldType::Boolean).default_value(false))
            .field(FieldSchema::new("json", FieldType::Boolean))
    }

    fn render(
        &self,
        props: &Props,
        _resolved: Option<&Value>,
        children: Children<'_>,
        ctx: &mut RenderContext,
    ) -> Result<RenderOutput, String> {
        let mut format = str_prop(props, "format").unwrap_or("text");
        if props.contains_key("json") {
            ctx.warn(
                DEPRECATED_ATTRIBUTE,
                "<OutputFormat json> is deprecated; use format=\"json\"",
            );
            if bool_prop(props, "json") {
                format = "json";
            }
        }

        let mut lines = Vec::new();
        let text = children.text();
        let body = text.trim();
        if !body.is_empty() {
            lines.push(body.to_string());
        }
        if format != "text" {
            lines.push(format!("Respond in {}.", format));
        }
        if bool_prop(props, "strict") {
            lines.push("Output nothing outside the requested format.".to_string());
        }

        if lines.is_empty() {
            return Ok(RenderOutput::Empty);
        }
        Ok(RenderOutput::Text(block("Output Format", &lines.join("\n"))))
    }
}

struct Reasoning;

impl Component for Reasoning {
    fn schema(&self) -> PropsSchema {
        structural_schema().field(FieldSchema::new("show", FieldType::Boolean).default_value(false))
    }

    fn render(
        &self,
        props: &Props,
        _resolved: Option<&Value>,
        children: Children<'_>,
        _ctx: &mut RenderContext,
    ) -> Result<RenderOutput, String> {
        let mut body = if bool_prop(props, "show") {
            "Think step by step and show your reasoning before the answer.".to_string()
        } else {
            "Think step by step, but only output the final answer.".to_string()
        };
        let text = children.text();
        let extra = text.trim();
        if !extra.is_empty() {
            body.push('\n');
            body.push_str(extra);
        }
        Ok(RenderOutput::Text(block("Reasoning", &body)))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// DATA
// ═══════════════════════════════════════════════════════════════════════════════

/// Producer for literal data. JSON strings are parsed; the element itself
/// renders nothing.
struct Data;

impl Component for Data {
    fn schema(&self) -> PropsSchema {
        PropsSchema::strict().field(FieldSchema::new("value", FieldType::Any))
    }

    fn has_resolver(&self) -> bool {
        true
    }

    fn resolve(&self, props: &Props, ctx: &mut ResolveContext) -> Result<Value, String> {
        match props.get("value") {
            None | Some(Value::Null) => {
                ctx.warn(EMPTY_BINDING, "<Data> has no value");
                Ok(Value::Null)
            }
            Some(Value::String(s)) => Ok(serde_json::from_str(s).unwrap_or_else(|_| Value::String(s.clone()))),
            Some(other) => Ok(other.clone()),
        }
    }

    fn render(
        &self,
        _props: &Props,
        _resolved: Option<&Value>,
        _children: Children<'_>,
        _ctx: &mut RenderContext,
    ) -> Result<RenderOutput, String> {
        Ok(RenderOutput::Empty)
    }
}

fn parse_path(path: &str) -> Vec<PathSegment> {
    path.split('.')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| match s.parse::<usize>() {
            Ok(i) => PathSegment::Index(i),
            Err(_) => PathSegment::Key(s.to_string()),
        })
        .collect()
}

/// Emits a value as text: `of={expr}` directly, or `from="binding" path="a.b"`
/// as a reference to another element's data. `default` covers undefined.
struct ValueOf;

impl Component for ValueOf {
    fn schema(&self) -> PropsSchema {
        PropsSchema::strict()
            .field(FieldSchema::new("of", FieldType::Any))
            .field(FieldSchema::new("from", FieldType::String))
            .field(FieldSchema::new("path", FieldType::String))
            .field(FieldSchema::new("default", FieldType::Any))
    }

    fn render(
        &self,
        props: &Props,
        _resolved: Option<&Value>,
        _children: Children<'_>,
        ctx: &mut RenderContext,
    ) -> Result<RenderOutput, String> {
        let path = str_prop(props, "path").map(parse_path).unwrap_or_default();

        let value = match str_prop(props, "from") {
            Some(name) => {
                let mut reference = ctx
                    .deferred(name)
                    .ok_or_else(|| format!("no binding named '{}'", name))?;
                for segment in path {
                    reference = reference.extend(segment);
                }
                PropValue::Deferred(reference)
            }
            None => {
                let found = props
                    .get("of")
                    .and_then(|of| resolve_path(of, &path))
                    .cloned();
                PropValue::from_value(found)
            }
        };

        Ok(RenderOutput::Value(match props.get("default") {
            Some(default) => PropValue::Fallback {
                value: Box::new(value),
                fallback: Box::new(PropValue::Direct(default.clone())),
                nullish: true,
            },
            None => value,
        }))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// LAYOUT
// ═══════════════════════════════════════════════════════════════════════════════

/// One line per non-empty child, or per entry of `items`.
struct List;

impl Component for List {
    fn schema(&self) -> PropsSchema {
        PropsSchema::strict()
            .field(FieldSchema::new("ordered", FieldType::Boolean).default_value(false))
            .field(FieldSchema::new("items", FieldType::Array))
    }

    fn render(
        &self,
        props: &Props,
        _resolved: Option<&Value>,
        children: Children<'_>,
        _ctx: &mut RenderContext,
    ) -> Result<RenderOutput, String> {
        let items: Vec<String> = match props.get("items").and_then(Value::as_array) {
            Some(values) => values.iter().map(|v| display_value(Some(v))).collect(),
            None => children.items().into_iter().map(str::to_string).collect(),
        };
        if items.is_empty() {
            return Ok(RenderOutput::Empty);
        }

        let ordered = bool_prop(props, "ordered");
        let mut out = String::new();
        for (i, item) in items.iter().enumerate() {
            if ordered {
                out.push_str(&format!("{}. {}\n", i + 1, item));
            } else {
                out.push_str(&format!("- {}\n", item));
            }
        }
        out.push('\n');
        Ok(RenderOutput::Text(out))
    }
}

/// Children printed back as source, unevaluated.
struct Verbatim;

impl Component for Verbatim {
    fn wants_raw_children(&self) -> bool {
        true
    }

    fn render(
        &self,
        _props: &Props,
        _resolved: Option<&Value>,
        children: Children<'_>,
        _ctx: &mut RenderContext,
    ) -> Result<RenderOutput, String> {
        Ok(RenderOutput::Text(children.text()))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ACTIONS
// ═══════════════════════════════════════════════════════════════════════════════

struct RunCommand;

impl Component for RunCommand {
    fn schema(&self) -> PropsSchema {
        PropsSchema::strict()
            .field(FieldSchema::new("command", FieldType::String).required())
            .field(FieldSchema::new("args", FieldType::Array))
            .field(FieldSchema::new("cwd", FieldType::String))
    }

    fn render(
        &self,
        props: &Props,
        _resolved: Option<&Value>,
        _children: Children<'_>,
        ctx: &mut RenderContext,
    ) -> Result<RenderOutput, String> {
        let command = str_prop(props, "command").unwrap_or_default().to_string();
        let args = props
            .get("args")
            .and_then(Value::as_array)
            .map(|args| args.iter().map(|a| display_value(Some(a))).collect())
            .unwrap_or_default();
        let cwd = str_prop(props, "cwd").map(str::to_string);
        ctx.push_action(Action::RunCommand { command, args, cwd });
        Ok(RenderOutput::Empty)
    }
}

struct OpenUrl;

impl Component for OpenUrl {
    fn schema(&self) -> PropsSchema {
        PropsSchema::strict().field(FieldSchema::new("url", FieldType::String).required())
    }

    fn render(
        &self,
        props: &Props,
        _resolved: Option<&Value>,
        _children: Children<'_>,
        ctx: &mut RenderContext,
    ) -> Result<RenderOutput, String> {
        let url = str_prop(props, "url").unwrap_or_default().to_string();
        ctx.push_action(Action::OpenUrl { url });
        Ok(RenderOutput::Empty)
    }
}

struct OpenFile;

impl Component for OpenFile {
    fn schema(&self) -> PropsSchema {
        PropsSchema::strict()
            .field(FieldSchema::new("path", FieldType::String).required())
            .field(FieldSchema::new("review", FieldType::Boolean).default_value(false))
    }

    fn render(
        &self,
        props: &Props,
        _resolved: Option<&Value>,
        _children: Children<'_>,
        ctx: &mut RenderContext,
    ) -> Result<RenderOutput, String> {
        let path = str_prop(props, "path").unwrap_or_default().to_string();
        let review = bool_prop(props, "review");
        ctx.push_action(Action::OpenFile { path, review });
        Ok(RenderOutput::Empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn render(tag: &str, props: Value, children: Vec<&str>) -> (RenderOutput, RenderContext) {
        let registry = builtin_registry();
        let component = registry.lookup(tag, &[]).unwrap();
        let props = component
            .schema()
            .validate(props.as_object().cloned().unwrap_or_default())
            .unwrap();
        let mut ctx = RenderContext::default();
        let children = Children::Rendered(children.into_iter().map(str::to_string).collect());
        let out = component.render(&props, None, children, &mut ctx).unwrap();
        (out, ctx)
    }

    #[test]
    fn test_section_blocks() {
        let (out, _) = render("Task", json!({}), vec!["  Summarize. "]);
        assert_eq!(out, RenderOutput::Text("# Task\n\nSummarize.\n\n".to_string()));

        let (out, _) = render("Section", json!({"title": "Notes"}), vec!["n"]);
        assert_eq!(out, RenderOutput::Text("# Notes\n\nn\n\n".to_string()));

        let (out, _) = render("Hint", json!({}), vec!["   "]);
        assert_eq!(out, RenderOutput::Empty);
    }

    #[test]
    fn test_output_format_legacy_attribute_warns() {
        let (out, ctx) = render("OutputFormat", json!({"json": "", "strict": ""}), vec![]);
        assert_eq!(ctx.diagnostics().len(), 1);
        assert_eq!(ctx.diagnostics()[0].code, DEPRECATED_ATTRIBUTE);
        assert!(ctx.diagnostics()[0].is_warning());
        match out {
            RenderOutput::Text(text) => {
                assert!(text.contains("Respond in json."));
                assert!(text.contains("Output nothing outside"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_list_renders_children_as_items() {
        let (out, _) = render("List", json!({"ordered": "true"}), vec!["one", " ", "two"]);
        assert_eq!(out, RenderOutput::Text("1. one\n2. two\n\n".to_string()));

        let (out, _) = render("List", json!({"items": "[\"a\", 2]"}), vec![]);
        assert_eq!(out, RenderOutput::Text("- a\n- 2\n\n".to_string()));
    }

    #[test]
    fn test_actions_are_recorded_not_run() {
        let (out, ctx) = render(
            "RunCommand",
            json!({"command": "cargo", "args": "[\"fmt\"]"}),
            vec![],
        );
        assert_eq!(out, RenderOutput::Empty);
        assert_eq!(
            ctx.actions(),
            &[Action::RunCommand {
                command: "cargo".to_string(),
                args: vec!["fmt".to_string()],
                cwd: None,
            }]
        );

        let (_, ctx) = render("OpenFile", json!({"path": "notes.md", "review": ""}), vec![]);
        assert_eq!(
            ctx.actions(),
            &[Action::OpenFile {
                path: "notes.md".to_string(),
                review: true,
            }]
        );
    }

    #[test]
    fn test_data_resolves_json_strings() {
        let registry = builtin_registry();
        let data = registry.lookup("Data", &[]).unwrap();
        assert!(data.has_resolver());

        let mut ctx = ResolveContext::default();
        let props = json!({"value": "{\"name\": \"Alice\"}"}).as_object().cloned().unwrap();
        assert_eq!(data.resolve(&props, &mut ctx).unwrap(), json!({"name": "Alice"}));

        let props = json!({"value": "plain"}).as_object().cloned().unwrap();
        assert_eq!(data.resolve(&props, &mut ctx).unwrap(), json!("plain"));

        assert_eq!(data.resolve(&Props::new(), &mut ctx).unwrap(), Value::Null);
        assert_eq!(ctx.diagnostics.len(), 1);
        assert_eq!(ctx.diagnostics[0].code, EMPTY_BINDING);
    }

    #[test]
    fn test_value_of_applies_path_and_default() {
        let (out, _) = render(
            "Value",
            json!({"of": {"a": [10, 20]}, "path": "a.1"}),
            vec![],
        );
        assert_eq!(out, RenderOutput::Value(PropValue::Direct(json!(20))));

        let (out, _) = render("Value", json!({"of": {}, "path": "x", "default": "n/a"}), vec![]);
        match out {
            RenderOutput::Value(value) => {
                let cache = crate::deferred::ResolutionCache::default();
                assert_eq!(crate::deferred::settle(&value, &cache), Some(json!("n/a")));
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
