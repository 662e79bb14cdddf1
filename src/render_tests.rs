#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::{json, Value};

    use crate::context::Action;
    use crate::diagnostics::{
        DiagnosticRules, Severity, E_IMPORT_DIRECTIVE, W_CONFLICTING_DIRECTIVES, W_MISSING_ELEMENT,
    };
    use crate::engine::{Engine, RenderOptions, RenderResult};
    use crate::test_support::{mock_registry, Consumer};

    fn engine(fixed: Value) -> Engine {
        let (registry, _, _) = mock_registry(fixed);
        Engine::new(registry)
    }

    fn codes(result: &RenderResult) -> Vec<&str> {
        result.errors.iter().map(|d| d.code.as_str()).collect()
    }

    #[test]
    fn test_producer_consumer_source() {
        let result = engine(json!({"name": "Alice"})).render(
            r#"<Prompt><Producer name="u"/><Consumer value={u.name}/></Prompt>"#,
            &RenderOptions::default(),
        );
        assert!(result.ok);
        assert_eq!(result.text.as_deref(), Some("Alice"));
        // Warnings ride along with success.
        assert_eq!(codes(&result), vec![W_MISSING_ELEMENT]);
    }

    #[test]
    fn test_blocks_and_context_inputs() {
        let source = "<Prompt>\n  <Role>\n    You are a careful reviewer.\n  </Role>\n  <Task>Review {topic}.</Task>\n</Prompt>";
        let options = RenderOptions {
            context: json!({"topic": "Rust"}).as_object().cloned().unwrap(),
            ..RenderOptions::default()
        };
        let result = engine(Value::Null).render(source, &options);
        assert!(result.ok, "{:?}", result.errors);
        assert_eq!(
            result.text.as_deref(),
            Some("# Role\n\nYou are a careful reviewer.\n\n# Task\n\nReview Rust.\n\n")
        );
        assert!(result.errors.is_empty());
    }

    #[test]
    fn test_structural_elements_accept_name() {
        let result = engine(Value::Null).render(
            r#"<Prompt name="review"><Task name="main">Do it</Task><Section name="intro">Hi</Section><OutputFormat name="fmt" format="json"/></Prompt>"#,
            &RenderOptions::default(),
        );
        assert!(result.ok, "{:?}", result.errors);
        assert_eq!(
            result.text.as_deref(),
            Some("# Task\n\nDo it\n\nHi\n\n# Output Format\n\nRespond in json.\n\n")
        );
        assert!(result.errors.is_empty());
    }

    #[test]
    fn test_empty_template() {
        let result = engine(Value::Null).render("", &RenderOptions::default());
        assert!(result.ok);
        assert_eq!(result.text.as_deref(), Some(""));
        assert_eq!(codes(&result), vec![W_MISSING_ELEMENT]);

        let (registry, _, _) = mock_registry(Value::Null);
        let quiet = Engine::new(registry).with_rules(DiagnosticRules::none());
        let result = quiet.render("", &RenderOptions::default());
        assert!(result.ok);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn test_conflict_needs_both_directives_active() {
        let engine = engine(Value::Null);
        let both = engine.render(
            r#"<Task>x</Task><OutputFormat format="json" strict/><Reasoning show/>"#,
            &RenderOptions::default(),
        );
        assert!(both.ok);
        assert_eq!(codes(&both), vec![W_CONFLICTING_DIRECTIVES]);

        let hidden = engine.render(
            r#"<Task>x</Task><OutputFormat format="json" strict/><Reasoning/>"#,
            &RenderOptions::default(),
        );
        assert!(hidden.errors.is_empty());
    }

    #[test]
    fn test_ignore_warnings_drops_only_listed_codes() {
        let source = r#"<OutputFormat strict/><Reasoning show/>"#;
        let engine = engine(Value::Null);

        let all = engine.render(source, &RenderOptions::default());
        assert_eq!(codes(&all), vec![W_CONFLICTING_DIRECTIVES, W_MISSING_ELEMENT]);

        let options = RenderOptions {
            ignore_warnings: vec![W_MISSING_ELEMENT.to_string()],
            ..RenderOptions::default()
        };
        let filtered = engine.render(source, &options);
        assert!(filtered.ok);
        assert_eq!(codes(&filtered), vec![W_CONFLICTING_DIRECTIVES]);
    }

    #[test]
    fn test_throw_on_warnings_fails_the_call() {
        let engine = engine(Value::Null);
        let options = RenderOptions {
            throw_on_warnings: true,
            ..RenderOptions::default()
        };
        let result = engine.render(r#"<RunCommand command="ls"/>"#, &options);
        assert!(!result.ok);
        assert!(result.text.is_none());
        assert!(result.actions.is_empty());
        assert_eq!(codes(&result), vec![W_MISSING_ELEMENT]);
        assert!(result.errors.iter().all(|d| d.severity == Severity::Error));

        // Ignored codes never escalate.
        let options = RenderOptions {
            ignore_warnings: vec![W_MISSING_ELEMENT.to_string()],
            throw_on_warnings: true,
            ..RenderOptions::default()
        };
        let result = engine.render(r#"<RunCommand command="ls"/>"#, &options);
        assert!(result.ok);
        assert_eq!(result.actions.len(), 1);
    }

    #[test]
    fn test_actions_returned_on_success() {
        let result = engine(Value::Null).render(
            r#"<Task>Ship it</Task><RunCommand command="make"/><OpenFile path="notes.md"/>"#,
            &RenderOptions::default(),
        );
        assert!(result.ok);
        assert_eq!(result.actions.len(), 2);
        assert!(matches!(&result.actions[0], Action::RunCommand { command, .. } if command == "make"));
        assert!(matches!(&result.actions[1], Action::OpenFile { path, .. } if path == "notes.md"));
    }

    #[test]
    fn test_compile_error_fails_without_text() {
        let result = engine(Value::Null).render(
            r#"<Import component="Card"/><Task>x</Task>"#,
            &RenderOptions::default(),
        );
        assert!(!result.ok);
        assert!(result.text.is_none());
        assert_eq!(codes(&result), vec![E_IMPORT_DIRECTIVE]);
    }

    #[test]
    fn test_resolution_failure_keeps_earlier_warnings() {
        let result = engine(Value::Null).render(
            r#"<Data/><Producer name="u" fail="offline"/>"#,
            &RenderOptions::default(),
        );
        assert!(!result.ok);
        assert_eq!(codes(&result), vec!["empty-binding", "E-RESOLVE"]);
    }

    #[test]
    fn test_imported_component_from_module() {
        let (mut registry, _, _) = mock_registry(Value::Null);
        registry.register_module("./ui", "Card", Consumer);
        let engine = Engine::new(registry);
        let result = engine.render(
            r#"<Import component="Card" from="./ui"/><Task><Card value="hi"/></Task>"#,
            &RenderOptions::default(),
        );
        assert!(result.ok, "{:?}", result.errors);
        assert_eq!(result.text.as_deref(), Some("# Task\n\nhi\n\n"));
    }

    #[test]
    fn test_verbatim_children_are_emitted_as_source() {
        let result = engine(Value::Null).render(
            "<Task><Verbatim>{x} <b>bold</b></Verbatim></Task>",
            &RenderOptions::default(),
        );
        assert!(result.ok, "{:?}", result.errors);
        assert_eq!(result.text.as_deref(), Some("# Task\n\n{x} <b>bold</b>\n\n"));
    }

    #[test]
    fn test_compile_is_cached_per_source() {
        let engine = engine(Value::Null);
        let first = engine.compile("<Task>x</Task>").unwrap();
        let second = engine.compile("<Task>x</Task>").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        let other = engine.compile("<Task>y</Task>").unwrap();
        assert!(!Arc::ptr_eq(&first, &other));
    }

    #[test]
    fn test_options_and_result_wire_format() {
        let options: RenderOptions = serde_json::from_str(
            r#"{"ignoreWarnings": ["W-MISSING-ELEMENT"], "throwOnWarnings": true, "context": {"a": 1}}"#,
        )
        .unwrap();
        assert_eq!(options.ignore_warnings, vec![W_MISSING_ELEMENT.to_string()]);
        assert!(options.throw_on_warnings);
        assert_eq!(options.context["a"], json!(1));

        let result = engine(Value::Null).render("<Task>x</Task>", &options);
        let wire = serde_json::to_value(&result).unwrap();
        assert_eq!(wire["ok"], json!(true));
        assert_eq!(wire["text"], json!("# Task\n\nx\n\n"));
        assert_eq!(wire["errors"], json!([]));
        assert_eq!(wire["actions"], json!([]));

        let failed = engine(Value::Null).render("<Mystery/>", &RenderOptions::default());
        let wire = serde_json::to_value(&failed).unwrap();
        assert_eq!(wire["ok"], json!(false));
        assert!(wire.get("text").is_none());
        assert_eq!(wire["errors"][0]["code"], json!("E-UNKNOWN-COMPONENT"));
    }
}
