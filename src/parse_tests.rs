#[cfg(test)]
mod tests {
    use crate::diagnostics::RenderError;
    use crate::ir::{AttributeValue, Element, Node};
    use crate::parse::parse_template;

    fn element(node: &Node) -> &Element {
        node.as_element().expect("expected element")
    }

    #[test]
    fn test_nested_elements_keep_casing() {
        let nodes = parse_template("<Prompt><OutputFormat>Use bullets</OutputFormat></Prompt>").unwrap();
        assert_eq!(nodes.len(), 1);
        let prompt = element(&nodes[0]);
        assert_eq!(prompt.tag, "Prompt");
        assert!(prompt.attributes.is_empty());
        let format = element(&prompt.children[0]);
        assert_eq!(format.tag, "OutputFormat");
        assert_eq!(format.children, vec![Node::text("Use bullets")]);
    }

    #[test]
    fn test_self_closing_tags_are_siblings() {
        let nodes =
            parse_template(r#"<Producer name="u"/><Consumer value={u.name}/>"#).unwrap();
        assert_eq!(nodes.len(), 2);
        let producer = element(&nodes[0]);
        assert_eq!(producer.static_attribute("name"), Some("u"));
        assert!(producer.children.is_empty());

        let consumer = element(&nodes[1]);
        match consumer.attribute("value") {
            Some(AttributeValue::Dynamic(expr)) => assert_eq!(expr.code, "u.name"),
            other => panic!("expected dynamic attribute, got {:?}", other),
        }
    }

    #[test]
    fn test_spaced_self_closing_tags() {
        let nodes =
            parse_template(r#"<Producer name="u" /><Consumer value={u.name} />"#).unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!(element(&nodes[0]).attributes.len(), 1);
        assert_eq!(element(&nodes[0]).static_attribute("name"), Some("u"));
        assert!(matches!(
            element(&nodes[1]).attribute("value"),
            Some(AttributeValue::Dynamic(_))
        ));
    }

    #[test]
    fn test_dotted_tags() {
        let nodes = parse_template(r#"<lib.Card title="x"/>"#).unwrap();
        let card = element(&nodes[0]);
        assert_eq!(card.tag, "lib.Card");
        assert_eq!(card.attributes.len(), 1);
        assert_eq!(card.static_attribute("title"), Some("x"));
    }

    #[test]
    fn test_text_expressions_split_text() {
        let nodes = parse_template("<Task>Hello {user.name}!</Task>").unwrap();
        let task = element(&nodes[0]);
        assert_eq!(task.children.len(), 3);
        assert_eq!(task.children[0], Node::text("Hello "));
        assert_eq!(task.children[1], Node::expression("user.name").unwrap());
        assert_eq!(task.children[2], Node::text("!"));
    }

    #[test]
    fn test_whitespace_is_preserved_for_the_compiler() {
        let nodes = parse_template("<Task>\n    line one\n    line two\n  </Task>").unwrap();
        let task = element(&nodes[0]);
        assert_eq!(
            task.children,
            vec![Node::text("\n    line one\n    line two\n  ")]
        );
    }

    #[test]
    fn test_quoted_json_attribute_is_static() {
        let nodes = parse_template(r#"<Data value='{"name": "Alice"}'/>"#).unwrap();
        let data = element(&nodes[0]);
        assert_eq!(data.static_attribute("value"), Some(r#"{"name": "Alice"}"#));
    }

    #[test]
    fn test_attribute_names_are_lowercased() {
        let nodes = parse_template(r#"<Widget maxItems="3"/>"#).unwrap();
        let widget = element(&nodes[0]);
        assert_eq!(widget.attributes[0].name, "maxitems");
    }

    #[test]
    fn test_bare_attribute_is_empty_string() {
        let nodes = parse_template("<Reasoning show/>").unwrap();
        assert_eq!(element(&nodes[0]).static_attribute("show"), Some(""));
    }

    #[test]
    fn test_comments_are_dropped() {
        let nodes = parse_template("<Task><!-- note -->Do it</Task>").unwrap();
        assert_eq!(element(&nodes[0]).children, vec![Node::text("Do it")]);
    }

    #[test]
    fn test_empty_source() {
        assert!(parse_template("").unwrap().is_empty());
    }

    #[test]
    fn test_rejected_expression() {
        let err = parse_template("<Consumer value={fetch(url)}/>").unwrap_err();
        assert!(matches!(err, RenderError::InvalidExpression { .. }));
    }
}
