//! Summary templates.
//!
//! A template is literal text with `{expression}` placeholders over the
//! rule's evaluation environment. The `link(name, expr)` function renders
//! its expression and additionally records a named link on the result, so
//! `deleted {link('target', audit.objectRef.name)}` both prints the name
//! and attaches it as a resource link.

use activity_core::ActivityLink;
use activity_filter::{bind, eval, parse, EvalError, Expr, FilterError, Literal, Schema, TypedExpr};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Literal(String),
    Expr(TypedExpr),
    Link { name: String, text: TypedExpr },
}

/// A parsed and schema-bound template, ready for repeated rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledTemplate {
    segments: Vec<Segment>,
}

impl CompiledTemplate {
    /// Compile a template against a rule schema. Placeholder expressions may
    /// be any scalar type; binding failures surface with the compiler
    /// message.
    pub fn compile(text: &str, schema: &Schema) -> Result<CompiledTemplate, FilterError> {
        let mut segments = Vec::new();
        let mut rest = text;
        let mut offset = 0;

        while let Some(open) = rest.find('{') {
            if !rest[..open].is_empty() {
                segments.push(Segment::Literal(rest[..open].to_string()));
            }
            let after_open = &rest[open + 1..];
            let close = after_open.find('}').ok_or_else(|| {
                FilterError::syntax(offset + open, "unterminated '{' in template")
            })?;
            let expr_text = &after_open[..close];
            segments.push(compile_placeholder(expr_text, schema)?);
            offset += open + close + 2;
            rest = &after_open[close + 1..];
        }
        if !rest.is_empty() {
            segments.push(Segment::Literal(rest.to_string()));
        }

        Ok(CompiledTemplate { segments })
    }

    /// Render against one record environment, yielding the summary string
    /// and the extracted links in template order.
    pub fn render(&self, env: &Value) -> Result<(String, Vec<ActivityLink>), EvalError> {
        let mut summary = String::new();
        let mut links = Vec::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => summary.push_str(text),
                Segment::Expr(expr) => summary.push_str(&eval(expr, env)?.display()),
                Segment::Link { name, text } => {
                    let rendered = eval(text, env)?.display();
                    summary.push_str(&rendered);
                    links.push(ActivityLink {
                        name: name.clone(),
                        target: rendered,
                    });
                }
            }
        }
        Ok((summary, links))
    }
}

fn compile_placeholder(text: &str, schema: &Schema) -> Result<Segment, FilterError> {
    let expr = parse(text)?;
    if let Expr::Call { function, args } = &expr {
        if function == "link" {
            let [Expr::Literal(Literal::Str(name)), value] = args.as_slice() else {
                return Err(FilterError::TypeMismatch {
                    path: "link".to_string(),
                    expected: "link('name', expression)".to_string(),
                    got: format!("{} arguments", args.len()),
                });
            };
            let text = bind(value, schema)?;
            return Ok(Segment::Link {
                name: name.clone(),
                text,
            });
        }
    }
    Ok(Segment::Expr(bind(&expr, schema)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use activity_filter::schema;
    use serde_json::json;

    fn env() -> Value {
        json!({
            "audit": {
                "verb": "delete",
                "objectRef": {"name": "web", "namespace": "prod"},
                "user": {"username": "jane@example.com"}
            },
            "actor": "jane@example.com",
            "verb": "delete",
            "kind": "Deployment"
        })
    }

    #[test]
    fn renders_placeholders_and_literals() {
        let template = CompiledTemplate::compile(
            "{actor} deleted {kind} {audit.objectRef.name} in {audit.objectRef.namespace}",
            schema::rule_audit(),
        )
        .unwrap();
        let (summary, links) = template.render(&env()).unwrap();
        assert_eq!(summary, "jane@example.com deleted Deployment web in prod");
        assert!(links.is_empty());
    }

    #[test]
    fn link_function_extracts_named_links() {
        let template = CompiledTemplate::compile(
            "{actor} deleted {link('target', audit.objectRef.name)}",
            schema::rule_audit(),
        )
        .unwrap();
        let (summary, links) = template.render(&env()).unwrap();
        assert_eq!(summary, "jane@example.com deleted web");
        assert_eq!(
            links,
            vec![ActivityLink {
                name: "target".into(),
                target: "web".into()
            }]
        );
    }

    #[test]
    fn compile_rejects_unknown_fields_and_bad_braces() {
        assert!(matches!(
            CompiledTemplate::compile("{event.reason}", schema::rule_audit()),
            Err(FilterError::UnknownField { .. })
        ));
        assert!(matches!(
            CompiledTemplate::compile("oops {actor", schema::rule_audit()),
            Err(FilterError::Syntax { .. })
        ));
    }

    #[test]
    fn template_without_placeholders_is_literal() {
        let template = CompiledTemplate::compile("nothing to see", schema::rule_audit()).unwrap();
        let (summary, links) = template.render(&env()).unwrap();
        assert_eq!(summary, "nothing to see");
        assert!(links.is_empty());
    }
}
