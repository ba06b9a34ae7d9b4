//! Kubernetes-style field selectors, mapped onto the compiled filter form.
//!
//! The list verbs accept the `=`, `==` and `!=` operators over a closed set
//! of fields per resource. Selector terms translate to the same typed
//! expression nodes the filter language produces, so the store sees one
//! predicate shape regardless of which surface the caller used. The
//! `spec.startTime` / `spec.endTime` selectors instead narrow the query
//! window.

use activity_core::{ActivityError, ActivityResult};
use activity_filter::{BinaryOp, FieldType, Literal, TypedExpr};
use chrono::{DateTime, Utc};

const SELECTOR_FIELD: &str = "fieldSelector";

/// Field selectors accepted on `activities` list/watch.
const ACTIVITY_FIELDS: &[(&str, &str, FieldType)] = &[
    ("metadata.name", "name", FieldType::String),
    ("metadata.namespace", "namespace", FieldType::String),
    ("spec.changeSource", "change_source", FieldType::String),
    ("spec.resource.apiGroup", "resource_api_group", FieldType::String),
    ("spec.resource.kind", "resource_kind", FieldType::String),
    ("spec.actor.name", "actor_name", FieldType::String),
    ("spec.origin.type", "origin_type", FieldType::String),
    ("spec.resource.uid", "resource_uid", FieldType::String),
];

/// Field selectors accepted on `events` list/watch.
const EVENT_FIELDS: &[(&str, &str, FieldType)] = &[
    ("metadata.namespace", "involved_namespace", FieldType::String),
    ("reason", "reason", FieldType::String),
    ("type", "event_type", FieldType::String),
    ("reportingComponent", "reporting_component", FieldType::String),
    ("involvedObject.apiGroup", "involved_api_group", FieldType::String),
    ("involvedObject.kind", "involved_kind", FieldType::String),
    ("involvedObject.namespace", "involved_namespace", FieldType::String),
    ("involvedObject.name", "involved_name", FieldType::String),
    ("involvedObject.uid", "involved_uid", FieldType::String),
];

/// Which selector vocabulary applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectorKind {
    Activity,
    Event,
}

/// A parsed field selector: an equality predicate plus optional window
/// overrides from the time-valued activity fields. Equality terms are also
/// kept as `(path, value)` pins so the watch engine can fold them into its
/// subject pattern.
#[derive(Debug, Clone, Default)]
pub struct FieldSelector {
    pub predicate: Option<TypedExpr>,
    pub pins: Vec<(String, String)>,
    pub start_override: Option<DateTime<Utc>>,
    pub end_override: Option<DateTime<Utc>>,
}

impl FieldSelector {
    /// Parse a comma-separated selector string against one vocabulary.
    pub fn parse(kind: SelectorKind, selector: &str) -> ActivityResult<FieldSelector> {
        let fields = match kind {
            SelectorKind::Activity => ACTIVITY_FIELDS,
            SelectorKind::Event => EVENT_FIELDS,
        };

        let mut parsed = FieldSelector::default();
        for term in selector.split(',') {
            let term = term.trim();
            if term.is_empty() {
                continue;
            }
            let (path, op, value) = split_term(term)?;

            if kind == SelectorKind::Activity && path == "spec.startTime" {
                parsed.start_override = Some(parse_time(value)?);
                continue;
            }
            if kind == SelectorKind::Activity && path == "spec.endTime" {
                parsed.end_override = Some(parse_time(value)?);
                continue;
            }

            let Some((_, column, ty)) = fields.iter().find(|(p, _, _)| *p == path) else {
                return Err(ActivityError::invalid(
                    SELECTOR_FIELD,
                    format!("unsupported field selector {:?}", path),
                ));
            };
            if op == BinaryOp::Eq {
                parsed.pins.push((path.to_string(), value.to_string()));
            }
            let field = TypedExpr::Field {
                path: path.to_string(),
                column: column.to_string(),
                ty: *ty,
            };
            let comparison = TypedExpr::Compare {
                op,
                left: Box::new(field),
                right: Box::new(TypedExpr::Literal(Literal::Str(value.to_string()))),
            };
            parsed.predicate = Some(match parsed.predicate.take() {
                Some(existing) => TypedExpr::And(Box::new(existing), Box::new(comparison)),
                None => comparison,
            });
        }

        Ok(parsed)
    }
}

fn split_term(term: &str) -> ActivityResult<(&str, BinaryOp, &str)> {
    if let Some((path, value)) = term.split_once("!=") {
        return Ok((path.trim(), BinaryOp::Ne, value.trim()));
    }
    if let Some((path, value)) = term.split_once("==") {
        return Ok((path.trim(), BinaryOp::Eq, value.trim()));
    }
    if let Some((path, value)) = term.split_once('=') {
        return Ok((path.trim(), BinaryOp::Eq, value.trim()));
    }
    Err(ActivityError::invalid(
        SELECTOR_FIELD,
        format!("selector term {:?} has no operator", term),
    ))
}

fn parse_time(value: &str) -> ActivityResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| {
            ActivityError::invalid(
                SELECTOR_FIELD,
                format!("{:?} is not an RFC3339 timestamp", value),
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use activity_filter::emit;

    #[test]
    fn translates_terms_to_bound_sql() {
        let selector = FieldSelector::parse(
            SelectorKind::Activity,
            "spec.changeSource=human,spec.actor.name!=robot",
        )
        .unwrap();
        let fragment = emit(selector.predicate.as_ref().unwrap());
        assert_eq!(
            fragment.where_clause,
            "(change_source = $1 AND actor_name <> $2)"
        );
    }

    #[test]
    fn time_fields_override_the_window() {
        let selector = FieldSelector::parse(
            SelectorKind::Activity,
            "spec.startTime=2024-01-01T00:00:00Z,spec.endTime=2024-01-02T00:00:00Z",
        )
        .unwrap();
        assert!(selector.predicate.is_none());
        assert!(selector.start_override.is_some());
        assert!(selector.end_override.is_some());
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = FieldSelector::parse(SelectorKind::Activity, "spec.summary=x").unwrap_err();
        assert_eq!(err.status_code(), 422);
        assert!(err.to_string().contains("spec.summary"));
    }

    #[test]
    fn event_vocabulary_accepts_involved_object() {
        let selector = FieldSelector::parse(
            SelectorKind::Event,
            "involvedObject.kind=Pod,type=Warning",
        )
        .unwrap();
        let fragment = emit(selector.predicate.as_ref().unwrap());
        assert_eq!(
            fragment.where_clause,
            "(involved_kind = $1 AND event_type = $2)"
        );
    }
}
