//! Facet aggregation: distinct values over one indexed field in a window.

use crate::models::{FacetQuerySpec, FacetRequest, FacetValueCount};
use activity_core::{ActivityError, ActivityResult};
use activity_filter::schema;
use activity_storage::RecordKind;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Upper bound on facets per request.
pub const MAX_FACETS: usize = 10;

/// Default and maximum distinct values returned per facet.
const DEFAULT_FACET_LIMIT: i64 = 10;
const MAX_FACET_LIMIT: i64 = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FacetResult {
    pub field: String,
    pub values: Vec<FacetValueCount>,
}

/// The closed set of facetable identifier paths per record family.
pub fn facet_whitelist(kind: RecordKind) -> &'static [&'static str] {
    match kind {
        RecordKind::Audit => &[
            "verb",
            "objectRef.resource",
            "objectRef.apiGroup",
            "objectRef.namespace",
            "user.username",
            "responseStatus.code",
        ],
        RecordKind::Event => &[
            "reason",
            "type",
            "reportingComponent",
            "involvedObject.kind",
            "involvedObject.namespace",
        ],
        RecordKind::Activity => &[
            "changeSource",
            "actor.type",
            "actor.name",
            "resource.kind",
            "resource.apiGroup",
            "origin.type",
        ],
    }
}

fn record_schema(kind: RecordKind) -> &'static activity_filter::Schema {
    match kind {
        RecordKind::Audit => schema::audit(),
        RecordKind::Event => schema::event(),
        RecordKind::Activity => schema::activity(),
    }
}

/// A validated facet request resolved to its store column.
#[derive(Debug, Clone)]
pub struct ResolvedFacet {
    pub field: String,
    pub column: String,
    pub limit: i64,
}

/// Validate the facet list of a spec: bounded count, whitelisted fields,
/// sane per-facet limits.
pub fn resolve_facets(
    kind: RecordKind,
    spec: &FacetQuerySpec,
) -> ActivityResult<Vec<ResolvedFacet>> {
    if spec.facets.is_empty() {
        return Err(ActivityError::invalid(
            "spec.facets",
            "at least one facet is required",
        ));
    }
    if spec.facets.len() > MAX_FACETS {
        return Err(ActivityError::invalid(
            "spec.facets",
            format!("at most {} facets are allowed", MAX_FACETS),
        ));
    }

    let whitelist = facet_whitelist(kind);
    let schema = record_schema(kind);
    spec.facets
        .iter()
        .enumerate()
        .map(|(i, facet)| resolve_one(schema, whitelist, i, facet))
        .collect()
}

fn resolve_one(
    schema: &'static activity_filter::Schema,
    whitelist: &[&str],
    index: usize,
    facet: &FacetRequest,
) -> ActivityResult<ResolvedFacet> {
    let field_path = format!("spec.facets[{}].field", index);
    if !whitelist.contains(&facet.field.as_str()) {
        return Err(ActivityError::invalid(
            field_path,
            format!("{:?} is not a facetable field", facet.field),
        ));
    }
    // Whitelisted fields always exist in the schema.
    let def = schema.field(&facet.field).ok_or_else(|| {
        ActivityError::Internal(format!("whitelisted facet {:?} missing from schema", facet.field))
    })?;

    let limit = facet.limit.unwrap_or(DEFAULT_FACET_LIMIT);
    if limit < 1 || limit > MAX_FACET_LIMIT {
        return Err(ActivityError::invalid(
            format!("spec.facets[{}].limit", index),
            format!("limit must be between 1 and {}", MAX_FACET_LIMIT),
        ));
    }

    Ok(ResolvedFacet {
        field: facet.field.clone(),
        column: def.column.to_string(),
        limit,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(fields: &[&str]) -> FacetQuerySpec {
        FacetQuerySpec {
            start_time: "now-1h".into(),
            end_time: "now".into(),
            facets: fields
                .iter()
                .map(|f| FacetRequest {
                    field: f.to_string(),
                    limit: None,
                })
                .collect(),
        }
    }

    #[test]
    fn resolves_whitelisted_fields_to_columns() {
        let resolved = resolve_facets(RecordKind::Audit, &spec(&["verb", "user.username"])).unwrap();
        assert_eq!(resolved[0].column, "verb");
        assert_eq!(resolved[1].column, "user_username");
        assert_eq!(resolved[0].limit, DEFAULT_FACET_LIMIT);
    }

    #[test]
    fn rejects_non_whitelisted_fields() {
        let err = resolve_facets(RecordKind::Audit, &spec(&["user.uid"])).unwrap_err();
        assert_eq!(err.status_code(), 422);
        assert!(err.to_string().contains("spec.facets[0].field"));
    }

    #[test]
    fn rejects_more_than_ten_facets() {
        let fields = ["verb"; 11];
        let err = resolve_facets(RecordKind::Audit, &spec(&fields)).unwrap_err();
        assert!(err.to_string().contains("at most 10"));
    }

    #[test]
    fn rejects_out_of_range_limits() {
        let mut s = spec(&["verb"]);
        s.facets[0].limit = Some(0);
        assert!(resolve_facets(RecordKind::Audit, &s).is_err());
        s.facets[0].limit = Some(101);
        assert!(resolve_facets(RecordKind::Audit, &s).is_err());
    }
}
