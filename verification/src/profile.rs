//! Extracting a profile hint from an ORCID employments document.
//!
//! Two shapes are accepted:
//! - flat: `{"employment-summary": [{"role-title": ..., "organization": {"name": ...}}]}`
//! - v3.0 grouped: `{"affiliation-group": [{"summaries": [{"employment-summary": {...}}]}]}`
//!
//! Every non-blank summary is listed. The pre-fill values come from the
//! first summary that carries a role title or an organization name.

use serde_json::Value;

use plaudit_types::{Employment, ProfileHint};

pub fn hint_from_employments(doc: &Value) -> ProfileHint {
    let employments: Vec<Employment> = summaries(doc)
        .into_iter()
        .map(employment)
        .filter(|entry| !entry.is_empty())
        .collect();
    let hint = employments
        .iter()
        .map(Employment::hint)
        .find(|hint| !hint.is_empty())
        .unwrap_or_default();
    hint.with_employments(employments)
}

fn employment(summary: &Value) -> Employment {
    let organization = summary.get("organization");
    let address = organization.and_then(|o| o.get("address"));
    Employment::new(
        text(summary.get("role-title")),
        text(organization.and_then(|o| o.get("name"))),
        text(address.and_then(|a| a.get("city"))),
        text(address.and_then(|a| a.get("country"))),
    )
}

fn summaries(doc: &Value) -> Vec<&Value> {
    if let Some(flat) = doc.get("employment-summary").and_then(Value::as_array) {
        return flat.iter().collect();
    }
    doc.get("affiliation-group")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|group| group.get("summaries").and_then(Value::as_array))
        .flatten()
        .filter_map(|s| s.get("employment-summary"))
        .collect()
}

// ORCID wraps some strings as `{"value": "..."}`.
fn text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => map.get("value").and_then(Value::as_str).map(str::to_string),
        _ => None,
    }
}
