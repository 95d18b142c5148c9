//! Field selection against a phase's field catalog.
//!
//! Humans pick fields by label; every write downstream is keyed by field id.
//! Resolution never mutates anything: a selection containing a single unknown
//! label or id is rejected as a whole.

use std::collections::HashSet;

use serde::Serialize;

use crate::error::CoreError;
use crate::pipe::{Field, Member};

/// Member choices offered for one assignee-type field in a selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssigneeOption {
    pub field_id: String,
    pub field_label: String,
    pub members: Vec<Member>,
}

/// Outcome of validating a label selection against the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedSelection {
    /// Selected labels, deduplicated, in request order.
    pub labels: Vec<String>,
    /// Ids of the selected fields, positionally aligned with `labels`.
    pub field_ids: Vec<String>,
    /// Selected fields whose type is `assignee_select`.
    pub assignee_fields: Vec<Field>,
    pub assignee_options: Vec<AssigneeOption>,
}

/// Validate `labels` against `catalog` and collect the assignee fields that
/// need a member choice.
///
/// Labels match exactly. When the catalog repeats a label (the same field
/// shown on several phases) the first occurrence wins.
pub fn prepare_selection(
    labels: &[String],
    catalog: &[Field],
    members: &[Member],
) -> Result<PreparedSelection, CoreError> {
    if labels.is_empty() {
        return Err(CoreError::Validation(
            "Select at least one field".into(),
        ));
    }

    let mut seen = HashSet::new();
    let mut resolved = Vec::with_capacity(labels.len());
    let mut missing = Vec::new();

    for label in labels {
        if !seen.insert(label.as_str()) {
            continue;
        }
        match catalog.iter().find(|f| &f.label == label) {
            Some(field) => resolved.push(field.clone()),
            None => missing.push(label.as_str()),
        }
    }

    if !missing.is_empty() {
        return Err(CoreError::UnknownField(format!(
            "Fields not found in the current phase: {}",
            missing.join(", ")
        )));
    }

    let assignee_fields: Vec<Field> = resolved.iter().filter(|f| f.is_assignee()).cloned().collect();
    let assignee_options = assignee_fields
        .iter()
        .map(|field| AssigneeOption {
            field_id: field.id.clone(),
            field_label: field.label.clone(),
            members: members.to_vec(),
        })
        .collect();

    Ok(PreparedSelection {
        labels: resolved.iter().map(|f| f.label.clone()).collect(),
        field_ids: resolved.iter().map(|f| f.id.clone()).collect(),
        assignee_fields,
        assignee_options,
    })
}

/// Resolve field ids against `catalog`, preserving request order.
///
/// Repeated ids are kept once. Fails with [`CoreError::UnknownField`] listing
/// every id that has no match.
pub fn resolve_field_ids(ids: &[String], catalog: &[Field]) -> Result<Vec<Field>, CoreError> {
    let mut seen = HashSet::new();
    let mut resolved = Vec::with_capacity(ids.len());
    let mut missing = Vec::new();

    for id in ids {
        if !seen.insert(id.as_str()) {
            continue;
        }
        match catalog.iter().find(|f| &f.id == id) {
            Some(field) => resolved.push(field.clone()),
            None => missing.push(id.as_str()),
        }
    }

    if !missing.is_empty() {
        return Err(CoreError::UnknownField(format!(
            "Field ids not found in the current phase: {}",
            missing.join(", ")
        )));
    }

    Ok(resolved)
}

/// Check that `member_id` belongs to the pipe when the selection needs one.
///
/// A selection without assignee fields accepts any value, since it is never
/// written into the template.
pub fn validate_default_assignee(
    member_id: Option<&str>,
    fields: &[Field],
    members: &[Member],
) -> Result<(), CoreError> {
    if !fields.iter().any(Field::is_assignee) {
        return Ok(());
    }
    match member_id.map(str::trim).filter(|id| !id.is_empty()) {
        None => Ok(()),
        Some(id) if members.iter().any(|m| m.id == id) => Ok(()),
        Some(id) => Err(CoreError::Validation(format!(
            "User {id} is not a member of this pipe"
        ))),
    }
}
