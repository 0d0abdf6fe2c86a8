//! Field-level diffing of entity snapshots.

use crate::config::{FieldPolicy, STORE_OWNED_FIELDS};
use crate::event::FieldChange;
use leaguesync_codec::{Document, Value};
use std::collections::{BTreeMap, BTreeSet};

/// Compares the top-level scalar fields of two snapshots.
///
/// A field counts as changed when its value differs, or when it is present
/// on only one side. Arrays and maps are never diffed. Store-owned fields
/// and fields rejected by `policy` are ignored.
pub fn diff_fields(previous: &Document, next: &Document, policy: &FieldPolicy) -> BTreeMap<String, FieldChange> {
    let fields: BTreeSet<&String> = previous.keys().chain(next.keys()).collect();
    fields
        .into_iter()
        .filter(|field| policy.permits(field) && !STORE_OWNED_FIELDS.contains(&field.as_str()))
        .filter_map(|field| {
            let old_value = scalar(previous.get(field));
            let new_value = scalar(next.get(field));
            if old_value == new_value {
                return None;
            }
            Some((
                field.clone(),
                FieldChange {
                    old_value: old_value.cloned(),
                    new_value: new_value.cloned(),
                },
            ))
        })
        .collect()
}

fn scalar(value: Option<&Value>) -> Option<&Value> {
    value.filter(|v| v.is_scalar())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(pairs: &[(&str, Value)]) -> Document {
        pairs.iter().map(|(k, v)| ((*k).to_string(), v.clone())).collect()
    }

    #[test]
    fn identical_snapshots_have_no_changes() {
        let a = doc(&[("x", Value::Integer(5)), ("name", Value::from("Bears"))]);
        assert!(diff_fields(&a, &a.clone(), &FieldPolicy::all()).is_empty());
    }

    #[test]
    fn changed_field_reports_old_and_new() {
        let a = doc(&[("x", Value::Integer(5))]);
        let b = doc(&[("x", Value::Integer(7))]);
        let changes = diff_fields(&a, &b, &FieldPolicy::all());
        assert_eq!(changes.len(), 1);
        assert_eq!(changes["x"].old_value, Some(Value::Integer(5)));
        assert_eq!(changes["x"].new_value, Some(Value::Integer(7)));
    }

    #[test]
    fn appearing_and_disappearing_fields_count() {
        let a = doc(&[("gone", Value::Bool(true))]);
        let b = doc(&[("new", Value::Integer(1))]);
        let changes = diff_fields(&a, &b, &FieldPolicy::all());
        assert_eq!(changes["gone"].new_value, None);
        assert_eq!(changes["new"].old_value, None);
    }

    #[test]
    fn nested_values_and_store_fields_are_ignored() {
        let a = doc(&[
            ("roster", Value::Array(vec![Value::Integer(1)])),
            ("timestamp", Value::Timestamp(1)),
            ("id", Value::from("4")),
        ]);
        let b = doc(&[("roster", Value::Array(vec![Value::Integer(2)]))]);
        assert!(diff_fields(&a, &b, &FieldPolicy::all()).is_empty());
    }

    #[test]
    fn policy_limits_diffed_fields() {
        let a = doc(&[("x", Value::Integer(1)), ("lastUpdated", Value::Integer(1))]);
        let b = doc(&[("x", Value::Integer(1)), ("lastUpdated", Value::Integer(2))]);
        let policy = FieldPolicy::all().with_denied(["lastUpdated"]);
        assert!(diff_fields(&a, &b, &policy).is_empty());
        assert_eq!(diff_fields(&a, &b, &FieldPolicy::all()).len(), 1);
    }
}
