//! State diff engine
//!
//! Compares desired inputs with the last-applied inputs and classifies every
//! difference as updatable in place or requiring replacement.

use crate::action::FieldChange;
use crate::provider::PropertyMap;
use crate::schema::ResourceSchema;
use serde_json::Value;

const REDACTED: &str = "[secret]";

/// Field-by-field comparison in schema declaration order
///
/// Both maps are expected to be normalized (defaults applied). Absent and
/// `null` compare equal.
pub fn compare(schema: &ResourceSchema, desired: &PropertyMap, prior: &PropertyMap) -> Vec<FieldChange> {
    schema
        .fields
        .iter()
        .filter_map(|field| {
            let new = present(desired.get(&field.name));
            let old = present(prior.get(&field.name));
            if values_equal(old, new) {
                return None;
            }
            Some(FieldChange {
                field: field.name.clone(),
                old: old.map(|v| redact(v, field.secret)),
                new: new.map(|v| redact(v, field.secret)),
                requires_replace: field.replace_trigger,
            })
        })
        .collect()
}

/// Every set field of a brand-new resource, as changes from nothing
pub fn additions(schema: &ResourceSchema, desired: &PropertyMap) -> Vec<FieldChange> {
    compare(schema, desired, &PropertyMap::new())
        .into_iter()
        .map(|mut change| {
            change.requires_replace = false;
            change
        })
        .collect()
}

fn present(value: Option<&Value>) -> Option<&Value> {
    value.filter(|v| !v.is_null())
}

fn redact(value: &Value, secret: bool) -> Value {
    if secret {
        Value::String(REDACTED.to_string())
    } else {
        value.clone()
    }
}

/// JSON equality where `1` and `1.0` are the same number
pub fn values_equal(a: Option<&Value>, b: Option<&Value>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(Value::Number(x)), Some(Value::Number(y))) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}
