//! Read-only lookup functions
//!
//! A function lists one API collection and keeps the items whose fields
//! equal every filter argument. IDs are matched loosely: `"101"` selects an
//! item whose `id` is the number 101.

use danubedata_core::diff::values_equal;
use danubedata_core::{DataSourceSchema, PropertyMap, ProviderError, Result};
use serde_json::Value;

/// Reject arguments the function does not filter on
pub fn check_args(function: &DataSourceSchema, args: &PropertyMap) -> Result<()> {
    for (field, value) in args {
        if value.is_null() {
            continue;
        }
        if !function.accepts_filter(field) {
            return Err(ProviderError::validation(
                &function.function,
                field,
                format!("not a filter of {}; expected one of: {}", function.function, function.filters.join(", ")),
            ));
        }
        if value.is_array() || value.is_object() {
            return Err(ProviderError::validation(
                &function.function,
                field,
                "filters take a single value",
            ));
        }
    }
    Ok(())
}

/// Items matching every non-null argument, in API order
pub fn select(args: &PropertyMap, items: Vec<Value>) -> Vec<Value> {
    items
        .into_iter()
        .filter(|item| {
            args.iter()
                .filter(|(_, wanted)| !wanted.is_null())
                .all(|(field, wanted)| matches(item.get(field), wanted))
        })
        .collect()
}

/// Function result: the items under the function's result key
pub fn result(function: &DataSourceSchema, items: Vec<Value>) -> Value {
    let mut result = serde_json::Map::new();
    result.insert(function.result.clone(), Value::Array(items));
    Value::Object(result)
}

fn matches(actual: Option<&Value>, wanted: &Value) -> bool {
    match (actual, wanted) {
        (Some(Value::Number(n)), Value::String(s)) => n.to_string() == *s,
        (Some(Value::String(s)), Value::Number(n)) => n.to_string() == *s,
        (actual, wanted) => values_equal(actual, Some(wanted)),
    }
}
