//! Translation between resource properties and API payloads

use danubedata_core::{
    FieldKind, PropertyMap, ProviderError, ResourceSchema, ResourceState, ResourceStatus, Result,
};
use serde_json::{Map, Value};

/// Request body for creating a resource: every declared schema field that is set
pub fn create_body(schema: &ResourceSchema, properties: &PropertyMap) -> Value {
    let body: Map<String, Value> = schema
        .fields
        .iter()
        .filter_map(|field| {
            properties
                .get(&field.name)
                .filter(|v| !v.is_null())
                .map(|v| (field.name.clone(), v.clone()))
        })
        .collect();
    Value::Object(body)
}

/// Request body for an in-place update: only the listed fields
///
/// A field that was removed from the spec is sent as `null`.
pub fn update_body<'a>(
    fields: impl IntoIterator<Item = &'a str>,
    properties: &PropertyMap,
) -> Value {
    let body: Map<String, Value> = fields
        .into_iter()
        .map(|field| {
            let value = properties.get(field).cloned().unwrap_or(Value::Null);
            (field.to_string(), value)
        })
        .collect();
    Value::Object(body)
}

/// ID of a remote object; numeric IDs are rendered as strings
pub fn remote_id(remote: &Value) -> Option<String> {
    match remote.get("id")? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Build the resource state from an API object
///
/// Outputs missing from `remote` keep the values recorded in `prior`;
/// the API only returns some of them (e.g. `secret_access_key`) at creation.
pub fn to_state(
    schema: &ResourceSchema,
    name: &str,
    inputs: &PropertyMap,
    remote: &Value,
    prior: Option<&ResourceState>,
) -> Result<ResourceState> {
    let id = remote_id(remote)
        .or_else(|| prior.map(|p| p.id.clone()))
        .ok_or_else(|| {
            ProviderError::InvalidResponse(format!(
                "{} {} response carries no id",
                schema.type_name, name
            ))
        })?;

    let status = remote
        .get("status")
        .and_then(Value::as_str)
        .map(ResourceStatus::from_remote)
        .unwrap_or(ResourceStatus::Running);

    let mut state = ResourceState::new(id, &schema.type_name, name)
        .with_status(status)
        .with_inputs(inputs.clone());

    if let Some(prior) = prior {
        state.created_at = prior.created_at;
        state.outputs = prior.outputs.clone();
    }

    for output in &schema.outputs {
        if let Some(value) = remote.get(&output.name).filter(|v| !v.is_null()) {
            state.set_output(&output.name, coerce(&output.kind, value));
        }
    }

    Ok(state)
}

/// Merge remote-reported property values into recorded inputs
///
/// Only fields the inputs already carry are refreshed. Values the API fills
/// in on its own (a default `version`, say) were never declared and must
/// not show up as drift. Secret fields are never echoed back by the API and
/// stay as recorded.
pub fn refresh_inputs(schema: &ResourceSchema, recorded: &PropertyMap, remote: &Value) -> PropertyMap {
    let mut inputs = recorded.clone();
    for field in schema.fields.iter().filter(|f| !f.secret) {
        let Some(slot) = inputs.get_mut(&field.name).filter(|v| !v.is_null()) else {
            continue;
        };
        if let Some(value) = remote.get(&field.name).filter(|v| !v.is_null()) {
            *slot = coerce(&field.kind, value);
        }
    }
    inputs
}

/// Normalize loosely typed API values (e.g. `"6379"` for an integer port)
fn coerce(kind: &FieldKind, value: &Value) -> Value {
    match (kind, value) {
        (FieldKind::Integer, Value::String(s)) => s
            .parse::<i64>()
            .map(Value::from)
            .unwrap_or_else(|_| value.clone()),
        (FieldKind::String, Value::Number(n)) => Value::String(n.to_string()),
        (FieldKind::Bool, Value::Number(n)) => Value::Bool(n.as_i64() == Some(1)),
        _ => value.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use danubedata_core::Registry;
    use serde_json::json;

    fn props(value: Value) -> PropertyMap {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_create_body_skips_unset_fields() {
        let registry = Registry::builtin();
        let schema = registry.schema("StorageBucket").unwrap();
        let body = create_body(
            schema,
            &props(json!({"name": "app-assets", "region": "fsn1", "public_access": null})),
        );
        assert_eq!(body, json!({"name": "app-assets", "region": "fsn1"}));
    }

    #[test]
    fn test_update_body_sends_null_for_removed() {
        let body = update_body(
            ["resource_profile", "description"],
            &props(json!({"resource_profile": "small"})),
        );
        assert_eq!(body, json!({"resource_profile": "small", "description": null}));
    }

    #[test]
    fn test_remote_id_forms() {
        assert_eq!(remote_id(&json!({"id": 12})).as_deref(), Some("12"));
        assert_eq!(remote_id(&json!({"id": "abc"})).as_deref(), Some("abc"));
        assert_eq!(remote_id(&json!({"id": ""})), None);
        assert_eq!(remote_id(&json!({})), None);
    }

    #[test]
    fn test_to_state_extracts_and_coerces_outputs() {
        let registry = Registry::builtin();
        let schema = registry.schema("Cache").unwrap();
        let remote = json!({
            "id": 7,
            "status": "active",
            "endpoint": "session-cache.fsn1.danubedata.ro",
            "port": "6379",
            "internal_field": true,
        });

        let state = to_state(schema, "session-cache", &PropertyMap::new(), &remote, None).unwrap();
        assert_eq!(state.id, "7");
        assert_eq!(state.status, ResourceStatus::Running);
        assert_eq!(state.outputs["port"], json!(6379));
        assert_eq!(state.outputs["status"], json!("active"));
        assert!(!state.outputs.contains_key("internal_field"));
    }

    #[test]
    fn test_to_state_keeps_prior_secret_outputs() {
        let registry = Registry::builtin();
        let schema = registry.schema("StorageAccessKey").unwrap();
        let prior = ResourceState::new("k-1", "StorageAccessKey", "assets-key")
            .with_output("access_key_id", json!("AKIA1"))
            .with_output("secret_access_key", json!("s3cr3t"));

        let refreshed = to_state(
            schema,
            "assets-key",
            &PropertyMap::new(),
            &json!({"id": "k-1", "access_key_id": "AKIA1"}),
            Some(&prior),
        )
        .unwrap();

        assert_eq!(refreshed.outputs["secret_access_key"], json!("s3cr3t"));
        assert_eq!(refreshed.created_at, prior.created_at);
    }

    #[test]
    fn test_to_state_without_id_is_error() {
        let registry = Registry::builtin();
        let schema = registry.schema("SshKey").unwrap();
        let err = to_state(schema, "my-key", &PropertyMap::new(), &json!({}), None).unwrap_err();
        assert!(matches!(err, ProviderError::InvalidResponse(_)));
    }

    #[test]
    fn test_refresh_inputs_detects_drift_but_not_secrets() {
        let registry = Registry::builtin();
        let schema = registry.schema("Vps").unwrap();
        let recorded = props(json!({
            "resource_profile": "nano_shared",
            "password": "hunter2",
        }));
        let remote = json!({"resource_profile": "small_shared", "password": null});

        let inputs = refresh_inputs(schema, &recorded, &remote);
        assert_eq!(inputs["resource_profile"], json!("small_shared"));
        assert_eq!(inputs["password"], json!("hunter2"));
    }

    #[test]
    fn test_refresh_inputs_ignores_undeclared_fields() {
        let registry = Registry::builtin();
        let schema = registry.schema("Cache").unwrap();
        let recorded = props(json!({
            "name": "session-cache-1a2b3c4",
            "cache_provider": "redis",
            "resource_profile": "micro",
            "datacenter": "fsn1",
        }));
        let remote = json!({
            "name": "session-cache-1a2b3c4",
            "cache_provider": "redis",
            "resource_profile": "micro",
            "datacenter": "fsn1",
            "version": "7.2",
        });

        let inputs = refresh_inputs(schema, &recorded, &remote);
        assert_eq!(inputs, recorded);
        assert!(!inputs.contains_key("version"));
    }
}
