//! Resource registry
//!
//! Maps resource type names to their schemas and validates declared
//! properties against them. Also holds the read-only lookup functions
//! (data sources) the host can invoke.

use crate::error::{ProviderError, Result};
use crate::provider::{PropertyMap, ResourceSpec};
use crate::schema::{DataSourceSchema, FieldSchema, MODULE, OutputSchema, PACKAGE, ResourceSchema};
use serde_json::{Value, json};
use std::collections::BTreeMap;

const DEFAULT_DATACENTER: &str = "fsn1";

/// Registry of resource schemas
#[derive(Debug, Clone, Default)]
pub struct Registry {
    schemas: BTreeMap<String, ResourceSchema>,
    functions: BTreeMap<String, DataSourceSchema>,
}

impl Registry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every DanubeData resource type and function
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for schema in builtin_schemas() {
            registry.register(schema);
        }
        for function in builtin_functions() {
            registry.register_function(function);
        }
        registry
    }

    pub fn register(&mut self, schema: ResourceSchema) {
        self.schemas.insert(schema.type_name.clone(), schema);
    }

    pub fn register_function(&mut self, function: DataSourceSchema) {
        self.functions.insert(function.function.clone(), function);
    }

    /// Look up a function by name (`getVpss`) or token (`danubedata:index:getVpss`)
    pub fn function(&self, name: &str) -> Result<&DataSourceSchema> {
        let prefix = format!("{}:{}:", PACKAGE, MODULE);
        let short = name.strip_prefix(prefix.as_str()).unwrap_or(name);
        self.functions
            .get(short)
            .ok_or_else(|| ProviderError::UnknownFunction(name.to_string()))
    }

    pub fn functions(&self) -> impl Iterator<Item = &DataSourceSchema> {
        self.functions.values()
    }

    /// Look up the schema of a resource type
    pub fn schema(&self, resource_type: &str) -> Result<&ResourceSchema> {
        self.schemas
            .get(resource_type)
            .ok_or_else(|| ProviderError::UnknownResourceType(resource_type.to_string()))
    }

    pub fn types(&self) -> impl Iterator<Item = &str> {
        self.schemas.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResourceSchema> {
        self.schemas.values()
    }

    /// Validate a spec against its schema
    ///
    /// `null` values are treated as absent.
    pub fn validate(&self, spec: &ResourceSpec) -> Result<()> {
        let schema = self.schema(&spec.resource_type)?;

        for key in spec.properties.keys() {
            if schema.get_field(key).is_none() {
                return Err(ProviderError::validation(
                    &spec.name,
                    key,
                    format!("unknown property for {}", schema.type_name),
                ));
            }
        }

        for dep in &spec.dependencies {
            let resolved = spec
                .properties
                .get(&dep.property)
                .is_some_and(|v| !v.is_null());
            if !resolved {
                return Err(ProviderError::UnresolvedReference {
                    resource: spec.name.clone(),
                    property: dep.property.clone(),
                    target: dep.resource.clone(),
                    output: dep.output.clone(),
                });
            }
        }

        for field in &schema.fields {
            match spec.properties.get(&field.name).filter(|v| !v.is_null()) {
                None if field.required => {
                    return Err(ProviderError::validation(
                        &spec.name,
                        &field.name,
                        "is required",
                    ));
                }
                None => {}
                Some(value) => field
                    .kind
                    .check(value)
                    .map_err(|reason| ProviderError::validation(&spec.name, &field.name, reason))?,
            }
        }

        Ok(())
    }

    /// Return `properties` with schema defaults filled in and nulls dropped
    pub fn apply_defaults(&self, resource_type: &str, properties: &PropertyMap) -> Result<PropertyMap> {
        let schema = self.schema(resource_type)?;
        let mut normalized: PropertyMap = properties
            .iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        for (field, default) in schema.optional_fields() {
            if let Some(default) = default {
                normalized
                    .entry(field.name.clone())
                    .or_insert_with(|| default.clone());
            }
        }

        Ok(normalized)
    }

    /// Package schema document handed to the host (`getSchema`)
    pub fn package_schema(&self, version: &str) -> Value {
        let resources: serde_json::Map<String, Value> = self
            .schemas
            .values()
            .map(|schema| (schema.token(), resource_document(schema)))
            .collect();
        let functions: serde_json::Map<String, Value> = self
            .functions
            .values()
            .map(|function| (function.token(), function_document(function)))
            .collect();

        json!({
            "name": PACKAGE,
            "displayName": "DanubeData",
            "version": version,
            "description": "A provider for managing DanubeData cloud infrastructure resources.",
            "homepage": "https://danubedata.ro",
            "license": "Apache-2.0",
            "keywords": ["danubedata", "category/cloud", "kind/native"],
            "config": {
                "variables": {
                    "api_token": { "type": "string", "secret": true },
                    "base_url": { "type": "string", "default": "https://danubedata.ro/api/v1" },
                }
            },
            "resources": resources,
            "functions": functions,
        })
    }
}

fn function_document(function: &DataSourceSchema) -> Value {
    let inputs: serde_json::Map<String, Value> = function
        .filters
        .iter()
        .map(|f| (f.clone(), json!({ "kind": { "type": "string" } })))
        .collect();

    let mut outputs = serde_json::Map::new();
    outputs.insert(function.result.clone(), json!({ "kind": { "type": "list" } }));

    json!({
        "description": function.description,
        "inputs": inputs,
        "outputs": outputs,
    })
}

fn resource_document(schema: &ResourceSchema) -> Value {
    let inputs: serde_json::Map<String, Value> = schema
        .fields
        .iter()
        .map(|f| {
            let mut doc = json!({
                "kind": f.kind,
                "secret": f.secret,
                "replaceOnChanges": f.replace_trigger,
            });
            if let Some(default) = &f.default {
                doc["default"] = default.clone();
            }
            if !f.description.is_empty() {
                doc["description"] = json!(f.description);
            }
            (f.name.clone(), doc)
        })
        .collect();

    let outputs: serde_json::Map<String, Value> = schema
        .outputs
        .iter()
        .map(|o| (o.name.clone(), json!({ "kind": o.kind, "secret": o.secret })))
        .collect();

    let required: Vec<&str> = schema.required_fields().map(|f| f.name.as_str()).collect();

    json!({
        "description": schema.description,
        "inputProperties": inputs,
        "requiredInputs": required,
        "properties": outputs,
    })
}

fn datacenter() -> FieldSchema {
    FieldSchema::string("datacenter")
        .default_value(json!(DEFAULT_DATACENTER))
        .replace_on_change()
        .describe("Datacenter location")
}

fn name_field() -> FieldSchema {
    FieldSchema::string("name").required().replace_on_change()
}

fn builtin_schemas() -> Vec<ResourceSchema> {
    vec![
        // Security
        ResourceSchema::new("SshKey", "/ssh-keys")
            .describe("SSH public key used to authenticate to VPS instances")
            .field(name_field())
            .field(
                FieldSchema::string("public_key")
                    .required()
                    .replace_on_change(),
            )
            .output(OutputSchema::string("fingerprint")),
        ResourceSchema::new("Firewall", "/firewalls")
            .describe("Network firewall attached to VPS instances")
            .field(FieldSchema::string("name").required())
            .field(FieldSchema::string("description"))
            .field(FieldSchema::one_of("default_action", &["accept", "drop"]).default_value(json!("drop")))
            .field(FieldSchema::list("rules"))
            .output(OutputSchema::string("status")),
        // Compute
        ResourceSchema::new("Vps", "/vps")
            .describe("Virtual private server")
            .await_ready()
            .field(name_field())
            .field(FieldSchema::string("image").required().replace_on_change())
            .field(
                FieldSchema::string("datacenter")
                    .required()
                    .replace_on_change(),
            )
            .field(
                FieldSchema::string("resource_profile")
                    .required()
                    .describe("Size profile, e.g. nano_shared"),
            )
            .field(
                FieldSchema::one_of("auth_method", &["ssh_key", "password"])
                    .default_value(json!("ssh_key"))
                    .replace_on_change(),
            )
            .field(FieldSchema::string("ssh_key_id").replace_on_change())
            .field(FieldSchema::string("password").secret().replace_on_change())
            .output(OutputSchema::string("public_ip"))
            .output(OutputSchema::string("private_ip"))
            .output(OutputSchema::string("ipv6_address"))
            .output(OutputSchema::string("status")),
        ResourceSchema::new("VpsSnapshot", "/vps-snapshots")
            .describe("Point-in-time snapshot of a VPS")
            .await_ready()
            .field(name_field())
            .field(
                FieldSchema::string("vps_instance_id")
                    .required()
                    .replace_on_change(),
            )
            .field(FieldSchema::string("description").replace_on_change())
            .output(OutputSchema::integer("size_gb"))
            .output(OutputSchema::string("status")),
        ResourceSchema::new("Serverless", "/serverless")
            .describe("Serverless container")
            .await_ready()
            .field(name_field())
            .field(FieldSchema::string("image").required())
            .field(FieldSchema::string("resource_profile").required())
            .field(FieldSchema::integer("port").default_value(json!(8080)))
            .output(OutputSchema::string("url"))
            .output(OutputSchema::string("status")),
        // Data services
        ResourceSchema::new("Cache", "/cache")
            .describe("Managed in-memory cache")
            .await_ready()
            .field(name_field())
            .field(
                FieldSchema::one_of("cache_provider", &["redis", "valkey", "dragonfly"])
                    .required()
                    .replace_on_change(),
            )
            .field(FieldSchema::string("resource_profile").required())
            .field(datacenter())
            .field(FieldSchema::string("version").replace_on_change())
            .output(OutputSchema::string("endpoint"))
            .output(OutputSchema::integer("port"))
            .output(OutputSchema::string("status")),
        ResourceSchema::new("Database", "/databases")
            .describe("Managed relational database")
            .await_ready()
            .field(name_field())
            .field(
                FieldSchema::one_of("engine", &["mysql", "postgresql", "mariadb"])
                    .required()
                    .replace_on_change(),
            )
            .field(FieldSchema::string("resource_profile").required())
            .field(FieldSchema::string("database_name").replace_on_change())
            .field(datacenter())
            .field(FieldSchema::string("version").replace_on_change())
            .output(OutputSchema::string("endpoint"))
            .output(OutputSchema::integer("port"))
            .output(OutputSchema::string("username"))
            .output(OutputSchema::string("status")),
        // Storage
        ResourceSchema::new("StorageBucket", "/storage/buckets")
            .describe("S3-compatible object storage bucket")
            .field(name_field())
            .field(
                FieldSchema::string("region")
                    .default_value(json!(DEFAULT_DATACENTER))
                    .replace_on_change(),
            )
            .field(FieldSchema::bool("versioning_enabled").default_value(json!(false)))
            .field(FieldSchema::bool("public_access").default_value(json!(false)))
            .output(OutputSchema::string("endpoint_url"))
            .output(OutputSchema::string("minio_bucket_name"))
            .output(OutputSchema::string("status")),
        ResourceSchema::new("StorageAccessKey", "/storage/access-keys")
            .describe("Access key pair for object storage")
            .field(name_field())
            .field(FieldSchema::string("expires_at").replace_on_change())
            .output(OutputSchema::string("access_key_id"))
            .output(OutputSchema::string("secret_access_key").secret()),
    ]
}

fn builtin_functions() -> Vec<DataSourceSchema> {
    vec![
        // Catalogs
        DataSourceSchema::new("getVpsImages", "/vps/images", "images")
            .describe("Operating system images available for VPS instances")
            .filter_by(&["name", "distribution"]),
        DataSourceSchema::new("getCacheProviders", "/cache/providers", "providers")
            .describe("Cache engines and their versions")
            .filter_by(&["name"]),
        DataSourceSchema::new("getDatabaseProviders", "/databases/providers", "providers")
            .describe("Database engines and their versions")
            .filter_by(&["name"]),
        // Existing resources
        DataSourceSchema::new("getSshKeys", "/ssh-keys", "keys")
            .describe("SSH keys of the account")
            .filter_by(&["name", "fingerprint"]),
        DataSourceSchema::new("getVpss", "/vps", "instances")
            .describe("VPS instances of the account")
            .filter_by(&["name", "status", "datacenter"]),
        DataSourceSchema::new("getDatabases", "/databases", "instances")
            .describe("Managed databases of the account")
            .filter_by(&["name", "engine", "status", "datacenter"]),
        DataSourceSchema::new("getCaches", "/cache", "instances")
            .describe("Managed caches of the account")
            .filter_by(&["name", "cache_provider", "status", "datacenter"]),
        DataSourceSchema::new("getFirewalls", "/firewalls", "firewalls")
            .describe("Firewalls of the account")
            .filter_by(&["name", "status"]),
        DataSourceSchema::new("getServerlessContainers", "/serverless", "containers")
            .describe("Serverless containers of the account")
            .filter_by(&["name", "status"]),
        DataSourceSchema::new("getStorageBuckets", "/storage/buckets", "buckets")
            .describe("Object storage buckets of the account")
            .filter_by(&["name", "region"]),
        DataSourceSchema::new("getStorageAccessKeys", "/storage/access-keys", "keys")
            .describe("Object storage access keys of the account")
            .filter_by(&["name"]),
        DataSourceSchema::new("getVpsSnapshots", "/vps-snapshots", "snapshots")
            .describe("VPS snapshots of the account")
            .filter_by(&["name", "vps_instance_id", "status"]),
    ]
}
