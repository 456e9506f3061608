//! Typed resource schemas
//!
//! A schema tells the reconciler which properties a resource accepts, which
//! of them have defaults, which force a replacement when changed, and which
//! outputs the remote API computes.

use serde::Serialize;
use serde_json::Value;

/// Package name used in resource tokens
pub const PACKAGE: &str = "danubedata";
/// Module used in resource tokens
pub const MODULE: &str = "index";

/// Value type of a property
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "values", rename_all = "snake_case")]
pub enum FieldKind {
    String,
    Integer,
    Bool,
    /// String restricted to a fixed set of values
    Enum(Vec<String>),
    /// JSON array
    List,
    /// JSON object
    Object,
}

impl FieldKind {
    /// Check a value against the kind; returns a human-readable reason on mismatch
    pub fn check(&self, value: &Value) -> std::result::Result<(), String> {
        let ok = match self {
            FieldKind::String => value.is_string(),
            // `8080.0` is the integer 8080, as in the diff engine
            FieldKind::Integer => {
                value.is_i64()
                    || value.is_u64()
                    || value.as_f64().is_some_and(|f| f.is_finite() && f.fract() == 0.0)
            }
            FieldKind::Bool => value.is_boolean(),
            FieldKind::List => value.is_array(),
            FieldKind::Object => value.is_object(),
            FieldKind::Enum(allowed) => {
                return match value.as_str() {
                    Some(s) if allowed.iter().any(|a| a == s) => Ok(()),
                    Some(s) => Err(format!(
                        "'{}' is not one of: {}",
                        s,
                        allowed.join(", ")
                    )),
                    None => Err("expected a string".to_string()),
                };
            }
        };
        if ok {
            Ok(())
        } else {
            Err(format!("expected {}, got {}", self.label(), json_type(value)))
        }
    }

    fn label(&self) -> &'static str {
        match self {
            FieldKind::String | FieldKind::Enum(_) => "a string",
            FieldKind::Integer => "an integer",
            FieldKind::Bool => "a boolean",
            FieldKind::List => "a list",
            FieldKind::Object => "an object",
        }
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

/// Schema of one input property
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldSchema {
    pub name: String,
    pub kind: FieldKind,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    /// A change to this field forces delete + create
    pub replace_trigger: bool,
    pub secret: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
}

impl FieldSchema {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: false,
            default: None,
            replace_trigger: false,
            secret: false,
            description: String::new(),
        }
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::String)
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Integer)
    }

    pub fn bool(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Bool)
    }

    pub fn list(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::List)
    }

    pub fn one_of(name: impl Into<String>, values: &[&str]) -> Self {
        Self::new(
            name,
            FieldKind::Enum(values.iter().map(|v| v.to_string()).collect()),
        )
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn default_value(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn replace_on_change(mut self) -> Self {
        self.replace_trigger = true;
        self
    }

    pub fn secret(mut self) -> Self {
        self.secret = true;
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Schema of one computed output
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputSchema {
    pub name: String,
    pub kind: FieldKind,
    pub secret: bool,
}

impl OutputSchema {
    pub fn string(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::String,
            secret: false,
        }
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Integer,
            secret: false,
        }
    }

    pub fn secret(mut self) -> Self {
        self.secret = true;
        self
    }
}

/// Schema of a resource type
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceSchema {
    /// Type name used by the host (e.g., "Vps")
    pub type_name: String,

    /// Remote API collection path (e.g., "/vps")
    pub collection: String,

    /// Whether create/update waits for the remote status to become ready
    pub await_ready: bool,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,

    pub fields: Vec<FieldSchema>,

    pub outputs: Vec<OutputSchema>,
}

impl ResourceSchema {
    pub fn new(type_name: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            collection: collection.into(),
            await_ready: false,
            description: String::new(),
            fields: Vec::new(),
            outputs: Vec::new(),
        }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn await_ready(mut self) -> Self {
        self.await_ready = true;
        self
    }

    pub fn field(mut self, field: FieldSchema) -> Self {
        self.fields.push(field);
        self
    }

    pub fn output(mut self, output: OutputSchema) -> Self {
        self.outputs.push(output);
        self
    }

    /// Fully qualified token, e.g. `danubedata:index:Vps`
    pub fn token(&self) -> String {
        format!("{}:{}:{}", PACKAGE, MODULE, self.type_name)
    }

    pub fn get_field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// `id` is an output of every resource
    pub fn has_output(&self, name: &str) -> bool {
        name == "id" || self.outputs.iter().any(|o| o.name == name)
    }

    pub fn required_fields(&self) -> impl Iterator<Item = &FieldSchema> {
        self.fields.iter().filter(|f| f.required)
    }

    /// Optional fields paired with their default, if any
    pub fn optional_fields(&self) -> impl Iterator<Item = (&FieldSchema, Option<&Value>)> {
        self.fields
            .iter()
            .filter(|f| !f.required)
            .map(|f| (f, f.default.as_ref()))
    }

    pub fn replace_triggers(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .filter(|f| f.replace_trigger)
            .map(|f| f.name.as_str())
    }

    pub fn is_secret(&self, name: &str) -> bool {
        self.get_field(name).is_some_and(|f| f.secret)
            || self.outputs.iter().any(|o| o.name == name && o.secret)
    }
}

/// Schema of a read-only lookup function (data source)
///
/// A function lists one API collection and narrows the result with
/// exact-match filters on item fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataSourceSchema {
    /// Function name used by the host (e.g., "getVpss")
    pub function: String,

    /// Remote API path that lists the items (e.g., "/vps")
    pub path: String,

    /// Key of the item list in the function result
    pub result: String,

    /// Item fields accepted as filter arguments
    pub filters: Vec<String>,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
}

impl DataSourceSchema {
    pub fn new(
        function: impl Into<String>,
        path: impl Into<String>,
        result: impl Into<String>,
    ) -> Self {
        Self {
            function: function.into(),
            path: path.into(),
            result: result.into(),
            filters: Vec::new(),
            description: String::new(),
        }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn filter_by(mut self, fields: &[&str]) -> Self {
        self.filters.extend(fields.iter().map(|f| f.to_string()));
        self
    }

    /// Fully qualified token, e.g. `danubedata:index:getVpss`
    pub fn token(&self) -> String {
        format!("{}:{}:{}", PACKAGE, MODULE, self.function)
    }

    pub fn accepts_filter(&self, field: &str) -> bool {
        self.filters.iter().any(|f| f == field)
    }
}
