use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::{CrudError, Result};
use crate::logic::PathSchemaWalker;
use crate::model::{is_reserved_field, FieldType, LifecycleState, RESERVED_FIELDS};

/// Key holding the engine-specific annotations inside a JSON-Schema property.
pub const MIA_CONFIGURATION: &str = "__mia_configuration";

const DATE_FORMATS: [&str; 2] = ["date-time", "date"];

/// Collection definition as written in the configuration files. Exactly one
/// of `fields` (legacy shape) and `schema` (JSON-Schema shape) is present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionDefinition {
    pub name: String,
    pub endpoint_base_path: String,
    #[serde(default)]
    pub default_state: LifecycleState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<LegacyField>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Value>,
    #[serde(default)]
    pub indexes: Vec<IndexDefinition>,
    /// `view` for virtual collections backed by an aggregation pipeline
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipeline: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyField {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Nested object schema of a `RawObject` field
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<LegacyItems>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encryption: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyItems {
    #[serde(rename = "type")]
    pub item_type: FieldType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexKind {
    Normal,
    Geo,
    Hash,
    Ttl,
    Text,
    Wildcard,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexField {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: IndexKind,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub fields: Vec<IndexField>,
    /// Single indexed field of `geo`, `hash` and `ttl` indexes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(rename = "expireAfterSeconds", default, skip_serializing_if = "Option::is_none")]
    pub expire_after_seconds: Option<u64>,
}

impl IndexDefinition {
    pub fn field_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.fields.iter().map(|f| f.name.as_str()).collect();
        if let Some(field) = &self.field {
            names.push(field.as_str());
        }
        names
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionKind {
    Collection,
    View,
}

/// One field of the canonical field tree.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDefinition {
    pub name: String,
    pub field_type: FieldType,
    pub required: bool,
    pub nullable: bool,
    pub description: Option<String>,
    pub encryption: Option<Value>,
    /// JSON-Schema rendition of the field, nested structure included
    pub schema: Value,
}

/// Canonical collection model. Built once by one of the two adapters; the
/// rest of the engine never looks at the configuration shape again.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionModel {
    pub name: String,
    pub endpoint_base_path: String,
    pub default_state: LifecycleState,
    pub kind: CollectionKind,
    pub source: Option<String>,
    pub pipeline: Option<Value>,
    pub fields: Vec<FieldDefinition>,
    pub indexes: Vec<IndexDefinition>,
}

impl CollectionModel {
    pub fn from_definition(definition: CollectionDefinition) -> Result<Self> {
        let fields = match (&definition.fields, &definition.schema) {
            (Some(fields), None) => from_legacy_fields(fields)?,
            (None, Some(schema)) => from_json_schema(schema)?,
            (Some(_), Some(_)) => {
                return Err(CrudError::InvalidDefinition(format!(
                    "{}: fields and schema are mutually exclusive",
                    definition.name
                )))
            }
            (None, None) => {
                return Err(CrudError::InvalidDefinition(format!(
                    "{}: one of fields or schema is required",
                    definition.name
                )))
            }
        };

        for reserved in RESERVED_FIELDS {
            if !fields.iter().any(|f| f.name == reserved) {
                return Err(CrudError::MissingReservedField {
                    collection: definition.name.clone(),
                    field: reserved.to_string(),
                });
            }
        }

        let kind = match definition.kind.as_deref() {
            Some("view") => CollectionKind::View,
            _ => CollectionKind::Collection,
        };

        Ok(Self {
            name: definition.name,
            endpoint_base_path: definition.endpoint_base_path,
            default_state: definition.default_state,
            kind,
            source: definition.source,
            pipeline: definition.pipeline,
            fields,
            indexes: definition.indexes,
        })
    }

    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn is_view(&self) -> bool {
        self.kind == CollectionKind::View
    }

    /// Non-reserved fields, in declaration order.
    pub fn user_fields(&self) -> impl Iterator<Item = &FieldDefinition> {
        self.fields.iter().filter(|f| !is_reserved_field(&f.name))
    }

    /// The whole collection as one JSON-Schema object.
    pub fn json_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .fields
            .iter()
            .map(|f| (f.name.clone(), f.schema.clone()))
            .collect();
        let required: Vec<Value> = self
            .fields
            .iter()
            .filter(|f| f.required)
            .map(|f| Value::String(f.name.clone()))
            .collect();
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}

/// Adapter for the legacy `fields` list.
pub fn from_legacy_fields(fields: &[LegacyField]) -> Result<Vec<FieldDefinition>> {
    fields
        .iter()
        .map(|field| {
            let mut schema = legacy_type_schema(field.field_type, field.schema.as_ref(), field.items.as_ref())
                .map_err(|reason| CrudError::InvalidDefinition(format!("{}: {}", field.name, reason)))?;
            if let Some(description) = &field.description {
                schema["description"] = Value::String(description.clone());
            }
            if field.nullable {
                schema["nullable"] = Value::Bool(true);
            }
            Ok(FieldDefinition {
                name: field.name.clone(),
                field_type: field.field_type,
                required: field.required || is_reserved_field(&field.name),
                nullable: field.nullable,
                description: field.description.clone(),
                encryption: field.encryption.clone(),
                schema,
            })
        })
        .collect()
}

fn legacy_type_schema(
    field_type: FieldType,
    nested: Option<&Value>,
    items: Option<&LegacyItems>,
) -> std::result::Result<Value, String> {
    let schema = match field_type {
        FieldType::String => json!({ "type": "string" }),
        FieldType::Number => json!({ "type": "number" }),
        FieldType::Boolean => json!({ "type": "boolean" }),
        FieldType::Date => json!({ "type": "string", "format": "date-time" }),
        FieldType::ObjectId => json!({
            "type": "string",
            MIA_CONFIGURATION: { "type": "ObjectId" },
        }),
        FieldType::GeoPoint => json!({
            "type": "array",
            "items": { "type": "number" },
            MIA_CONFIGURATION: { "type": "GeoPoint" },
        }),
        FieldType::RawObject => {
            let mut schema = match nested {
                Some(Value::Object(map)) => Value::Object(map.clone()),
                Some(_) => return Err("RawObject schema must be an object".to_string()),
                None => json!({ "additionalProperties": true }),
            };
            schema["type"] = json!("object");
            schema
        }
        FieldType::Array => {
            let items = items.ok_or_else(|| "Array fields require items".to_string())?;
            if items.item_type == FieldType::Array {
                return Err("nested arrays are not supported in fields definitions".to_string());
            }
            let item_schema = legacy_type_schema(items.item_type, items.schema.as_ref(), None)?;
            json!({ "type": "array", "items": item_schema })
        }
    };
    Ok(schema)
}

/// Adapter for the JSON-Schema `schema` shape.
pub fn from_json_schema(schema: &Value) -> Result<Vec<FieldDefinition>> {
    PathSchemaWalker::ensure_supported(schema)?;
    let properties = schema
        .get("properties")
        .and_then(Value::as_object)
        .ok_or_else(|| CrudError::InvalidDefinition("schema.properties must be an object".to_string()))?;
    let required: Vec<&str> = schema
        .get("required")
        .and_then(Value::as_array)
        .map(|r| r.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    properties
        .iter()
        .map(|(name, property)| {
            let field_type = classify_json_schema(property).ok_or_else(|| {
                CrudError::InvalidDefinition(format!("{}: cannot resolve field type", name))
            })?;
            Ok(FieldDefinition {
                name: name.clone(),
                field_type,
                required: required.contains(&name.as_str()) || is_reserved_field(name),
                nullable: property.get("nullable").and_then(Value::as_bool).unwrap_or(false),
                description: property
                    .get("description")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                encryption: property
                    .get(MIA_CONFIGURATION)
                    .and_then(|c| c.get("encryption"))
                    .cloned(),
                schema: property.clone(),
            })
        })
        .collect()
}

/// Semantic type of a JSON-Schema property, `None` when it declares no
/// usable `type`.
pub fn classify_json_schema(property: &Value) -> Option<FieldType> {
    if let Some(declared) = property
        .get(MIA_CONFIGURATION)
        .and_then(|c| c.get("type"))
        .and_then(Value::as_str)
        .and_then(FieldType::parse)
    {
        return Some(declared);
    }

    match json_schema_type(property)? {
        "string" => {
            let is_date = property
                .get("format")
                .and_then(Value::as_str)
                .map(|f| DATE_FORMATS.contains(&f))
                .unwrap_or(false);
            Some(if is_date { FieldType::Date } else { FieldType::String })
        }
        "number" | "integer" => Some(FieldType::Number),
        "boolean" => Some(FieldType::Boolean),
        "object" => Some(FieldType::RawObject),
        "array" => Some(FieldType::Array),
        _ => None,
    }
}

/// The declared `type`; for a type list the first non-null entry.
pub fn json_schema_type(schema: &Value) -> Option<&str> {
    match schema.get("type")? {
        Value::String(t) => Some(t.as_str()),
        Value::Array(types) => types
            .iter()
            .filter_map(Value::as_str)
            .find(|t| *t != "null"),
        _ => None,
    }
}
