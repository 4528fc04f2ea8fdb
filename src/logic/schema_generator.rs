//! Per-operation request/response validation schemas of one collection.

use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::fmt;

use crate::logic::field_resolver::{FieldDefinitionResolver, FieldTypes};
use crate::logic::operators::UpdateOperator;
use crate::logic::path_walker::{is_array_schema, PathMaps, SchemaMap};
use crate::model::{
    classify_json_schema, json_schema_type, CollectionModel, FieldDefinition, FieldType,
    LifecycleState, ID_FIELD, MIA_CONFIGURATION, STATE_FIELD,
};

pub const OBJECT_ID_PATTERN: &str = r"^[a-fA-F\d]{24}$";
pub const DATE_TIME_PATTERN: &str =
    r"^\d{4}-\d{2}-\d{2}(T\d{2}:\d{2}(:\d{2}(\.\d{1,9})?)?(Z|[+-]\d{2}:?\d{2})?)?$";

const SECTION_SEPARATOR: &str = "__MIA__";
const SCALAR_KEYWORDS: [&str; 10] = [
    "enum",
    "minimum",
    "maximum",
    "exclusiveMinimum",
    "exclusiveMaximum",
    "minLength",
    "maxLength",
    "pattern",
    "default",
    "examples",
];

/// The operations a collection exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchemaOperation {
    GetList,
    GetItem,
    Post,
    Validate,
    Delete,
    DeleteList,
    Count,
    Bulk,
    Patch,
    UpsertOne,
    PatchBulk,
    PatchMany,
    ChangeState,
    ChangeStateMany,
    Export,
}

impl SchemaOperation {
    pub const ALL: [SchemaOperation; 15] = [
        SchemaOperation::GetList,
        SchemaOperation::GetItem,
        SchemaOperation::Post,
        SchemaOperation::Validate,
        SchemaOperation::Delete,
        SchemaOperation::DeleteList,
        SchemaOperation::Count,
        SchemaOperation::Bulk,
        SchemaOperation::Patch,
        SchemaOperation::UpsertOne,
        SchemaOperation::PatchBulk,
        SchemaOperation::PatchMany,
        SchemaOperation::ChangeState,
        SchemaOperation::ChangeStateMany,
        SchemaOperation::Export,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaOperation::GetList => "getList",
            SchemaOperation::GetItem => "getItem",
            SchemaOperation::Post => "post",
            SchemaOperation::Validate => "validate",
            SchemaOperation::Delete => "delete",
            SchemaOperation::DeleteList => "deleteList",
            SchemaOperation::Count => "count",
            SchemaOperation::Bulk => "bulk",
            SchemaOperation::Patch => "patch",
            SchemaOperation::UpsertOne => "upsertOne",
            SchemaOperation::PatchBulk => "patchBulk",
            SchemaOperation::PatchMany => "patchMany",
            SchemaOperation::ChangeState => "changeState",
            SchemaOperation::ChangeStateMany => "changeStateMany",
            SchemaOperation::Export => "export",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.as_str() == name)
    }
}

impl fmt::Display for SchemaOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validation schemas read wire input; serialization schemas describe output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireContext {
    Validation,
    Serialization,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeneratorOptions {
    pub max_limit: u64,
    pub limit_constraint_enabled: bool,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            max_limit: 200,
            limit_constraint_enabled: true,
        }
    }
}

/// Generated sections of one operation; responses are keyed by status code.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OperationSchema {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub querystring: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub response: BTreeMap<String, Value>,
}

impl OperationSchema {
    pub fn to_value(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }
}

fn is_nullable(source: &Value) -> bool {
    source.get("nullable").and_then(Value::as_bool).unwrap_or(false)
        || source
            .get("type")
            .and_then(Value::as_array)
            .map(|types| types.iter().any(|t| t == "null"))
            .unwrap_or(false)
}

fn make_nullable(schema: &mut Value) {
    if let Some(Value::String(t)) = schema.get("type").cloned() {
        schema["type"] = json!([t, "null"]);
    }
    if let Some(Value::Array(values)) = schema.get_mut("enum") {
        if !values.contains(&Value::Null) {
            values.push(Value::Null);
        }
    }
}

/// Schema of a JSON-Schema property whose type could not be classified:
/// engine annotations are dropped, the rest is kept as declared.
fn strip_annotations(source: &Value) -> Value {
    match source {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(key, _)| key.as_str() != MIA_CONFIGURATION && key.as_str() != "nullable")
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn child_schema(child: &Value, context: WireContext) -> Value {
    match classify_json_schema(child) {
        Some(field_type) => wire_schema(child, field_type, context, true),
        None => strip_annotations(child),
    }
}

fn raw_object_schema(source: &Value, context: WireContext) -> Value {
    let mut schema = json!({ "type": "object" });
    if let Some(properties) = source.get("properties").and_then(Value::as_object) {
        let converted: Map<String, Value> = properties
            .iter()
            .map(|(name, child)| (name.clone(), child_schema(child, context)))
            .collect();
        schema["properties"] = Value::Object(converted);
    }
    for keyword in ["required", "additionalProperties", "patternProperties"] {
        if let Some(value) = source.get(keyword) {
            schema[keyword] = value.clone();
        }
    }
    if source.get("properties").is_none() && source.get("additionalProperties").is_none() {
        schema["additionalProperties"] = Value::Bool(true);
    }
    schema
}

/// Wire schema of a value of `field_type` declared by `source`.
pub fn wire_schema(source: &Value, field_type: FieldType, context: WireContext, allow_null: bool) -> Value {
    let mut schema = match field_type {
        FieldType::String => json!({ "type": "string" }),
        FieldType::Number => {
            let declared = json_schema_type(source).filter(|t| *t == "integer").unwrap_or("number");
            json!({ "type": declared })
        }
        FieldType::Boolean => json!({ "type": "boolean" }),
        FieldType::Date => match context {
            WireContext::Validation => json!({ "type": "string", "pattern": DATE_TIME_PATTERN }),
            WireContext::Serialization => json!({ "type": "string", "format": "date-time" }),
        },
        FieldType::ObjectId => json!({ "type": "string", "pattern": OBJECT_ID_PATTERN }),
        FieldType::GeoPoint => match context {
            WireContext::Validation => json!({
                "type": "array",
                "items": { "type": "number" },
                "minItems": 2,
                "maxItems": 3,
            }),
            WireContext::Serialization => json!({ "type": "array", "items": { "type": "number" } }),
        },
        FieldType::RawObject => raw_object_schema(source, context),
        FieldType::Array => {
            let items = source
                .get("items")
                .map(|items| child_schema(items, context))
                .unwrap_or_else(|| json!({}));
            json!({ "type": "array", "items": items })
        }
    };

    if matches!(field_type, FieldType::String | FieldType::Number | FieldType::Boolean) {
        for keyword in SCALAR_KEYWORDS {
            if let Some(value) = source.get(keyword) {
                schema[keyword] = value.clone();
            }
        }
    }
    if let Some(description) = source.get("description") {
        schema["description"] = description.clone();
    }
    if allow_null && is_nullable(source) {
        make_nullable(&mut schema);
    }
    schema
}

fn scalar_item_type(field: &FieldDefinition) -> Option<(FieldType, &Value)> {
    let items = field.schema.get("items")?;
    let item_type = classify_json_schema(items)?;
    matches!(
        item_type,
        FieldType::String | FieldType::Number | FieldType::Boolean | FieldType::Date | FieldType::ObjectId
    )
    .then_some((item_type, items))
}

fn is_scalar(field_type: FieldType) -> bool {
    matches!(
        field_type,
        FieldType::String | FieldType::Number | FieldType::Boolean | FieldType::Date | FieldType::ObjectId
    )
}

fn flag_schema() -> Value {
    json!({ "type": "boolean", "enum": [true] })
}

fn object_schema(properties: Map<String, Value>) -> Value {
    json!({
        "type": "object",
        "properties": properties,
        "additionalProperties": false,
    })
}

/// Builds the validation schemas of every operation of one collection. All
/// output is a pure function of the model and the derived path maps.
#[derive(Debug, Clone)]
pub struct JsonSchemaGenerator {
    collection: String,
    fields: Vec<FieldDefinition>,
    nested_types: FieldTypes,
    nested_paths: SchemaMap,
    nested_patterns: SchemaMap,
    operator_paths: SchemaMap,
    operator_patterns: SchemaMap,
    options: GeneratorOptions,
}

impl JsonSchemaGenerator {
    pub fn new(model: &CollectionModel, path_maps: &PathMaps, options: GeneratorOptions) -> Self {
        let nested_types = FieldDefinitionResolver::resolve(model)
            .into_iter()
            .filter(|(path, _)| path.contains('.'))
            .collect();
        let nested_paths = path_maps
            .paths
            .iter()
            .filter(|(path, _)| path.contains('.'))
            .map(|(path, schema)| (path.clone(), schema.clone()))
            .collect();

        Self {
            collection: model.name.clone(),
            fields: model.fields.clone(),
            nested_types,
            nested_paths,
            nested_patterns: path_maps.pattern_properties.clone(),
            operator_paths: path_maps.paths_operators.clone(),
            operator_patterns: path_maps.pattern_properties_operators.clone(),
            options,
        }
    }

    pub fn generate(&self, operation: SchemaOperation) -> OperationSchema {
        match operation {
            SchemaOperation::GetList => self.generate_get_list_json_schema(),
            SchemaOperation::GetItem => self.generate_get_item_json_schema(),
            SchemaOperation::Post => self.generate_post_json_schema(),
            SchemaOperation::Validate => self.generate_validate_json_schema(),
            SchemaOperation::Delete => self.generate_delete_json_schema(),
            SchemaOperation::DeleteList => self.generate_delete_list_json_schema(),
            SchemaOperation::Count => self.generate_count_json_schema(),
            SchemaOperation::Bulk => self.generate_bulk_json_schema(),
            SchemaOperation::Patch => self.generate_patch_json_schema(),
            SchemaOperation::UpsertOne => self.generate_upsert_one_json_schema(),
            SchemaOperation::PatchBulk => self.generate_patch_bulk_json_schema(),
            SchemaOperation::PatchMany => self.generate_patch_many_json_schema(),
            SchemaOperation::ChangeState => self.generate_change_state_json_schema(),
            SchemaOperation::ChangeStateMany => self.generate_change_state_many_json_schema(),
            SchemaOperation::Export => self.generate_export_json_schema(),
        }
    }

    pub fn generate_get_list_json_schema(&self) -> OperationSchema {
        let op = SchemaOperation::GetList;
        OperationSchema {
            querystring: Some(self.section(op, "querystring", self.list_querystring())),
            response: self.responses(op, [("200", self.item_list_schema())]),
            ..OperationSchema::default()
        }
    }

    pub fn generate_get_item_json_schema(&self) -> OperationSchema {
        let op = SchemaOperation::GetItem;
        OperationSchema {
            params: Some(self.section(op, "params", self.id_params())),
            querystring: Some(self.section(op, "querystring", self.read_querystring())),
            response: self.responses(op, [("200", self.item_schema())]),
            ..OperationSchema::default()
        }
    }

    pub fn generate_post_json_schema(&self) -> OperationSchema {
        let op = SchemaOperation::Post;
        OperationSchema {
            body: Some(self.section(op, "body", self.document_body())),
            response: self.responses(op, [("200", self.created_id_schema())]),
            ..OperationSchema::default()
        }
    }

    pub fn generate_validate_json_schema(&self) -> OperationSchema {
        let op = SchemaOperation::Validate;
        let result = json!({
            "type": "object",
            "properties": { "result": { "type": "string", "enum": ["ok"] } },
        });
        OperationSchema {
            body: Some(self.section(op, "body", self.document_body())),
            response: self.responses(op, [("200", result)]),
            ..OperationSchema::default()
        }
    }

    pub fn generate_delete_json_schema(&self) -> OperationSchema {
        let op = SchemaOperation::Delete;
        OperationSchema {
            params: Some(self.section(op, "params", self.id_params())),
            querystring: Some(self.section(op, "querystring", self.filter_querystring())),
            response: self.responses(op, [("204", json!({ "type": "null" }))]),
            ..OperationSchema::default()
        }
    }

    pub fn generate_delete_list_json_schema(&self) -> OperationSchema {
        self.filter_count_operation(SchemaOperation::DeleteList)
    }

    pub fn generate_count_json_schema(&self) -> OperationSchema {
        self.filter_count_operation(SchemaOperation::Count)
    }

    pub fn generate_bulk_json_schema(&self) -> OperationSchema {
        let op = SchemaOperation::Bulk;
        let body = json!({ "type": "array", "items": self.document_body() });
        let response = json!({ "type": "array", "items": self.created_id_schema() });
        OperationSchema {
            body: Some(self.section(op, "body", body)),
            response: self.responses(op, [("200", response)]),
            ..OperationSchema::default()
        }
    }

    pub fn generate_patch_json_schema(&self) -> OperationSchema {
        let op = SchemaOperation::Patch;
        OperationSchema {
            params: Some(self.section(op, "params", self.id_params())),
            querystring: Some(self.section(op, "querystring", self.read_querystring())),
            body: Some(self.section(op, "body", self.update_body(false))),
            response: self.responses(op, [("200", self.item_schema())]),
        }
    }

    pub fn generate_upsert_one_json_schema(&self) -> OperationSchema {
        let op = SchemaOperation::UpsertOne;
        OperationSchema {
            querystring: Some(self.section(op, "querystring", self.read_querystring())),
            body: Some(self.section(op, "body", self.update_body(true))),
            response: self.responses(op, [("200", self.item_schema())]),
            ..OperationSchema::default()
        }
    }

    pub fn generate_patch_bulk_json_schema(&self) -> OperationSchema {
        let op = SchemaOperation::PatchBulk;
        let body = json!({
            "type": "array",
            "minItems": 1,
            "items": {
                "type": "object",
                "properties": {
                    "filter": self.filter_object(true),
                    "update": self.update_body(false),
                },
                "required": ["filter", "update"],
                "additionalProperties": false,
            },
        });
        OperationSchema {
            body: Some(self.section(op, "body", body)),
            response: self.responses(op, [("200", count_schema())]),
            ..OperationSchema::default()
        }
    }

    pub fn generate_patch_many_json_schema(&self) -> OperationSchema {
        let op = SchemaOperation::PatchMany;
        OperationSchema {
            querystring: Some(self.section(op, "querystring", self.filter_querystring())),
            body: Some(self.section(op, "body", self.update_body(false))),
            response: self.responses(op, [("200", count_schema())]),
            ..OperationSchema::default()
        }
    }

    pub fn generate_change_state_json_schema(&self) -> OperationSchema {
        let op = SchemaOperation::ChangeState;
        let body = json!({
            "type": "object",
            "properties": { "stateTo": state_to_schema() },
            "required": ["stateTo"],
            "additionalProperties": false,
        });
        OperationSchema {
            params: Some(self.section(op, "params", self.id_params())),
            body: Some(self.section(op, "body", body)),
            response: self.responses(op, [("204", json!({ "type": "null" }))]),
            ..OperationSchema::default()
        }
    }

    pub fn generate_change_state_many_json_schema(&self) -> OperationSchema {
        let op = SchemaOperation::ChangeStateMany;
        let body = json!({
            "type": "array",
            "minItems": 1,
            "items": {
                "type": "object",
                "properties": {
                    "filter": self.filter_object(false),
                    "stateTo": state_to_schema(),
                },
                "required": ["filter", "stateTo"],
                "additionalProperties": false,
            },
        });
        OperationSchema {
            body: Some(self.section(op, "body", body)),
            response: self.responses(op, [("200", count_schema())]),
            ..OperationSchema::default()
        }
    }

    pub fn generate_export_json_schema(&self) -> OperationSchema {
        let op = SchemaOperation::Export;
        OperationSchema {
            querystring: Some(self.section(op, "querystring", self.list_querystring())),
            response: self.responses(op, [("200", self.item_list_schema())]),
            ..OperationSchema::default()
        }
    }

    /// `_s` pattern: comma separated terms, each an optional `-` followed
    /// by a sortable field and any number of `.sub` suffixes.
    pub fn sort_pattern(&self) -> String {
        let names: Vec<String> = self
            .fields
            .iter()
            .filter(|f| f.field_type != FieldType::GeoPoint)
            .map(|f| regex::escape(&f.name))
            .collect();
        let term = format!(r"-?({})(\.[^\.,]+)*", names.join("|"));
        format!("^({})(,{})*$", term, term)
    }

    fn section_id(&self, operation: SchemaOperation, section: &str) -> String {
        format!(
            "{}{sep}{}{sep}{}",
            self.collection,
            operation,
            section,
            sep = SECTION_SEPARATOR
        )
    }

    fn section(&self, operation: SchemaOperation, section: &str, mut schema: Value) -> Value {
        schema["$id"] = Value::String(self.section_id(operation, section));
        schema
    }

    fn responses<const N: usize>(
        &self,
        operation: SchemaOperation,
        responses: [(&str, Value); N],
    ) -> BTreeMap<String, Value> {
        responses
            .into_iter()
            .map(|(status, schema)| {
                let section = format!("response.{}", status);
                (status.to_string(), self.section(operation, &section, schema))
            })
            .collect()
    }

    fn filter_count_operation(&self, op: SchemaOperation) -> OperationSchema {
        OperationSchema {
            querystring: Some(self.section(op, "querystring", self.filter_querystring())),
            response: self.responses(op, [("200", count_schema())]),
            ..OperationSchema::default()
        }
    }

    fn id_field_schema(&self) -> Value {
        match self.fields.iter().find(|f| f.name == ID_FIELD) {
            Some(field) => wire_schema(&field.schema, field.field_type, WireContext::Validation, false),
            None => json!({ "type": "string", "pattern": OBJECT_ID_PATTERN }),
        }
    }

    fn id_params(&self) -> Value {
        json!({
            "type": "object",
            "properties": { "id": self.id_field_schema() },
            "required": ["id"],
        })
    }

    fn created_id_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": { ID_FIELD: self.id_field_schema() },
        })
    }

    /// Equality filters addressable from the querystring or a filter body.
    fn filter_properties(&self, include_state: bool) -> Map<String, Value> {
        let mut properties = Map::new();
        for field in &self.fields {
            if field.name == STATE_FIELD && !include_state {
                continue;
            }
            if is_scalar(field.field_type) {
                properties.insert(
                    field.name.clone(),
                    wire_schema(&field.schema, field.field_type, WireContext::Validation, false),
                );
            } else if let Some((item_type, items)) =
                scalar_item_type(field).filter(|_| field.field_type == FieldType::Array)
            {
                properties.insert(
                    field.name.clone(),
                    wire_schema(items, item_type, WireContext::Validation, false),
                );
            }
        }
        for (path, field_type) in &self.nested_types {
            if is_scalar(*field_type) {
                properties.insert(
                    path.clone(),
                    wire_schema(&Value::Null, *field_type, WireContext::Validation, false),
                );
            }
        }
        properties
    }

    fn filter_object(&self, include_state: bool) -> Value {
        object_schema(self.filter_properties(include_state))
    }

    fn filter_querystring(&self) -> Value {
        let mut properties = self.filter_properties(false);
        properties.insert(
            "_q".to_string(),
            json!({ "type": "string", "description": "Additional query part to forward to the store" }),
        );
        properties.insert("_st".to_string(), state_list_schema());
        object_schema(properties)
    }

    fn read_querystring(&self) -> Value {
        let mut schema = self.filter_querystring();
        if let Some(properties) = schema.get_mut("properties").and_then(Value::as_object_mut) {
            properties.insert(
                "_p".to_string(),
                json!({
                    "type": "string",
                    "description": "Return only the properties specified in a comma separated list",
                }),
            );
            properties.insert(
                "_rawp".to_string(),
                json!({ "type": "string", "description": "Raw projection forwarded to the store" }),
            );
        }
        schema
    }

    fn list_querystring(&self) -> Value {
        let mut schema = self.read_querystring();
        let limit = if self.options.limit_constraint_enabled {
            json!({ "type": "integer", "minimum": 1, "maximum": self.options.max_limit })
        } else {
            json!({ "type": "integer", "minimum": 1 })
        };
        if let Some(properties) = schema.get_mut("properties").and_then(Value::as_object_mut) {
            properties.insert("_l".to_string(), limit);
            properties.insert("_sk".to_string(), json!({ "type": "integer", "minimum": 0 }));
            properties.insert(
                "_s".to_string(),
                json!({ "type": "string", "pattern": self.sort_pattern() }),
            );
        }
        schema
    }

    fn item_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .fields
            .iter()
            .map(|f| {
                let schema = wire_schema(&f.schema, f.field_type, WireContext::Serialization, true);
                (f.name.clone(), schema)
            })
            .collect();
        json!({ "type": "object", "properties": properties })
    }

    fn item_list_schema(&self) -> Value {
        json!({ "type": "array", "items": self.item_schema() })
    }

    fn user_fields(&self) -> impl Iterator<Item = &FieldDefinition> {
        self.fields.iter().filter(|f| !crate::model::is_reserved_field(&f.name))
    }

    fn document_body(&self) -> Value {
        let mut properties: Map<String, Value> = self
            .user_fields()
            .map(|f| {
                let schema = wire_schema(&f.schema, f.field_type, WireContext::Validation, true);
                (f.name.clone(), schema)
            })
            .collect();
        properties.insert(
            STATE_FIELD.to_string(),
            json!({ "type": "string", "enum": LifecycleState::names() }),
        );
        let required: Vec<&str> = self
            .user_fields()
            .filter(|f| f.required)
            .map(|f| f.name.as_str())
            .collect();
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
            "additionalProperties": false,
        })
    }

    fn set_schema(&self) -> Value {
        let mut properties: Map<String, Value> = self
            .user_fields()
            .map(|f| {
                let schema = wire_schema(&f.schema, f.field_type, WireContext::Validation, true);
                (f.name.clone(), schema)
            })
            .collect();
        for (path, schema) in self.nested_paths.iter().chain(self.operator_paths.iter()) {
            properties.insert(path.clone(), self.path_map_schema(path, schema));
        }

        let mut patterns = Map::new();
        for (pattern, schema) in self.nested_patterns.iter().chain(self.operator_patterns.iter()) {
            patterns.insert(pattern.clone(), self.path_map_schema(pattern, schema));
        }

        json!({
            "type": "object",
            "properties": properties,
            "patternProperties": patterns,
            "additionalProperties": false,
        })
    }

    fn path_map_schema(&self, key: &str, schema: &Value) -> Value {
        if schema == &Value::Bool(true) {
            return Value::Bool(true);
        }
        // Merge patches only part of an element, so none of its fields are required.
        if key.ends_with(".$.merge") || key.ends_with(r"\.\$\.merge$") {
            let mut merged = child_schema(schema, WireContext::Validation);
            if let Some(map) = merged.as_object_mut() {
                map.remove("required");
            }
            return merged;
        }
        if is_array_schema(schema) {
            return wire_schema(schema, FieldType::Array, WireContext::Validation, true);
        }
        child_schema(schema, WireContext::Validation)
    }

    fn operator_block(&self, operator: UpdateOperator) -> Value {
        let properties: Map<String, Value> = self
            .user_fields()
            .filter(|f| operator.accepts(f.field_type))
            .filter_map(|f| {
                let schema = match operator {
                    UpdateOperator::Unset if f.required => return None,
                    UpdateOperator::CurrentDate if f.required => return None,
                    UpdateOperator::Unset | UpdateOperator::CurrentDate => flag_schema(),
                    UpdateOperator::Inc | UpdateOperator::Mul => json!({ "type": "number" }),
                    UpdateOperator::Push | UpdateOperator::Pull | UpdateOperator::AddToSet => f
                        .schema
                        .get("items")
                        .map(|items| child_schema(items, WireContext::Validation))
                        .unwrap_or_else(|| json!({})),
                    UpdateOperator::Set | UpdateOperator::SetOnInsert => {
                        wire_schema(&f.schema, f.field_type, WireContext::Validation, true)
                    }
                };
                Some((f.name.clone(), schema))
            })
            .collect();
        object_schema(properties)
    }

    fn update_body(&self, upsert: bool) -> Value {
        let mut blocks = Map::new();
        for operator in UpdateOperator::ALL {
            let block = match operator {
                UpdateOperator::Set => self.set_schema(),
                UpdateOperator::SetOnInsert if !upsert => continue,
                other => self.operator_block(other),
            };
            blocks.insert(operator.as_str().to_string(), block);
        }
        json!({
            "type": "object",
            "properties": blocks,
            "additionalProperties": false,
        })
    }
}

fn count_schema() -> Value {
    json!({ "type": "integer", "minimum": 0 })
}

fn state_to_schema() -> Value {
    json!({ "type": "string", "enum": LifecycleState::names() })
}

fn state_list_schema() -> Value {
    let states = LifecycleState::names().join("|");
    json!({
        "type": "string",
        "pattern": format!("^({states})(,({states}))*$", states = states),
        "default": LifecycleState::Public.as_str(),
        "description": "Filter by __STATE__, multiple states can be specified in OR by providing a comma separated list",
    })
}
