use regex::Regex;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

use crate::error::{CrudError, Result};
use crate::model::{classify_json_schema, json_schema_type, CollectionModel, FieldType, IndexKind};

/// Flattened `path → semantic type` view of a collection.
pub type FieldTypes = BTreeMap<String, FieldType>;

/// Drops purely numeric segments (array indices) from a dotted path:
/// `orders.1.productId` → `orders.productId`, while `up2you` is kept.
pub fn normalize_path(path: &str) -> String {
    path.split('.')
        .filter(|segment| segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()))
        .collect::<Vec<_>>()
        .join(".")
}

/// Derives lookup tables from a collection model.
pub struct FieldDefinitionResolver;

impl FieldDefinitionResolver {
    /// Every declared field, plus the declared nested properties of raw
    /// objects and of object array items (array indices omitted).
    pub fn resolve(model: &CollectionModel) -> FieldTypes {
        let mut types = FieldTypes::new();
        for field in &model.fields {
            types.insert(field.name.clone(), field.field_type);
            if field.field_type.is_schemaless_container() {
                Self::flatten_nested(&field.name, &field.schema, &mut types, &mut BTreeSet::new());
            }
        }
        types
    }

    /// Paths declared `nullable`, nested ones included.
    pub fn resolve_nullable(model: &CollectionModel) -> BTreeSet<String> {
        let mut nullable: BTreeSet<String> = model
            .fields
            .iter()
            .filter(|f| f.nullable)
            .map(|f| f.name.clone())
            .collect();
        for field in &model.fields {
            if field.field_type.is_schemaless_container() {
                Self::flatten_nested(&field.name, &field.schema, &mut FieldTypes::new(), &mut nullable);
            }
        }
        nullable
    }

    /// One regex per raw object or array path; a normalized path matching
    /// one of them lives inside a schemaless container.
    pub fn resolve_raw_object_prefixes(model: &CollectionModel) -> Result<Vec<Regex>> {
        Self::resolve(model)
            .into_iter()
            .filter(|(_, field_type)| field_type.is_schemaless_container())
            .map(|(path, _)| {
                let pattern = format!(r"^{}\.", regex::escape(&path));
                Regex::new(&pattern)
                    .map_err(|err| CrudError::InvalidDefinition(format!("{}: {}", pattern, err)))
            })
            .collect()
    }

    pub fn resolve_text_indexed_fields(model: &CollectionModel) -> BTreeSet<String> {
        model
            .indexes
            .iter()
            .filter(|index| index.kind == IndexKind::Text)
            .flat_map(|index| index.field_names())
            .map(str::to_string)
            .collect()
    }

    /// Leading fields of normal and hash indexes: the fields a query clause
    /// can be served by on its own.
    pub fn resolve_normal_indexed_fields(model: &CollectionModel) -> BTreeSet<String> {
        model
            .indexes
            .iter()
            .filter(|index| matches!(index.kind, IndexKind::Normal | IndexKind::Hash))
            .filter_map(|index| index.field_names().first().map(|name| name.to_string()))
            .collect()
    }

    fn flatten_nested(
        prefix: &str,
        schema: &Value,
        types: &mut FieldTypes,
        nullable: &mut BTreeSet<String>,
    ) {
        match json_schema_type(schema) {
            Some("array") => {
                if let Some(items) = schema.get("items") {
                    Self::flatten_nested(prefix, items, types, nullable);
                }
            }
            Some("object") | None => {
                let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
                    return;
                };
                for (name, child) in properties {
                    let path = format!("{}.{}", prefix, name);
                    if child.get("nullable").and_then(Value::as_bool).unwrap_or(false) {
                        nullable.insert(path.clone());
                    }
                    if let Some(field_type) = classify_json_schema(child) {
                        types.insert(path.clone(), field_type);
                        if field_type.is_schemaless_container() {
                            Self::flatten_nested(&path, child, types, nullable);
                        }
                    }
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CollectionDefinition;
    use serde_json::json;

    fn model() -> CollectionModel {
        let definition: CollectionDefinition = serde_json::from_value(json!({
            "name": "orders",
            "endpointBasePath": "/orders",
            "schema": {
                "type": "object",
                "required": ["_id"],
                "properties": {
                    "_id": {"type": "string", "__mia_configuration": {"type": "ObjectId"}},
                    "creatorId": {"type": "string"},
                    "createdAt": {"type": "string", "format": "date-time"},
                    "updaterId": {"type": "string"},
                    "updatedAt": {"type": "string", "format": "date-time"},
                    "__STATE__": {"type": "string"},
                    "note": {"type": "string", "nullable": true},
                    "items": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "productId": {"type": "string", "__mia_configuration": {"type": "ObjectId"}},
                                "shippedAt": {"type": "string", "format": "date-time", "nullable": true}
                            }
                        }
                    },
                    "metadata": {
                        "type": "object",
                        "properties": {"up2you": {"type": "number"}}
                    }
                }
            },
            "indexes": [
                {"name": "text", "type": "text", "fields": [{"name": "note"}]},
                {"name": "compound", "type": "normal", "fields": [{"name": "creatorId", "order": 1}, {"name": "createdAt", "order": -1}]},
                {"name": "geo", "type": "geo", "field": "position"}
            ]
        }))
        .unwrap();
        CollectionModel::from_definition(definition).unwrap()
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("orders.1.productId"), "orders.productId");
        assert_eq!(normalize_path("matrix.0.12.value"), "matrix.value");
        assert_eq!(normalize_path("metadata.up2you"), "metadata.up2you");
        assert_eq!(normalize_path("2fa"), "2fa");
        assert_eq!(normalize_path("plain"), "plain");
    }

    #[test]
    fn test_resolve_flattens_nested_declarations() {
        let types = FieldDefinitionResolver::resolve(&model());
        assert_eq!(types.get("_id"), Some(&FieldType::ObjectId));
        assert_eq!(types.get("createdAt"), Some(&FieldType::Date));
        assert_eq!(types.get("items"), Some(&FieldType::Array));
        assert_eq!(types.get("items.productId"), Some(&FieldType::ObjectId));
        assert_eq!(types.get("items.shippedAt"), Some(&FieldType::Date));
        assert_eq!(types.get("metadata"), Some(&FieldType::RawObject));
        assert_eq!(types.get("metadata.up2you"), Some(&FieldType::Number));
        assert_eq!(types.get(&normalize_path("items.4.productId")), Some(&FieldType::ObjectId));
    }

    #[test]
    fn test_resolve_nullable() {
        let nullable = FieldDefinitionResolver::resolve_nullable(&model());
        assert!(nullable.contains("note"));
        assert!(nullable.contains("items.shippedAt"));
        assert!(!nullable.contains("items.productId"));
    }

    #[test]
    fn test_raw_object_prefixes() {
        let prefixes = FieldDefinitionResolver::resolve_raw_object_prefixes(&model()).unwrap();
        let matches = |path: &str| prefixes.iter().any(|p| p.is_match(path));
        assert!(matches("metadata.anything"));
        assert!(matches("items.whatever"));
        assert!(!matches("metadata"));
        assert!(!matches("metadataExtra.x"));
    }

    #[test]
    fn test_indexed_fields() {
        let model = model();
        let text = FieldDefinitionResolver::resolve_text_indexed_fields(&model);
        assert_eq!(text.into_iter().collect::<Vec<_>>(), vec!["note".to_string()]);
        let normal = FieldDefinitionResolver::resolve_normal_indexed_fields(&model);
        assert_eq!(normal.into_iter().collect::<Vec<_>>(), vec!["creatorId".to_string()]);
    }
}
