use log::debug;
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::error::{CrudError, Result};
use crate::logic::casting::ValueCaster;
use crate::logic::field_resolver::{normalize_path, FieldDefinitionResolver, FieldTypes};
use crate::logic::operators::{Operand, QueryOperator, UpdateOperator};
use crate::logic::path_walker::{is_array_schema, CompiledPatterns, PathMaps, SchemaMap};
use crate::logic::text_search;
use crate::model::{classify_json_schema, CollectionModel, FieldType};
use crate::store::traits::IdentifierDriver;

const REPLACE_SUFFIX: &str = ".$.replace";
const MERGE_SUFFIX: &str = ".$.merge";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArrayElementOperation {
    Replace,
    Merge,
}

fn split_array_operation(key: &str) -> Option<(&str, ArrayElementOperation)> {
    if let Some(base) = key.strip_suffix(REPLACE_SUFFIX) {
        return Some((base, ArrayElementOperation::Replace));
    }
    key.strip_suffix(MERGE_SUFFIX)
        .map(|base| (base, ArrayElementOperation::Merge))
}

fn root_field(path: &str) -> &str {
    path.split('.').next().unwrap_or(path)
}

enum FieldLookup {
    Typed(FieldType),
    Schemaless,
    Unknown,
}

/// Validates and casts filters, document bodies and update commands of one
/// collection. Every entry point works in place on the caller's value.
#[derive(Debug)]
pub struct QueryTranslator {
    collection: String,
    field_types: FieldTypes,
    nullable: BTreeSet<String>,
    raw_object_prefixes: Vec<Regex>,
    nested_paths: SchemaMap,
    nested_patterns: CompiledPatterns,
    operator_paths: SchemaMap,
    operator_patterns: CompiledPatterns,
    text_indexed_fields: BTreeSet<String>,
    caster: ValueCaster,
}

impl QueryTranslator {
    pub fn new(
        model: &CollectionModel,
        path_maps: &PathMaps,
        driver: Arc<dyn IdentifierDriver>,
    ) -> Result<Self> {
        let nested_paths: SchemaMap = path_maps
            .paths
            .iter()
            .filter(|(path, _)| path.contains('.'))
            .map(|(path, schema)| (path.clone(), schema.clone()))
            .collect();

        Ok(Self {
            collection: model.name.clone(),
            field_types: FieldDefinitionResolver::resolve(model),
            nullable: FieldDefinitionResolver::resolve_nullable(model),
            raw_object_prefixes: FieldDefinitionResolver::resolve_raw_object_prefixes(model)?,
            nested_paths,
            nested_patterns: CompiledPatterns::compile(&path_maps.pattern_properties)?,
            operator_paths: path_maps.paths_operators.clone(),
            operator_patterns: CompiledPatterns::compile(&path_maps.pattern_properties_operators)?,
            text_indexed_fields: FieldDefinitionResolver::resolve_text_indexed_fields(model),
            caster: ValueCaster::new(driver),
        })
    }

    /// Casts a read/delete filter.
    pub fn parse_and_cast(&self, query: &mut Value) -> Result<()> {
        let clauses = query
            .as_object_mut()
            .ok_or_else(|| CrudError::InvalidCommandBlock("query".to_string()))?;

        for (key, value) in clauses.iter_mut() {
            match key.as_str() {
                "$and" | "$or" => {
                    let members = value
                        .as_array_mut()
                        .ok_or_else(|| CrudError::InvalidLogicalClause(key.clone()))?;
                    for member in members {
                        self.parse_and_cast(member)?;
                    }
                }
                text_search::TEXT_OPERATOR => {}
                operator if operator.starts_with('$') => {
                    return Err(CrudError::UnknownOperator(operator.to_string()))
                }
                _ => self.cast_filter_field(key, value)?,
            }
        }
        Ok(())
    }

    /// Casts an insert/replace document. Only top-level fields are checked.
    pub fn parse_and_cast_body(&self, document: &mut Value) -> Result<()> {
        let fields = document
            .as_object_mut()
            .ok_or_else(|| CrudError::InvalidCommandBlock("body".to_string()))?;

        for (key, value) in fields.iter_mut() {
            let field_type = *self
                .field_types
                .get(key)
                .ok_or_else(|| CrudError::UnknownField(key.clone()))?;
            if value.is_null() && self.nullable.contains(key) {
                continue;
            }
            self.caster.cast_in_place(field_type, value)?;
        }
        Ok(())
    }

    /// Casts an update command object. Every targeted field must belong to
    /// `editable_fields`, whatever its type.
    pub fn parse_and_cast_commands(
        &self,
        commands: &mut Value,
        editable_fields: &BTreeSet<String>,
    ) -> Result<()> {
        let blocks = commands
            .as_object_mut()
            .ok_or_else(|| CrudError::InvalidCommandBlock("update".to_string()))?;

        for (name, block) in blocks.iter_mut() {
            let operator =
                UpdateOperator::parse(name).ok_or_else(|| CrudError::UnknownOperator(name.clone()))?;
            let entries = match block {
                Value::Object(entries) => std::mem::take(entries),
                _ => return Err(CrudError::InvalidCommandBlock(name.clone())),
            };

            let mut casted = Map::new();
            for (key, value) in entries {
                self.cast_command_entry(operator, key, value, editable_fields, &mut casted)?;
            }
            *block = Value::Object(casted);
        }
        Ok(())
    }

    /// Validates `$text` composition. Queries without `$text` pass.
    pub fn parse_and_cast_text_search_query(
        &self,
        query: &Value,
        normal_indexed_fields: &BTreeSet<String>,
    ) -> Result<()> {
        if !text_search::is_text_search_query(query) {
            return Ok(());
        }
        text_search::validate_text_search(query, normal_indexed_fields)?;
        if self.text_indexed_fields.is_empty() {
            return Err(CrudError::MissingTextIndex(self.collection.clone()));
        }
        Ok(())
    }

    pub fn is_text_search_query(query: &Value) -> bool {
        text_search::is_text_search_query(query)
    }

    fn lookup_field(&self, path: &str) -> FieldLookup {
        let normalized = normalize_path(path);
        if let Some(field_type) = self.field_types.get(&normalized) {
            return FieldLookup::Typed(*field_type);
        }
        if self.raw_object_prefixes.iter().any(|p| p.is_match(&normalized)) {
            return FieldLookup::Schemaless;
        }
        FieldLookup::Unknown
    }

    fn cast_filter_field(&self, key: &str, value: &mut Value) -> Result<()> {
        let field_type = match self.lookup_field(key) {
            FieldLookup::Typed(field_type) => field_type,
            FieldLookup::Schemaless => return Ok(()),
            FieldLookup::Unknown => return Err(CrudError::UnknownField(key.to_string())),
        };

        let Value::Object(operators) = value else {
            return self.caster.cast_in_place(field_type, value);
        };

        // A plain sub-document is an equality match on a container field.
        if field_type.is_schemaless_container() && !operators.keys().any(|k| k.starts_with('$')) {
            return Ok(());
        }

        for (name, operand) in operators.iter_mut() {
            let operator = QueryOperator::parse(name)
                .ok_or_else(|| CrudError::UnsupportedOperator(name.clone()))?;
            if !operator.supports(field_type) {
                return Err(CrudError::OperatorNotAllowed {
                    operator: name.clone(),
                    field_type,
                });
            }
            match operator.operand() {
                Operand::Cast => self.caster.cast_in_place(field_type, operand)?,
                Operand::CastEach => {
                    let items = operand
                        .as_array_mut()
                        .ok_or_else(|| CrudError::InvalidLogicalClause(name.clone()))?;
                    for item in items {
                        self.caster.cast_in_place(field_type, item)?;
                    }
                }
                Operand::Unchanged => {}
                Operand::NearSphere => *operand = near_sphere(operand)?,
            }
        }
        Ok(())
    }

    fn cast_command_entry(
        &self,
        operator: UpdateOperator,
        key: String,
        mut value: Value,
        editable_fields: &BTreeSet<String>,
        casted: &mut Map<String, Value>,
    ) -> Result<()> {
        if let Some((base, operation)) = split_array_operation(&key) {
            if self.is_array_path(base) {
                ensure_editable(root_field(base), editable_fields)?;
                return self.apply_array_operation(&key, base, operation, value, casted);
            }
        }

        let normalized = normalize_path(&key);
        let field_type = self.field_types.get(&normalized).copied();
        if field_type.is_none() && !self.is_schemaless_path(&key, &normalized) {
            debug!("rejecting update of unknown path {} on {}", key, self.collection);
            return Err(CrudError::UnknownFields);
        }
        ensure_editable(root_field(&key), editable_fields)?;

        if let Some(field_type) = field_type {
            let keep_null = value.is_null() && self.nullable.contains(&normalized);
            if operator.casts_values() && !keep_null {
                self.caster.cast_in_place(field_type, &mut value)?;
            }
        }
        casted.insert(key, value);
        Ok(())
    }

    fn apply_array_operation(
        &self,
        key: &str,
        base: &str,
        operation: ArrayElementOperation,
        value: Value,
        casted: &mut Map<String, Value>,
    ) -> Result<()> {
        let item_schema = self
            .operator_paths
            .get(key)
            .or_else(|| self.operator_patterns.find(key));

        match operation {
            ArrayElementOperation::Replace => {
                if value.is_null() {
                    return Err(CrudError::InvalidArrayOperationValue);
                }
                let value = match item_schema.and_then(classify_json_schema) {
                    Some(item_type) => self.caster.cast(item_type, &value)?,
                    None => value,
                };
                casted.insert(format!("{}.$", base), value);
            }
            ArrayElementOperation::Merge => {
                let Value::Object(patch) = value else {
                    return Err(CrudError::InvalidArrayOperationValue);
                };
                for (sub_key, mut sub_value) in patch {
                    let sub_type = item_schema
                        .and_then(|schema| schema.get("properties"))
                        .and_then(|properties| properties.get(&sub_key))
                        .and_then(classify_json_schema);
                    if let Some(sub_type) = sub_type {
                        self.caster.cast_in_place(sub_type, &mut sub_value)?;
                    }
                    casted.insert(format!("{}.$.{}", base, sub_key), sub_value);
                }
            }
        }
        Ok(())
    }

    fn is_array_path(&self, path: &str) -> bool {
        if self.field_types.get(&normalize_path(path)) == Some(&FieldType::Array) {
            return true;
        }
        self.nested_paths
            .get(path)
            .or_else(|| self.nested_patterns.find(path))
            .map(is_array_schema)
            .unwrap_or(false)
    }

    fn is_schemaless_path(&self, path: &str, normalized: &str) -> bool {
        self.nested_paths.contains_key(path)
            || self.nested_patterns.is_match(path)
            || self.raw_object_prefixes.iter().any(|p| p.is_match(normalized))
    }
}

fn ensure_editable(field: &str, editable_fields: &BTreeSet<String>) -> Result<()> {
    if editable_fields.contains(field) {
        Ok(())
    } else {
        Err(CrudError::FieldNotEditable(field.to_string()))
    }
}

/// `{from, minDistance?, maxDistance?}` → `{$geometry, $minDistance?, $maxDistance?}`.
fn near_sphere(operand: &Value) -> Result<Value> {
    let from = operand
        .get("from")
        .ok_or_else(|| CrudError::InvalidCommandBlock("$nearSphere".to_string()))?;

    let mut near = Map::new();
    near.insert(
        "$geometry".to_string(),
        serde_json::json!({ "type": "Point", "coordinates": from }),
    );
    if let Some(min) = operand.get("minDistance") {
        near.insert("$minDistance".to_string(), min.clone());
    }
    if let Some(max) = operand.get("maxDistance") {
        near.insert("$maxDistance".to_string(), max.clone());
    }
    Ok(Value::Object(near))
}
