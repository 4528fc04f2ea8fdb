//! Structural validation of collection definitions before they are adapted.

use jsonschema::{Draft, Validator};
use serde_json::{json, Value};

use crate::error::{CrudError, Result};
use crate::model::{FieldType, LifecycleState};

fn field_type_names() -> Vec<&'static str> {
    FieldType::ALL.iter().map(|t| t.as_str()).collect()
}

/// Meta-schema every definition file must satisfy.
pub fn definition_meta_schema() -> Value {
    json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "type": "object",
        "required": ["name", "endpointBasePath"],
        "oneOf": [
            { "required": ["fields"] },
            { "required": ["schema"] }
        ],
        "properties": {
            "name": { "type": "string", "pattern": "^[a-zA-Z0-9_-]+$" },
            "endpointBasePath": { "type": "string", "pattern": "^/" },
            "defaultState": { "type": "string", "enum": LifecycleState::names() },
            "type": { "type": "string", "enum": ["collection", "view"] },
            "source": { "type": "string" },
            "pipeline": { "type": "array" },
            "fields": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["name", "type"],
                    "properties": {
                        "name": { "type": "string", "minLength": 1 },
                        "type": { "type": "string", "enum": field_type_names() },
                        "required": { "type": "boolean" },
                        "nullable": { "type": "boolean" },
                        "description": { "type": "string" },
                        "schema": { "type": "object" },
                        "items": {
                            "type": "object",
                            "required": ["type"],
                            "properties": {
                                "type": { "type": "string", "enum": field_type_names() },
                                "schema": { "type": "object" }
                            }
                        },
                        "encryption": { "type": "object" }
                    }
                }
            },
            "schema": {
                "type": "object",
                "required": ["properties"],
                "properties": {
                    "type": { "const": "object" },
                    "properties": { "type": "object" },
                    "required": { "type": "array", "items": { "type": "string" } }
                }
            },
            "indexes": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["name", "type"],
                    "properties": {
                        "name": { "type": "string" },
                        "type": {
                            "type": "string",
                            "enum": ["normal", "geo", "hash", "ttl", "text", "wildcard"]
                        },
                        "unique": { "type": "boolean" },
                        "field": { "type": "string" },
                        "fields": {
                            "type": "array",
                            "items": {
                                "type": "object",
                                "required": ["name"],
                                "properties": { "name": { "type": "string" } }
                            }
                        }
                    }
                }
            }
        }
    })
}

/// Compiled meta-schema, built once by the loader.
pub struct DefinitionValidator {
    validator: Validator,
}

impl DefinitionValidator {
    pub fn new() -> Result<Self> {
        let validator = jsonschema::options()
            .with_draft(Draft::Draft7)
            .build(&definition_meta_schema())
            .map_err(|err| CrudError::InvalidDefinition(err.to_string()))?;
        Ok(Self { validator })
    }

    pub fn validate(&self, definition: &Value) -> Result<()> {
        let messages: Vec<String> = self
            .validator
            .iter_errors(definition)
            .map(|err| err.to_string())
            .collect();
        if messages.is_empty() {
            Ok(())
        } else {
            Err(CrudError::InvalidDefinition(messages.join("; ")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_both_shapes() {
        let validator = DefinitionValidator::new().unwrap();
        let legacy = json!({
            "name": "books",
            "endpointBasePath": "/books",
            "fields": [{"name": "_id", "type": "ObjectId"}],
            "indexes": [{"name": "_id", "type": "normal", "unique": true, "fields": [{"name": "_id"}]}]
        });
        assert!(validator.validate(&legacy).is_ok());

        let modern = json!({
            "name": "books",
            "endpointBasePath": "/books",
            "schema": {"type": "object", "properties": {}, "required": []}
        });
        assert!(validator.validate(&modern).is_ok());
    }

    #[test]
    fn test_rejects_malformed_definitions() {
        let validator = DefinitionValidator::new().unwrap();
        let both = json!({
            "name": "books",
            "endpointBasePath": "/books",
            "fields": [],
            "schema": {"properties": {}}
        });
        assert!(matches!(
            validator.validate(&both),
            Err(CrudError::InvalidDefinition(_))
        ));

        let bad_type = json!({
            "name": "books",
            "endpointBasePath": "/books",
            "fields": [{"name": "price", "type": "Decimal"}]
        });
        assert!(validator.validate(&bad_type).is_err());

        let bad_path = json!({
            "name": "books",
            "endpointBasePath": "books",
            "fields": []
        });
        assert!(validator.validate(&bad_path).is_err());
    }
}
