use thiserror::Error;

use crate::model::FieldType;

pub type Result<T> = std::result::Result<T, CrudError>;

/// Every failure the engine can report. Messages are stable: callers and
/// tests match on the rendered text.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CrudError {
    // Definition errors, raised while loading a collection.
    #[error("Unsupported operation in jsonSchema: {0}")]
    UnsupportedSchemaOperation(String),

    #[error("Invalid collection definition: {0}")]
    InvalidDefinition(String),

    #[error("Collection {collection} is missing reserved field {field}")]
    MissingReservedField { collection: String, field: String },

    #[error("Duplicate collection name: {0}")]
    DuplicateCollection(String),

    // Unknown identifiers.
    #[error("Unknown field: {0}")]
    UnknownField(String),

    #[error("Unknown fields")]
    UnknownFields,

    #[error("Unknown operator: {0}")]
    UnknownOperator(String),

    #[error("Unsupported operator: {operator} for {field_type} field")]
    OperatorNotAllowed {
        operator: String,
        field_type: FieldType,
    },

    #[error("Unsupported operator: {0}")]
    UnsupportedOperator(String),

    // Type casts.
    #[error("Invalid Date")]
    InvalidDate,

    #[error("Invalid objectId")]
    InvalidObjectId,

    // Policy.
    #[error("You cannot edit \"{0}\" field")]
    FieldNotEditable(String),

    #[error("Invalid value for array operation")]
    InvalidArrayOperationValue,

    #[error("Invalid value for {0}: expected an object")]
    InvalidCommandBlock(String),

    #[error("Invalid value for {0}: expected an array")]
    InvalidLogicalClause(String),

    #[error("Only one $text clause is allowed per query")]
    MultipleTextClauses,

    #[error("$text is not allowed inside {0}")]
    TextNotAllowedIn(String),

    #[error("$text query in $or requires all clauses indexed")]
    TextOrRequiresIndexes,

    #[error("$text requires $search")]
    TextMissingSearch,

    #[error("Unsupported $text option: {0}")]
    UnsupportedTextOption(String),

    #[error("$text requires a text index on collection {0}")]
    MissingTextIndex(String),
}

impl CrudError {
    /// Errors caused by the request payload rather than by the loaded
    /// definitions.
    pub fn is_client_error(&self) -> bool {
        !matches!(
            self,
            CrudError::UnsupportedSchemaOperation(_)
                | CrudError::InvalidDefinition(_)
                | CrudError::MissingReservedField { .. }
                | CrudError::DuplicateCollection(_)
        )
    }
}
