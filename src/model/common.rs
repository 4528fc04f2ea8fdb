use serde::{Deserialize, Serialize};
use std::fmt;

/// Semantic type of a declared field. Selects the cast function, the legal
/// query/update operators and the wire schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FieldType {
    #[serde(rename = "string")]
    String,
    #[serde(rename = "number")]
    Number,
    #[serde(rename = "boolean")]
    Boolean,
    Date,
    ObjectId,
    GeoPoint,
    RawObject,
    Array,
}

impl FieldType {
    pub const ALL: [FieldType; 8] = [
        FieldType::String,
        FieldType::Number,
        FieldType::Boolean,
        FieldType::Date,
        FieldType::ObjectId,
        FieldType::GeoPoint,
        FieldType::RawObject,
        FieldType::Array,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Number => "number",
            FieldType::Boolean => "boolean",
            FieldType::Date => "Date",
            FieldType::ObjectId => "ObjectId",
            FieldType::GeoPoint => "GeoPoint",
            FieldType::RawObject => "RawObject",
            FieldType::Array => "Array",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == value)
    }

    /// Sub-paths of these types are not type-checked.
    pub fn is_schemaless_container(&self) -> bool {
        matches!(self, FieldType::RawObject | FieldType::Array)
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Soft-delete / workflow marker stored in `__STATE__`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecycleState {
    Public,
    Draft,
    Trash,
    Deleted,
}

impl LifecycleState {
    pub const ALL: [LifecycleState; 4] = [
        LifecycleState::Public,
        LifecycleState::Draft,
        LifecycleState::Trash,
        LifecycleState::Deleted,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleState::Public => "PUBLIC",
            LifecycleState::Draft => "DRAFT",
            LifecycleState::Trash => "TRASH",
            LifecycleState::Deleted => "DELETED",
        }
    }

    pub fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(|s| s.as_str()).collect()
    }
}

impl Default for LifecycleState {
    fn default() -> Self {
        LifecycleState::Draft
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub const ID_FIELD: &str = "_id";
pub const CREATOR_ID: &str = "creatorId";
pub const CREATED_AT: &str = "createdAt";
pub const UPDATER_ID: &str = "updaterId";
pub const UPDATED_AT: &str = "updatedAt";
pub const STATE_FIELD: &str = "__STATE__";

/// Fields every collection carries; they are never client-editable.
pub const RESERVED_FIELDS: [&str; 6] = [
    ID_FIELD,
    CREATOR_ID,
    CREATED_AT,
    UPDATER_ID,
    UPDATED_AT,
    STATE_FIELD,
];

pub fn is_reserved_field(name: &str) -> bool {
    RESERVED_FIELDS.contains(&name)
}
