use serde_json::Value;

/// Identifier contract of the document store driver. The engine only needs
/// to know which values the driver accepts and how it builds an identifier
/// out of them.
pub trait IdentifierDriver: Send + Sync {
    fn is_valid_id(&self, value: &Value) -> bool;

    /// Storage representation of `value`, `None` when it is not a valid id.
    fn make_id(&self, value: &Value) -> Option<Value>;
}

/// Source of fresh `_id` values for inserted documents.
pub trait IdGenerator: Send + Sync {
    fn generate(&self) -> Value;
}
