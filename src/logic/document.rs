use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::error::{CrudError, Result};
use crate::logic::casting::date_value;
use crate::logic::query_translator::QueryTranslator;
use crate::model::{
    CollectionModel, FieldType, LifecycleState, CREATED_AT, CREATOR_ID, ID_FIELD, STATE_FIELD,
    UPDATED_AT, UPDATER_ID,
};
use crate::store::object_id::{ObjectIdGenerator, UuidGenerator};
use crate::store::traits::IdGenerator;

/// ObjectId identifiers when `_id` is declared as one, UUIDs otherwise.
pub fn id_generator_for(model: &CollectionModel) -> Arc<dyn IdGenerator> {
    match model.field(ID_FIELD).map(|f| f.field_type) {
        Some(FieldType::ObjectId) => Arc::new(ObjectIdGenerator::new()),
        _ => Arc::new(UuidGenerator),
    }
}

/// Stamps the reserved bookkeeping fields on documents and updates.
pub struct DocumentPreparer {
    translator: Arc<QueryTranslator>,
    id_generator: Arc<dyn IdGenerator>,
    default_state: LifecycleState,
}

impl DocumentPreparer {
    pub fn new(
        translator: Arc<QueryTranslator>,
        id_generator: Arc<dyn IdGenerator>,
        default_state: LifecycleState,
    ) -> Self {
        Self {
            translator,
            id_generator,
            default_state,
        }
    }

    /// Casts `document` and fills `_id`, the audit fields and `__STATE__`.
    /// A caller-supplied `_id` or `__STATE__` is kept.
    pub fn prepare_insert(&self, document: &mut Value, user_id: &str, now: DateTime<Utc>) -> Result<()> {
        self.translator.parse_and_cast_body(document)?;
        let fields = document
            .as_object_mut()
            .ok_or_else(|| CrudError::InvalidCommandBlock("body".to_string()))?;

        if !fields.contains_key(ID_FIELD) {
            fields.insert(ID_FIELD.to_string(), self.id_generator.generate());
        }
        fields.insert(CREATOR_ID.to_string(), Value::String(user_id.to_string()));
        fields.insert(UPDATER_ID.to_string(), Value::String(user_id.to_string()));
        fields.insert(CREATED_AT.to_string(), date_value(now));
        fields.insert(UPDATED_AT.to_string(), date_value(now));
        fields
            .entry(STATE_FIELD.to_string())
            .or_insert_with(|| Value::String(self.default_state.as_str().to_string()));
        Ok(())
    }

    /// Adds `updaterId` and `updatedAt` to the `$set` block of `commands`.
    pub fn prepare_update(&self, commands: &mut Value, user_id: &str, now: DateTime<Utc>) -> Result<()> {
        let blocks = commands
            .as_object_mut()
            .ok_or_else(|| CrudError::InvalidCommandBlock("update".to_string()))?;
        let set = blocks
            .entry("$set".to_string())
            .or_insert_with(|| Value::Object(Map::new()))
            .as_object_mut()
            .ok_or_else(|| CrudError::InvalidCommandBlock("$set".to_string()))?;

        set.insert(UPDATER_ID.to_string(), Value::String(user_id.to_string()));
        set.insert(UPDATED_AT.to_string(), date_value(now));
        Ok(())
    }
}
