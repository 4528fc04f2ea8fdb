use anyhow::Context;
use log::{debug, info};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;

use crate::error::{CrudError, Result};
use crate::logic::{
    id_generator_for, DocumentPreparer, FieldDefinitionResolver, FieldTypes, GeneratorOptions,
    JsonSchemaGenerator, PathMaps, PathSchemaWalker, QueryTranslator, WalkOptions,
};
use crate::model::{CollectionDefinition, CollectionModel, DefinitionValidator};
use crate::store::object_id::HexObjectIdDriver;
use crate::store::traits::IdentifierDriver;

/// Everything derived from one collection definition. Built once at boot
/// and shared read-only.
pub struct CollectionArtifacts {
    pub model: CollectionModel,
    pub field_types: FieldTypes,
    pub nullable: BTreeSet<String>,
    pub text_indexed_fields: BTreeSet<String>,
    pub normal_indexed_fields: BTreeSet<String>,
    pub path_maps: PathMaps,
    pub translator: Arc<QueryTranslator>,
    pub generator: JsonSchemaGenerator,
    pub preparer: DocumentPreparer,
}

impl CollectionArtifacts {
    pub fn build(
        model: CollectionModel,
        driver: Arc<dyn IdentifierDriver>,
        options: GeneratorOptions,
    ) -> Result<Self> {
        let walk_options = WalkOptions {
            add_raw_schema_for_nested: true,
            ..WalkOptions::default()
        };
        let path_maps = PathSchemaWalker::resolve_path_maps(&model.json_schema(), &walk_options)?;
        let translator = Arc::new(QueryTranslator::new(&model, &path_maps, driver)?);
        let generator = JsonSchemaGenerator::new(&model, &path_maps, options);
        let preparer = DocumentPreparer::new(
            translator.clone(),
            id_generator_for(&model),
            model.default_state,
        );

        Ok(Self {
            field_types: FieldDefinitionResolver::resolve(&model),
            nullable: FieldDefinitionResolver::resolve_nullable(&model),
            text_indexed_fields: FieldDefinitionResolver::resolve_text_indexed_fields(&model),
            normal_indexed_fields: FieldDefinitionResolver::resolve_normal_indexed_fields(&model),
            path_maps,
            translator,
            generator,
            preparer,
            model,
        })
    }

    /// Default write allow-list: every non-reserved top-level field.
    pub fn editable_fields(&self) -> BTreeSet<String> {
        self.model.user_fields().map(|f| f.name.clone()).collect()
    }
}

/// Immutable name → artifacts map of every loaded collection.
#[derive(Default)]
pub struct CollectionRegistry {
    collections: BTreeMap<String, Arc<CollectionArtifacts>>,
}

impl CollectionRegistry {
    /// Validates, adapts and derives every raw definition.
    pub fn from_definitions(definitions: Vec<Value>, options: GeneratorOptions) -> Result<Self> {
        let validator = DefinitionValidator::new()?;
        let driver: Arc<dyn IdentifierDriver> = Arc::new(HexObjectIdDriver);
        let mut collections = BTreeMap::new();

        for raw in definitions {
            validator.validate(&raw)?;
            let definition: CollectionDefinition = serde_json::from_value(raw)
                .map_err(|err| CrudError::InvalidDefinition(err.to_string()))?;
            let model = CollectionModel::from_definition(definition)?;
            let name = model.name.clone();
            if collections.contains_key(&name) {
                return Err(CrudError::DuplicateCollection(name));
            }

            let artifacts = CollectionArtifacts::build(model, driver.clone(), options)?;
            debug!(
                "collection {}: {} typed paths, {} pattern paths",
                name,
                artifacts.field_types.len(),
                artifacts.path_maps.pattern_properties.len()
            );
            collections.insert(name, Arc::new(artifacts));
        }

        Ok(Self { collections })
    }

    /// Loads every `*.json` file of `dir`, in file name order.
    pub fn load_dir(dir: impl AsRef<Path>, options: GeneratorOptions) -> anyhow::Result<Self> {
        let dir = dir.as_ref();
        let mut files: Vec<_> = std::fs::read_dir(dir)
            .with_context(|| format!("reading definitions directory {}", dir.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.extension().and_then(|e| e.to_str()) == Some("json"))
            .collect();
        files.sort();

        let mut definitions = Vec::with_capacity(files.len());
        for file in &files {
            let content = std::fs::read_to_string(file)
                .with_context(|| format!("reading {}", file.display()))?;
            let definition: Value = serde_json::from_str(&content)
                .with_context(|| format!("parsing {}", file.display()))?;
            definitions.push(definition);
        }

        let registry = Self::from_definitions(definitions, options)
            .with_context(|| format!("loading collections from {}", dir.display()))?;
        info!("Loaded {} collections from {}", registry.len(), dir.display());
        Ok(registry)
    }

    pub fn get(&self, name: &str) -> Option<Arc<CollectionArtifacts>> {
        self.collections.get(name).cloned()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<CollectionArtifacts>> {
        self.collections.values()
    }

    pub fn len(&self) -> usize {
        self.collections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn definition(name: &str) -> Value {
        json!({
            "name": name,
            "endpointBasePath": format!("/{}", name),
            "fields": [
                {"name": "_id", "type": "ObjectId", "required": true},
                {"name": "creatorId", "type": "string", "required": true},
                {"name": "createdAt", "type": "Date", "required": true},
                {"name": "updaterId", "type": "string", "required": true},
                {"name": "updatedAt", "type": "Date", "required": true},
                {"name": "__STATE__", "type": "string", "required": true},
                {"name": "title", "type": "string"}
            ],
            "indexes": [{"name": "title", "type": "normal", "fields": [{"name": "title"}]}]
        })
    }

    #[test]
    fn test_registry_derives_artifacts() {
        let registry = CollectionRegistry::from_definitions(
            vec![definition("books"), definition("authors")],
            GeneratorOptions::default(),
        )
        .unwrap();
        assert_eq!(registry.len(), 2);

        let books = registry.get("books").unwrap();
        assert!(books.field_types.contains_key("title"));
        assert!(books.normal_indexed_fields.contains("title"));
        assert_eq!(
            books.editable_fields(),
            ["title".to_string()].into_iter().collect::<BTreeSet<_>>()
        );
        let names: Vec<&str> = registry.iter().map(|c| c.model.name.as_str()).collect();
        assert_eq!(names, vec!["authors", "books"]);
    }

    #[test]
    fn test_duplicate_names_are_rejected() {
        let result =
            CollectionRegistry::from_definitions(vec![definition("books"), definition("books")], GeneratorOptions::default());
        assert_eq!(result.err(), Some(CrudError::DuplicateCollection("books".to_string())));
    }

    #[test]
    fn test_meta_schema_failures_are_definition_errors() {
        let mut broken = definition("books");
        broken["schema"] = json!({"type": "object", "properties": {}});
        let err = CollectionRegistry::from_definitions(vec![broken], GeneratorOptions::default())
            .err()
            .unwrap();
        assert!(!err.is_client_error());
    }

    #[test]
    fn test_typeless_combinator_property_is_unsupported() {
        for combinator in ["oneOf", "anyOf"] {
            let mut schema_shaped = definition("products");
            schema_shaped.as_object_mut().unwrap().remove("fields");
            schema_shaped.as_object_mut().unwrap().remove("indexes");
            schema_shaped["schema"] = json!({
                "type": "object",
                "properties": {
                    "_id": {"type": "string", "__mia_configuration": {"type": "ObjectId"}},
                    "price": { combinator: [{"type": "string"}, {"type": "number"}] }
                }
            });
            let err = CollectionRegistry::from_definitions(vec![schema_shaped], GeneratorOptions::default())
                .err()
                .unwrap();
            assert_eq!(
                err.to_string(),
                format!("Unsupported operation in jsonSchema: {}", combinator)
            );
        }
    }

    #[test]
    fn test_load_dir_reads_json_files_only() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("books.json"), definition("books").to_string()).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let registry = CollectionRegistry::load_dir(dir.path(), GeneratorOptions::default()).unwrap();
        assert_eq!(registry.len(), 1);
        assert!(registry.get("books").is_some());
    }

    #[test]
    fn test_load_dir_reports_the_broken_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.json"), "{not json").unwrap();
        let err = CollectionRegistry::load_dir(dir.path(), GeneratorOptions::default())
            .err()
            .unwrap();
        assert!(format!("{:#}", err).contains("broken.json"));
    }
}
