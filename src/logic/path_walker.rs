use regex::Regex;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

use crate::error::{CrudError, Result};
use crate::model::{json_schema_type, MIA_CONFIGURATION};

/// Path (literal or regex) → schema of what lives at that path.
pub type SchemaMap = BTreeMap<String, Value>;

/// JSON-Schema keywords the walker refuses to interpret.
pub const UNSUPPORTED_COMBINATORS: [&str; 4] = ["oneOf", "allOf", "anyOf", "if"];

const ARRAY_INDEX: &str = r"\d+";
const ANY_SUBPATH: &str = ".+";

#[derive(Debug, Clone, Default)]
pub struct WalkOptions {
    /// Key every generated entry as a regex pattern
    pub use_regex: bool,
    /// Literal path the schema lives at
    pub base_path: String,
    /// Also record the raw schema of nested objects and arrays
    pub add_raw_schema_for_nested: bool,
}

impl WalkOptions {
    pub fn nested(base_path: &str) -> Self {
        Self {
            use_regex: false,
            base_path: base_path.to_string(),
            add_raw_schema_for_nested: true,
        }
    }
}

/// Output of one walk: literal paths and end-anchored regex paths.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PathFields {
    pub paths: SchemaMap,
    pub pattern_properties: SchemaMap,
}

/// Path fields plus the synthetic `.$.replace` / `.$.merge` update paths.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PathMaps {
    pub paths: SchemaMap,
    pub pattern_properties: SchemaMap,
    pub paths_operators: SchemaMap,
    pub pattern_properties_operators: SchemaMap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeKind {
    Object,
    Array,
    Leaf,
}

fn node_kind(schema: &Value) -> NodeKind {
    let is_geo_point = schema
        .get(MIA_CONFIGURATION)
        .and_then(|c| c.get("type"))
        .and_then(Value::as_str)
        == Some("GeoPoint");
    if is_geo_point {
        return NodeKind::Leaf;
    }
    match json_schema_type(schema) {
        Some("object") => NodeKind::Object,
        Some("array") => NodeKind::Array,
        None if schema.get("properties").is_some() => NodeKind::Object,
        _ => NodeKind::Leaf,
    }
}

fn join(prefix: &str, separator: &str, key: &str) -> String {
    match (prefix.is_empty(), key.is_empty()) {
        (_, true) => prefix.to_string(),
        (true, false) => key.to_string(),
        (false, false) => format!("{}{}{}", prefix, separator, key),
    }
}

fn join_literal(prefix: &str, key: &str) -> String {
    join(prefix, ".", key)
}

fn join_pattern(prefix: &str, key: &str) -> String {
    join(prefix, r"\.", key)
}

impl PathFields {
    fn insert(&mut self, use_regex: bool, key: &str, schema: Value) {
        if use_regex {
            self.pattern_properties.insert(regex::escape(key), schema);
        } else {
            self.paths.insert(key.to_string(), schema);
        }
    }

    fn merge(&mut self, other: PathFields) {
        self.paths.extend(other.paths);
        self.pattern_properties.extend(other.pattern_properties);
    }

    /// Re-roots relative entries under a literal path segment.
    fn nest(self, segment: &str) -> PathFields {
        let pattern_prefix = regex::escape(segment);
        PathFields {
            paths: self
                .paths
                .into_iter()
                .map(|(key, schema)| (join_literal(segment, &key), schema))
                .collect(),
            pattern_properties: self
                .pattern_properties
                .into_iter()
                .map(|(key, schema)| (join_pattern(&pattern_prefix, &key), schema))
                .collect(),
        }
    }

    /// Re-roots every entry under a regex segment; the result is pattern-only.
    fn nest_pattern(self, segment: &str) -> PathFields {
        let mut pattern_properties: SchemaMap = self
            .paths
            .into_iter()
            .map(|(key, schema)| (join_pattern(segment, &regex::escape(&key)), schema))
            .collect();
        pattern_properties.extend(
            self.pattern_properties
                .into_iter()
                .map(|(key, schema)| (join_pattern(segment, &key), schema)),
        );
        PathFields {
            paths: SchemaMap::new(),
            pattern_properties,
        }
    }
}

/// Decomposes JSON-Schema shaped definitions into path maps.
pub struct PathSchemaWalker;

impl PathSchemaWalker {
    /// Walks `schema` and returns its literal and regex paths. Pattern keys
    /// are end-anchored but not start-anchored.
    pub fn generate_paths(schema: &Value, options: &WalkOptions) -> Result<PathFields> {
        Self::ensure_supported(schema)?;

        let relative = Self::walk(schema, options.use_regex, options.add_raw_schema_for_nested);
        let rooted = if options.base_path.is_empty() {
            relative
        } else {
            relative.nest(&options.base_path)
        };

        Ok(PathFields {
            paths: rooted.paths,
            pattern_properties: rooted
                .pattern_properties
                .into_iter()
                .map(|(key, schema)| (format!("{}$", key), schema))
                .collect(),
        })
    }

    /// `generate_paths` plus the per-array-element update operator paths.
    pub fn resolve_path_maps(schema: &Value, options: &WalkOptions) -> Result<PathMaps> {
        let fields = Self::generate_paths(schema, options)?;

        let mut paths_operators = SchemaMap::new();
        for (path, schema) in &fields.paths {
            Self::insert_array_operators(&mut paths_operators, schema, |op| {
                format!("{}.$.{}", path, op)
            });
        }

        let mut pattern_properties_operators = SchemaMap::new();
        for (pattern, schema) in &fields.pattern_properties {
            let base = pattern.strip_suffix('$').unwrap_or(pattern);
            Self::insert_array_operators(&mut pattern_properties_operators, schema, |op| {
                format!(r"{}\.\$\.{}$", base, op)
            });
        }

        Ok(PathMaps {
            paths: fields.paths,
            pattern_properties: fields.pattern_properties,
            paths_operators,
            pattern_properties_operators,
        })
    }

    /// Fails on the first combinator found anywhere in the schema tree.
    pub fn ensure_supported(schema: &Value) -> Result<()> {
        let Some(node) = schema.as_object() else {
            return Ok(());
        };
        if let Some(name) = UNSUPPORTED_COMBINATORS.iter().find(|k| node.contains_key(**k)) {
            return Err(CrudError::UnsupportedSchemaOperation(name.to_string()));
        }
        for keyword in ["properties", "patternProperties"] {
            if let Some(children) = node.get(keyword).and_then(Value::as_object) {
                for child in children.values() {
                    Self::ensure_supported(child)?;
                }
            }
        }
        for keyword in ["items", "additionalProperties", "not"] {
            match node.get(keyword) {
                Some(Value::Array(children)) => {
                    for child in children {
                        Self::ensure_supported(child)?;
                    }
                }
                Some(child) => Self::ensure_supported(child)?,
                None => {}
            }
        }
        Ok(())
    }

    fn walk(schema: &Value, use_regex: bool, add_raw: bool) -> PathFields {
        match node_kind(schema) {
            NodeKind::Leaf => {
                let mut leaf = Map::new();
                if let Some(t) = schema.get("type") {
                    leaf.insert("type".to_string(), t.clone());
                }
                if let Some(config) = schema.get(MIA_CONFIGURATION) {
                    leaf.insert(MIA_CONFIGURATION.to_string(), config.clone());
                }
                let mut out = PathFields::default();
                out.insert(use_regex, "", Value::Object(leaf));
                out
            }
            NodeKind::Array => Self::walk_array(schema, use_regex, add_raw),
            NodeKind::Object => Self::walk_object(schema, use_regex, add_raw),
        }
    }

    fn walk_array(schema: &Value, use_regex: bool, add_raw: bool) -> PathFields {
        let items = schema
            .get("items")
            .filter(|items| items.is_object())
            .cloned()
            .unwrap_or_else(|| json!({}));

        let mut out = PathFields::default();
        if add_raw && !use_regex {
            out.paths.insert(String::new(), schema.clone());
        }
        if use_regex {
            out.pattern_properties.insert(String::new(), schema.clone());
        }

        // Elements are addressed by index, so everything below is a pattern.
        let elements = Self::walk(&items, true, true);
        out.merge(elements.nest_pattern(ARRAY_INDEX));
        out.pattern_properties.insert(ARRAY_INDEX.to_string(), items);
        out
    }

    fn walk_object(schema: &Value, use_regex: bool, add_raw: bool) -> PathFields {
        let mut out = PathFields::default();

        if let Some(properties) = schema.get("properties").and_then(Value::as_object) {
            for (name, child) in properties {
                match node_kind(child) {
                    NodeKind::Leaf => out.insert(use_regex, name, child.clone()),
                    NodeKind::Object => {
                        let nested = Self::walk(child, use_regex, add_raw);
                        out.merge(nested.nest(name));
                        if add_raw {
                            out.insert(use_regex, name, child.clone());
                        }
                    }
                    NodeKind::Array => {
                        let nested = Self::walk(child, use_regex, add_raw);
                        out.merge(nested.nest(name));
                    }
                }
            }
        }

        if schema.get("additionalProperties") == Some(&Value::Bool(true)) {
            out.pattern_properties
                .insert(ANY_SUBPATH.to_string(), Value::Bool(true));
        }
        out
    }

    fn insert_array_operators(
        operators: &mut SchemaMap,
        schema: &Value,
        key_for: impl Fn(&str) -> String,
    ) {
        if node_kind(schema) != NodeKind::Array {
            return;
        }
        let items = schema
            .get("items")
            .filter(|items| items.is_object())
            .cloned()
            .unwrap_or_else(|| json!({}));

        if node_kind(&items) == NodeKind::Object {
            let mut merge_schema = items.clone();
            if let Some(map) = merge_schema.as_object_mut() {
                map.remove("required");
            }
            operators.insert(key_for("merge"), merge_schema);
        }
        operators.insert(key_for("replace"), items);
    }
}

/// Regex entries of a [`SchemaMap`], compiled once.
#[derive(Debug, Clone, Default)]
pub struct CompiledPatterns {
    entries: Vec<(Regex, Value)>,
}

impl CompiledPatterns {
    pub fn compile(patterns: &SchemaMap) -> Result<Self> {
        let entries = patterns
            .iter()
            .map(|(pattern, schema)| {
                Regex::new(pattern)
                    .map(|regex| (regex, schema.clone()))
                    .map_err(|err| CrudError::InvalidDefinition(format!("{}: {}", pattern, err)))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { entries })
    }

    /// Schema of the first pattern matching `path`.
    pub fn find(&self, path: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(regex, _)| regex.is_match(path))
            .map(|(_, schema)| schema)
    }

    pub fn is_match(&self, path: &str) -> bool {
        self.find(path).is_some()
    }
}

/// Whether a schema found in a path map describes an array container.
pub fn is_array_schema(schema: &Value) -> bool {
    node_kind(schema) == NodeKind::Array
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{classify_json_schema, FieldType};

    fn attachments_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "name": {"type": "string"},
                "attachments": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "required": ["name"],
                        "properties": {
                            "name": {"type": "string"},
                            "neastedArr": {"type": "array", "items": {"type": "number"}},
                            "detail": {
                                "type": "object",
                                "properties": {"size": {"type": "number"}}
                            }
                        }
                    }
                },
                "metadata": {
                    "type": "object",
                    "additionalProperties": true,
                    "properties": {
                        "somethingNumber": {"type": "number"},
                        "exhaustive": {"type": "boolean"}
                    }
                },
                "tags": {"type": "array", "items": {"type": "string"}}
            }
        })
    }

    #[test]
    fn test_leaf_root_is_keyed_by_empty_path() {
        let fields =
            PathSchemaWalker::generate_paths(&json!({"type": "string", "format": "email"}), &WalkOptions::default())
                .unwrap();
        assert_eq!(fields.paths.get(""), Some(&json!({"type": "string"})));
        assert!(fields.pattern_properties.is_empty());
    }

    #[test]
    fn test_leaves_keep_their_engine_annotation() {
        let schema = json!({
            "type": "string",
            "description": "owner",
            "__mia_configuration": {"type": "ObjectId"}
        });
        let fields = PathSchemaWalker::generate_paths(&schema, &WalkOptions::default()).unwrap();
        let leaf = fields.paths.get("").unwrap();
        assert_eq!(
            leaf,
            &json!({"type": "string", "__mia_configuration": {"type": "ObjectId"}})
        );
        assert_eq!(classify_json_schema(leaf), Some(FieldType::ObjectId));
    }

    #[test]
    fn test_object_with_arrays_and_nested_objects() {
        let fields = PathSchemaWalker::generate_paths(&attachments_schema(), &WalkOptions::default())
            .unwrap();

        let literal: Vec<&str> = fields.paths.keys().map(String::as_str).collect();
        assert_eq!(
            literal,
            vec!["metadata.exhaustive", "metadata.somethingNumber", "name"]
        );

        let schema = attachments_schema();
        let items = &schema["properties"]["attachments"]["items"];
        assert_eq!(fields.pattern_properties.get(r"attachments\.\d+$"), Some(items));
        assert_eq!(
            fields.pattern_properties.get(r"attachments\.\d+\.name$"),
            Some(&json!({"type": "string"}))
        );
        assert_eq!(
            fields.pattern_properties.get(r"attachments\.\d+\.neastedArr\.\d+$"),
            Some(&json!({"type": "number"}))
        );
        assert_eq!(
            fields.pattern_properties.get(r"attachments\.\d+\.neastedArr$"),
            Some(&items["properties"]["neastedArr"])
        );
        assert_eq!(
            fields.pattern_properties.get(r"attachments\.\d+\.detail$"),
            Some(&items["properties"]["detail"])
        );
        assert_eq!(
            fields.pattern_properties.get(r"attachments\.\d+\.detail\.size$"),
            Some(&json!({"type": "number"}))
        );
        assert_eq!(
            fields.pattern_properties.get(r"metadata\..+$"),
            Some(&Value::Bool(true))
        );
        assert_eq!(
            fields.pattern_properties.get(r"tags\.\d+$"),
            Some(&json!({"type": "string"}))
        );
    }

    #[test]
    fn test_raw_schema_for_nested_adds_containers() {
        let schema = attachments_schema();
        let fields = PathSchemaWalker::generate_paths(
            &schema,
            &WalkOptions {
                add_raw_schema_for_nested: true,
                ..WalkOptions::default()
            },
        )
        .unwrap();

        assert_eq!(fields.paths.get("attachments"), Some(&schema["properties"]["attachments"]));
        assert_eq!(fields.paths.get("metadata"), Some(&schema["properties"]["metadata"]));
        assert_eq!(fields.paths.get("tags"), Some(&schema["properties"]["tags"]));
    }

    #[test]
    fn test_base_path_and_regex_mode() {
        let schema = json!({
            "type": "object",
            "properties": {"a.b": {"type": "string"}, "c": {"type": "number"}}
        });
        let fields = PathSchemaWalker::generate_paths(
            &schema,
            &WalkOptions {
                use_regex: true,
                base_path: "root".to_string(),
                add_raw_schema_for_nested: false,
            },
        )
        .unwrap();
        assert!(fields.paths.is_empty());
        let keys: Vec<&str> = fields.pattern_properties.keys().map(String::as_str).collect();
        assert_eq!(keys, vec![r"root\.a\.b$", r"root\.c$"]);
    }

    #[test]
    fn test_array_operators() {
        let maps = PathSchemaWalker::resolve_path_maps(
            &attachments_schema(),
            &WalkOptions {
                add_raw_schema_for_nested: true,
                ..WalkOptions::default()
            },
        )
        .unwrap();

        let schema = attachments_schema();
        let items = &schema["properties"]["attachments"]["items"];
        assert_eq!(maps.paths_operators.get("attachments.$.replace"), Some(items));
        let merge = maps.paths_operators.get("attachments.$.merge").unwrap();
        assert!(merge.get("required").is_none());
        assert_eq!(merge["properties"], items["properties"]);

        assert_eq!(
            maps.paths_operators.get("tags.$.replace"),
            Some(&json!({"type": "string"}))
        );
        assert!(maps.paths_operators.get("tags.$.merge").is_none());

        assert_eq!(
            maps.pattern_properties_operators
                .get(r"attachments\.\d+\.neastedArr\.\$\.replace$"),
            Some(&json!({"type": "number"}))
        );
        assert!(maps
            .pattern_properties_operators
            .get(r"attachments\.\d+\.neastedArr\.\$\.merge$")
            .is_none());
    }

    #[test]
    fn test_generation_is_idempotent() {
        let options = WalkOptions {
            add_raw_schema_for_nested: true,
            ..WalkOptions::default()
        };
        let first = PathSchemaWalker::resolve_path_maps(&attachments_schema(), &options).unwrap();
        let second = PathSchemaWalker::resolve_path_maps(&attachments_schema(), &options).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_patterns_are_end_anchored() {
        let fields = PathSchemaWalker::generate_paths(&attachments_schema(), &WalkOptions::default())
            .unwrap();
        for pattern in fields.pattern_properties.keys() {
            if pattern.ends_with(r"\..+$") {
                continue;
            }
            let example = pattern
                .trim_end_matches('$')
                .replace(r"\d+", "12")
                .replace(r"\.", ".");
            let regex = Regex::new(pattern).unwrap();
            assert!(regex.is_match(&example), "{} should match {}", pattern, example);
            assert!(
                !regex.is_match(&format!("{}.extra", example)),
                "{} should not match a longer path",
                pattern
            );
        }
    }

    #[test]
    fn test_unsupported_combinators_fail_fast() {
        for combinator in UNSUPPORTED_COMBINATORS {
            let schema = json!({
                "type": "object",
                "properties": {
                    "list": {
                        "type": "array",
                        "items": {"type": "object", "properties": {"deep": {combinator: []}}}
                    }
                }
            });
            let err = PathSchemaWalker::generate_paths(&schema, &WalkOptions::default()).unwrap_err();
            assert_eq!(
                err.to_string(),
                format!("Unsupported operation in jsonSchema: {}", combinator)
            );
        }
    }

    #[test]
    fn test_property_named_like_combinator_is_allowed() {
        let schema = json!({
            "type": "object",
            "properties": {"if": {"type": "string"}}
        });
        let fields = PathSchemaWalker::generate_paths(&schema, &WalkOptions::default()).unwrap();
        assert!(fields.paths.contains_key("if"));
    }

    #[test]
    fn test_compiled_patterns_find() {
        let fields = PathSchemaWalker::generate_paths(&attachments_schema(), &WalkOptions::default())
            .unwrap();
        let compiled = CompiledPatterns::compile(&fields.pattern_properties).unwrap();
        assert_eq!(compiled.find("attachments.3.name"), Some(&json!({"type": "string"})));
        assert!(compiled.is_match("metadata.anything.goes"));
        assert!(!compiled.is_match("unknown.3"));
    }
}
