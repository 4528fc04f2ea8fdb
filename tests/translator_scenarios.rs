use crud_engine::{CollectionArtifacts, CollectionRegistry, CrudError, GeneratorOptions};
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::sync::Arc;

fn registry() -> CollectionRegistry {
    CollectionRegistry::load_dir(
        concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures"),
        GeneratorOptions::default(),
    )
    .unwrap()
}

fn books() -> Arc<CollectionArtifacts> {
    registry().get("books").unwrap()
}

fn all_fields(collection: &CollectionArtifacts) -> BTreeSet<String> {
    collection.model.fields.iter().map(|f| f.name.clone()).collect()
}

#[test]
fn test_object_id_string_is_cast() {
    let mut query = json!({"_id": "aaaaaaaaaaaaaaaaaaaaaaaa"});
    books().translator.parse_and_cast(&mut query).unwrap();
    assert_eq!(query, json!({"_id": {"$oid": "aaaaaaaaaaaaaaaaaaaaaaaa"}}));
}

#[test]
fn test_numeric_object_id_is_rejected() {
    let mut query = json!({"_id": 33.3});
    let err = books().translator.parse_and_cast(&mut query).unwrap_err();
    assert_eq!(err.to_string(), "Invalid objectId");
}

#[test]
fn test_timestamp_is_cast_to_date() {
    let mut query = json!({"publishDate": 1517827514394_i64});
    books().translator.parse_and_cast(&mut query).unwrap();
    assert_eq!(query, json!({"publishDate": {"$date": "2018-02-05T10:45:14.394Z"}}));
}

#[test]
fn test_unknown_top_level_operator() {
    let mut query = json!({"position": [0, 0], "$foo": "x"});
    let err = books().translator.parse_and_cast(&mut query).unwrap_err();
    assert_eq!(err.to_string(), "Unknown operator: $foo");
}

#[test]
fn test_merge_expands_into_positional_keys() {
    let books = books();
    let mut commands = json!({"$set": {"attachments.$.merge": {"name": "renamed"}}});
    books
        .translator
        .parse_and_cast_commands(&mut commands, &all_fields(&books))
        .unwrap();
    assert_eq!(commands, json!({"$set": {"attachments.$.name": "renamed"}}));
}

#[test]
fn test_text_in_or_requires_indexed_siblings() {
    let books = books();
    let query = json!({"$or": [{"author": "X"}, {"$text": {"$search": "Y"}}]});
    let err = books
        .translator
        .parse_and_cast_text_search_query(&query, &BTreeSet::new())
        .unwrap_err();
    assert_eq!(err, CrudError::TextOrRequiresIndexes);

    // `author` leads a normal index in the fixture.
    assert!(books
        .translator
        .parse_and_cast_text_search_query(&query, &books.normal_indexed_fields)
        .is_ok());
}

#[test]
fn test_filter_casting_mutates_every_legal_operator() {
    let books = books();
    let cases: Vec<(&str, &str, Value, Value)> = vec![
        ("price", "$gt", json!(10), json!(10)),
        ("isPromoted", "$ne", json!(true), json!(true)),
        ("author", "$in", json!(["a", "b"]), json!(["a", "b"])),
        (
            "authorAddressId",
            "$eq",
            json!("bbbbbbbbbbbbbbbbbbbbbbbb"),
            json!({"$oid": "bbbbbbbbbbbbbbbbbbbbbbbb"}),
        ),
        (
            "publishDate",
            "$nin",
            json!([0]),
            json!([{"$date": "1970-01-01T00:00:00.000Z"}]),
        ),
        ("tags", "$exists", json!(false), json!(false)),
    ];
    for (field, operator, input, expected) in cases {
        let mut query = json!({ field: { operator: input } });
        books.translator.parse_and_cast(&mut query).unwrap();
        assert_eq!(query, json!({ field: { operator: expected } }), "{} {}", field, operator);
    }
}

#[test]
fn test_legality_matrix_rejections() {
    let books = books();
    let cases = [
        ("tags", "$all", json!(["a"]), "Array"),
        ("position", "$gt", json!([0, 0]), "GeoPoint"),
        ("metadata", "$regex", json!("x"), "RawObject"),
        ("isPromoted", "$nearSphere", json!({"from": [0, 0]}), "boolean"),
        ("publishDate", "$elemMatch", json!({}), "Date"),
    ];
    for (field, operator, operand, type_name) in cases {
        let mut query = json!({ field: { operator: operand } });
        let err = books.translator.parse_and_cast(&mut query).unwrap_err();
        assert_eq!(
            err.to_string(),
            format!("Unsupported operator: {} for {} field", operator, type_name)
        );
    }
}

#[test]
fn test_numeric_path_segments_resolve_against_array_items() {
    let books = books();
    let mut query = json!({"attachments.3.detail.size": {"$gte": 10}, "metadata.somethingArrayObject.0.anotherNumber": 2});
    books.translator.parse_and_cast(&mut query).unwrap();

    let mut unknown = json!({"attachments.3.nope": 1});
    assert!(books.translator.parse_and_cast(&mut unknown).is_ok());

    let mut wrong_root = json!({"up2you.1": 1});
    assert_eq!(
        books.translator.parse_and_cast(&mut wrong_root).unwrap_err().to_string(),
        "Unknown field: up2you.1"
    );
}

#[test]
fn test_write_protection_is_independent_of_type() {
    let books = books();
    let editable: BTreeSet<String> = ["price".to_string()].into_iter().collect();
    for field in ["name", "publishDate", "metadata.somethingNumber", "tags"] {
        let mut commands = json!({"$set": { field: Value::Null }});
        let err = books
            .translator
            .parse_and_cast_commands(&mut commands, &editable)
            .unwrap_err();
        let root = field.split('.').next().unwrap();
        assert_eq!(err.to_string(), format!("You cannot edit \"{}\" field", root));
    }
}

#[test]
fn test_nested_array_operators() {
    let books = books();
    let mut commands = json!({
        "$set": {
            "metadata.somethingArrayObject.$.replace": {"arrayItemObjectChildNumber": 1},
            "metadata.somethingArrayOfNumbers.$.replace": 7
        }
    });
    books
        .translator
        .parse_and_cast_commands(&mut commands, &all_fields(&books))
        .unwrap();
    assert_eq!(
        commands,
        json!({
            "$set": {
                "metadata.somethingArrayObject.$": {"arrayItemObjectChildNumber": 1},
                "metadata.somethingArrayOfNumbers.$": 7
            }
        })
    );
}

#[test]
fn test_json_schema_shaped_definition() {
    let products = registry().get("products").unwrap();
    let mut query = json!({
        "releasedOn": "2021-06-01",
        "supplierId": {"$in": ["cccccccccccccccccccccccc"]},
        "variants.2.color": "red",
        "specs.anything": {"$exists": true}
    });
    products.translator.parse_and_cast(&mut query).unwrap();
    assert_eq!(
        query,
        json!({
            "releasedOn": {"$date": "2021-06-01T00:00:00.000Z"},
            "supplierId": {"$in": [{"$oid": "cccccccccccccccccccccccc"}]},
            "variants.2.color": "red",
            "specs.anything": {"$exists": true}
        })
    );

    let mut commands = json!({"$push": {"variants": {"color": "blue"}}, "$inc": {"stock": -1}});
    products
        .translator
        .parse_and_cast_commands(&mut commands, &products.editable_fields())
        .unwrap();
    assert_eq!(commands, json!({"$push": {"variants": {"color": "blue"}}, "$inc": {"stock": -1}}));
}

#[test]
fn test_collection_without_text_index_rejects_text_search() {
    let products = registry().get("products").unwrap();
    let query = json!({"$text": {"$search": "shoe"}});
    assert_eq!(
        products
            .translator
            .parse_and_cast_text_search_query(&query, &products.normal_indexed_fields),
        Err(CrudError::MissingTextIndex("products".to_string()))
    );
}
