//! Composition rules for `$text` full-text search queries.

use serde_json::Value;
use std::collections::BTreeSet;

use crate::error::{CrudError, Result};

pub const TEXT_OPERATOR: &str = "$text";

const TEXT_OPTIONS: [&str; 4] = ["$search", "$language", "$caseSensitive", "$diacriticSensitive"];

fn count_text_clauses(value: &Value) -> usize {
    match value {
        Value::Object(map) => map
            .iter()
            .map(|(key, child)| usize::from(key == TEXT_OPERATOR) + count_text_clauses(child))
            .sum(),
        Value::Array(items) => items.iter().map(count_text_clauses).sum(),
        _ => 0,
    }
}

/// Whether `$text` appears anywhere in the query.
pub fn is_text_search_query(query: &Value) -> bool {
    count_text_clauses(query) > 0
}

/// Checks every `$text` rule; the query itself is left untouched.
pub fn validate_text_search(query: &Value, normal_indexed_fields: &BTreeSet<String>) -> Result<()> {
    if count_text_clauses(query) > 1 {
        return Err(CrudError::MultipleTextClauses);
    }
    check_node(query, normal_indexed_fields)
}

fn check_node(value: &Value, indexed: &BTreeSet<String>) -> Result<()> {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                match key.as_str() {
                    TEXT_OPERATOR => check_text_block(child)?,
                    "$nor" | "$elemMatch" => {
                        if is_text_search_query(child) {
                            return Err(CrudError::TextNotAllowedIn(key.clone()));
                        }
                    }
                    "$or" => {
                        check_or_clauses(child, indexed)?;
                        check_node(child, indexed)?;
                    }
                    _ => check_node(child, indexed)?,
                }
            }
            Ok(())
        }
        Value::Array(items) => items.iter().try_for_each(|item| check_node(item, indexed)),
        _ => Ok(()),
    }
}

fn check_text_block(block: &Value) -> Result<()> {
    let options = block.as_object().ok_or(CrudError::TextMissingSearch)?;
    if let Some(unknown) = options.keys().find(|k| !TEXT_OPTIONS.contains(&k.as_str())) {
        return Err(CrudError::UnsupportedTextOption(unknown.clone()));
    }
    if !options.contains_key("$search") {
        return Err(CrudError::TextMissingSearch);
    }
    Ok(())
}

// The store can only plan an `$or` holding a text clause when every other
// clause is served by an index.
fn check_or_clauses(clauses: &Value, indexed: &BTreeSet<String>) -> Result<()> {
    let Some(clauses) = clauses.as_array() else {
        return Ok(());
    };
    if !clauses.iter().any(is_text_search_query) {
        return Ok(());
    }
    let all_indexed = clauses
        .iter()
        .filter_map(Value::as_object)
        .flat_map(|clause| clause.keys())
        .all(|key| key.starts_with('$') || indexed.contains(key));
    if all_indexed {
        Ok(())
    } else {
        Err(CrudError::TextOrRequiresIndexes)
    }
}
