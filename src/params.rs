//! Conversion of typed tool inputs into query strings and request bodies.
//!
//! One rule for every entity: excluded keys (the `action` discriminant and
//! routing fields already consumed by the URL) and null values are dropped.
//! For string encodings (query, form) arrays are comma-joined and objects are
//! JSON-stringified. JSON bodies keep nested values as-is, except label lists,
//! which GitLab takes as one comma-separated string in every encoding.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::Result;
use crate::gitlab::Payload;

/// Fields holding label names.
const LABEL_FIELDS: &[&str] = &["labels", "add_labels", "remove_labels"];

/// Target encoding of a request body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Form,
    Json,
}

/// Filters and flattens an input object into a map of primitives.
///
/// Non-object inputs yield an empty map.
pub fn to_query(input: &Value, excluded: &[&str]) -> Map<String, Value> {
    filtered(input, excluded)
        .filter_map(|(key, value)| flatten(value).map(|v| (key.clone(), v)))
        .collect()
}

/// Same filtering as [`to_query`]; only label lists are flattened.
pub fn to_json_body(input: &Value, excluded: &[&str]) -> Map<String, Value> {
    filtered(input, excluded)
        .filter_map(|(key, value)| {
            let value = if LABEL_FIELDS.contains(&key.as_str()) {
                flatten(value)?
            } else {
                value.clone()
            };
            Some((key.clone(), value))
        })
        .collect()
}

fn filtered<'a>(
    input: &'a Value,
    excluded: &'a [&'a str],
) -> impl Iterator<Item = (&'a String, &'a Value)> + 'a {
    input
        .as_object()
        .into_iter()
        .flat_map(|map| map.iter())
        .filter(move |(key, value)| !value.is_null() && !excluded.contains(&key.as_str()))
}

fn flatten(value: &Value) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::Array(items) => {
            let joined = items
                .iter()
                .filter(|item| !item.is_null())
                .map(scalar_string)
                .collect::<Vec<_>>()
                .join(",");
            Some(Value::String(joined))
        }
        Value::Object(_) => Some(Value::String(value.to_string())),
        scalar => Some(scalar.clone()),
    }
}

fn scalar_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Renders a flattened map as ordered key/value string pairs.
pub fn to_pairs(map: &Map<String, Value>) -> Vec<(String, String)> {
    map.iter()
        .map(|(key, value)| (key.clone(), scalar_string(value)))
        .collect()
}

/// Serializes a typed input and builds query pairs from it.
pub fn query_pairs<T: Serialize>(input: &T, excluded: &[&str]) -> Result<Vec<(String, String)>> {
    let value = serde_json::to_value(input)?;
    Ok(to_pairs(&to_query(&value, excluded)))
}

/// Serializes a typed input into a request body of the given encoding.
pub fn payload<T: Serialize>(input: &T, excluded: &[&str], encoding: Encoding) -> Result<Payload> {
    let value = serde_json::to_value(input)?;
    Ok(match encoding {
        Encoding::Form => Payload::Form(to_pairs(&to_query(&value, excluded))),
        Encoding::Json => Payload::Json(Value::Object(to_json_body(&value, excluded))),
    })
}
