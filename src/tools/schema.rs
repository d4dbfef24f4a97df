//! Client-facing input schemas for action-discriminated tools.

use serde_json::{json, Map, Value};

use super::validation::CompiledAction;
use crate::config::SchemaMode;

pub fn render(actions: &[CompiledAction], mode: SchemaMode) -> Map<String, Value> {
    let value = match mode {
        SchemaMode::Discriminated => discriminated(actions),
        SchemaMode::Flat => flat(actions),
    };
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn action_names(actions: &[CompiledAction]) -> Vec<&'static str> {
    actions.iter().map(|a| a.name).collect()
}

/// One `oneOf` branch per action, each pinning `action` to a constant.
fn discriminated(actions: &[CompiledAction]) -> Value {
    let branches: Vec<Value> = actions
        .iter()
        .map(|action| {
            let mut properties = Map::new();
            properties.insert("action".to_string(), json!({ "const": action.name }));
            properties.extend(action.properties().clone());

            let mut required = vec![Value::from("action")];
            required.extend(action.required().iter().cloned().map(Value::from));

            json!({
                "type": "object",
                "description": action.description,
                "properties": properties,
                "required": required,
                "additionalProperties": false,
            })
        })
        .collect();

    json!({
        "type": "object",
        "properties": {
            "action": {
                "type": "string",
                "enum": action_names(actions),
                "description": "Operation to perform",
            }
        },
        "required": ["action"],
        "oneOf": branches,
    })
}

/// A single object holding the union of every action's fields.
///
/// Only `action` is required; each field's description says which actions use it.
fn flat(actions: &[CompiledAction]) -> Value {
    let mut properties = Map::new();
    let mut used_by: Vec<(String, Vec<&'static str>)> = Vec::new();

    for action in actions {
        for (field, schema) in action.properties() {
            if !properties.contains_key(field) {
                properties.insert(field.clone(), schema.clone());
                used_by.push((field.clone(), Vec::new()));
            }
            if let Some((_, names)) = used_by.iter_mut().find(|(f, _)| f == field) {
                names.push(action.name);
            }
        }
    }

    for (field, names) in used_by {
        if names.len() == actions.len() {
            continue;
        }
        if let Some(Value::Object(schema)) = properties.get_mut(&field) {
            let note = format!("Used by: {}.", names.join(", "));
            let description = match schema.get("description").and_then(Value::as_str) {
                Some(existing) => format!("{} {}", existing, note),
                None => note,
            };
            schema.insert("description".to_string(), Value::from(description));
        }
    }

    let summary = actions
        .iter()
        .map(|a| format!("{} ({})", a.name, a.description))
        .collect::<Vec<_>>()
        .join("; ");
    let mut all = Map::new();
    all.insert(
        "action".to_string(),
        json!({
            "type": "string",
            "enum": action_names(actions),
            "description": format!("Operation to perform: {}", summary),
        }),
    );
    all.extend(properties);

    json!({
        "type": "object",
        "properties": all,
        "required": ["action"],
    })
}
