//! Action-aware input validation.
//!
//! Every problem with an input is collected before anything is reported, so a
//! caller sees all failing fields of a call at once.

use std::collections::BTreeMap;

use schemars::generate::SchemaSettings;
use schemars::JsonSchema;
use serde_json::{Map, Value};

use crate::error::{FieldIssue, GitlabMcpError, Result};
use crate::identifier;

/// Fields holding a project/group reference; checked for identifier format.
const IDENTIFIER_FIELDS: &[&str] = &["namespace", "project_id"];

/// JSON Schema of one action's input.
#[derive(Debug, Clone)]
pub struct ActionSchema {
    pub name: &'static str,
    pub description: &'static str,
    pub schema: Value,
}

impl ActionSchema {
    pub fn of<T: JsonSchema>(name: &'static str, description: &'static str) -> Self {
        let generator = SchemaSettings::draft2020_12()
            .with(|s| s.inline_subschemas = true)
            .into_generator();
        let mut schema = generator.into_root_schema_for::<T>().to_value();
        if let Some(map) = schema.as_object_mut() {
            map.remove("$schema");
            map.remove("title");
        }
        Self {
            name,
            description,
            schema,
        }
    }
}

pub struct CompiledAction {
    pub name: &'static str,
    pub description: &'static str,
    properties: Map<String, Value>,
    required: Vec<String>,
    validators: BTreeMap<String, jsonschema::Validator>,
}

impl CompiledAction {
    fn compile(tool: &str, action: ActionSchema) -> Result<Self> {
        let properties = action
            .schema
            .get("properties")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        let required = action
            .schema
            .get("required")
            .and_then(Value::as_array)
            .map(|fields| {
                fields
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let mut validators = BTreeMap::new();
        for (field, schema) in &properties {
            let validator = jsonschema::validator_for(schema).map_err(|e| {
                GitlabMcpError::Schema(format!(
                    "{}.{}.{}: {}",
                    tool, action.name, field, e
                ))
            })?;
            validators.insert(field.clone(), validator);
        }

        Ok(Self {
            name: action.name,
            description: action.description,
            properties,
            required,
            validators,
        })
    }

    /// Field schemas, excluding the `action` discriminator.
    pub fn properties(&self) -> &Map<String, Value> {
        &self.properties
    }

    pub fn required(&self) -> &[String] {
        &self.required
    }

    pub fn accepts(&self, field: &str) -> bool {
        self.validators.contains_key(field)
    }
}

pub struct InputValidator {
    tool: &'static str,
    actions: Vec<CompiledAction>,
}

impl InputValidator {
    pub fn new(tool: &'static str, actions: Vec<ActionSchema>) -> Result<Self> {
        let actions = actions
            .into_iter()
            .map(|a| CompiledAction::compile(tool, a))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { tool, actions })
    }

    pub fn actions(&self) -> &[CompiledAction] {
        &self.actions
    }

    fn action_names(&self) -> String {
        self.actions
            .iter()
            .map(|a| a.name)
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn fail(&self, issues: Vec<FieldIssue>) -> GitlabMcpError {
        GitlabMcpError::validation(self.tool, issues)
    }

    /// Checks `args` against the schema of the action it names.
    pub fn validate(&self, args: &Value) -> Result<&CompiledAction> {
        let Some(fields) = args.as_object() else {
            return Err(self.fail(vec![FieldIssue::root("expected a JSON object")]));
        };

        let name = match fields.get("action") {
            None | Some(Value::Null) => {
                return Err(self.fail(vec![FieldIssue::new(
                    "action",
                    format!("required; expected one of: {}", self.action_names()),
                )]))
            }
            Some(Value::String(name)) => name,
            Some(other) => {
                return Err(self.fail(vec![FieldIssue::new(
                    "action",
                    format!("expected a string, got {}", other),
                )]))
            }
        };
        let Some(action) = self.actions.iter().find(|a| a.name == name) else {
            return Err(self.fail(vec![FieldIssue::new(
                "action",
                format!("unknown action '{}'; expected one of: {}", name, self.action_names()),
            )]));
        };

        let mut issues = Vec::new();
        for field in &action.required {
            if fields.get(field).map_or(true, Value::is_null) {
                issues.push(FieldIssue::new(
                    field,
                    format!("required for action '{}'", action.name),
                ));
            }
        }

        for (field, value) in fields {
            if field == "action" || value.is_null() {
                continue;
            }
            let Some(validator) = action.validators.get(field) else {
                issues.push(FieldIssue::new(
                    field,
                    format!("not accepted by action '{}'", action.name),
                ));
                continue;
            };
            let before = issues.len();
            for error in validator.iter_errors(value) {
                issues.push(FieldIssue::new(field, error.to_string()));
            }
            if issues.len() == before && IDENTIFIER_FIELDS.contains(&field.as_str()) {
                if let Some(Err(reason)) = value.as_str().map(identifier::validate) {
                    issues.push(FieldIssue::new(field, reason));
                }
            }
        }

        if issues.is_empty() {
            Ok(action)
        } else {
            Err(self.fail(issues))
        }
    }
}
