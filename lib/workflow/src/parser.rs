//! Parsing raw, untrusted workflow exports into [`WorkflowDefinition`]s.
//!
//! Two layouts are accepted:
//! - a resource envelope (`name`, `id`, `location`, `tags`, `properties`
//!   holding `state`, timestamps, `definition` and `parameters`);
//! - a bare definition with `triggers` and `actions` at the top level.
//!
//! Mapping order is significant: `serde_json` is built with
//! `preserve_order`, and the position of each trigger/step in its mapping
//! becomes its declaration index.

use crate::definition::{ConnectionRef, WorkflowDefinition, WorkflowMetadata, WorkflowState};
use crate::error::{DefinitionError, json_kind};
use crate::step::{ActionStep, RunAfter, Scope, StepBody, StepType, SwitchCase};
use crate::trigger::{Recurrence, Trigger};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value as JsonValue};
use std::collections::BTreeMap;
use tracing::debug;

type JsonMap = Map<String, JsonValue>;

const CONNECTIONS_PARAMETER: &str = "$connections";

/// Identity hints supplied by the source alongside the raw payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseHints<'a> {
    /// Used when the payload carries no name (e.g. the export's file stem).
    pub name: Option<&'a str>,
    /// Used when the payload carries no resource group.
    pub scope_id: Option<&'a str>,
}

/// Parses one raw workflow export.
///
/// # Errors
///
/// Returns a [`DefinitionError`] if the payload is not an object, a section
/// has the wrong shape, or a trigger/step lacks a usable name or type.
pub fn parse_workflow(
    raw: &JsonValue,
    hints: &ParseHints<'_>,
) -> Result<WorkflowDefinition, DefinitionError> {
    let root = raw
        .as_object()
        .ok_or(DefinitionError::NotAMapping { found: json_kind(raw) })?;

    let properties = optional_map(root.get("properties"), "properties")?;
    let (definition, parameters) = match properties {
        Some(properties) => (
            optional_map(properties.get("definition"), "definition")?,
            optional_map(properties.get("parameters"), "parameters")?,
        ),
        None => (Some(root), optional_map(root.get("parameters"), "parameters")?),
    };

    let name = string_field(root, "name")
        .or_else(|| hints.name.map(str::to_string))
        .filter(|name| !name.is_empty())
        .ok_or(DefinitionError::MissingName)?;

    let scope_id = string_field(root, "resourceGroup")
        .or_else(|| string_field(root, "id").and_then(|id| resource_group_from_id(&id)))
        .or_else(|| hints.scope_id.map(str::to_string))
        .unwrap_or_default();

    let metadata = parse_metadata(root, properties)?;

    let (triggers, actions) = match definition {
        Some(definition) => (
            parse_triggers(optional_map(definition.get("triggers"), "triggers")?)?,
            parse_scope(definition.get("actions"), "actions")?,
        ),
        None => (Vec::new(), Scope::default()),
    };

    let (connections, parameters) = split_parameters(parameters);

    let workflow = WorkflowDefinition {
        name,
        scope_id,
        metadata,
        triggers,
        actions,
        connections,
        parameters,
    };

    debug!(
        workflow = %workflow.name,
        scope = %workflow.scope_id,
        triggers = workflow.trigger_count(),
        actions = workflow.action_count(),
        "parsed workflow definition"
    );

    Ok(workflow)
}

/// Extracts the resource group from an ARM resource id.
///
/// `/subscriptions/s/resourceGroups/rg-prod/providers/...` yields `rg-prod`.
#[must_use]
pub fn resource_group_from_id(id: &str) -> Option<String> {
    let mut segments = id.split('/');
    segments
        .by_ref()
        .find(|segment| segment.eq_ignore_ascii_case("resourcegroups"))?;
    segments
        .next()
        .filter(|rg| !rg.is_empty())
        .map(str::to_string)
}

fn parse_metadata(
    root: &JsonMap,
    properties: Option<&JsonMap>,
) -> Result<WorkflowMetadata, DefinitionError> {
    let mut metadata = WorkflowMetadata {
        location: string_field(root, "location"),
        tags: parse_tags(optional_map(root.get("tags"), "tags")?),
        ..WorkflowMetadata::default()
    };

    if let Some(properties) = properties {
        metadata.state = string_field(properties, "state")
            .map(|state| WorkflowState::from_raw(&state))
            .unwrap_or(WorkflowState::Unknown);
        metadata.created_at = timestamp_field(properties, "createdTime");
        metadata.changed_at = timestamp_field(properties, "changedTime");
        metadata.version = string_field(properties, "version");
        metadata.endpoint = string_field(properties, "accessEndpoint");
    }

    Ok(metadata)
}

fn parse_tags(tags: Option<&JsonMap>) -> BTreeMap<String, String> {
    tags.into_iter()
        .flatten()
        .map(|(key, value)| (key.clone(), scalar_text(value)))
        .collect()
}

fn parse_triggers(triggers: Option<&JsonMap>) -> Result<Vec<Trigger>, DefinitionError> {
    triggers
        .into_iter()
        .flatten()
        .enumerate()
        .map(|(index, (name, body))| parse_trigger(name, body, index))
        .collect()
}

fn parse_trigger(name: &str, body: &JsonValue, index: usize) -> Result<Trigger, DefinitionError> {
    let body = step_object(name, body)?;
    let trigger_type = step_type_field(name, body)?;

    let recurrence = body
        .get("recurrence")
        .and_then(JsonValue::as_object)
        .and_then(|recurrence| {
            let interval = match recurrence.get("interval")? {
                JsonValue::Number(n) => n.as_u64()?,
                JsonValue::String(s) => s.trim().parse().ok()?,
                _ => return None,
            };
            let frequency = string_field(recurrence, "frequency")?;
            Some(Recurrence {
                interval,
                frequency,
            })
        });

    Ok(Trigger {
        name: name.to_string(),
        trigger_type: trigger_type.to_string(),
        declaration_index: index,
        recurrence,
        configuration: body.get("inputs").cloned(),
    })
}

/// Parses a scope from an optional `actions` mapping.
fn parse_scope(actions: Option<&JsonValue>, section: &str) -> Result<Scope, DefinitionError> {
    let steps = optional_map(actions, section)?
        .into_iter()
        .flatten()
        .enumerate()
        .map(|(index, (name, body))| parse_step(name, body, index))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Scope::new(steps))
}

fn parse_step(name: &str, body: &JsonValue, index: usize) -> Result<ActionStep, DefinitionError> {
    let object = step_object(name, body)?;
    let step_type = StepType::from_raw(step_type_field(name, object)?);

    let body = match step_type {
        StepType::Condition => StepBody::Condition {
            if_true: parse_scope(object.get("actions"), &format!("{name}/actions"))?,
            if_false: parse_branch(object.get("else"), &format!("{name}/else"))?,
        },
        StepType::Switch => {
            let section = format!("{name}/cases");
            let cases = optional_map(object.get("cases"), &section)?
                .into_iter()
                .flatten()
                .map(|(case_name, case)| parse_case(&section, case_name, case))
                .collect::<Result<Vec<_>, _>>()?;
            StepBody::Switch {
                cases,
                default: parse_branch(object.get("default"), &format!("{name}/default"))?,
            }
        }
        StepType::Foreach | StepType::Until => StepBody::Loop {
            body: parse_scope(object.get("actions"), &format!("{name}/actions"))?,
        },
        _ => StepBody::Simple,
    };

    Ok(ActionStep {
        name: name.to_string(),
        step_type,
        declaration_index: index,
        run_after: parse_run_after(name, object.get("runAfter"))?,
        inputs: object.get("inputs").cloned(),
        body,
    })
}

/// Parses `{ "actions": { ... } }` wrappers used by `else` and `default`.
fn parse_branch(branch: Option<&JsonValue>, section: &str) -> Result<Scope, DefinitionError> {
    match optional_map(branch, section)? {
        Some(branch) => parse_scope(branch.get("actions"), &format!("{section}/actions")),
        None => Ok(Scope::default()),
    }
}

fn parse_case(section: &str, name: &str, case: &JsonValue) -> Result<SwitchCase, DefinitionError> {
    let section = format!("{section}/{name}");
    let case = case.as_object().ok_or_else(|| DefinitionError::InvalidSection {
        section: section.clone(),
        expected: "an object",
        found: json_kind(case),
    })?;

    let value = match case.get("case") {
        None | Some(JsonValue::Null) => name.to_string(),
        Some(value) => scalar_text(value),
    };

    Ok(SwitchCase {
        name: name.to_string(),
        value,
        scope: parse_scope(case.get("actions"), &format!("{section}/actions"))?,
    })
}

fn parse_run_after(name: &str, value: Option<&JsonValue>) -> Result<Vec<RunAfter>, DefinitionError> {
    match value {
        None | Some(JsonValue::Null) => Ok(Vec::new()),
        Some(JsonValue::Object(map)) => Ok(map
            .iter()
            .map(|(step, statuses)| RunAfter {
                step: step.clone(),
                statuses: statuses
                    .as_array()
                    .map(|list| list.iter().map(scalar_text).collect())
                    .unwrap_or_default(),
            })
            .collect()),
        Some(JsonValue::Array(list)) => list
            .iter()
            .map(|entry| {
                entry
                    .as_str()
                    .map(RunAfter::succeeded)
                    .ok_or_else(|| DefinitionError::InvalidStep {
                        name: name.to_string(),
                        reason: format!("runAfter entries must be strings, found {}", json_kind(entry)),
                    })
            })
            .collect(),
        Some(other) => Err(DefinitionError::InvalidSection {
            section: format!("{name}/runAfter"),
            expected: "an object or an array",
            found: json_kind(other),
        }),
    }
}

/// Splits raw parameters into `$connections` entries and the rest.
fn split_parameters(
    parameters: Option<&JsonMap>,
) -> (Vec<ConnectionRef>, BTreeMap<String, JsonValue>) {
    let mut connections = Vec::new();
    let mut rest = BTreeMap::new();

    for (name, value) in parameters.into_iter().flatten() {
        if name == CONNECTIONS_PARAMETER {
            connections = parse_connections(value);
        } else {
            rest.insert(name.clone(), value.clone());
        }
    }

    (connections, rest)
}

fn parse_connections(value: &JsonValue) -> Vec<ConnectionRef> {
    // Deployed exports wrap the map in `value`; bare definitions use `defaultValue`.
    let entries = value
        .get("value")
        .or_else(|| value.get("defaultValue"))
        .unwrap_or(value);

    let mut connections: Vec<ConnectionRef> = entries
        .as_object()
        .into_iter()
        .flatten()
        .map(|(name, entry)| {
            let mut properties: BTreeMap<String, JsonValue> = entry
                .as_object()
                .into_iter()
                .flatten()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            let connection_id = properties
                .remove("connectionId")
                .and_then(|v| v.as_str().map(str::to_string));
            let connection_name = properties
                .remove("connectionName")
                .and_then(|v| v.as_str().map(str::to_string));
            ConnectionRef {
                name: name.clone(),
                connection_id,
                connection_name,
                properties,
            }
        })
        .collect();

    connections.sort_by(|a, b| a.name.cmp(&b.name));
    connections
}

fn optional_map<'a>(
    value: Option<&'a JsonValue>,
    section: &str,
) -> Result<Option<&'a JsonMap>, DefinitionError> {
    match value {
        None | Some(JsonValue::Null) => Ok(None),
        Some(JsonValue::Object(map)) => Ok(Some(map)),
        Some(other) => Err(DefinitionError::InvalidSection {
            section: section.to_string(),
            expected: "an object",
            found: json_kind(other),
        }),
    }
}

fn step_object<'a>(name: &str, body: &'a JsonValue) -> Result<&'a JsonMap, DefinitionError> {
    if name.trim().is_empty() {
        return Err(DefinitionError::InvalidStep {
            name: String::new(),
            reason: "name is empty".to_string(),
        });
    }
    body.as_object().ok_or_else(|| DefinitionError::InvalidStep {
        name: name.to_string(),
        reason: format!("body must be an object, found {}", json_kind(body)),
    })
}

fn step_type_field<'a>(name: &str, body: &'a JsonMap) -> Result<&'a str, DefinitionError> {
    body.get("type")
        .and_then(JsonValue::as_str)
        .filter(|kind| !kind.trim().is_empty())
        .ok_or_else(|| DefinitionError::InvalidStep {
            name: name.to_string(),
            reason: "missing type".to_string(),
        })
}

fn string_field(map: &JsonMap, key: &str) -> Option<String> {
    map.get(key).and_then(JsonValue::as_str).map(str::to_string)
}

fn timestamp_field(map: &JsonMap, key: &str) -> Option<DateTime<Utc>> {
    map.get(key)
        .and_then(JsonValue::as_str)
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|ts| ts.with_timezone(&Utc))
}

/// Renders a scalar as plain text (strings unquoted).
fn scalar_text(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::Branch;
    use serde_json::json;

    fn parse(raw: JsonValue) -> Result<WorkflowDefinition, DefinitionError> {
        parse_workflow(
            &raw,
            &ParseHints {
                name: Some("hinted"),
                scope_id: None,
            },
        )
    }

    #[test]
    fn parses_envelope_metadata() {
        let raw = json!({
            "name": "order-sync",
            "id": "/subscriptions/abc/resourceGroups/rg-prod/providers/Microsoft.Logic/workflows/order-sync",
            "location": "westeurope",
            "tags": { "team": "ops", "cost": 12 },
            "properties": {
                "state": "Enabled",
                "createdTime": "2024-01-02T03:04:05Z",
                "changedTime": "not a timestamp",
                "version": "08584",
                "accessEndpoint": "https://example.invalid/workflows/x",
                "definition": { "triggers": {}, "actions": {} }
            }
        });

        let workflow = parse(raw).expect("parse");
        assert_eq!(workflow.name, "order-sync");
        assert_eq!(workflow.scope_id, "rg-prod");
        assert_eq!(workflow.metadata.state, WorkflowState::Enabled);
        assert_eq!(workflow.metadata.location.as_deref(), Some("westeurope"));
        assert!(workflow.metadata.created_at.is_some());
        assert!(workflow.metadata.changed_at.is_none());
        assert_eq!(workflow.metadata.tags.get("cost").map(String::as_str), Some("12"));
        assert_eq!(workflow.trigger_count(), 0);
        assert_eq!(workflow.action_count(), 0);
    }

    #[test]
    fn bare_definition_uses_hints() {
        let workflow = parse(json!({ "triggers": {}, "actions": {} })).expect("parse");
        assert_eq!(workflow.name, "hinted");
        assert_eq!(workflow.scope_id, "");
        assert_eq!(workflow.metadata.state, WorkflowState::Unknown);
    }

    #[test]
    fn declaration_order_is_preserved() {
        let workflow = parse(json!({
            "actions": {
                "Zeta": { "type": "Compose" },
                "Alpha": { "type": "Compose", "runAfter": { "Zeta": ["Succeeded"] } },
                "Mid": { "type": "Http" }
            }
        }))
        .expect("parse");

        let names: Vec<_> = workflow
            .actions
            .steps
            .iter()
            .map(|s| (s.name.as_str(), s.declaration_index))
            .collect();
        assert_eq!(names, vec![("Zeta", 0), ("Alpha", 1), ("Mid", 2)]);
        assert_eq!(workflow.actions.steps[1].run_after, vec![RunAfter::succeeded("Zeta")]);
    }

    #[test]
    fn unknown_type_maps_to_other() {
        let workflow = parse(json!({
            "actions": { "Wrap": { "type": "Scope", "actions": { "Inner": { "type": "Compose" } } } }
        }))
        .expect("parse");
        assert_eq!(
            workflow.actions.steps[0].step_type,
            StepType::Other("Scope".to_string())
        );
        assert_eq!(workflow.actions.steps[0].body, StepBody::Simple);
    }

    #[test]
    fn parses_nested_control_flow() {
        let workflow = parse(json!({
            "actions": {
                "Check": {
                    "type": "If",
                    "expression": {},
                    "actions": { "X": { "type": "Compose" } },
                    "else": { "actions": { "Y": { "type": "Compose" } } }
                },
                "Route": {
                    "type": "Switch",
                    "cases": {
                        "Case_EU": { "case": "eu", "actions": { "Eu": { "type": "Http" } } },
                        "Case_7": { "case": 7, "actions": {} }
                    },
                    "default": { "actions": { "Fallback": { "type": "Terminate" } } },
                    "runAfter": { "Check": ["Succeeded", "Failed"] }
                },
                "Each": { "type": "Foreach", "actions": { "Item": { "type": "SetVariable" } } }
            }
        }))
        .expect("parse");

        assert_eq!(workflow.action_count(), 8);

        let check = &workflow.actions.steps[0];
        let branches = check.body.branches();
        assert_eq!(branches[0].0, Branch::True);
        assert_eq!(branches[0].1.steps[0].name, "X");
        assert_eq!(branches[1].1.steps[0].name, "Y");

        let route = &workflow.actions.steps[1];
        let labels: Vec<_> = route
            .body
            .branches()
            .iter()
            .map(|(b, _)| b.edge_label().map(str::to_string))
            .collect();
        assert_eq!(
            labels,
            vec![Some("eu".into()), Some("7".into()), Some("default".into())]
        );
        assert!(!route.run_after[0].is_default());

        let each = &workflow.actions.steps[2];
        assert!(matches!(each.body, StepBody::Loop { ref body } if body.steps.len() == 1));
    }

    #[test]
    fn condition_without_else_has_empty_false_branch() {
        let workflow = parse(json!({
            "actions": { "Check": { "type": "If", "actions": { "X": { "type": "Compose" } } } }
        }))
        .expect("parse");
        match &workflow.actions.steps[0].body {
            StepBody::Condition { if_false, .. } => assert!(if_false.is_empty()),
            other => panic!("unexpected body: {other:?}"),
        }
    }

    #[test]
    fn run_after_array_form() {
        let workflow = parse(json!({
            "actions": {
                "A": { "type": "Compose" },
                "B": { "type": "Compose", "runAfter": ["A"] }
            }
        }))
        .expect("parse");
        assert_eq!(workflow.actions.steps[1].run_after, vec![RunAfter::succeeded("A")]);
    }

    #[test]
    fn parses_triggers_with_recurrence() {
        let workflow = parse(json!({
            "triggers": {
                "Every_hour": {
                    "type": "Recurrence",
                    "recurrence": { "interval": 1, "frequency": "Hour" }
                },
                "manual": { "type": "Request", "inputs": { "schema": {} } }
            }
        }))
        .expect("parse");

        assert_eq!(workflow.triggers.len(), 2);
        assert_eq!(
            workflow.triggers[0].recurrence,
            Some(Recurrence {
                interval: 1,
                frequency: "Hour".to_string()
            })
        );
        assert_eq!(workflow.triggers[1].declaration_index, 1);
        assert!(workflow.triggers[1].configuration.is_some());
    }

    #[test]
    fn parses_connections_and_parameters() {
        let workflow = parse(json!({
            "name": "wf",
            "properties": {
                "definition": {},
                "parameters": {
                    "$connections": {
                        "value": {
                            "office365": {
                                "connectionId": "/subscriptions/x/connections/office365",
                                "connectionName": "office365",
                                "id": "/providers/office365"
                            },
                            "azureblob": { "connectionId": "/blob" }
                        }
                    },
                    "region": { "value": "eu" }
                }
            }
        }))
        .expect("parse");

        let names: Vec<_> = workflow.connections.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["azureblob", "office365"]);
        let office = &workflow.connections[1];
        assert_eq!(office.connection_name.as_deref(), Some("office365"));
        assert!(office.properties.contains_key("id"));
        assert!(workflow.parameters.contains_key("region"));
        assert!(!workflow.parameters.contains_key("$connections"));
    }

    #[test]
    fn rejects_non_object_top_level() {
        let err = parse(json!([1, 2])).unwrap_err();
        assert_eq!(err, DefinitionError::NotAMapping { found: "an array" });
    }

    #[test]
    fn rejects_step_without_type() {
        let err = parse(json!({ "actions": { "A": { "inputs": {} } } })).unwrap_err();
        assert_eq!(
            err,
            DefinitionError::InvalidStep {
                name: "A".to_string(),
                reason: "missing type".to_string()
            }
        );
    }

    #[test]
    fn rejects_empty_step_name() {
        let err = parse(json!({ "actions": { "": { "type": "Compose" } } })).unwrap_err();
        assert!(matches!(err, DefinitionError::InvalidStep { ref name, .. } if name.is_empty()));
    }

    #[test]
    fn rejects_non_object_actions() {
        let err = parse(json!({ "actions": ["A"] })).unwrap_err();
        assert!(matches!(err, DefinitionError::InvalidSection { ref section, .. } if section == "actions"));
    }

    #[test]
    fn missing_name_without_hint() {
        let err = parse_workflow(&json!({ "actions": {} }), &ParseHints::default()).unwrap_err();
        assert_eq!(err, DefinitionError::MissingName);
    }

    #[test]
    fn resource_group_extraction() {
        assert_eq!(
            resource_group_from_id("/subscriptions/s/resourcegroups/rg-1/providers/p"),
            Some("rg-1".to_string())
        );
        assert_eq!(resource_group_from_id("/subscriptions/s"), None);
    }
}
