//! Workflow sources.
//!
//! A [`WorkflowSource`] lists raw workflow payloads together with their run
//! samples. [`FsWorkflowSource`] reads exported JSON files from a directory.

use crate::error::SourceError;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use flowscribe_core::Result;
use flowscribe_workflow::RunOutcomeSample;
use flowscribe_workflow::parser::resource_group_from_id;
use serde_json::Value as JsonValue;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument, warn};

const WORKFLOW_EXTENSION: &str = ".json";
const RUNS_SUFFIX: &str = ".runs.json";

/// What to list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceQuery {
    /// Runs older than this many days before `as_of` are dropped.
    pub lookback_days: u32,
    /// Only workflows in this resource group.
    pub scope: Option<String>,
    /// Only the workflow with this name.
    pub workflow: Option<String>,
    /// End of the lookback window.
    pub as_of: DateTime<Utc>,
}

impl SourceQuery {
    /// Query for every workflow, with the window ending now.
    #[must_use]
    pub fn new(lookback_days: u32) -> Self {
        Self {
            lookback_days,
            scope: None,
            workflow: None,
            as_of: Utc::now(),
        }
    }

    /// Restricts the query to one resource group.
    #[must_use]
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Restricts the query to one workflow.
    #[must_use]
    pub fn with_workflow(mut self, workflow: impl Into<String>) -> Self {
        self.workflow = Some(workflow.into());
        self
    }

    /// Returns true if a run started at `timestamp` falls inside the window.
    ///
    /// Runs without a timestamp are always kept.
    #[must_use]
    pub fn in_window(&self, timestamp: Option<DateTime<Utc>>) -> bool {
        let cutoff = self.as_of - Duration::days(i64::from(self.lookback_days));
        timestamp.is_none_or(|at| at >= cutoff)
    }

    /// Returns true if a workflow with this identity passes the filters.
    ///
    /// Names and scopes compare case-insensitively.
    #[must_use]
    pub fn matches(&self, name: &str, scope: &str) -> bool {
        let name_ok = self
            .workflow
            .as_deref()
            .is_none_or(|wanted| wanted.eq_ignore_ascii_case(name));
        let scope_ok = self
            .scope
            .as_deref()
            .is_none_or(|wanted| wanted.eq_ignore_ascii_case(scope));
        name_ok && scope_ok
    }
}

/// One raw workflow as delivered by a source.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowInput {
    /// Name to use when the payload has none.
    pub name_hint: String,
    /// Scope to use when the payload has none.
    pub scope_hint: Option<String>,
    /// Raw definition; `Null` when the export could not be decoded.
    pub payload: JsonValue,
    /// Raw run records inside the lookback window.
    pub runs: Vec<JsonValue>,
}

impl WorkflowInput {
    #[must_use]
    pub fn new(name_hint: impl Into<String>, payload: JsonValue) -> Self {
        Self {
            name_hint: name_hint.into(),
            scope_hint: None,
            payload,
            runs: Vec::new(),
        }
    }

    /// Sets the raw run records.
    #[must_use]
    pub fn with_runs(mut self, runs: Vec<JsonValue>) -> Self {
        self.runs = runs;
        self
    }
}

/// Lists raw workflows to document.
#[async_trait]
pub trait WorkflowSource: Send + Sync {
    /// Lists every workflow matching the query, with its windowed runs.
    async fn list(&self, query: &SourceQuery) -> Result<Vec<WorkflowInput>, SourceError>;
}

/// Reads workflow exports from a directory.
///
/// Every `*.json` file except `*.runs.json` is one workflow, read in file
/// name order. `<stem>.runs.json`, when present, holds the workflow's runs as
/// an array (or an object with a `value` array).
#[derive(Debug, Clone)]
pub struct FsWorkflowSource {
    root: PathBuf,
}

impl FsWorkflowSource {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The directory being read.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn workflow_files(&self) -> Result<Vec<(String, PathBuf)>, SourceError> {
        let unreadable = |err: std::io::Error| SourceError::DirectoryUnreadable {
            path: self.root.clone(),
            reason: err.to_string(),
        };

        let mut entries = tokio::fs::read_dir(&self.root).await.map_err(unreadable)?;
        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(unreadable)? {
            let Some(file_name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if file_name.ends_with(RUNS_SUFFIX) {
                continue;
            }
            let Some(stem) = file_name.strip_suffix(WORKFLOW_EXTENSION) else {
                continue;
            };
            let is_file = entry.file_type().await.is_ok_and(|kind| kind.is_file());
            if is_file && !stem.is_empty() {
                files.push((stem.to_string(), entry.path()));
            }
        }
        files.sort();
        Ok(files)
    }

    async fn read_runs(&self, stem: &str, query: &SourceQuery) -> Vec<JsonValue> {
        let path = self.root.join(format!("{stem}{RUNS_SUFFIX}"));
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "cannot read run history");
                return Vec::new();
            }
        };

        let records = match serde_json::from_slice::<JsonValue>(&bytes) {
            Ok(JsonValue::Array(records)) => records,
            Ok(JsonValue::Object(mut wrapper)) => match wrapper.remove("value") {
                Some(JsonValue::Array(records)) => records,
                _ => {
                    warn!(path = %path.display(), "run history has no 'value' array");
                    return Vec::new();
                }
            },
            Ok(_) => {
                warn!(path = %path.display(), "run history is not an array");
                return Vec::new();
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "run history is not valid JSON");
                return Vec::new();
            }
        };

        records
            .into_iter()
            .filter(|record| query.in_window(RunOutcomeSample::from_value(record).timestamp))
            .collect()
    }
}

#[async_trait]
impl WorkflowSource for FsWorkflowSource {
    #[instrument(skip(self, query), fields(root = %self.root.display()))]
    async fn list(&self, query: &SourceQuery) -> Result<Vec<WorkflowInput>, SourceError> {
        let mut inputs = Vec::new();
        for (stem, path) in self.workflow_files().await? {
            let bytes = tokio::fs::read(&path)
                .await
                .map_err(|err| SourceError::FileUnreadable {
                    path: path.clone(),
                    reason: err.to_string(),
                })?;

            let payload = serde_json::from_slice::<JsonValue>(&bytes).unwrap_or_else(|err| {
                warn!(path = %path.display(), error = %err, "workflow export is not valid JSON");
                JsonValue::Null
            });

            let (name, scope) = identity(&payload, &stem);
            if !query.matches(&name, &scope) {
                debug!(workflow = %name, scope = %scope, "filtered out");
                continue;
            }

            let runs = self.read_runs(&stem, query).await;
            inputs.push(WorkflowInput::new(stem, payload).with_runs(runs));
        }

        debug!(count = inputs.len(), "listed workflows");
        Ok(inputs)
    }
}

/// Name and resource group a payload will parse to, for filtering.
fn identity(payload: &JsonValue, stem: &str) -> (String, String) {
    let field = |key: &str| {
        payload
            .get(key)
            .and_then(JsonValue::as_str)
            .filter(|value| !value.is_empty())
    };
    let name = field("name").unwrap_or(stem).to_string();
    let scope = field("resourceGroup")
        .map(str::to_string)
        .or_else(|| field("id").and_then(resource_group_from_id))
        .unwrap_or_default();
    (name, scope)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn write(dir: &TempDir, file: &str, contents: &str) {
        std::fs::write(dir.path().join(file), contents).expect("write fixture");
    }

    fn as_of() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-06-30T00:00:00Z")
            .expect("timestamp")
            .with_timezone(&Utc)
    }

    fn query() -> SourceQuery {
        SourceQuery {
            as_of: as_of(),
            ..SourceQuery::new(30)
        }
    }

    #[tokio::test]
    async fn lists_workflows_in_file_name_order() {
        let dir = TempDir::new().expect("tempdir");
        write(&dir, "b.json", r#"{"name": "beta"}"#);
        write(&dir, "a.json", r#"{"name": "alpha"}"#);
        write(&dir, "a.runs.json", "[]");
        write(&dir, "notes.txt", "ignored");

        let inputs = FsWorkflowSource::new(dir.path())
            .list(&query())
            .await
            .expect("list");
        let stems: Vec<_> = inputs.iter().map(|i| i.name_hint.as_str()).collect();
        assert_eq!(stems, vec!["a", "b"]);
        assert_eq!(inputs[0].payload, json!({"name": "alpha"}));
    }

    #[tokio::test]
    async fn runs_are_windowed() {
        let dir = TempDir::new().expect("tempdir");
        write(&dir, "wf.json", r#"{"name": "wf"}"#);
        write(
            &dir,
            "wf.runs.json",
            r#"[
                {"properties": {"status": "Succeeded", "startTime": "2024-06-29T10:00:00Z"}},
                {"properties": {"status": "Failed", "startTime": "2024-01-01T10:00:00Z"}},
                {"status": "Running"}
            ]"#,
        );

        let inputs = FsWorkflowSource::new(dir.path())
            .list(&query())
            .await
            .expect("list");
        let statuses: Vec<_> = inputs[0]
            .runs
            .iter()
            .map(|run| RunOutcomeSample::from_value(run).status)
            .collect();
        assert_eq!(
            statuses,
            vec![
                flowscribe_workflow::RunStatus::Succeeded,
                flowscribe_workflow::RunStatus::Running,
            ]
        );
    }

    #[tokio::test]
    async fn run_history_may_be_wrapped() {
        let dir = TempDir::new().expect("tempdir");
        write(&dir, "wf.json", r#"{"name": "wf"}"#);
        write(&dir, "wf.runs.json", r#"{"value": [{"status": "Succeeded"}]}"#);

        let inputs = FsWorkflowSource::new(dir.path())
            .list(&query())
            .await
            .expect("list");
        assert_eq!(inputs[0].runs.len(), 1);
    }

    #[tokio::test]
    async fn invalid_json_becomes_null_payload() {
        let dir = TempDir::new().expect("tempdir");
        write(&dir, "broken.json", "{ not json");
        write(&dir, "broken.runs.json", "also not json");

        let inputs = FsWorkflowSource::new(dir.path())
            .list(&query())
            .await
            .expect("list");
        assert_eq!(inputs.len(), 1);
        assert_eq!(inputs[0].payload, JsonValue::Null);
        assert!(inputs[0].runs.is_empty());
    }

    #[tokio::test]
    async fn filters_by_scope_and_name() {
        let dir = TempDir::new().expect("tempdir");
        write(
            &dir,
            "one.json",
            r#"{"name": "orders", "id": "/subscriptions/s/resourceGroups/rg-prod/providers/Microsoft.Logic/workflows/orders"}"#,
        );
        write(&dir, "two.json", r#"{"name": "billing", "resourceGroup": "rg-dev"}"#);

        let source = FsWorkflowSource::new(dir.path());
        let by_scope = source
            .list(&query().with_scope("RG-PROD"))
            .await
            .expect("list");
        assert_eq!(by_scope.len(), 1);
        assert_eq!(by_scope[0].name_hint, "one");

        let by_name = source
            .list(&query().with_workflow("billing"))
            .await
            .expect("list");
        assert_eq!(by_name.len(), 1);
        assert_eq!(by_name[0].name_hint, "two");
    }

    #[tokio::test]
    async fn missing_directory_is_an_error() {
        let dir = TempDir::new().expect("tempdir");
        let missing = dir.path().join("nope");
        let result = FsWorkflowSource::new(&missing).list(&query()).await;
        assert!(result.is_err());
    }

    #[test]
    fn window_keeps_undated_runs() {
        let query = query();
        assert!(query.in_window(None));
        assert!(query.in_window(Some(as_of())));
        assert!(!query.in_window(Some(as_of() - Duration::days(31))));
    }
}
