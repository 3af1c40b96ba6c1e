//! Run outcome samples.
//!
//! Samples arrive already windowed by the source. Anything that cannot be
//! read is bucketed as [`RunStatus::Other`] rather than rejected.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;

/// The reported outcome of one workflow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Succeeded,
    Failed,
    Cancelled,
    Running,
    Other,
}

impl RunStatus {
    /// All statuses in reporting order.
    pub const ALL: [RunStatus; 5] = [
        Self::Succeeded,
        Self::Failed,
        Self::Cancelled,
        Self::Running,
        Self::Other,
    ];

    /// Parses a raw status string, case-insensitively.
    #[must_use]
    pub fn from_raw(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "succeeded" => Self::Succeeded,
            "failed" => Self::Failed,
            "cancelled" | "canceled" => Self::Cancelled,
            "running" => Self::Running,
            _ => Self::Other,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Succeeded => "Succeeded",
            Self::Failed => "Failed",
            Self::Cancelled => "Cancelled",
            Self::Running => "Running",
            Self::Other => "Other",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One sampled run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOutcomeSample {
    pub status: RunStatus,
    /// When the run started, if known.
    pub timestamp: Option<DateTime<Utc>>,
}

impl RunOutcomeSample {
    #[must_use]
    pub fn new(status: RunStatus, timestamp: Option<DateTime<Utc>>) -> Self {
        Self { status, timestamp }
    }

    /// Reads a raw run record.
    ///
    /// Accepts `{ "properties": { "status", "startTime" } }` as well as a
    /// flat `{ "status", "startTime" }`. Never fails: a missing or unknown
    /// status yields [`RunStatus::Other`].
    #[must_use]
    pub fn from_value(raw: &JsonValue) -> Self {
        let fields = raw
            .get("properties")
            .filter(|p| p.is_object())
            .unwrap_or(raw);

        let status = fields
            .get("status")
            .and_then(JsonValue::as_str)
            .map_or(RunStatus::Other, RunStatus::from_raw);

        let timestamp = ["startTime", "timestamp"]
            .iter()
            .find_map(|key| fields.get(*key).and_then(JsonValue::as_str))
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|ts| ts.with_timezone(&Utc));

        Self { status, timestamp }
    }
}
