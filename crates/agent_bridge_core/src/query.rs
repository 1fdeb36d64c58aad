use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use crate::action_group::contract_value;

pub const QUERY_UNAVAILABLE: &str = "Query unavailable";
pub const UNKNOWN_FAILURE_REASON: &str = "Unknown error";
pub const TIMED_OUT_STATUS: &str = "TIMED_OUT";
const FINGERPRINT_HEX_LEN: usize = 12;

/// Flattens a SQL string onto one line for submission.
pub fn normalize_query_text(raw: &str) -> String {
    raw.replace('\n', " ").trim().to_string()
}

pub fn output_location(bucket: &str) -> String {
    format!("s3://{}/athena/output/", bucket.trim_matches('/'))
}

/// Short stable digest of the query text, used to correlate log events
/// without logging the SQL itself.
pub fn query_fingerprint(query: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(query.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..FINGERPRINT_HEX_LEN].to_string()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryState {
    Queued,
    Running,
    Succeeded,
    Failed,
    Cancelled,
    Other(String),
}

impl QueryState {
    pub fn parse(value: &str) -> Self {
        match value {
            "QUEUED" => Self::Queued,
            "RUNNING" => Self::Running,
            "SUCCEEDED" => Self::Succeeded,
            "FAILED" => Self::Failed,
            "CANCELLED" => Self::Cancelled,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Queued => "QUEUED",
            Self::Running => "RUNNING",
            Self::Succeeded => "SUCCEEDED",
            Self::Failed => "FAILED",
            Self::Cancelled => "CANCELLED",
            Self::Other(value) => value,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }
}

impl fmt::Display for QueryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryStatusReport {
    pub state: QueryState,
    pub state_change_reason: Option<String>,
}

impl QueryStatusReport {
    pub fn new(state: QueryState) -> Self {
        Self {
            state,
            state_change_reason: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.state_change_reason = Some(reason.into());
        self
    }
}

// Result payload in the engine's own wire shape so the agent sees exactly
// what the query API returned.

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct QueryResultSet {
    pub result_set: ResultSet,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_count: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_token: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct ResultSet {
    #[serde(default)]
    pub rows: Vec<ResultRow>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_set_metadata: Option<ResultSetMetadata>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct ResultRow {
    #[serde(default)]
    pub data: Vec<Datum>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct Datum {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub var_char_value: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct ResultSetMetadata {
    #[serde(default)]
    pub column_info: Vec<ColumnInfo>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct ColumnInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_name: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(rename = "Type")]
    pub column_type: String,
    #[serde(default)]
    pub precision: i32,
    #[serde(default)]
    pub scale: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nullable: Option<String>,
    #[serde(default)]
    pub case_sensitive: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct QueryFailure {
    pub query_execution_id: String,
    pub status: String,
    pub error: String,
    pub original_query: String,
}

impl QueryFailure {
    pub fn from_report(
        query_execution_id: impl Into<String>,
        report: &QueryStatusReport,
        original_query: impl Into<String>,
    ) -> Self {
        let reason = report
            .state_change_reason
            .as_deref()
            .unwrap_or(UNKNOWN_FAILURE_REASON);
        Self {
            query_execution_id: query_execution_id.into(),
            status: report.state.as_str().to_string(),
            error: format!("The query failed: {reason}"),
            original_query: original_query.into(),
        }
    }
}

/// Terminal result of one query. Engine-reported failures are data here,
/// not errors.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    Succeeded(QueryResultSet),
    Failed(QueryFailure),
}

impl QueryOutcome {
    pub fn status(&self) -> &str {
        match self {
            Self::Succeeded(_) => QueryState::Succeeded.as_str(),
            Self::Failed(failure) => &failure.status,
        }
    }

    pub fn into_body(self) -> Value {
        match self {
            Self::Succeeded(result) => contract_value(result),
            Self::Failed(failure) => contract_value(failure),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    #[error("'value' not found at requestBody.content[\"application/json\"].properties[0]")]
    MissingQuery,
    #[error("{0}")]
    Engine(String),
    #[error("query {query_execution_id} did not reach a terminal state after {attempts} status checks")]
    PollExhausted {
        query_execution_id: String,
        attempts: u32,
        query: String,
    },
}

impl QueryError {
    /// Category label used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingQuery => "input_validation",
            Self::Engine(_) => "engine_transport",
            Self::PollExhausted { .. } => "poll_exhausted",
        }
    }

    /// Maps the error to the body returned to the agent. `event_query` is
    /// the raw query text from the triggering event, when there was one.
    pub fn into_body(self, event_query: Option<&str>) -> Value {
        match self {
            Self::PollExhausted {
                ref query_execution_id,
                ref query,
                ..
            } => contract_value(QueryFailure {
                query_execution_id: query_execution_id.clone(),
                status: TIMED_OUT_STATUS.to_string(),
                error: format!("The query failed: {self}"),
                original_query: query.clone(),
            }),
            Self::MissingQuery | Self::Engine(_) => json!({
                "Error": format!("An exception occurred: {self}"),
                "OriginalQuery": event_query.unwrap_or(QUERY_UNAVAILABLE),
            }),
        }
    }
}
