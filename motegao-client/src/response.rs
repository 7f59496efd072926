use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Task status as reported by the job queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RemoteStatus {
    Pending,
    Started,
    Progress,
    Success,
    Failure,
    Retry,
    Revoked,
    Cancelled,
    #[serde(other)]
    Unknown,
}

impl RemoteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RemoteStatus::Pending => "PENDING",
            RemoteStatus::Started => "STARTED",
            RemoteStatus::Progress => "PROGRESS",
            RemoteStatus::Success => "SUCCESS",
            RemoteStatus::Failure => "FAILURE",
            RemoteStatus::Retry => "RETRY",
            RemoteStatus::Revoked => "REVOKED",
            RemoteStatus::Cancelled => "CANCELLED",
            RemoteStatus::Unknown => "UNKNOWN",
        }
    }

    /// SUCCESS, FAILURE, REVOKED and CANCELLED end a job; everything else
    /// means the job is still queued or running.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RemoteStatus::Success
                | RemoteStatus::Failure
                | RemoteStatus::Revoked
                | RemoteStatus::Cancelled
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubmitResponse {
    pub task_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TaskResultResponse {
    pub status: RemoteStatus,
    #[serde(default)]
    pub result: Value,
}

impl TaskResultResponse {
    /// Percentage carried by a PROGRESS result, clamped to 0..=100.
    ///
    /// Workers report either `{"progress": n}`, `{"percent": n}` or
    /// `{"current": c, "total": t}`.
    pub fn progress(&self) -> Option<u8> {
        let meta = self.result.as_object()?;
        let pct = if let Some(p) = meta.get("progress").or_else(|| meta.get("percent")) {
            p.as_f64()?
        } else {
            let current = meta.get("current")?.as_f64()?;
            let total = meta.get("total")?.as_f64()?;
            if total <= 0.0 {
                return None;
            }
            current / total * 100.0
        };
        Some(pct.clamp(0.0, 100.0).round() as u8)
    }

    /// Error text carried by a FAILURE result
    pub fn error_message(&self) -> String {
        match &self.result {
            Value::String(s) => s.clone(),
            Value::Null => "task failed without an error message".to_string(),
            Value::Object(map) => map
                .get("exc_message")
                .or_else(|| map.get("error"))
                .map(|v| match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .unwrap_or_else(|| self.result.to_string()),
            other => other.to_string(),
        }
    }
}

/// Whether `value` is worker progress metadata rather than a result. A
/// cancelled job reports whatever it last stored, which is usually this.
pub fn is_progress_meta(value: &Value) -> bool {
    let Some(meta) = value.as_object() else {
        return false;
    };
    meta.contains_key("progress")
        || meta.contains_key("percent")
        || (meta.contains_key("current") && meta.contains_key("total"))
}

#[derive(Debug, Clone, Deserialize)]
pub struct CancelResponse {
    pub status: String,
    #[serde(default)]
    pub result: Option<Value>,
}

impl CancelResponse {
    /// The partial result returned by the cancel call, if it carries anything
    /// worth keeping.
    pub fn partial_result(&self) -> Option<&Value> {
        match self.result.as_ref()? {
            Value::Null => None,
            v if is_progress_meta(v) => None,
            Value::String(s) if s.trim().is_empty() => None,
            Value::Array(a) if a.is_empty() => None,
            Value::Object(o) if o.is_empty() => None,
            v => Some(v),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleProfile {
    pub email: String,
    pub name: String,
    pub google_id: String,
    #[serde(default)]
    pub picture: Option<String>,
}

/// A project as stored by the backend. Nodes and edges stay as raw JSON at
/// this layer; the core crate owns their shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectDocument {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default)]
    pub nodes: Vec<Value>,
    #[serde(default)]
    pub edges: Vec<Value>,
    #[serde(rename = "lastModified", default)]
    pub last_modified: Option<String>,
}
