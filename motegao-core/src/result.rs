// Tool-specific interpretation of raw job results

use crate::tool::ToolKind;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Help text nmap prints when it was invoked with bad arguments
pub const NMAP_USAGE_MARKER: &str = "Usage: nmap";

/// One hit from path enumeration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathHit {
    pub path: String,
    pub status_code: u16,
    #[serde(default)]
    pub size: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum NmapReport {
    OpenPorts { lines: Vec<String> },
    InvalidInvocation,
}

/// A finished job's payload, interpreted per tool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "tool", rename_all = "lowercase")]
pub enum ToolResult {
    Subdomain { subdomains: Vec<String> },
    Nmap { report: NmapReport },
    Pathfinder { hits: Vec<PathHit> },
}

impl ToolResult {
    /// Interpret a raw result blob. Malformed input yields an empty result of
    /// the right kind rather than an error.
    pub fn interpret(kind: ToolKind, raw: &Value) -> Self {
        match kind {
            ToolKind::Subdomain => ToolResult::Subdomain {
                subdomains: parse_subdomains(raw),
            },
            ToolKind::Nmap => ToolResult::Nmap {
                report: parse_nmap(raw),
            },
            ToolKind::Pathfinder => ToolResult::Pathfinder {
                hits: parse_path_hits(raw),
            },
        }
    }

    pub fn kind(&self) -> ToolKind {
        match self {
            ToolResult::Subdomain { .. } => ToolKind::Subdomain,
            ToolResult::Nmap { .. } => ToolKind::Nmap,
            ToolResult::Pathfinder { .. } => ToolKind::Pathfinder,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(
            self,
            ToolResult::Nmap {
                report: NmapReport::InvalidInvocation
            }
        )
    }

    /// Display lines for the result node
    pub fn entries(&self) -> Vec<String> {
        match self {
            ToolResult::Subdomain { subdomains } => subdomains.clone(),
            ToolResult::Nmap {
                report: NmapReport::OpenPorts { lines },
            } => lines.clone(),
            ToolResult::Nmap {
                report: NmapReport::InvalidInvocation,
            } => Vec::new(),
            ToolResult::Pathfinder { hits } => hits
                .iter()
                .map(|hit| match hit.size {
                    Some(size) => format!("{} {} ({} bytes)", hit.status_code, hit.path, size),
                    None => format!("{} {}", hit.status_code, hit.path),
                })
                .collect(),
        }
    }
}

fn parse_subdomains(raw: &Value) -> Vec<String> {
    let list = match raw {
        Value::Array(items) => items,
        Value::Object(map) => match map.get("subdomains") {
            Some(Value::Array(items)) => items,
            _ => return Vec::new(),
        },
        _ => return Vec::new(),
    };

    list.iter()
        .filter_map(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_nmap(raw: &Value) -> NmapReport {
    let text = match raw {
        Value::String(s) => s.as_str(),
        Value::Object(map) => map.get("output").and_then(|v| v.as_str()).unwrap_or(""),
        _ => "",
    };

    if text.contains(NMAP_USAGE_MARKER) {
        return NmapReport::InvalidInvocation;
    }

    let lines = text
        .lines()
        .filter(|line| line.contains("open"))
        .map(|line| line.trim().to_string())
        .collect();
    NmapReport::OpenPorts { lines }
}

fn parse_path_hits(raw: &Value) -> Vec<PathHit> {
    let list = match raw {
        Value::Array(items) => items,
        Value::Object(map) => match map.get("results").or_else(|| map.get("paths")) {
            Some(Value::Array(items)) => items,
            _ => return Vec::new(),
        },
        _ => return Vec::new(),
    };

    list.iter()
        .filter_map(|item| serde_json::from_value::<PathHit>(item.clone()).ok())
        .collect()
}
