use crate::error::{ApiError, Result};
use serde::{Deserialize, Serialize};

/// nmap flags the job queue accepts
pub const ALLOWED_NMAP_OPTIONS: &[&str] = &["-sS", "-sT", "-sU", "-Pn", "--open", "-n", "-sV"];

pub const MIN_THREADS: u32 = 1;
pub const MAX_THREADS: u32 = 100;
pub const MIN_WORDLIST: u8 = 1;
pub const MAX_WORDLIST: u8 = 3;
pub const MAX_TIMING_TEMPLATE: u8 = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubdomainEnumRequest {
    pub domain: String,
    pub threads: u32,
    pub wordlist: u8,
}

impl SubdomainEnumRequest {
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            threads: 10,
            wordlist: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NmapRequest {
    pub host: String,
    pub timing_template: u8,
    pub options: Vec<String>,
    pub all_ports: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ports_range: Option<Vec<u16>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ports_specific: Option<Vec<u16>>,
}

impl NmapRequest {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            timing_template: 3,
            options: Vec::new(),
            all_ports: false,
            ports_range: None,
            ports_specific: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathEnumRequest {
    pub url: String,
    pub threads: u32,
    pub wordlist: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclude_status: Option<Vec<u16>>,
}

impl PathEnumRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            threads: 10,
            wordlist: 1,
            exclude_status: None,
        }
    }
}

/// A job submission for one of the remote scanning tools.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolRequest {
    Subdomain(SubdomainEnumRequest),
    Nmap(NmapRequest),
    PathEnum(PathEnumRequest),
}

impl ToolRequest {
    /// Endpoint path relative to the API base URL
    pub fn endpoint(&self) -> &'static str {
        match self {
            ToolRequest::Subdomain(_) => "commands/subdomain_dns_enum",
            ToolRequest::Nmap(_) => "commands/nmap",
            ToolRequest::PathEnum(_) => "commands/path_enum",
        }
    }

    pub fn target(&self) -> &str {
        match self {
            ToolRequest::Subdomain(req) => &req.domain,
            ToolRequest::Nmap(req) => &req.host,
            ToolRequest::PathEnum(req) => &req.url,
        }
    }

    /// Check the request against the limits the job queue enforces, so an
    /// invalid configuration never leaves the machine.
    pub fn validate(&self) -> Result<()> {
        if self.target().trim().is_empty() {
            return Err(ApiError::InvalidRequest("target must not be empty".to_string()));
        }

        match self {
            ToolRequest::Subdomain(req) => {
                check_threads(req.threads)?;
                check_wordlist(req.wordlist)
            }
            ToolRequest::PathEnum(req) => {
                check_threads(req.threads)?;
                check_wordlist(req.wordlist)?;
                if let Some(codes) = &req.exclude_status
                    && let Some(bad) = codes.iter().find(|c| !(100..=599).contains(*c))
                {
                    return Err(ApiError::InvalidRequest(format!(
                        "exclude_status contains invalid HTTP status {}",
                        bad
                    )));
                }
                Ok(())
            }
            ToolRequest::Nmap(req) => {
                if req.timing_template > MAX_TIMING_TEMPLATE {
                    return Err(ApiError::InvalidRequest(format!(
                        "timing_template must be between 0 and {}",
                        MAX_TIMING_TEMPLATE
                    )));
                }
                if let Some(opt) = req
                    .options
                    .iter()
                    .find(|o| !ALLOWED_NMAP_OPTIONS.contains(&o.as_str()))
                {
                    return Err(ApiError::InvalidRequest(format!("Option not allowed: {}", opt)));
                }
                if req.all_ports && (req.ports_range.is_some() || req.ports_specific.is_some()) {
                    return Err(ApiError::InvalidRequest(
                        "Cannot combine all_ports with specific port selections".to_string(),
                    ));
                }
                if let Some(range) = &req.ports_range {
                    if range.len() != 2 {
                        return Err(ApiError::InvalidRequest(
                            "ports_range must contain exactly 2 values".to_string(),
                        ));
                    }
                    if range[0] > range[1] {
                        return Err(ApiError::InvalidRequest(format!(
                            "ports_range start {} is after end {}",
                            range[0], range[1]
                        )));
                    }
                }
                Ok(())
            }
        }
    }

    pub fn to_json(&self) -> Result<serde_json::Value> {
        let value = match self {
            ToolRequest::Subdomain(req) => serde_json::to_value(req)?,
            ToolRequest::Nmap(req) => serde_json::to_value(req)?,
            ToolRequest::PathEnum(req) => serde_json::to_value(req)?,
        };
        Ok(value)
    }
}

fn check_threads(threads: u32) -> Result<()> {
    if !(MIN_THREADS..=MAX_THREADS).contains(&threads) {
        return Err(ApiError::InvalidRequest(format!(
            "threads must be between {} and {}",
            MIN_THREADS, MAX_THREADS
        )));
    }
    Ok(())
}

fn check_wordlist(wordlist: u8) -> Result<()> {
    if !(MIN_WORDLIST..=MAX_WORDLIST).contains(&wordlist) {
        return Err(ApiError::InvalidRequest(format!(
            "wordlist must be between {} and {}",
            MIN_WORDLIST, MAX_WORDLIST
        )));
    }
    Ok(())
}
