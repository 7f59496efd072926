use motegao_client::{NmapRequest, PathEnumRequest, SubdomainEnumRequest, ToolRequest};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use url::Url;

/// The remote scanning tools a task can run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolKind {
    Subdomain,
    Nmap,
    Pathfinder,
}

impl ToolKind {
    pub const ALL: [ToolKind; 3] = [ToolKind::Subdomain, ToolKind::Nmap, ToolKind::Pathfinder];

    pub fn as_str(&self) -> &'static str {
        match self {
            ToolKind::Subdomain => "subdomain",
            ToolKind::Nmap => "nmap",
            ToolKind::Pathfinder => "pathfinder",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ToolKind::Subdomain => "Subdomain Finder",
            ToolKind::Nmap => "Nmap Scan",
            ToolKind::Pathfinder => "Path Finder",
        }
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "subdomain" => Ok(ToolKind::Subdomain),
            "nmap" => Ok(ToolKind::Nmap),
            "pathfinder" => Ok(ToolKind::Pathfinder),
            other => Err(format!("Unknown tool '{}'", other)),
        }
    }
}

/// Per-tool configuration as chosen by the user
#[derive(Debug, Clone, PartialEq)]
pub enum ToolConfig {
    Subdomain {
        wordlist: u8,
        threads: u32,
    },
    Nmap {
        timing_template: u8,
        options: Vec<String>,
        all_ports: bool,
        ports_range: Option<(u16, u16)>,
        ports_specific: Option<Vec<u16>>,
    },
    Pathfinder {
        wordlist: u8,
        threads: u32,
        exclude_status: Vec<u16>,
    },
}

impl ToolConfig {
    /// The configuration the tool panel starts with
    pub fn default_for(kind: ToolKind) -> Self {
        match kind {
            ToolKind::Subdomain => ToolConfig::Subdomain {
                wordlist: 1,
                threads: 10,
            },
            ToolKind::Nmap => ToolConfig::Nmap {
                timing_template: 4,
                options: vec!["-sV".to_string()],
                all_ports: false,
                ports_range: None,
                ports_specific: Some(vec![80, 443, 8080, 8443]),
            },
            ToolKind::Pathfinder => ToolConfig::Pathfinder {
                wordlist: 1,
                threads: 10,
                exclude_status: vec![404],
            },
        }
    }

    pub fn kind(&self) -> ToolKind {
        match self {
            ToolConfig::Subdomain { .. } => ToolKind::Subdomain,
            ToolConfig::Nmap { .. } => ToolKind::Nmap,
            ToolConfig::Pathfinder { .. } => ToolKind::Pathfinder,
        }
    }

    /// Build the job submission for `domain`
    pub fn to_request(&self, domain: &str) -> ToolRequest {
        match self {
            ToolConfig::Subdomain { wordlist, threads } => {
                ToolRequest::Subdomain(SubdomainEnumRequest {
                    domain: domain.to_string(),
                    threads: *threads,
                    wordlist: *wordlist,
                })
            }
            ToolConfig::Nmap {
                timing_template,
                options,
                all_ports,
                ports_range,
                ports_specific,
            } => ToolRequest::Nmap(NmapRequest {
                host: domain.to_string(),
                timing_template: *timing_template,
                options: options.clone(),
                all_ports: *all_ports,
                ports_range: ports_range.map(|(start, end)| vec![start, end]),
                ports_specific: ports_specific.clone(),
            }),
            ToolConfig::Pathfinder {
                wordlist,
                threads,
                exclude_status,
            } => ToolRequest::PathEnum(PathEnumRequest {
                url: target_url(domain),
                threads: *threads,
                wordlist: *wordlist,
                exclude_status: if exclude_status.is_empty() {
                    None
                } else {
                    Some(exclude_status.clone())
                },
            }),
        }
    }
}

/// Path enumeration needs a URL; bare hostnames get `http://`
pub fn target_url(domain: &str) -> String {
    let domain = domain.trim();
    if let Ok(url) = Url::parse(domain)
        && url.has_host()
    {
        return url.to_string();
    }
    format!("http://{}", domain)
}
