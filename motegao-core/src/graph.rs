// In-memory canvas graph: domains, scan result nodes and provenance edges

use crate::error::{CoreError, Result};
use crate::layout::next_position;
use crate::result::ToolResult;
use crate::tool::ToolKind;
use chrono::{DateTime, Utc};
use petgraph::dot::{Config, Dot};
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

/// Source used for result edges when no domain is selected
pub const DEFAULT_ROOT_ID: &str = "root";

/// Entries shown on a result node before collapsing into "+N more"
pub const LABEL_PREVIEW: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Domain,
    Subdomain,
    Nmap,
    Pathfinder,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Domain => "domain",
            NodeKind::Subdomain => "subdomain",
            NodeKind::Nmap => "nmap",
            NodeKind::Pathfinder => "pathfinder",
        }
    }
}

impl From<ToolKind> for NodeKind {
    fn from(kind: ToolKind) -> Self {
        match kind {
            ToolKind::Subdomain => NodeKind::Subdomain,
            ToolKind::Nmap => NodeKind::Nmap,
            ToolKind::Pathfinder => NodeKind::Pathfinder,
        }
    }
}

/// A user-designated scan target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Domain {
    pub id: i64,
    pub name: String,
    pub status: String,
}

impl Domain {
    pub fn node_id(&self) -> String {
        format!("domain-{}", self.id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStyle {
    Domain,
    DomainSelected,
    Result,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeStyle {
    Default,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodePayload {
    Domain(Domain),
    Result(ToolResult),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    pub position: Position,
    pub style: NodeStyle,
    pub data: NodePayload,
    /// Presentation only; rebuilt from `data` after a load
    #[serde(skip)]
    pub label: String,
}

impl GraphNode {
    fn new(
        id: String,
        kind: NodeKind,
        position: Position,
        style: NodeStyle,
        data: NodePayload,
    ) -> Self {
        let mut node = Self {
            id,
            kind,
            position,
            style,
            data,
            label: String::new(),
        };
        node.refresh_label();
        node
    }

    pub fn domain(&self) -> Option<&Domain> {
        match &self.data {
            NodePayload::Domain(domain) => Some(domain),
            NodePayload::Result(_) => None,
        }
    }

    pub fn result(&self) -> Option<&ToolResult> {
        match &self.data {
            NodePayload::Result(result) => Some(result),
            NodePayload::Domain(_) => None,
        }
    }

    pub fn refresh_label(&mut self) {
        self.label = match &self.data {
            NodePayload::Domain(domain) => format!("🎯 {}", domain.name),
            NodePayload::Result(result) => result_label(result),
        };
    }
}

fn result_label(result: &ToolResult) -> String {
    let kind = result.kind();
    let title = match kind {
        ToolKind::Subdomain => "Subdomains Found",
        ToolKind::Nmap => "Nmap Scan",
        ToolKind::Pathfinder => "Paths Found",
    };
    let mut lines = vec![title.to_string()];

    if result.is_error() {
        lines.push("Error: Invalid command".to_string());
        lines.push("Check configuration".to_string());
        return lines.join("\n");
    }

    let entries = result.entries();
    if entries.is_empty() {
        lines.push(
            match kind {
                ToolKind::Subdomain => "No subdomains found",
                ToolKind::Nmap => "Scan completed",
                ToolKind::Pathfinder => "No paths found",
            }
            .to_string(),
        );
    } else {
        lines.extend(entries.iter().take(LABEL_PREVIEW).map(|e| format!("• {}", e)));
        if entries.len() > LABEL_PREVIEW {
            lines.push(format!("+{} more", entries.len() - LABEL_PREVIEW));
        }
    }
    lines.join("\n")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    pub style: EdgeStyle,
    #[serde(default)]
    pub animated: bool,
}

impl GraphEdge {
    pub fn new(source: &str, target: &str, style: EdgeStyle) -> Self {
        Self {
            id: format!("e-{}-{}", source, target),
            source: source.to_string(),
            target: target.to_string(),
            style,
            animated: true,
        }
    }

    pub fn touches(&self, node_id: &str) -> bool {
        self.source == node_id || self.target == node_id
    }
}

/// What the last appended scan was, for the canvas overlay
#[derive(Debug, Clone, PartialEq)]
pub struct ScanSummary {
    pub tool: ToolKind,
    pub timestamp: DateTime<Utc>,
}

/// Ordered working copy of the project graph. Mutations are individually
/// atomic; referential integrity of edges is the caller's business.
#[derive(Debug, Clone, Default)]
pub struct GraphState {
    nodes: Vec<GraphNode>,
    edges: Vec<GraphEdge>,
    domains: Vec<Domain>,
    selected: Option<i64>,
    last_scan: Option<ScanSummary>,
}

impl GraphState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild state from stored nodes and edges. Labels are recomputed, the
    /// domain list is repopulated from domain nodes and nothing is selected.
    pub fn from_parts(mut nodes: Vec<GraphNode>, edges: Vec<GraphEdge>) -> Self {
        let mut domains = Vec::new();
        for node in nodes.iter_mut() {
            node.refresh_label();
            if node.kind == NodeKind::Domain
                && let Some(domain) = node.domain()
            {
                domains.push(domain.clone());
                node.style = NodeStyle::Domain;
            }
        }
        Self {
            nodes,
            edges,
            domains,
            selected: None,
            last_scan: None,
        }
    }

    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    pub fn edges(&self) -> &[GraphEdge] {
        &self.edges
    }

    pub fn domains(&self) -> &[Domain] {
        &self.domains
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, node_id: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.id == node_id)
    }

    pub fn selected_domain(&self) -> Option<&Domain> {
        let id = self.selected?;
        self.domains.iter().find(|d| d.id == id)
    }

    pub fn last_scan(&self) -> Option<&ScanSummary> {
        self.last_scan.as_ref()
    }

    pub fn find_domain(&self, name: &str) -> Option<&Domain> {
        let name = name.trim();
        self.domains.iter().find(|d| d.name.eq_ignore_ascii_case(name))
    }

    /// Add a domain and its node. Names are unique ignoring ASCII case.
    pub fn add_domain_node(&mut self, name: &str) -> Result<String> {
        let domain = self.new_domain(name)?;
        let node_id = domain.node_id();
        let position = next_position(&self.nodes, NodeKind::Domain);

        info!("Adding domain {} as {}", domain.name, node_id);
        self.nodes.push(GraphNode::new(
            node_id.clone(),
            NodeKind::Domain,
            position,
            NodeStyle::Domain,
            NodePayload::Domain(domain.clone()),
        ));
        self.domains.push(domain);
        Ok(node_id)
    }

    fn new_domain(&self, name: &str) -> Result<Domain> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CoreError::EmptyDomain);
        }
        if self.find_domain(name).is_some() {
            return Err(CoreError::DuplicateDomain(name.to_string()));
        }

        let mut id = Utc::now().timestamp_millis();
        while self.domains.iter().any(|d| d.id == id) {
            id += 1;
        }
        Ok(Domain {
            id,
            name: name.to_string(),
            status: "active".to_string(),
        })
    }

    /// Make the domain behind `node_id` the active selection
    pub fn select_domain(&mut self, node_id: &str) -> Result<&Domain> {
        let domain_id = self
            .node(node_id)
            .and_then(|n| n.domain())
            .map(|d| d.id)
            .ok_or_else(|| CoreError::UnknownNode(node_id.to_string()))?;

        self.selected = Some(domain_id);
        self.last_scan = None;
        for node in self.nodes.iter_mut().filter(|n| n.kind == NodeKind::Domain) {
            node.style = if node.id == node_id {
                NodeStyle::DomainSelected
            } else {
                NodeStyle::Domain
            };
        }
        debug!("Selected domain node {}", node_id);

        self.domains
            .iter()
            .find(|d| d.id == domain_id)
            .ok_or_else(|| CoreError::UnknownNode(node_id.to_string()))
    }

    /// Append one result node plus one edge from the selected domain (or the
    /// default root). Returns the new node's id.
    pub fn append_tool_result(&mut self, result: &ToolResult) -> String {
        let kind = result.kind();
        let source = self
            .selected_domain()
            .map(|d| d.node_id())
            .unwrap_or_else(|| DEFAULT_ROOT_ID.to_string());
        let node_id = self.unique_node_id(kind.as_str());
        let position = next_position(&self.nodes, kind.into());
        let (node_style, edge_style) = if result.is_error() {
            (NodeStyle::Error, EdgeStyle::Error)
        } else {
            (NodeStyle::Result, EdgeStyle::Default)
        };

        info!("Appending {} result {} under {}", kind, node_id, source);
        self.nodes.push(GraphNode::new(
            node_id.clone(),
            kind.into(),
            position,
            node_style,
            NodePayload::Result(result.clone()),
        ));
        self.edges.push(GraphEdge::new(&source, &node_id, edge_style));
        self.last_scan = Some(ScanSummary {
            tool: kind,
            timestamp: Utc::now(),
        });
        node_id
    }

    /// Turn a subdomain listed on a result node into a domain of its own,
    /// linked from that result node.
    pub fn promote_subdomain(&mut self, result_node_id: &str, name: &str) -> Result<String> {
        let node = self
            .node(result_node_id)
            .ok_or_else(|| CoreError::UnknownNode(result_node_id.to_string()))?;
        let listed = match node.result() {
            Some(ToolResult::Subdomain { subdomains }) => subdomains,
            _ => return Err(CoreError::NotSubdomainResult(result_node_id.to_string())),
        };
        if !listed.iter().any(|s| s.eq_ignore_ascii_case(name.trim())) {
            return Err(CoreError::SubdomainNotListed {
                node: result_node_id.to_string(),
                name: name.trim().to_string(),
            });
        }

        let node_id = self.add_domain_node(name)?;
        self.edges
            .push(GraphEdge::new(result_node_id, &node_id, EdgeStyle::Default));
        Ok(node_id)
    }

    /// Remove a node and every edge touching it. Deleting a domain node also
    /// drops the domain and clears the selection if it pointed there.
    pub fn delete_node(&mut self, node_id: &str) -> Result<GraphNode> {
        let idx = self
            .nodes
            .iter()
            .position(|n| n.id == node_id)
            .ok_or_else(|| CoreError::UnknownNode(node_id.to_string()))?;
        let removed = self.nodes.remove(idx);
        self.edges.retain(|e| !e.touches(node_id));

        if let Some(domain) = removed.domain() {
            self.domains.retain(|d| d.id != domain.id);
            if self.selected == Some(domain.id) {
                self.selected = None;
                self.last_scan = None;
            }
        }
        info!("Deleted node {}", node_id);
        Ok(removed)
    }

    fn unique_node_id(&self, prefix: &str) -> String {
        let mut ts = Utc::now().timestamp_millis();
        loop {
            let candidate = format!("{}-{}", prefix, ts);
            if self.node(&candidate).is_none() {
                return candidate;
            }
            ts += 1;
        }
    }

    /// Graphviz rendering of the canvas. Edges whose endpoints are missing
    /// are left out.
    pub fn to_dot(&self) -> String {
        let mut graph: DiGraph<String, &str> = DiGraph::new();
        let mut index: HashMap<&str, NodeIndex> = HashMap::new();

        for node in &self.nodes {
            let label = node.label.lines().next().unwrap_or(node.id.as_str()).to_string();
            let label = match node.kind {
                NodeKind::Domain => label,
                _ => format!("{} ({})", label, node.result().map_or(0, |r| r.entries().len())),
            };
            index.insert(node.id.as_str(), graph.add_node(label));
        }
        for edge in &self.edges {
            let source = index.get(edge.source.as_str());
            let target = index.get(edge.target.as_str());
            if let (Some(&a), Some(&b)) = (source, target) {
                graph.add_edge(a, b, "");
            }
        }

        format!("{}", Dot::with_config(&graph, &[Config::EdgeNoLabel]))
    }
}
