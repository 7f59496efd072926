// Bridge between the in-memory graph and the backend project store

use crate::error::{CoreError, Result};
use crate::graph::{GraphEdge, GraphNode, GraphState};
use crate::notify::Notifier;
use chrono::{SecondsFormat, Utc};
use motegao_client::{ApiClient, ProjectDocument};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveStatus {
    Saved,
    Saving,
    Unsaved,
}

impl fmt::Display for SaveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SaveStatus::Saved => "saved",
            SaveStatus::Saving => "saving",
            SaveStatus::Unsaved => "unsaved",
        };
        f.write_str(s)
    }
}

pub struct ProjectBridge {
    client: ApiClient,
    notifier: Notifier,
    status: SaveStatus,
}

impl ProjectBridge {
    pub fn new(client: ApiClient, notifier: Notifier) -> Self {
        Self {
            client,
            notifier,
            status: SaveStatus::Saved,
        }
    }

    pub fn status(&self) -> SaveStatus {
        self.status
    }

    /// Record a structural change that has not reached the backend yet
    pub fn mark_dirty(&mut self) {
        self.status = SaveStatus::Unsaved;
    }

    pub fn set_token(&mut self, token: Option<String>) {
        self.client.set_token(token);
    }

    /// Replace `graph` with the stored project. Any fetch error leaves
    /// `graph` untouched and counts as an empty project. Returns whether
    /// anything was loaded.
    pub async fn load(&mut self, project_id: &str, graph: &mut GraphState) -> bool {
        let document = match self.client.get_project(project_id).await {
            Ok(document) => document,
            Err(e) => {
                warn!("Could not load project {}: {}; starting empty", project_id, e);
                return false;
            }
        };

        *graph = graph_from_document(&document);
        info!(
            "Loaded project {} ({} nodes, {} edges)",
            project_id,
            graph.nodes().len(),
            graph.edges().len()
        );
        self.status = SaveStatus::Saved;
        true
    }

    /// Push the graph to the backend. Labels never leave the process.
    pub async fn save(&mut self, project_id: &str, graph: &GraphState) -> Result<()> {
        self.status = SaveStatus::Saving;

        let encoded = encode_all(graph.nodes())
            .and_then(|nodes| encode_all(graph.edges()).map(|edges| (nodes, edges)));
        let (nodes, edges) = match encoded {
            Ok(parts) => parts,
            Err(e) => {
                self.status = SaveStatus::Unsaved;
                self.notifier.error(format!("Save failed: {}", e));
                return Err(e.into());
            }
        };

        let last_modified = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        match self
            .client
            .update_project(project_id, &nodes, &edges, &last_modified)
            .await
        {
            Ok(_) => {
                debug!("Saved project {} at {}", project_id, last_modified);
                self.status = SaveStatus::Saved;
                Ok(())
            }
            Err(e) => {
                warn!("Save of project {} failed: {}", project_id, e);
                self.status = SaveStatus::Unsaved;
                self.notifier.error(format!("Save failed: {}", e));
                Err(CoreError::SaveFailed(e))
            }
        }
    }

    pub async fn list(&self) -> Result<Vec<ProjectDocument>> {
        Ok(self.client.list_projects().await?)
    }

    /// Create an empty project. Without a name one is generated.
    pub async fn create(&self, name: Option<&str>) -> Result<ProjectDocument> {
        let id = Uuid::new_v4();
        let name = match name.map(str::trim) {
            Some(n) if !n.is_empty() => n.to_string(),
            _ => format!("NEW_RECON_{}", id.as_u128() % 1000),
        };
        let document = ProjectDocument {
            id: id.to_string(),
            name,
            owner: None,
            nodes: Vec::new(),
            edges: Vec::new(),
            last_modified: Some(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
        };
        self.client.create_project(&document).await?;
        info!("Created project {} ({})", document.name, document.id);
        Ok(document)
    }

    pub async fn rename(&self, project_id: &str, name: &str) -> Result<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CoreError::Config("project name must not be empty".to_string()));
        }
        self.client.rename_project(project_id, name).await?;
        info!("Renamed project {} to {}", project_id, name);
        Ok(())
    }

    pub async fn delete(&self, project_id: &str) -> Result<()> {
        self.client.delete_project(project_id).await?;
        info!("Deleted project {}", project_id);
        Ok(())
    }
}

/// Rebuild a graph from a stored project, skipping records that no longer
/// parse
pub fn graph_from_document(document: &ProjectDocument) -> GraphState {
    let nodes: Vec<GraphNode> = decode_all(&document.nodes, "node");
    let edges: Vec<GraphEdge> = decode_all(&document.edges, "edge");
    GraphState::from_parts(nodes, edges)
}

fn encode_all<T: serde::Serialize>(items: &[T]) -> serde_json::Result<Vec<Value>> {
    items.iter().map(serde_json::to_value).collect()
}

/// Decode stored records, skipping the ones that no longer parse
fn decode_all<T: DeserializeOwned>(raw: &[Value], what: &str) -> Vec<T> {
    raw.iter()
        .filter_map(|value| match serde_json::from_value(value.clone()) {
            Ok(item) => Some(item),
            Err(e) => {
                warn!("Skipping malformed {}: {}", what, e);
                None
            }
        })
        .collect()
}
