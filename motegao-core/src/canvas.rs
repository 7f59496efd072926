// The owning view: graph, tasks and persistence behind one set of actions

use crate::config::Config;
use crate::error::{CoreError, Result};
use crate::graph::{Domain, GraphNode, GraphState};
use crate::notify::Notifier;
use crate::persistence::{ProjectBridge, SaveStatus};
use crate::task::{TaskEvent, TaskTracker};
use crate::tool::{ToolConfig, ToolKind};
use motegao_client::ApiClient;
use tracing::{debug, warn};

pub struct Canvas {
    graph: GraphState,
    tracker: TaskTracker,
    bridge: ProjectBridge,
    notifier: Notifier,
    project_id: Option<String>,
    autosave: bool,
    // A completed result that has not been autosaved yet
    pending_save: bool,
}

impl Canvas {
    pub fn new(client: ApiClient, config: &Config, notifier: Notifier) -> Self {
        Self {
            graph: GraphState::new(),
            tracker: TaskTracker::new(client.clone(), config.poll_interval(), notifier.clone()),
            bridge: ProjectBridge::new(client, notifier.clone()),
            notifier,
            project_id: None,
            autosave: config.autosave,
            pending_save: false,
        }
    }

    pub fn graph(&self) -> &GraphState {
        &self.graph
    }

    pub fn tracker(&self) -> &TaskTracker {
        &self.tracker
    }

    pub fn save_status(&self) -> SaveStatus {
        self.bridge.status()
    }

    pub fn project_id(&self) -> Option<&str> {
        self.project_id.as_deref()
    }

    pub fn set_token(&mut self, token: Option<String>) {
        self.tracker.client_mut().set_token(token.clone());
        self.bridge.set_token(token);
    }

    /// Attach to a project and load it. A project that cannot be fetched
    /// opens empty.
    pub async fn open_project(&mut self, project_id: &str) -> bool {
        self.project_id = Some(project_id.to_string());
        self.bridge.load(project_id, &mut self.graph).await
    }

    /// Add a domain; the first one added to an empty selection becomes the
    /// active domain.
    pub async fn add_domain(&mut self, name: &str) -> Result<String> {
        let node_id = match self.graph.add_domain_node(name) {
            Ok(id) => id,
            Err(e) => {
                self.notifier.warn(e.to_string());
                return Err(e);
            }
        };
        if self.graph.selected_domain().is_none() {
            self.graph.select_domain(&node_id)?;
        }
        self.persist().await;
        Ok(node_id)
    }

    pub fn select_domain(&mut self, node_id: &str) -> Result<&Domain> {
        self.graph.select_domain(node_id)
    }

    /// Select a domain by name rather than node id
    pub fn select_domain_named(&mut self, name: &str) -> Result<&Domain> {
        let node_id = self
            .graph
            .find_domain(name)
            .map(Domain::node_id)
            .ok_or_else(|| CoreError::UnknownNode(name.to_string()))?;
        self.graph.select_domain(&node_id)
    }

    /// Start `config` against the selected domain. Only one tool may run
    /// at a time; re-running the busy tool replaces its task.
    pub async fn run_tool(&mut self, config: &ToolConfig) -> Result<()> {
        let tool = config.kind();
        if let Some(busy) = self.tracker.running_tool()
            && busy != tool
        {
            self.notifier.warn(CoreError::ToolBusy(busy).to_string());
            return Err(CoreError::ToolBusy(busy));
        }
        let domain = self.graph.selected_domain().cloned();
        self.tracker.run(config, domain.as_ref()).await
    }

    /// Wait for the next task event and apply it to the graph.
    ///
    /// Cancel safe: a completed result is appended before this returns and
    /// its autosave runs at the start of the next call, or on [`flush`] or
    /// [`close`]. Dropping the future never loses an applied event.
    ///
    /// [`flush`]: Canvas::flush
    /// [`close`]: Canvas::close
    pub async fn next_event(&mut self) -> Option<TaskEvent> {
        self.flush().await;
        let event = self.tracker.next_event().await?;
        if let TaskEvent::Completed { result, .. } = &event {
            self.graph.append_tool_result(result);
            self.bridge.mark_dirty();
            self.pending_save = true;
        }
        Some(event)
    }

    /// Run the autosave owed by a completed result, if any
    pub async fn flush(&mut self) {
        if self.pending_save {
            self.persist().await;
        }
    }

    /// Cancel the running task for `tool`, keeping any partial result on
    /// the canvas. Returns the id of the node created for it.
    pub async fn cancel_tool(&mut self, tool: ToolKind) -> Result<Option<String>> {
        let partial = self.tracker.cancel(tool).await?;
        let Some(result) = partial else {
            return Ok(None);
        };
        let node_id = self.graph.append_tool_result(&result);
        self.persist().await;
        Ok(Some(node_id))
    }

    pub async fn promote_subdomain(&mut self, result_node_id: &str, name: &str) -> Result<String> {
        match self.graph.promote_subdomain(result_node_id, name) {
            Ok(node_id) => {
                self.persist().await;
                Ok(node_id)
            }
            Err(e) => {
                self.notifier.warn(e.to_string());
                Err(e)
            }
        }
    }

    pub async fn delete_node(&mut self, node_id: &str) -> Result<GraphNode> {
        let removed = self.graph.delete_node(node_id)?;
        self.persist().await;
        Ok(removed)
    }

    /// Save now, regardless of the autosave setting
    pub async fn save(&mut self) -> Result<()> {
        let project_id = self.project_id.as_deref().ok_or(CoreError::NoProject)?;
        let saved = self.bridge.save(project_id, &self.graph).await;
        self.pending_save = false;
        saved
    }

    async fn persist(&mut self) {
        self.bridge.mark_dirty();
        if !self.autosave {
            self.pending_save = false;
            return;
        }
        let Some(project_id) = self.project_id.as_deref() else {
            debug!("No project open; change kept locally");
            self.pending_save = false;
            return;
        };
        // The bridge has already told the user
        if let Err(e) = self.bridge.save(project_id, &self.graph).await {
            warn!("Autosave failed: {}", e);
        }
        self.pending_save = false;
    }

    /// Tear down: autosave anything pending, then cancel whatever is still
    /// running. Failures are logged.
    pub async fn close(&mut self) {
        self.flush().await;
        self.tracker.shutdown().await;
    }
}
