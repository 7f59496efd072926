// Lifecycle tracking for remote scan jobs: submit, poll, complete, cancel

use crate::error::{CoreError, Result};
use crate::graph::Domain;
use crate::notify::Notifier;
use crate::result::ToolResult;
use crate::tool::{ToolConfig, ToolKind};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use motegao_client::{ApiClient, RemoteStatus, TaskResultResponse};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum TaskState {
    Running { progress: u8 },
    Completed { result: Value },
    Failed { error: TaskFailure },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskFailure {
    /// The job never got a remote id
    Submission(String),
    /// The worker reported FAILURE
    Remote(String),
    /// The worker was killed or the job revoked
    Revoked,
}

impl std::fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskFailure::Submission(msg) => write!(f, "submission failed: {}", msg),
            TaskFailure::Remote(msg) => f.write_str(msg),
            TaskFailure::Revoked => f.write_str("worker was terminated"),
        }
    }
}

/// One run of one tool
#[derive(Debug, Clone)]
pub struct Task {
    pub tool: ToolKind,
    pub remote_id: Option<String>,
    pub state: TaskState,
    pub started_at: DateTime<Utc>,
    /// Polls that errored at the transport level; they never end the task
    pub failed_polls: u32,
}

impl Task {
    pub fn is_running(&self) -> bool {
        matches!(self.state, TaskState::Running { .. })
    }

    pub fn progress(&self) -> Option<u8> {
        match self.state {
            TaskState::Running { progress } => Some(progress),
            _ => None,
        }
    }
}

/// What the front end hears about a task
#[derive(Debug, Clone, PartialEq)]
pub enum TaskEvent {
    Progress { tool: ToolKind, progress: u8 },
    Completed { tool: ToolKind, result: ToolResult },
    Failed { tool: ToolKind, error: TaskFailure },
    PollFailed { tool: ToolKind, attempts: u32, error: String },
}

#[derive(Debug)]
enum PollOutcome {
    Response(TaskResultResponse),
    Error(String),
}

#[derive(Debug)]
struct PollMessage {
    tool: ToolKind,
    generation: u64,
    outcome: PollOutcome,
}

/// Background poll loop; aborted when dropped
struct Poller(JoinHandle<()>);

impl Drop for Poller {
    fn drop(&mut self) {
        self.0.abort();
    }
}

struct Entry {
    task: Task,
    generation: u64,
    poller: Option<Poller>,
}

/// Owns at most one task per tool. Poll results travel over a channel
/// tagged with the run's generation, so a superseded or cancelled run can
/// never touch the current one.
pub struct TaskTracker {
    client: ApiClient,
    poll_interval: Duration,
    notifier: Notifier,
    entries: HashMap<ToolKind, Entry>,
    next_generation: u64,
    tx: mpsc::UnboundedSender<PollMessage>,
    rx: mpsc::UnboundedReceiver<PollMessage>,
}

impl TaskTracker {
    pub fn new(client: ApiClient, poll_interval: Duration, notifier: Notifier) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            client,
            poll_interval: poll_interval.max(Duration::from_millis(1)),
            notifier,
            entries: HashMap::new(),
            next_generation: 0,
            tx,
            rx,
        }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn client_mut(&mut self) -> &mut ApiClient {
        &mut self.client
    }

    pub fn task(&self, tool: ToolKind) -> Option<&Task> {
        self.entries.get(&tool).map(|e| &e.task)
    }

    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.entries.values().map(|e| &e.task)
    }

    pub fn is_running(&self, tool: ToolKind) -> bool {
        self.task(tool).is_some_and(Task::is_running)
    }

    /// First running tool in a stable order
    pub fn running_tool(&self) -> Option<ToolKind> {
        ToolKind::ALL.into_iter().find(|t| self.is_running(*t))
    }

    /// Submit `config` against `domain` and start polling.
    ///
    /// Without a domain nothing is tracked. Any previous task for the same
    /// tool is discarded.
    pub async fn run(&mut self, config: &ToolConfig, domain: Option<&Domain>) -> Result<()> {
        let tool = config.kind();
        let Some(domain) = domain else {
            self.notifier.error(CoreError::NoDomainSelected.to_string());
            return Err(CoreError::NoDomainSelected);
        };

        if let Some(old) = self.entries.get(&tool)
            && old.task.is_running()
            && let Some(id) = &old.task.remote_id
        {
            warn!("Discarding running {} task {}", tool, id);
        }

        let generation = self.next_generation;
        self.next_generation += 1;
        self.entries.insert(
            tool,
            Entry {
                task: Task {
                    tool,
                    remote_id: None,
                    state: TaskState::Running { progress: 0 },
                    started_at: Utc::now(),
                    failed_polls: 0,
                },
                generation,
                poller: None,
            },
        );

        let request = config.to_request(&domain.name);
        match self.client.submit(&request).await {
            Ok(remote_id) => {
                info!("Submitted {} for {} as {}", tool, domain.name, remote_id);
                let poller = self.spawn_poller(tool, generation, remote_id.clone());
                if let Some(entry) = self.entries.get_mut(&tool) {
                    entry.task.remote_id = Some(remote_id);
                    entry.poller = Some(poller);
                }
                Ok(())
            }
            Err(e) => {
                warn!("Submission of {} failed: {}", tool, e);
                if let Some(entry) = self.entries.get_mut(&tool) {
                    entry.task.state = TaskState::Failed {
                        error: TaskFailure::Submission(e.to_string()),
                    };
                }
                self.notifier
                    .error(format!("Failed to run {}: {}", tool.display_name(), e));
                Err(CoreError::Submission { tool, source: e })
            }
        }
    }

    fn spawn_poller(&self, tool: ToolKind, generation: u64, remote_id: String) -> Poller {
        let client = self.client.clone();
        let tx = self.tx.clone();
        let period = self.poll_interval;

        Poller(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // First tick is immediate; the first poll waits one full period
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let (outcome, terminal) = match client.poll_result(&remote_id).await {
                    Ok(response) => {
                        let terminal = response.status.is_terminal();
                        (PollOutcome::Response(response), terminal)
                    }
                    Err(e) => {
                        warn!("Poll of {} task {} failed: {}", tool, remote_id, e);
                        (PollOutcome::Error(e.to_string()), false)
                    }
                };
                let message = PollMessage {
                    tool,
                    generation,
                    outcome,
                };
                if tx.send(message).is_err() || terminal {
                    break;
                }
            }
            debug!("Poller for {} task {} stopped", tool, remote_id);
        }))
    }

    fn has_live_poller(&self) -> bool {
        self.entries
            .values()
            .any(|e| e.poller.is_some() && e.task.is_running())
    }

    /// Wait for the next event. Returns `None` once nothing is running and
    /// every queued poll result has been handled.
    pub async fn next_event(&mut self) -> Option<TaskEvent> {
        loop {
            let message = if self.has_live_poller() {
                self.rx.recv().await?
            } else {
                self.rx.try_recv().ok()?
            };
            if let Some(event) = self.apply(message) {
                return Some(event);
            }
        }
    }

    /// Non-blocking variant of [`next_event`](Self::next_event)
    pub fn try_next_event(&mut self) -> Option<TaskEvent> {
        while let Ok(message) = self.rx.try_recv() {
            if let Some(event) = self.apply(message) {
                return Some(event);
            }
        }
        None
    }

    fn apply(&mut self, message: PollMessage) -> Option<TaskEvent> {
        let tool = message.tool;
        let Some(entry) = self
            .entries
            .get_mut(&tool)
            .filter(|e| e.generation == message.generation && e.task.is_running())
        else {
            debug!("Dropping stale poll result for {}", tool);
            return None;
        };

        let response = match message.outcome {
            PollOutcome::Error(error) => {
                entry.task.failed_polls += 1;
                return Some(TaskEvent::PollFailed {
                    tool,
                    attempts: entry.task.failed_polls,
                    error,
                });
            }
            PollOutcome::Response(response) => response,
        };

        match response.status {
            RemoteStatus::Progress => {
                let current = entry.task.progress().unwrap_or(0);
                let progress = response.progress().unwrap_or(current);
                entry.task.state = TaskState::Running { progress };
                Some(TaskEvent::Progress { tool, progress })
            }
            RemoteStatus::Success => {
                entry.poller = None;
                let result = ToolResult::interpret(tool, &response.result);
                entry.task.state = TaskState::Completed {
                    result: response.result,
                };
                info!("{} task completed", tool);
                self.notifier
                    .info(format!("{} completed successfully", tool.display_name()));
                Some(TaskEvent::Completed { tool, result })
            }
            RemoteStatus::Failure => {
                entry.poller = None;
                let error = TaskFailure::Remote(response.error_message());
                entry.task.state = TaskState::Failed {
                    error: error.clone(),
                };
                warn!("{} task failed: {}", tool, error);
                self.notifier
                    .error(format!("{} failed: {}", tool.display_name(), error));
                Some(TaskEvent::Failed { tool, error })
            }
            RemoteStatus::Revoked | RemoteStatus::Cancelled => {
                entry.poller = None;
                entry.task.state = TaskState::Failed {
                    error: TaskFailure::Revoked,
                };
                warn!("{} task revoked", tool);
                self.notifier.warn(format!(
                    "{} was terminated by the worker",
                    tool.display_name()
                ));
                Some(TaskEvent::Failed {
                    tool,
                    error: TaskFailure::Revoked,
                })
            }
            RemoteStatus::Pending
            | RemoteStatus::Started
            | RemoteStatus::Retry
            | RemoteStatus::Unknown => {
                debug!("{} task still {}", tool, response.status.as_str());
                None
            }
        }
    }

    /// Ask the backend to stop the running task for `tool`. The task is
    /// removed locally once the backend answers; whatever partial result it
    /// returned is interpreted and handed back.
    pub async fn cancel(&mut self, tool: ToolKind) -> Result<Option<ToolResult>> {
        let remote_id = match self.entries.get(&tool) {
            Some(entry) if entry.task.is_running() => entry.task.remote_id.clone(),
            _ => None,
        };
        let Some(remote_id) = remote_id else {
            self.notifier.error("No running task to cancel");
            return Err(CoreError::NoRemoteTask(tool));
        };

        // Stop polling first so a late result cannot land mid-cancel
        let generation = match self.entries.get_mut(&tool) {
            Some(entry) => {
                entry.poller = None;
                entry.generation
            }
            None => return Err(CoreError::NoRemoteTask(tool)),
        };

        match self.client.cancel(&remote_id).await {
            Ok(response) => {
                self.entries.remove(&tool);
                info!("Cancelled {} task {} ({})", tool, remote_id, response.status);
                self.notifier
                    .info(format!("{} cancelled", tool.display_name()));
                Ok(response
                    .partial_result()
                    .map(|raw| ToolResult::interpret(tool, raw))
                    .filter(|result| result.is_error() || !result.entries().is_empty()))
            }
            Err(e) => {
                warn!("Cancel of {} task {} failed: {}", tool, remote_id, e);
                let poller = self.spawn_poller(tool, generation, remote_id);
                if let Some(entry) = self.entries.get_mut(&tool) {
                    entry.poller = Some(poller);
                }
                self.notifier
                    .error(format!("Failed to cancel {}: {}", tool.display_name(), e));
                Err(CoreError::Api(e))
            }
        }
    }

    /// Best-effort cancel of everything still running, then forget all
    /// tasks. Failures are logged only.
    pub async fn shutdown(&mut self) {
        let pending = self.take_running();
        let client = self.client.clone();
        let cancels = pending.into_iter().map(|(tool, id)| {
            let client = client.clone();
            async move {
                match client.cancel(&id).await {
                    Ok(_) => debug!("Cancelled {} task {} on shutdown", tool, id),
                    Err(e) => warn!("Cancel of {} task {} on shutdown failed: {}", tool, id, e),
                }
            }
        });
        join_all(cancels).await;
    }

    fn take_running(&mut self) -> Vec<(ToolKind, String)> {
        self.entries
            .drain()
            .filter_map(|(tool, entry)| {
                if entry.task.is_running() {
                    entry.task.remote_id.map(|id| (tool, id))
                } else {
                    None
                }
            })
            .collect()
    }
}

impl Drop for TaskTracker {
    fn drop(&mut self) {
        let pending = self.take_running();
        if pending.is_empty() {
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!("{} task(s) left running remotely", pending.len());
            return;
        };
        for (tool, id) in pending {
            let client = self.client.clone();
            handle.spawn(async move {
                if let Err(e) = client.cancel(&id).await {
                    warn!("Cancel of {} task {} on drop failed: {}", tool, id, e);
                }
            });
        }
    }
}
