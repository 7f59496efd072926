pub mod canvas;
pub mod config;
pub mod data;
pub mod error;
pub mod graph;
pub mod layout;
pub mod notify;
pub mod persistence;
pub mod result;
pub mod task;
pub mod tool;

pub use canvas::Canvas;
pub use config::Config;
pub use error::{CoreError, Result};
pub use graph::{Domain, GraphEdge, GraphNode, GraphState, NodeKind};
pub use notify::{Notice, NoticeLevel, Notifier};
pub use persistence::{ProjectBridge, SaveStatus};
pub use result::{NmapReport, PathHit, ToolResult};
pub use task::{Task, TaskEvent, TaskFailure, TaskState, TaskTracker};
pub use tool::{ToolConfig, ToolKind};
