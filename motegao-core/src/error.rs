use crate::tool::ToolKind;
use motegao_client::ApiError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Please select a domain first")]
    NoDomainSelected,

    #[error("Domain {0} already exists")]
    DuplicateDomain(String),

    #[error("Domain name must not be empty")]
    EmptyDomain,

    #[error("Unknown node: {0}")]
    UnknownNode(String),

    #[error("Node {0} is not a subdomain result")]
    NotSubdomainResult(String),

    #[error("{name} is not listed on result node {node}")]
    SubdomainNotListed { node: String, name: String },

    #[error("No running {0} task to cancel")]
    NoRemoteTask(ToolKind),

    #[error("{0} is already running; wait for it to finish or cancel it")]
    ToolBusy(ToolKind),

    #[error("Failed to run {tool}: {source}")]
    Submission {
        tool: ToolKind,
        #[source]
        source: ApiError,
    },

    #[error("No project is open")]
    NoProject,

    #[error("Save failed: {0}")]
    SaveFailed(#[source] ApiError),

    #[error("API error: {0}")]
    Api(#[from] ApiError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
