pub mod client;
pub mod error;
pub mod request;
pub mod response;

pub use client::ApiClient;
pub use error::ApiError;
pub use request::{NmapRequest, PathEnumRequest, SubdomainEnumRequest, ToolRequest};
pub use response::{
    CancelResponse, GoogleProfile, ProjectDocument, RemoteStatus, SubmitResponse,
    TaskResultResponse, TokenResponse,
};
