//! Result type alias shared across the workspace.
//!
//! Defaults the error type to the common `AgentError`, so functions can simply
//! return `Result<T>`.
use crate::error::AgentError;

/// Workspace-wide `Result` alias with `AgentError` as the default error.
pub type Result<T, E = AgentError> = std::result::Result<T, E>;
