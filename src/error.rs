//! Error types.

use crate::types::{AgentHandle, ObstacleId};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, NavError>;

/// Errors returned by the public engine API.
///
/// Query failures are not errors: they surface as `PathStatus::Failed`.
#[derive(Debug, Error)]
pub enum NavError {
    #[error("unknown agent {0}")]
    UnknownAgent(AgentHandle),

    #[error("agent id '{0}' is already registered")]
    DuplicateAgent(String),

    #[error("unknown obstacle {0}")]
    UnknownObstacle(ObstacleId),

    #[error("invalid obstacle: {0}")]
    InvalidObstacle(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("surface rebuild failed: {0}")]
    RebuildFailed(String),
}

/// Errors produced by the navigable-surface primitive. These never leave a
/// query slot; the slot converts them into a fallback attempt.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SurfaceError {
    #[error("path needs {needed} entries but the buffer holds {capacity}")]
    BufferOverflow { needed: usize, capacity: usize },

    #[error("location is not on the navigable surface")]
    InvalidLocation,
}
