use crate::model::{ConnectionId, NodeId, PortRef};
use thiserror::Error;

/// Caller misuse of the unchecked APIs. User-driven validation outcomes are
/// never reported through this type; see [`crate::connection`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GraphError {
    #[error("Node {0} not found")]
    NodeNotFound(NodeId),
    #[error("Connection {0} not found")]
    ConnectionNotFound(ConnectionId),
    #[error("Port {0} not found")]
    PortNotFound(PortRef),
    #[error("Node id {0} already exists")]
    DuplicateNodeId(NodeId),
    #[error("Connection id {0} already exists")]
    DuplicateConnectionId(ConnectionId),
    #[error("parameter '{0}' must be finite")]
    NonFinite(&'static str),
    #[error("Node {0} is not resizable")]
    NotResizable(NodeId),
    #[error("{expected} interaction is not active")]
    NoActiveInteraction { expected: &'static str },
    #[error("control point {index} out of range for connection {id}")]
    ControlPointOutOfRange { id: ConnectionId, index: usize },
    #[error("invalid document: {0}")]
    Document(String),
    #[error("invalid config: {0}")]
    Config(String),
}

impl GraphError {
    /// Stable snake_case code for host-facing error envelopes.
    pub fn code(&self) -> &'static str {
        match self {
            GraphError::NodeNotFound(_)
            | GraphError::ConnectionNotFound(_)
            | GraphError::PortNotFound(_) => "invalid_id",
            GraphError::DuplicateNodeId(_) | GraphError::DuplicateConnectionId(_) => "duplicate_id",
            GraphError::NonFinite(_) => "non_finite",
            GraphError::NotResizable(_) => "not_resizable",
            GraphError::NoActiveInteraction { .. } => "no_interaction",
            GraphError::ControlPointOutOfRange { .. } => "out_of_range",
            GraphError::Document(_) => "invalid_document",
            GraphError::Config(_) => "invalid_config",
        }
    }
}

pub type Result<T, E = GraphError> = std::result::Result<T, E>;
