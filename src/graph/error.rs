//! Errors raised by graph store operations

use super::edge::EdgeId;
use super::node::NodeId;
use thiserror::Error;

/// Errors that can occur when mutating or querying a graph
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("Edge not found: {0}")]
    EdgeNotFound(EdgeId),

    #[error("Duplicate node key: {0}")]
    DuplicateNode(NodeId),

    #[error("Duplicate edge key: {0}")]
    DuplicateEdge(EdgeId),

    #[error("Edge {edge} references missing node {node}")]
    DanglingEdge { edge: EdgeId, node: NodeId },

    #[error("Invalid sign {0}: expected -1, 0 or 1")]
    InvalidSign(i64),
}

/// Result type for graph operations
pub type GraphResult<T> = Result<T, GraphError>;
