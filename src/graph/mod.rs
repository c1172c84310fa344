//! Core graph data structures

mod edge;
mod error;
mod node;
mod provenance;
mod store;

#[cfg(test)]
mod tests;

pub use edge::{Edge, EdgeId, Sign};
pub use error::{GraphError, GraphResult};
pub use node::{
    Category, Jurisdiction, Node, NodeId, Position, ValidTime, DEFAULT_END_YEAR,
    DEFAULT_NODE_SIZE, DEFAULT_START_YEAR,
};
pub use provenance::{Classification, Method, Provenance};
pub use store::{Graph, GraphStats};
