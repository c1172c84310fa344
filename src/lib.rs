//! Polity: temporal signed-graph analytics
//!
//! An in-memory model of a historical relationship network: entities
//! (people, organizations, events, ...) joined by signed, time-bounded
//! relationships, with the analytics that run over it.
//!
//! # Core Concepts
//!
//! - **Graph**: canonical multigraph of nodes and signed edges
//! - **Hydration**: loose documents normalized into the graph with
//!   deterministic defaults
//! - **Temporal filter**: which nodes and edges exist in a given year
//! - **Analytics**: layout, communities, centrality, structural balance,
//!   embeddings and learned representations, run off the control path by the
//!   [`Coordinator`]
//!
//! # Example
//!
//! ```
//! use polity::temporal;
//!
//! let (mut graph, report) = polity::ingest::load(
//!     r#"{"nodes": [{"id": "a"}, {"id": "b"}],
//!         "edges": [{"source": "a", "target": "b", "relationship": "opposed"}]}"#,
//! ).unwrap();
//! assert!(report.diagnostics.is_empty());
//! assert_eq!(graph.edges().next().unwrap().sign.value(), -1);
//!
//! let counts = temporal::apply_year(&mut graph, 1900);
//! assert_eq!(counts.visible_nodes, 2);
//! ```

pub mod analysis;
pub mod config;
pub mod graph;
pub mod ingest;
pub mod lcg;
pub mod llm;
pub mod storage;
pub mod temporal;

pub use analysis::{AnalysisError, AnalysisKind, AnalysisOutput, AnalysisRequest, Coordinator, Outcome};
pub use config::{ConfigError, PolityConfig};
pub use graph::{
    Category, Edge, EdgeId, Graph, GraphError, GraphResult, Jurisdiction, Node, NodeId, Provenance, Sign,
    ValidTime,
};
pub use ingest::{HydrationReport, Hydrator, IngestError};
pub use llm::{LanguageModel, LlmError, MockModel};
pub use storage::{InMemorySnapshotStore, OpenStore, SnapshotStore, SqliteSnapshotStore, StorageError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
