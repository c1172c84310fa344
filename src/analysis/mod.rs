//! Analytics over the political graph
//!
//! Every algorithm is a pure function from an owned [`GraphSnapshot`] to a
//! result keyed by node id. The [`Coordinator`] runs them off the control
//! path and merges their results back into the live graph.
//!
//! # Algorithms
//!
//! - **layout**: ForceAtlas2 with optional Barnes–Hut approximation
//! - **community**: Louvain modularity optimisation
//! - **centrality**: Brandes betweenness, weighted or hop-count
//! - **balance**: signed triangle census and frustration index
//! - **embedding**: text embeddings and cosine search
//! - **representation**: two-layer graph encoder trained on node features
//!
//! # Example
//!
//! ```ignore
//! use polity::analysis::{AnalysisRequest, Coordinator, Outcome};
//!
//! let mut coordinator = Coordinator::new(graph);
//! coordinator.submit(AnalysisRequest::Community(Default::default()));
//! coordinator.submit(AnalysisRequest::Centrality(Default::default()));
//!
//! for completion in coordinator.drain().await? {
//!     if let Outcome::Applied { summary, .. } = completion.outcome {
//!         println!("{}: {} nodes updated", completion.kind, summary.updated);
//!     }
//! }
//! ```

pub mod balance;
pub mod centrality;
pub mod community;
mod coordinator;
pub mod embedding;
pub mod layout;
mod merger;
pub mod representation;
mod snapshot;
mod types;

pub use balance::{BalanceMode, BalanceReport};
pub use centrality::{CentralityConfig, CentralityResult};
pub use community::{CommunityConfig, CommunityResult};
pub use coordinator::{
    execute, Completion, Coordinator, CoordinatorError, DiscardReason, Outcome, Ticket, Workspace,
};
pub use embedding::{Embedder, EmbeddingError, EmbeddingResult, HashEmbedder, ResilientEmbedder, SearchHit};
pub use layout::{LayoutConfig, LayoutResult};
pub use merger::{MergeError, MergeSummary, ResultMerger};
pub use representation::{RepresentationConfig, RepresentationResult};
pub use snapshot::{GraphSnapshot, SnapshotEdge, SnapshotNode};
pub use types::{
    AnalysisError, AnalysisKind, AnalysisOutput, AnalysisRequest, CancellationToken, Generation, RequestId,
};
