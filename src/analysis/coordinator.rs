//! Offload coordinator
//!
//! Owns the live graph. Each submitted request runs on tokio's blocking pool
//! against an owned snapshot; results come back over an mpsc channel and
//! are merged on the caller's task, one at a time, in submission order.
//!
//! - At most one request per `AnalysisKind` is in flight. A newer request
//!   cancels the older one, whose result is then discarded as superseded.
//! - Every snapshot is tagged with the graph generation. Replacing the graph
//!   bumps the generation, so results computed on the old graph are
//!   discarded as stale.
//! - A panicking algorithm surfaces as `AnalysisError::Crashed`; the graph
//!   is untouched and nothing is retried.

use super::embedding::{self, Embedder, HashEmbedder, ResilientEmbedder};
use super::merger::{MergeSummary, ResultMerger};
use super::snapshot::GraphSnapshot;
use super::types::{
    AnalysisError, AnalysisKind, AnalysisOutput, AnalysisRequest, CancellationToken, Generation, RequestId,
};
use super::{balance, centrality, community, layout, representation};
use crate::graph::Graph;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("Result channel closed")]
    ChannelClosed,
}

/// The live graph and the generation it belongs to
#[derive(Debug, Clone, Default)]
pub struct Workspace {
    graph: Graph,
    generation: Generation,
}

impl Workspace {
    pub fn new(graph: Graph) -> Self {
        Self { graph, generation: 0 }
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }
}

/// Why a completed result was dropped without merging
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscardReason {
    /// A newer request of the same kind was submitted
    Superseded,
    /// The graph was replaced after the snapshot was taken
    Stale,
    /// Cancelled explicitly
    Cancelled,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Applied {
        output: AnalysisOutput,
        summary: MergeSummary,
    },
    Failed(AnalysisError),
    Discarded(DiscardReason),
}

/// Handle returned by `submit`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    pub request_id: RequestId,
    pub kind: AnalysisKind,
    pub sequence: u64,
    pub generation: Generation,
}

/// A request that has been released from the coordinator
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub request_id: RequestId,
    pub kind: AnalysisKind,
    pub sequence: u64,
    pub generation: Generation,
    pub outcome: Outcome,
}

#[derive(Debug)]
struct InFlight {
    sequence: u64,
    token: CancellationToken,
}

#[derive(Debug)]
struct Pending {
    request_id: RequestId,
    kind: AnalysisKind,
    discard: Option<DiscardReason>,
}

#[derive(Debug)]
struct TaskMessage {
    sequence: u64,
    generation: Generation,
    result: Result<AnalysisOutput, AnalysisError>,
}

pub struct Coordinator {
    workspace: Workspace,
    embedder: Arc<dyn Embedder>,
    merger: ResultMerger,
    in_flight: BTreeMap<AnalysisKind, InFlight>,
    /// Submitted and not yet released, by sequence
    pending: BTreeMap<u64, Pending>,
    /// Finished but waiting for an earlier request
    ready: BTreeMap<u64, TaskMessage>,
    next_sequence: u64,
    tx: mpsc::UnboundedSender<TaskMessage>,
    rx: mpsc::UnboundedReceiver<TaskMessage>,
}

impl Coordinator {
    /// Coordinator with the offline hash embedder
    pub fn new(graph: Graph) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            workspace: Workspace::new(graph),
            embedder: Arc::new(ResilientEmbedder::fallback_only(HashEmbedder::default())),
            merger: ResultMerger::new(),
            in_flight: BTreeMap::new(),
            pending: BTreeMap::new(),
            ready: BTreeMap::new(),
            next_sequence: 0,
            tx,
            rx,
        }
    }

    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = embedder;
        self
    }

    pub fn with_merger(mut self, merger: ResultMerger) -> Self {
        self.merger = merger;
        self
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn graph(&self) -> &Graph {
        &self.workspace.graph
    }

    /// User edits go through the control path like merges do
    pub fn graph_mut(&mut self) -> &mut Graph {
        &mut self.workspace.graph
    }

    pub fn generation(&self) -> Generation {
        self.workspace.generation
    }

    /// Kinds with a request still running
    pub fn in_flight(&self) -> Vec<AnalysisKind> {
        self.in_flight.keys().copied().collect()
    }

    /// Number of submitted requests not yet released
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Snapshot the graph and start `request` on the blocking pool.
    ///
    /// Must be called from within a tokio runtime.
    pub fn submit(&mut self, request: AnalysisRequest) -> Ticket {
        let kind = request.kind();
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        let request_id = RequestId::new();
        let generation = self.workspace.generation;
        let token = CancellationToken::new();

        let previous = self.in_flight.insert(
            kind,
            InFlight {
                sequence,
                token: token.clone(),
            },
        );
        if let Some(previous) = previous {
            previous.token.cancel();
            if let Some(p) = self.pending.get_mut(&previous.sequence) {
                p.discard.get_or_insert(DiscardReason::Superseded);
                debug!(%kind, superseded = %p.request_id, "superseding in-flight request");
            }
        }
        self.pending.insert(
            sequence,
            Pending {
                request_id,
                kind,
                discard: None,
            },
        );

        let snapshot = GraphSnapshot::from_graph(&self.workspace.graph, generation);
        let embedder = Arc::clone(&self.embedder);
        let tx = self.tx.clone();
        debug!(%kind, %request_id, sequence, generation, "submitting analysis");
        tokio::task::spawn_blocking(move || {
            let result = panic::catch_unwind(AssertUnwindSafe(|| {
                execute(&request, &snapshot, embedder.as_ref(), &token)
            }))
            .unwrap_or_else(|payload| Err(AnalysisError::Crashed(panic_message(payload))));
            // A send error means the coordinator is gone; nothing to report to
            let _ = tx.send(TaskMessage {
                sequence,
                generation,
                result,
            });
        });

        Ticket {
            request_id,
            kind,
            sequence,
            generation,
        }
    }

    /// Cancel the in-flight request of `kind`, if any
    pub fn cancel(&mut self, kind: AnalysisKind) -> bool {
        match self.in_flight.remove(&kind) {
            Some(flight) => {
                flight.token.cancel();
                if let Some(p) = self.pending.get_mut(&flight.sequence) {
                    p.discard.get_or_insert(DiscardReason::Cancelled);
                }
                true
            }
            None => false,
        }
    }

    /// Replace the graph wholesale. Everything in flight is cancelled and
    /// its results will be discarded as stale.
    pub fn replace_graph(&mut self, graph: Graph) -> Generation {
        for (_, flight) in std::mem::take(&mut self.in_flight) {
            flight.token.cancel();
        }
        self.workspace.graph = graph;
        self.workspace.generation += 1;
        info!(generation = self.workspace.generation, "graph replaced");
        self.workspace.generation
    }

    /// Wait for the next request in submission order and merge it.
    ///
    /// Returns `None` when nothing is pending.
    pub async fn next_completion(&mut self) -> Result<Option<Completion>, CoordinatorError> {
        loop {
            let Some(&head) = self.pending.keys().next() else {
                return Ok(None);
            };
            if let Some(message) = self.ready.remove(&head) {
                if let Some((_, pending)) = self.pending.pop_first() {
                    return Ok(Some(self.settle(pending, message)));
                }
            }
            let message = self.rx.recv().await.ok_or(CoordinatorError::ChannelClosed)?;
            self.ready.insert(message.sequence, message);
        }
    }

    /// Wait for and merge everything pending
    pub async fn drain(&mut self) -> Result<Vec<Completion>, CoordinatorError> {
        let mut completions = Vec::new();
        while let Some(completion) = self.next_completion().await? {
            completions.push(completion);
        }
        Ok(completions)
    }

    /// Submit one request and wait for everything up to and including it
    pub async fn run(&mut self, request: AnalysisRequest) -> Result<Completion, CoordinatorError> {
        let ticket = self.submit(request);
        loop {
            match self.next_completion().await? {
                Some(c) if c.sequence == ticket.sequence => return Ok(c),
                Some(_) => continue,
                None => return Err(CoordinatorError::ChannelClosed),
            }
        }
    }

    fn settle(&mut self, pending: Pending, message: TaskMessage) -> Completion {
        let sequence = message.sequence;
        let Pending {
            request_id,
            kind,
            discard,
        } = pending;
        if self.in_flight.get(&kind).is_some_and(|flight| flight.sequence == sequence) {
            self.in_flight.remove(&kind);
        }

        let outcome = if let Some(reason) = discard {
            Outcome::Discarded(reason)
        } else if message.generation != self.workspace.generation {
            Outcome::Discarded(DiscardReason::Stale)
        } else {
            match message.result {
                Err(AnalysisError::Cancelled) => Outcome::Discarded(DiscardReason::Cancelled),
                Err(e) => {
                    warn!(%kind, %request_id, error = %e, "analysis failed");
                    Outcome::Failed(e)
                }
                Ok(output) => match self.merger.merge(&mut self.workspace.graph, &output) {
                    Ok(summary) => Outcome::Applied { output, summary },
                    Err(e) => {
                        warn!(%kind, %request_id, error = %e, "analysis result rejected");
                        Outcome::Failed(AnalysisError::InvalidInput(e.to_string()))
                    }
                },
            }
        };
        if let Outcome::Discarded(reason) = &outcome {
            debug!(%kind, %request_id, ?reason, "analysis result discarded");
        }

        Completion {
            request_id,
            kind,
            sequence,
            generation: message.generation,
            outcome,
        }
    }
}

/// Run one request against a snapshot. Pure apart from the embedder.
pub fn execute(
    request: &AnalysisRequest,
    snapshot: &GraphSnapshot,
    embedder: &dyn Embedder,
    token: &CancellationToken,
) -> Result<AnalysisOutput, AnalysisError> {
    match request {
        AnalysisRequest::Layout(config) => layout::run(snapshot, config, token).map(AnalysisOutput::Layout),
        AnalysisRequest::Community(config) => {
            community::run(snapshot, config, token).map(AnalysisOutput::Community)
        }
        AnalysisRequest::Centrality(config) => {
            centrality::run(snapshot, config, token).map(AnalysisOutput::Centrality)
        }
        AnalysisRequest::Balance { mode } => balance::run(snapshot, *mode, token).map(AnalysisOutput::Balance),
        AnalysisRequest::EmbedNodes => {
            embedding::embed_nodes(snapshot, embedder, token).map(AnalysisOutput::Embeddings)
        }
        AnalysisRequest::Search { query, top_k } => {
            embedding::search_text(snapshot, embedder, query, *top_k, token)
                .map(|hits| AnalysisOutput::Search { hits })
        }
        AnalysisRequest::Representation(config) => {
            representation::run(snapshot, config, token).map(AnalysisOutput::Representation)
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
