//! Language-model collaborator boundary
//!
//! The graph never calls a model directly. A [`LanguageModel`] receives a
//! bounded [`GraphContext`] exported from the graph and answers with
//! suggested operations or a summary. Suggestions are applied by
//! [`apply_suggestions`], one at a time, each carrying AI-inference
//! provenance. Edges a model proposes are always hypothetical.
//!
//! Two implementations ship with the crate:
//! - any caller-provided client implementing the trait
//! - `MockModel`: returns preconfigured responses (testing, offline use)

use crate::graph::{Category, Edge, EdgeId, Graph, Node, NodeId, Provenance, Sign};
use crate::ingest::{self, rules::RuleTable};
use crate::lcg::Lcg;
use async_trait::async_trait;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, VecDeque};
use tracing::{info, warn};

/// Errors from language-model operations
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("language model not available: {0}")]
    Unavailable(String),
    #[error("invocation failed: {0}")]
    InvocationFailed(String),
    #[error("response parse error: {0}")]
    ParseError(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextNode {
    pub id: NodeId,
    pub label: String,
    pub category: Category,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextEdge {
    pub source: NodeId,
    pub target: NodeId,
    pub relationship: String,
    pub sign: Sign,
}

/// The slice of the graph a model gets to see
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GraphContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focus: Option<NodeId>,
    pub nodes: Vec<ContextNode>,
    pub edges: Vec<ContextEdge>,
}

impl GraphContext {
    pub fn to_json(&self) -> Result<String, LlmError> {
        serde_json::to_string_pretty(self).map_err(|e| LlmError::ParseError(e.to_string()))
    }
}

/// Export visible nodes within `hops` of `focus`, or the whole visible
/// graph when there is no focus. Edges are kept when both ends are kept.
pub fn export_context(graph: &Graph, focus: Option<&NodeId>, hops: usize) -> GraphContext {
    let kept: BTreeSet<NodeId> = match focus {
        Some(start) if graph.contains_node(start) => {
            let mut seen = BTreeSet::from([start.clone()]);
            let mut queue = VecDeque::from([(start.clone(), 0usize)]);
            while let Some((id, depth)) = queue.pop_front() {
                if depth == hops {
                    continue;
                }
                for next in graph.neighbors(&id) {
                    let hidden = graph.node(&next).map_or(true, Node::is_hidden);
                    if !hidden && seen.insert(next.clone()) {
                        queue.push_back((next, depth + 1));
                    }
                }
            }
            seen
        }
        Some(_) => BTreeSet::new(),
        None => graph
            .nodes()
            .filter(|n| !n.is_hidden())
            .map(|n| n.id().clone())
            .collect(),
    };

    let nodes = graph
        .nodes()
        .filter(|n| kept.contains(n.id()))
        .map(|n| ContextNode {
            id: n.id().clone(),
            label: n.label.clone(),
            category: n.category,
            description: n.description.clone(),
        })
        .collect();
    let edges = graph
        .edges()
        .filter(|e| !e.is_hidden() && kept.contains(e.source()) && kept.contains(e.target()))
        .map(|e| ContextEdge {
            source: e.source().clone(),
            target: e.target().clone(),
            relationship: e.relationship.clone(),
            sign: e.sign,
        })
        .collect();

    GraphContext {
        focus: focus.cloned(),
        nodes,
        edges,
    }
}

/// A change a model proposes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum SuggestedOperation {
    AddNode {
        id: String,
        label: String,
        /// Free text, mapped onto the closed category vocabulary
        #[serde(default)]
        category: String,
        #[serde(default)]
        description: Option<String>,
    },
    AddEdge {
        source: String,
        target: String,
        relationship: String,
        /// Inferred from the relationship text when absent
        #[serde(default)]
        sign: Option<i64>,
        #[serde(default)]
        confidence: Option<f64>,
    },
}

/// Parse a model response: a JSON array of operations, optionally inside a
/// fenced code block
pub fn parse_suggestions(response: &str) -> Result<Vec<SuggestedOperation>, LlmError> {
    let fence = Regex::new(r"(?s)```(?:json)?\s*(.*?)```").map_err(|e| LlmError::ParseError(e.to_string()))?;
    let body = fence
        .captures(response)
        .and_then(|c| c.get(1))
        .map_or(response, |m| m.as_str());
    serde_json::from_str(body.trim()).map_err(|e| LlmError::ParseError(e.to_string()))
}

/// Client trait for language-model services.
///
/// Abstracts over transport so the graph doesn't depend on how a model is
/// reached.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Tag recorded in provenance for everything this model proposes
    fn name(&self) -> &str;

    /// Check if the service is reachable.
    async fn is_available(&self) -> bool;

    /// Propose graph operations for a context.
    async fn suggest(&self, context: &GraphContext) -> Result<Vec<SuggestedOperation>, LlmError>;

    /// Summarize a context in prose.
    async fn summarize(&self, context: &GraphContext) -> Result<String, LlmError>;
}

/// Mock model for testing: returns preconfigured responses.
pub struct MockModel {
    name: String,
    available: bool,
    suggestions: Option<String>,
    summary: Option<String>,
}

impl MockModel {
    /// Create a mock model that reports as available.
    pub fn available() -> Self {
        Self {
            name: "mock".to_string(),
            available: true,
            suggestions: None,
            summary: None,
        }
    }

    /// Create a mock model that reports as unavailable.
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::available()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Register the raw text returned by `suggest`. It goes through the
    /// same parser as a real response.
    pub fn with_suggestions(mut self, response: impl Into<String>) -> Self {
        self.suggestions = Some(response.into());
        self
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    fn check_available(&self) -> Result<(), LlmError> {
        if self.available {
            Ok(())
        } else {
            Err(LlmError::Unavailable("mock model configured as unavailable".to_string()))
        }
    }
}

#[async_trait]
impl LanguageModel for MockModel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn is_available(&self) -> bool {
        self.available
    }

    async fn suggest(&self, _context: &GraphContext) -> Result<Vec<SuggestedOperation>, LlmError> {
        self.check_available()?;
        match &self.suggestions {
            Some(response) => parse_suggestions(response),
            None => Err(LlmError::InvocationFailed("no mock suggestions configured".to_string())),
        }
    }

    async fn summarize(&self, context: &GraphContext) -> Result<String, LlmError> {
        self.check_available()?;
        Ok(self.summary.clone().unwrap_or_else(|| {
            format!("{} nodes, {} edges", context.nodes.len(), context.edges.len())
        }))
    }
}

/// What happened to one suggested operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SuggestionOutcome {
    AddedNode { id: NodeId },
    AddedEdge { id: EdgeId },
    Rejected { reason: String },
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SuggestionReport {
    /// One entry per operation, in input order
    pub outcomes: Vec<SuggestionOutcome>,
}

impl SuggestionReport {
    pub fn applied(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| !matches!(o, SuggestionOutcome::Rejected { .. }))
            .count()
    }

    pub fn rejected(&self) -> usize {
        self.outcomes.len() - self.applied()
    }
}

/// Apply suggestions to the graph. Each operation is validated on its own;
/// a rejected one leaves the graph as it was and does not stop the rest.
pub fn apply_suggestions(
    graph: &mut Graph,
    operations: &[SuggestedOperation],
    model: &str,
    rules: &RuleTable,
) -> SuggestionReport {
    let mut report = SuggestionReport::default();
    for (index, op) in operations.iter().enumerate() {
        let outcome = match apply_one(graph, op, model, rules) {
            Ok(outcome) => outcome,
            Err(reason) => {
                warn!(index, %reason, "rejected suggested operation");
                SuggestionOutcome::Rejected { reason }
            }
        };
        report.outcomes.push(outcome);
    }
    info!(
        model,
        applied = report.applied(),
        rejected = report.rejected(),
        "applied model suggestions"
    );
    report
}

fn apply_one(
    graph: &mut Graph,
    op: &SuggestedOperation,
    model: &str,
    rules: &RuleTable,
) -> Result<SuggestionOutcome, String> {
    let provenance = Provenance::ai_inference(model, Some(model.to_string()));
    match op {
        SuggestedOperation::AddNode {
            id,
            label,
            category,
            description,
        } => {
            let id = id.trim();
            if id.is_empty() {
                return Err("node id is empty".to_string());
            }
            let label = if label.trim().is_empty() { id } else { label.as_str() };
            let position = ingest::initial_position(id, &mut Lcg::from_text(id), 50.0);
            let mut node = Node::new(id, label, ingest::rules::category(category))
                .with_jurisdiction(rules.jurisdiction(id, label))
                .with_position(position)
                .with_provenance(provenance);
            if let Some(description) = description {
                node = node.with_description(description.as_str());
            }
            let id = graph.add_node(node).map_err(|e| e.to_string())?;
            Ok(SuggestionOutcome::AddedNode { id })
        }
        SuggestedOperation::AddEdge {
            source,
            target,
            relationship,
            sign,
            confidence,
        } => {
            let sign = match sign {
                Some(value) => Sign::try_from(*value).map_err(|e| e.to_string())?,
                None => rules.sign(relationship),
            };
            let provenance = match confidence {
                Some(c) => provenance.with_confidence(*c),
                None => provenance,
            };
            let edge = Edge::new(source.as_str(), target.as_str(), relationship.as_str())
                .with_sign(sign)
                .hypothetical()
                .with_provenance(provenance);
            let id = graph.add_edge(edge).map_err(|e| e.to_string())?;
            Ok(SuggestionOutcome::AddedEdge { id })
        }
    }
}

/// Ask a model for suggestions around `focus` and apply them.
///
/// An unavailable model is reported as `LlmError::Unavailable` without
/// invoking it.
pub async fn suggest_and_apply(
    graph: &mut Graph,
    model: &dyn LanguageModel,
    focus: Option<&NodeId>,
    hops: usize,
    rules: &RuleTable,
) -> Result<SuggestionReport, LlmError> {
    if !model.is_available().await {
        return Err(LlmError::Unavailable(model.name().to_string()));
    }
    let context = export_context(graph, focus, hops);
    let operations = model.suggest(&context).await?;
    Ok(apply_suggestions(graph, &operations, model.name(), rules))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Classification, Method};

    fn graph() -> Graph {
        let mut g = Graph::new();
        for (id, label) in [("a", "Alpha"), ("b", "Beta"), ("c", "Gamma"), ("d", "Delta")] {
            g.add_node(Node::new(id, label, Category::Person)).unwrap();
        }
        g.add_edge(Edge::new("a", "b", "allied")).unwrap();
        g.add_edge(Edge::new("b", "c", "allied")).unwrap();
        g.add_edge(Edge::new("c", "d", "allied")).unwrap();
        g
    }

    #[test]
    fn context_respects_hops() {
        let g = graph();
        let ctx = export_context(&g, Some(&NodeId::from("a")), 1);
        let ids: Vec<_> = ctx.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(ctx.edges.len(), 1);

        let ctx = export_context(&g, Some(&NodeId::from("a")), 2);
        assert_eq!(ctx.nodes.len(), 3);
        assert_eq!(export_context(&g, None, 0).nodes.len(), 4);
        assert!(export_context(&g, Some(&NodeId::from("zzz")), 3).nodes.is_empty());
    }

    #[test]
    fn parses_fenced_response() {
        let response = "Here you go:\n```json\n[{\"op\": \"add_edge\", \"source\": \"a\", \"target\": \"d\", \"relationship\": \"rivals\"}]\n```";
        let ops = parse_suggestions(response).unwrap();
        assert_eq!(ops.len(), 1);
        assert!(matches!(&ops[0], SuggestedOperation::AddEdge { sign: None, .. }));
        assert!(matches!(parse_suggestions("not json"), Err(LlmError::ParseError(_))));
    }

    #[test]
    fn suggestions_carry_ai_provenance() {
        let mut g = graph();
        let ops = vec![
            SuggestedOperation::AddNode {
                id: "e".into(),
                label: "Epsilon Lodge".into(),
                category: "organization".into(),
                description: None,
            },
            SuggestedOperation::AddEdge {
                source: "a".into(),
                target: "e".into(),
                relationship: "rivals".into(),
                sign: None,
                confidence: Some(0.6),
            },
        ];
        let report = apply_suggestions(&mut g, &ops, "test-model", &RuleTable::default());
        assert_eq!(report.applied(), 2);

        let node = g.node(&NodeId::from("e")).unwrap();
        assert_eq!(node.category, Category::Organization);
        assert_eq!(node.provenance()[0].classification, Classification::AiInference);

        let edge = g.edges().find(|e| e.target().as_str() == "e").unwrap();
        assert!(edge.hypothetical);
        assert_eq!(edge.sign, Sign::Negative);
        let p = &edge.provenance()[0];
        assert_eq!(p.method, Method::Inference);
        assert_eq!(p.model.as_deref(), Some("test-model"));
        assert_eq!(p.confidence, 0.6);
    }

    #[test]
    fn bad_operations_rejected_independently() {
        let mut g = graph();
        let ops = vec![
            SuggestedOperation::AddEdge {
                source: "a".into(),
                target: "ghost".into(),
                relationship: "knew".into(),
                sign: None,
                confidence: None,
            },
            SuggestedOperation::AddEdge {
                source: "a".into(),
                target: "c".into(),
                relationship: "knew".into(),
                sign: Some(7),
                confidence: None,
            },
            SuggestedOperation::AddNode {
                id: "a".into(),
                label: "Duplicate".into(),
                category: "person".into(),
                description: None,
            },
            SuggestedOperation::AddEdge {
                source: "a".into(),
                target: "d".into(),
                relationship: "knew".into(),
                sign: Some(1),
                confidence: None,
            },
        ];
        let report = apply_suggestions(&mut g, &ops, "m", &RuleTable::default());
        assert_eq!(report.rejected(), 3);
        assert!(matches!(report.outcomes[3], SuggestionOutcome::AddedEdge { .. }));
        assert_eq!(g.edge_count(), 4);
        assert_eq!(g.node(&NodeId::from("a")).unwrap().label, "Alpha");
        g.validate().unwrap();
    }

    #[tokio::test]
    async fn unavailable_model_is_not_invoked() {
        let mut g = graph();
        let model = MockModel::unavailable().with_suggestions("[]");
        let err = suggest_and_apply(&mut g, &model, None, 1, &RuleTable::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::Unavailable(_)));
    }

    #[tokio::test]
    async fn mock_model_round_trip() {
        let mut g = graph();
        let model = MockModel::available()
            .with_name("mock-7b")
            .with_suggestions(r#"[{"op": "add_edge", "source": "b", "target": "d", "relationship": "founded", "sign": 1}]"#);
        let report = suggest_and_apply(&mut g, &model, Some(&NodeId::from("b")), 2, &RuleTable::default())
            .await
            .unwrap();
        assert_eq!(report.applied(), 1);

        let summary = model.summarize(&export_context(&g, None, 0)).await.unwrap();
        assert_eq!(summary, "4 nodes, 4 edges");
    }
}
