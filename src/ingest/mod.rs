//! Hydration: loosely structured documents into the canonical graph
//!
//! Accepts two shapes:
//! - the loose shape (`nodes`, `edges`, optional `myths`, optional
//!   `metadata`) with missing fields and inconsistent key names, which is
//!   normalized with deterministic defaults
//! - the canonical shape written by [`export`], imported at full fidelity
//!
//! Malformed top-level input aborts the load. Malformed records are dropped
//! with a diagnostic and ingestion continues.

mod canonical;
mod dates;
pub mod rules;

pub use canonical::{
    export, import, is_canonical, CanonicalDocument, CANONICAL_FORMAT, CANONICAL_VERSION,
};
pub use dates::{interval_or_default, parse_interval};

use crate::graph::{
    Classification, Edge, EdgeId, Graph, GraphError, Method, Node, NodeId, Position, Provenance,
    Sign, ValidTime,
};
use crate::lcg::Lcg;
use rules::RuleTable;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Fatal ingestion errors
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Document is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Document top level must be an object")]
    NotAnObject,

    #[error("Unsupported canonical version {0}")]
    UnsupportedVersion(u32),

    #[error("Canonical document violates graph invariants: {0}")]
    Graph(#[from] GraphError),
}

/// Hydration settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HydrationConfig {
    /// Seed for the layout jitter generator
    pub seed: u32,
    /// Maximum jitter applied to hash-derived positions
    pub jitter: f64,
    /// Provenance source name when the document's metadata names none
    pub default_source: String,
}

impl Default for HydrationConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            jitter: 50.0,
            default_source: "import".to_string(),
        }
    }
}

/// Which record list a diagnostic refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Node,
    Edge,
    Myth,
}

/// A dropped or degraded record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: RecordKind,
    /// Position of the record in its list
    pub index: usize,
    pub reason: String,
}

/// Which document shape was detected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentShape {
    Loose,
    Canonical,
}

/// Summary of a hydration run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HydrationReport {
    pub shape: DocumentShape,
    pub nodes_added: usize,
    pub edges_added: usize,
    pub myths_added: usize,
    pub diagnostics: Vec<Diagnostic>,
}

impl HydrationReport {
    fn new(shape: DocumentShape) -> Self {
        Self {
            shape,
            nodes_added: 0,
            edges_added: 0,
            myths_added: 0,
            diagnostics: Vec::new(),
        }
    }

    fn drop_record(&mut self, kind: RecordKind, index: usize, reason: impl Into<String>) {
        let reason = reason.into();
        warn!(?kind, index, %reason, "dropping record");
        self.diagnostics.push(Diagnostic { kind, index, reason });
    }
}

/// Keys consumed by node normalization; anything else lands in `extra`
const NODE_KEYS: &[&str] = &[
    "id", "key", "label", "name", "title", "type", "category", "description", "desc",
    "summary", "date", "dates", "period", "start_year", "end_year", "jurisdiction",
    "financial_weight", "secrecy_level", "embedding",
];

const EDGE_KEYS: &[&str] = &[
    "id", "key", "source", "from", "target", "to", "label", "relationship", "relation",
    "type", "weight", "date", "dates", "period", "start_year", "end_year", "hypothetical",
    "is_hypothetical",
];

/// Relationship label for edges created by the myth pass
pub const MYTH_RELATIONSHIP: &str = "mythologizes";

/// Converts documents into graphs
#[derive(Debug, Clone, Default)]
pub struct Hydrator {
    config: HydrationConfig,
    rules: RuleTable,
}

impl Hydrator {
    pub fn new(config: HydrationConfig) -> Self {
        Self {
            config,
            rules: RuleTable::default(),
        }
    }

    /// Replace the keyword rule tables
    pub fn with_rules(mut self, rules: RuleTable) -> Self {
        self.rules = rules;
        self
    }

    pub fn rules(&self) -> &RuleTable {
        &self.rules
    }

    /// Parse and load a document, detecting its shape
    pub fn load_str(&self, input: &str) -> Result<(Graph, HydrationReport), IngestError> {
        let value: Value = serde_json::from_str(input)?;
        self.load(&value)
    }

    /// Load a parsed document, detecting its shape
    pub fn load(&self, value: &Value) -> Result<(Graph, HydrationReport), IngestError> {
        if !value.is_object() {
            return Err(IngestError::NotAnObject);
        }
        if is_canonical(value) {
            let doc: CanonicalDocument = serde_json::from_value(value.clone())?;
            let graph = import(doc)?;
            let mut report = HydrationReport::new(DocumentShape::Canonical);
            report.nodes_added = graph.node_count();
            report.edges_added = graph.edge_count();
            info!(nodes = report.nodes_added, edges = report.edges_added, "imported canonical document");
            return Ok((graph, report));
        }
        self.hydrate(value)
    }

    /// Hydrate a loose document
    pub fn hydrate(&self, value: &Value) -> Result<(Graph, HydrationReport), IngestError> {
        let doc = value.as_object().ok_or(IngestError::NotAnObject)?;
        let mut graph = Graph::new();
        let mut report = HydrationReport::new(DocumentShape::Loose);
        let mut rng = Lcg::new(self.config.seed);
        let source = source_name(doc.get("metadata"), &self.config.default_source);

        for (index, record) in list(doc, "nodes", RecordKind::Node, &mut report).iter().enumerate() {
            match self.node_from_record(record, &source, &mut rng) {
                Ok(node) => match graph.add_node(node) {
                    Ok(_) => report.nodes_added += 1,
                    Err(e) => report.drop_record(RecordKind::Node, index, e.to_string()),
                },
                Err(reason) => report.drop_record(RecordKind::Node, index, reason),
            }
        }

        for (index, record) in list(doc, "edges", RecordKind::Edge, &mut report).iter().enumerate() {
            match self.edge_from_record(record, index, &source) {
                Ok(edge) => match graph.add_edge(edge) {
                    Ok(_) => report.edges_added += 1,
                    Err(e) => report.drop_record(RecordKind::Edge, index, e.to_string()),
                },
                Err(reason) => report.drop_record(RecordKind::Edge, index, reason),
            }
        }

        for (index, record) in list(doc, "myths", RecordKind::Myth, &mut report).iter().enumerate() {
            self.ingest_myth(&mut graph, &mut report, record, index, &source, &mut rng);
        }

        info!(
            nodes = report.nodes_added,
            edges = report.edges_added,
            myths = report.myths_added,
            dropped = report.diagnostics.len(),
            "hydrated document"
        );
        Ok((graph, report))
    }

    fn node_from_record(&self, record: &Value, source: &str, rng: &mut Lcg) -> Result<Node, String> {
        let obj = record.as_object().ok_or("node record is not an object")?;
        let id = identity(obj, &["id", "key"]).ok_or("node has no id or key")?;
        let label = text(obj, &["label", "name", "title"]).unwrap_or_else(|| id.clone());
        let category = text(obj, &["type", "category"])
            .map(|raw| rules::category(&raw))
            .unwrap_or_else(|| rules::category(""));
        let jurisdiction = text(obj, &["jurisdiction"])
            .and_then(|j| j.parse().ok())
            .unwrap_or_else(|| self.rules.jurisdiction(&id, &label));

        let mut node = Node::new(id.as_str(), label, category)
            .with_jurisdiction(jurisdiction)
            .with_valid_time(valid_time(obj))
            .with_position(initial_position(&id, rng, self.config.jitter))
            .with_provenance(Provenance::archival(source));
        if let Some(description) = text(obj, &["description", "desc", "summary"]) {
            node.description = description;
        }
        if let Some(fw) = obj.get("financial_weight").and_then(Value::as_f64) {
            node.set_financial_weight(fw);
        }
        if let Some(level) = obj.get("secrecy_level").and_then(Value::as_f64) {
            node.set_secrecy_level(level.round() as i64);
        }
        if let Some(vector) = obj.get("embedding").and_then(float_vector) {
            node.set_embedding(Some(vector));
        }
        node.extra = leftovers(obj, NODE_KEYS);
        Ok(node)
    }

    fn edge_from_record(&self, record: &Value, index: usize, source: &str) -> Result<Edge, String> {
        let obj = record.as_object().ok_or("edge record is not an object")?;
        let from = identity(obj, &["source", "from"]).ok_or("edge has no source")?;
        let to = identity(obj, &["target", "to"]).ok_or("edge has no target")?;
        let relationship =
            text(obj, &["label", "relationship", "relation", "type"]).unwrap_or_else(|| "related".to_string());
        let id = identity(obj, &["id", "key"])
            .map(EdgeId::from_string)
            .unwrap_or_else(|| derived_edge_id(&from, &to, &relationship, index));
        let sign = self.rules.sign(&relationship);
        let weight = obj
            .get("weight")
            .and_then(Value::as_f64)
            .map(|w| w.round() as i64)
            .unwrap_or(1);
        let hypothetical = obj
            .get("hypothetical")
            .or_else(|| obj.get("is_hypothetical"))
            .and_then(Value::as_bool)
            .unwrap_or(false);

        let mut edge = Edge::with_id(id, from, to, relationship)
            .with_sign(sign)
            .with_weight(weight)
            .with_valid_time(valid_time(obj))
            .with_provenance(Provenance::archival(source));
        edge.hypothetical = hypothetical;
        edge.extra = leftovers(obj, EDGE_KEYS);
        Ok(edge)
    }

    fn ingest_myth(
        &self,
        graph: &mut Graph,
        report: &mut HydrationReport,
        record: &Value,
        index: usize,
        source: &str,
        rng: &mut Lcg,
    ) {
        let Some(obj) = record.as_object() else {
            report.drop_record(RecordKind::Myth, index, "myth record is not an object");
            return;
        };
        let title = text(obj, &["title", "name", "label"]);
        let Some(id) = identity(obj, &["id", "key"])
            .or_else(|| title.as_deref().map(|t| format!("myth:{}", slug(t))))
            .filter(|id| id != "myth:")
        else {
            report.drop_record(RecordKind::Myth, index, "myth has no id, key or title");
            return;
        };

        let provenance = Provenance::new(source, Method::Inference, Classification::Myth);
        let mut node = Node::new(id.as_str(), title.unwrap_or_else(|| id.clone()), crate::graph::Category::Myth)
            .with_jurisdiction(self.rules.jurisdiction(&id, ""))
            .with_valid_time(valid_time(obj))
            .with_position(initial_position(&id, rng, self.config.jitter))
            .with_provenance(provenance.clone());
        if let Some(description) = text(obj, &["description", "desc", "summary"]) {
            node.description = description;
        }
        let myth_id = match graph.add_node(node) {
            Ok(id) => id,
            Err(e) => {
                report.drop_record(RecordKind::Myth, index, e.to_string());
                return;
            }
        };
        report.myths_added += 1;

        for target in references(obj) {
            let target_id = NodeId::from_string(target.as_str());
            if !graph.contains_node(&target_id) || target_id == myth_id {
                debug!(myth = %myth_id, target = %target, "myth reference not in graph; skipped");
                continue;
            }
            let edge = Edge::with_id(
                derived_edge_id(myth_id.as_str(), &target, MYTH_RELATIONSHIP, index),
                myth_id.clone(),
                target_id,
                MYTH_RELATIONSHIP,
            )
            .with_sign(Sign::Neutral)
            .with_provenance(provenance.clone());
            match graph.add_edge(edge) {
                Ok(_) => report.edges_added += 1,
                Err(e) => debug!(myth = %myth_id, error = %e, "myth edge skipped"),
            }
        }
    }
}

/// Hydrate or import with default settings
pub fn load(input: &str) -> Result<(Graph, HydrationReport), IngestError> {
    Hydrator::default().load_str(input)
}

/// Initial position: polar coordinates from a character-sum hash of the id,
/// jittered by the seeded generator.
pub fn initial_position(id: &str, rng: &mut Lcg, jitter: f64) -> Position {
    let hash = id.chars().fold(0u32, |acc, c| acc.wrapping_add(c as u32));
    let angle = ((hash % 360) as f64).to_radians();
    let radius = 100.0 + (hash % 200) as f64;
    let dx = (rng.next_f64() - 0.5) * jitter;
    let dy = (rng.next_f64() - 0.5) * jitter;
    Position::new(radius * angle.cos() + dx, radius * angle.sin() + dy)
}

/// Deterministic key for edges that arrive without one
fn derived_edge_id(source: &str, target: &str, relationship: &str, index: usize) -> EdgeId {
    let name = format!("{}|{}|{}|{}", source, target, relationship, index);
    EdgeId::from_string(Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()).to_string())
}

fn source_name(metadata: Option<&Value>, default: &str) -> String {
    metadata
        .and_then(|m| m.as_object())
        .and_then(|m| text(m, &["source", "title"]))
        .unwrap_or_else(|| default.to_string())
}

fn list<'a>(
    doc: &'a Map<String, Value>,
    key: &str,
    kind: RecordKind,
    report: &mut HydrationReport,
) -> &'a [Value] {
    match doc.get(key) {
        None | Some(Value::Null) => &[],
        Some(Value::Array(items)) => items,
        Some(_) => {
            report.drop_record(kind, 0, format!("`{}` is not a list", key));
            &[]
        }
    }
}

/// First non-empty string or integer among `keys`
fn identity(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| match obj.get(*k)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// First non-empty string among `keys`
fn text(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| match obj.get(*k)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    })
}

fn valid_time(obj: &Map<String, Value>) -> ValidTime {
    let raw = ["date", "dates", "period"].iter().find_map(|k| match obj.get(*k)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    });
    let parsed = interval_or_default(raw.as_deref());
    let year = |k: &str| obj.get(k).and_then(Value::as_i64).and_then(|y| i32::try_from(y).ok());
    match (year("start_year"), year("end_year")) {
        (Some(start), Some(end)) => ValidTime::new(start, end),
        (Some(start), None) => ValidTime::new(start, parsed.end.max(start)),
        (None, Some(end)) => ValidTime::new(parsed.start.min(end), end),
        (None, None) => parsed,
    }
}

fn float_vector(value: &Value) -> Option<Vec<f32>> {
    let items = value.as_array()?;
    if items.is_empty() {
        return None;
    }
    items.iter().map(|v| v.as_f64().map(|f| f as f32)).collect()
}

fn references(obj: &Map<String, Value>) -> Vec<String> {
    ["related", "links", "nodes", "connections", "related_nodes"]
        .iter()
        .filter_map(|k| obj.get(*k)?.as_array())
        .flatten()
        .filter_map(|v| match v {
            Value::String(s) => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .collect()
}

fn leftovers(obj: &Map<String, Value>, consumed: &[&str]) -> Map<String, Value> {
    obj.iter()
        .filter(|(k, _)| !consumed.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

fn slug(text: &str) -> String {
    let mut out = String::new();
    for c in text.chars() {
        if c.is_alphanumeric() {
            out.extend(c.to_lowercase());
        } else if !out.ends_with('-') && !out.is_empty() {
            out.push('-');
        }
    }
    out.trim_end_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Category, Jurisdiction};
    use serde_json::json;

    fn doc() -> Value {
        json!({
            "metadata": { "source": "Lodge minutes" },
            "nodes": [
                { "id": "A", "type": "Person", "label": "Alice", "date": "1890-1910" },
                { "key": "B", "category": "organization", "name": "Order of the Dawn" },
                { "label": "no identity" },
                { "id": "C", "type": "city", "date": "1901 (founded)", "lodge": 7 },
                { "id": "A", "type": "person" }
            ],
            "edges": [
                { "source": "A", "target": "B", "label": "opposed" },
                { "from": "B", "to": "C", "relationship": "met in", "weight": 3 },
                { "source": "A", "target": "ghost", "label": "knew" },
                { "source": "A" }
            ],
            "myths": [
                { "title": "The Secret Chiefs", "related": ["B", "nowhere"] },
                { "description": "anonymous" }
            ]
        })
    }

    #[test]
    fn hydrates_loose_document() {
        let (graph, report) = Hydrator::default().hydrate(&doc()).unwrap();
        assert_eq!(report.shape, DocumentShape::Loose);
        assert_eq!(report.nodes_added, 3);
        assert_eq!(report.myths_added, 1);
        assert_eq!(graph.node_count(), 4);
        // two document edges plus one myth edge
        assert_eq!(graph.edge_count(), 3);
        graph.validate().unwrap();

        // no identity, duplicate A, ghost edge, sourceless edge, anonymous myth
        assert_eq!(report.diagnostics.len(), 5);
    }

    #[test]
    fn node_normalization() {
        let (graph, _) = Hydrator::default().hydrate(&doc()).unwrap();
        let a = graph.node(&NodeId::from("A")).unwrap();
        assert_eq!(a.category, Category::Person);
        assert_eq!(a.valid_time, ValidTime::new(1890, 1910));
        assert_eq!(a.provenance()[0].source, "Lodge minutes");

        let b = graph.node(&NodeId::from("B")).unwrap();
        assert_eq!(b.category, Category::Organization);
        assert_eq!(b.label, "Order of the Dawn");
        assert_eq!(b.valid_time, ValidTime::new(1890, 1940));

        let c = graph.node(&NodeId::from("C")).unwrap();
        assert_eq!(c.category, Category::Location);
        assert_eq!(c.valid_time, ValidTime::year(1901));
        assert_eq!(c.extra.get("lodge"), Some(&json!(7)));
        assert_eq!(c.jurisdiction, Jurisdiction::Other);
    }

    #[test]
    fn edge_sign_inferred_from_label() {
        let (graph, _) = Hydrator::default().hydrate(&doc()).unwrap();
        let a = NodeId::from("A");
        let b = NodeId::from("B");
        let ab: Vec<_> = graph.edges_between(&a, &b).collect();
        assert_eq!(ab.len(), 1);
        assert_eq!(ab[0].sign, Sign::Negative);

        let c = NodeId::from("C");
        let bc = graph.edges_between(&b, &c).next().unwrap();
        assert_eq!(bc.sign, Sign::Positive);
        assert_eq!(bc.weight, 3);
    }

    #[test]
    fn myth_pass_creates_neutral_edges() {
        let (graph, _) = Hydrator::default().hydrate(&doc()).unwrap();
        let myth = graph.node(&NodeId::from("myth:the-secret-chiefs")).unwrap();
        assert_eq!(myth.category, Category::Myth);
        assert_eq!(myth.provenance()[0].method, Method::Inference);
        assert_eq!(myth.provenance()[0].classification, Classification::Myth);

        let edges: Vec<_> = graph.incident_edges(myth.id()).collect();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].sign, Sign::Neutral);
        assert_eq!(edges[0].target().as_str(), "B");
    }

    #[test]
    fn hydration_is_reproducible() {
        let h = Hydrator::default();
        let (g1, _) = h.hydrate(&doc()).unwrap();
        let (g2, _) = h.hydrate(&doc()).unwrap();
        let p1: Vec<_> = g1.nodes().map(|n| (n.id().clone(), n.position())).collect();
        let p2: Vec<_> = g2.nodes().map(|n| (n.id().clone(), n.position())).collect();
        assert_eq!(p1, p2);
        let e1: Vec<_> = g1.edges().map(|e| e.id().clone()).collect();
        let e2: Vec<_> = g2.edges().map(|e| e.id().clone()).collect();
        assert_eq!(e1, e2);
    }

    #[test]
    fn different_seed_moves_positions() {
        let (g1, _) = Hydrator::default().hydrate(&doc()).unwrap();
        let config = HydrationConfig { seed: 7, ..Default::default() };
        let (g2, _) = Hydrator::new(config).hydrate(&doc()).unwrap();
        let a = NodeId::from("A");
        assert_ne!(g1.node(&a).unwrap().position(), g2.node(&a).unwrap().position());
    }

    #[test]
    fn malformed_top_level_is_fatal() {
        let h = Hydrator::default();
        assert!(matches!(h.load_str("{ not json"), Err(IngestError::Parse(_))));
        assert!(matches!(h.load_str("[1, 2]"), Err(IngestError::NotAnObject)));
    }

    #[test]
    fn non_list_sections_are_diagnosed() {
        let (graph, report) = Hydrator::default()
            .hydrate(&json!({ "nodes": "oops", "edges": null }))
            .unwrap();
        assert!(graph.is_empty());
        assert_eq!(report.diagnostics.len(), 1);
    }

    #[test]
    fn numeric_year_fields_override_text() {
        let (graph, _) = Hydrator::default()
            .hydrate(&json!({ "nodes": [
                { "id": 1, "date": "1900-1905", "end_year": 1920 },
                { "id": 2, "start_year": 1899, "end_year": 1901 }
            ]}))
            .unwrap();
        assert_eq!(graph.node(&NodeId::from("1")).unwrap().valid_time, ValidTime::new(1900, 1920));
        assert_eq!(graph.node(&NodeId::from("2")).unwrap().valid_time, ValidTime::new(1899, 1901));
    }

    #[test]
    fn out_of_range_year_fields_are_ignored() {
        let (graph, _) = Hydrator::default()
            .hydrate(&json!({ "nodes": [
                { "id": "a", "date": "1900-1905", "start_year": 5_000_000_000_i64 },
                { "id": "b", "start_year": 1880, "end_year": -5_000_000_000_i64 }
            ]}))
            .unwrap();
        assert_eq!(graph.node(&NodeId::from("a")).unwrap().valid_time, ValidTime::new(1900, 1905));
        assert_eq!(graph.node(&NodeId::from("b")).unwrap().valid_time, ValidTime::new(1880, 1940));
    }

    #[test]
    fn load_detects_canonical_shape() {
        let (graph, _) = Hydrator::default().hydrate(&doc()).unwrap();
        let json = export(&graph, 1).to_json().unwrap();
        let (restored, report) = load(&json).unwrap();
        assert_eq!(report.shape, DocumentShape::Canonical);
        assert_eq!(restored, graph);
    }

    #[test]
    fn slug_normalizes_titles() {
        assert_eq!(slug("The Secret Chiefs!"), "the-secret-chiefs");
        assert_eq!(slug("  a  b "), "a-b");
    }
}
