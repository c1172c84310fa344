//! Canonical document format: full-fidelity export and import

use super::IngestError;
use crate::graph::{Edge, Graph, Node};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Marker written into the `format` field of canonical exports
pub const CANONICAL_FORMAT: &str = "polity/canonical";

/// Current canonical schema version
pub const CANONICAL_VERSION: u32 = 1;

/// A complete, re-ingestible export of a graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalDocument {
    pub format: String,
    pub version: u32,
    /// Generation of the graph instance that was exported
    #[serde(default)]
    pub generation: u64,
    pub exported_at: DateTime<Utc>,
    #[serde(default)]
    pub metadata: serde_json::Value,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl CanonicalDocument {
    pub fn to_json(&self) -> Result<String, IngestError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Whether a parsed document declares the canonical format
pub fn is_canonical(value: &serde_json::Value) -> bool {
    value
        .get("format")
        .and_then(|f| f.as_str())
        .map_or(false, |f| f == CANONICAL_FORMAT)
}

/// Export a graph: nodes in key order, edges in insertion order
pub fn export(graph: &Graph, generation: u64) -> CanonicalDocument {
    CanonicalDocument {
        format: CANONICAL_FORMAT.to_string(),
        version: CANONICAL_VERSION,
        generation,
        exported_at: Utc::now(),
        metadata: serde_json::json!({ "stats": graph.stats() }),
        nodes: graph.nodes().cloned().collect(),
        edges: graph.edges().cloned().collect(),
    }
}

/// Import a canonical document.
///
/// Canonical documents are trusted to be whole: a dangling or duplicate
/// entity aborts the import rather than producing a partial graph.
pub fn import(doc: CanonicalDocument) -> Result<Graph, IngestError> {
    if doc.version != CANONICAL_VERSION {
        return Err(IngestError::UnsupportedVersion(doc.version));
    }
    let mut graph = Graph::new();
    for mut node in doc.nodes {
        // Re-apply clamps in case the document was edited by hand
        let fw = node.financial_weight();
        node.set_financial_weight(fw);
        let level = node.secrecy_level() as i64;
        node.set_secrecy_level(level);
        graph.add_node(node)?;
    }
    for edge in doc.edges {
        graph.add_edge(edge)?;
    }
    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Category, Provenance, Sign};

    fn sample() -> Graph {
        let mut g = Graph::new();
        g.add_node(
            Node::new("a", "Alpha", Category::Person).with_provenance(Provenance::archival("test")),
        )
        .unwrap();
        g.add_node(Node::new("b", "Beta", Category::Organization)).unwrap();
        g.add_edge(Edge::with_id("e1".into(), "a", "b", "opposed").with_sign(Sign::Negative))
            .unwrap();
        g
    }

    #[test]
    fn export_then_import_is_identical() {
        let g = sample();
        let doc = export(&g, 3);
        assert!(is_canonical(&serde_json::to_value(&doc).unwrap()));
        let json = doc.to_json().unwrap();
        let parsed: CanonicalDocument = serde_json::from_str(&json).unwrap();
        let g2 = import(parsed).unwrap();
        assert_eq!(g, g2);
    }

    #[test]
    fn other_versions_rejected() {
        for version in [0, CANONICAL_VERSION + 1] {
            let mut doc = export(&sample(), 0);
            doc.version = version;
            assert!(matches!(import(doc), Err(IngestError::UnsupportedVersion(v)) if v == version));
        }
    }

    #[test]
    fn dangling_edge_aborts_import() {
        let mut doc = export(&sample(), 0);
        doc.nodes.retain(|n| n.id().as_str() != "b");
        assert!(matches!(import(doc), Err(IngestError::Graph(_))));
    }
}
