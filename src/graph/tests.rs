//! Serialization tests with canonical-format fixtures

use serde_json::{json, Value};

/// Canonical fixture: a node as written by `ingest::export`
fn canonical_node_fixture() -> Value {
    json!({
        "id": "person:mathers",
        "label": "S. L. MacGregor Mathers",
        "category": "person",
        "description": "Co-founder",
        "jurisdiction": "british",
        "valid_time": { "start": 1888, "end": 1918 },
        "position": { "x": 12.5, "y": -4.0 },
        "size": 7.5,
        "color": "#4e79a7",
        "financial_weight": 0.4,
        "secrecy_level": 4,
        "community": 2,
        "centrality": 0.31,
        "provenance": [
            {
                "source": "ledger",
                "confidence": 1.0,
                "method": "archival",
                "classification": "primary",
                "created_at": "2025-11-30T10:00:00Z"
            }
        ],
        "hidden": false,
        "lodge_number": 3
    })
}

/// Canonical fixture: an edge as written by `ingest::export`
fn canonical_edge_fixture() -> Value {
    json!({
        "id": "edge:schism",
        "source": "person:mathers",
        "target": "person:westcott",
        "relationship": "schism",
        "weight": 2,
        "sign": -1,
        "valid_time": { "start": 1900, "end": 1900 },
        "hypothetical": true,
        "provenance": [],
        "hidden": false
    })
}

#[cfg(test)]
mod serialization_tests {
    use super::*;
    use crate::graph::{
        Category, Classification, Edge, Jurisdiction, Method, Node, NodeId, Sign, ValidTime,
    };

    #[test]
    fn node_id_serializes_as_string() {
        let id = NodeId::from_string("person:mathers");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"person:mathers\"");
    }

    #[test]
    fn category_serializes_lowercase() {
        let json = serde_json::to_string(&Category::Organization).unwrap();
        assert_eq!(json, "\"organization\"");
    }

    #[test]
    fn node_deserializes_from_canonical_fixture() {
        let node: Node = serde_json::from_value(canonical_node_fixture()).unwrap();
        assert_eq!(node.id().as_str(), "person:mathers");
        assert_eq!(node.category, Category::Person);
        assert_eq!(node.jurisdiction, Jurisdiction::British);
        assert_eq!(node.valid_time, ValidTime::new(1888, 1918));
        assert_eq!(node.secrecy_level(), 4);
        assert_eq!(node.community(), Some(2));
        assert_eq!(node.provenance().len(), 1);
        assert_eq!(node.provenance()[0].method, Method::Archival);
        assert_eq!(node.provenance()[0].classification, Classification::Primary);
        // unknown fields land in the extra bucket
        assert_eq!(node.extra.get("lodge_number"), Some(&json!(3)));
    }

    #[test]
    fn node_roundtrip_preserves_extra_fields() {
        let node: Node = serde_json::from_value(canonical_node_fixture()).unwrap();
        let json = serde_json::to_value(&node).unwrap();
        let node2: Node = serde_json::from_value(json).unwrap();
        assert_eq!(node, node2);
    }

    #[test]
    fn optional_derived_fields_skipped_when_none() {
        let node = Node::new("x", "X", Category::Concept);
        let json = serde_json::to_value(&node).unwrap();
        assert!(json.get("embedding").is_none());
        assert!(json.get("community").is_none());
        assert!(json.get("centrality").is_none());
    }

    #[test]
    fn edge_deserializes_from_canonical_fixture() {
        let edge: Edge = serde_json::from_value(canonical_edge_fixture()).unwrap();
        assert_eq!(edge.id().as_str(), "edge:schism");
        assert_eq!(edge.sign, Sign::Negative);
        assert_eq!(edge.weight, 2);
        assert!(edge.hypothetical);
    }

    #[test]
    fn edge_with_bad_sign_rejected() {
        let mut fixture = canonical_edge_fixture();
        fixture["sign"] = json!(5);
        assert!(serde_json::from_value::<Edge>(fixture).is_err());
    }

    #[test]
    fn edge_weight_defaults_to_one() {
        let mut fixture = canonical_edge_fixture();
        fixture.as_object_mut().unwrap().remove("weight");
        let edge: Edge = serde_json::from_value(fixture).unwrap();
        assert_eq!(edge.weight, 1);
    }
}
