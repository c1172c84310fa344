//! Signed, time-bounded edge representation

use super::error::GraphError;
use super::node::{NodeId, ValidTime};
use super::provenance::Provenance;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable string key for an edge
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EdgeId(String);

impl EdgeId {
    /// Create a new random EdgeId
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create an EdgeId from a string
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for EdgeId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EdgeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for EdgeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Sign of a relationship: alliance, hostility, or neutral information.
///
/// Serializes as the integer +1, -1 or 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum Sign {
    Positive,
    Negative,
    Neutral,
}

impl Sign {
    pub fn value(self) -> i64 {
        match self {
            Sign::Positive => 1,
            Sign::Negative => -1,
            Sign::Neutral => 0,
        }
    }
}

impl TryFrom<i64> for Sign {
    type Error = GraphError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Sign::Positive),
            -1 => Ok(Sign::Negative),
            0 => Ok(Sign::Neutral),
            other => Err(GraphError::InvalidSign(other)),
        }
    }
}

impl From<Sign> for i64 {
    fn from(sign: Sign) -> Self {
        sign.value()
    }
}

/// A directed relationship between two nodes.
///
/// The graph is a multigraph: several edges may join the same ordered pair.
/// Key and endpoints are fixed at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    id: EdgeId,
    source: NodeId,
    target: NodeId,
    /// Free-text relationship label (e.g. "founded", "opposed")
    pub relationship: String,
    /// Aggregation weight
    #[serde(default = "default_weight")]
    pub weight: i64,
    pub sign: Sign,
    #[serde(default)]
    pub valid_time: ValidTime,
    /// Unconfirmed edge, typically suggested by a model
    #[serde(default)]
    pub hypothetical: bool,
    #[serde(default)]
    pub(crate) provenance: Vec<Provenance>,
    #[serde(default)]
    pub(crate) hidden: bool,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

fn default_weight() -> i64 {
    1
}

impl Edge {
    /// Create a positive edge with a random key
    pub fn new(source: impl Into<NodeId>, target: impl Into<NodeId>, relationship: impl Into<String>) -> Self {
        Self::with_id(EdgeId::new(), source, target, relationship)
    }

    /// Create a positive edge with a specific key
    pub fn with_id(
        id: EdgeId,
        source: impl Into<NodeId>,
        target: impl Into<NodeId>,
        relationship: impl Into<String>,
    ) -> Self {
        Self {
            id,
            source: source.into(),
            target: target.into(),
            relationship: relationship.into(),
            weight: 1,
            sign: Sign::Positive,
            valid_time: ValidTime::default(),
            hypothetical: false,
            provenance: Vec::new(),
            hidden: false,
            extra: serde_json::Map::new(),
        }
    }

    pub fn with_sign(mut self, sign: Sign) -> Self {
        self.sign = sign;
        self
    }

    pub fn with_weight(mut self, weight: i64) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_valid_time(mut self, valid_time: ValidTime) -> Self {
        self.valid_time = valid_time;
        self
    }

    pub fn hypothetical(mut self) -> Self {
        self.hypothetical = true;
        self
    }

    pub fn with_provenance(mut self, provenance: Provenance) -> Self {
        self.attest(provenance);
        self
    }

    pub fn id(&self) -> &EdgeId {
        &self.id
    }

    pub fn source(&self) -> &NodeId {
        &self.source
    }

    pub fn target(&self) -> &NodeId {
        &self.target
    }

    pub fn provenance(&self) -> &[Provenance] {
        &self.provenance
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    pub fn is_self_loop(&self) -> bool {
        self.source == self.target
    }

    /// Whether this edge touches the given node
    pub fn touches(&self, node: &NodeId) -> bool {
        &self.source == node || &self.target == node
    }

    /// Append a provenance record
    pub fn attest(&mut self, provenance: Provenance) {
        self.provenance.push(provenance);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_serializes_as_integer() {
        assert_eq!(serde_json::to_value(Sign::Negative).unwrap(), -1);
        assert_eq!(serde_json::to_value(Sign::Neutral).unwrap(), 0);
        let s: Sign = serde_json::from_str("1").unwrap();
        assert_eq!(s, Sign::Positive);
    }

    #[test]
    fn sign_rejects_out_of_domain_values() {
        assert!(matches!(Sign::try_from(2), Err(GraphError::InvalidSign(2))));
        assert!(serde_json::from_str::<Sign>("-3").is_err());
    }

    #[test]
    fn new_edge_defaults() {
        let edge = Edge::new("a", "b", "knew");
        assert_eq!(edge.weight, 1);
        assert_eq!(edge.sign, Sign::Positive);
        assert!(!edge.hypothetical);
        assert!(edge.touches(&NodeId::from("a")));
        assert!(!edge.is_self_loop());
    }

    #[test]
    fn random_edge_ids_are_unique() {
        assert_ne!(EdgeId::new(), EdgeId::new());
    }
}
