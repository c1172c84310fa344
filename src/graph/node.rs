//! Node representation in the relationship graph

use super::provenance::Provenance;
use serde::{Deserialize, Serialize};

/// Default validity interval for records that carry no usable date.
pub const DEFAULT_START_YEAR: i32 = 1890;
pub const DEFAULT_END_YEAR: i32 = 1940;

/// Size assigned to nodes before any centrality result is merged.
pub const DEFAULT_NODE_SIZE: f64 = 5.0;

/// Stable string key for a node.
///
/// Serializes as a plain string (e.g. "person:crowley").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Create a NodeId from a string
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Entity category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Person,
    Organization,
    Event,
    Publication,
    Location,
    Concept,
    Myth,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::Person,
        Category::Organization,
        Category::Event,
        Category::Publication,
        Category::Location,
        Category::Concept,
        Category::Myth,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Person => "person",
            Category::Organization => "organization",
            Category::Event => "event",
            Category::Publication => "publication",
            Category::Location => "location",
            Category::Concept => "concept",
            Category::Myth => "myth",
        }
    }

    /// Base color before any community coloring is applied.
    pub fn color(&self) -> &'static str {
        match self {
            Category::Person => "#4e79a7",
            Category::Organization => "#f28e2b",
            Category::Event => "#e15759",
            Category::Publication => "#76b7b2",
            Category::Location => "#59a14f",
            Category::Concept => "#edc948",
            Category::Myth => "#b07aa1",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Historical jurisdiction a node is associated with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Jurisdiction {
    British,
    French,
    German,
    Russian,
    Other,
}

impl Jurisdiction {
    pub const ALL: [Jurisdiction; 5] = [
        Jurisdiction::British,
        Jurisdiction::French,
        Jurisdiction::German,
        Jurisdiction::Russian,
        Jurisdiction::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Jurisdiction::British => "british",
            Jurisdiction::French => "french",
            Jurisdiction::German => "german",
            Jurisdiction::Russian => "russian",
            Jurisdiction::Other => "other",
        }
    }
}

impl std::fmt::Display for Jurisdiction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Jurisdiction {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Jurisdiction::ALL
            .iter()
            .copied()
            .find(|j| j.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown jurisdiction: {}", s))
    }
}

/// Inclusive year range during which an entity is active.
///
/// `start <= end` is expected but not enforced; an inverted interval is
/// simply never visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidTime {
    pub start: i32,
    pub end: i32,
}

impl ValidTime {
    pub fn new(start: i32, end: i32) -> Self {
        Self { start, end }
    }

    pub fn year(year: i32) -> Self {
        Self { start: year, end: year }
    }

    pub fn contains(&self, year: i32) -> bool {
        self.start <= year && year <= self.end
    }
}

impl Default for ValidTime {
    fn default() -> Self {
        Self::new(DEFAULT_START_YEAR, DEFAULT_END_YEAR)
    }
}

/// 2-D layout position
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A node in the relationship graph.
///
/// The key is fixed at construction. Derived attributes (position, size,
/// color, community, centrality, embedding) change only through algorithm
/// merges or the explicit `set_*` edit methods.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    id: NodeId,
    pub label: String,
    pub category: Category,
    #[serde(default)]
    pub description: String,
    pub jurisdiction: Jurisdiction,
    #[serde(default)]
    pub valid_time: ValidTime,
    #[serde(default)]
    pub(crate) position: Position,
    pub(crate) size: f64,
    pub(crate) color: String,
    pub(crate) financial_weight: f64,
    pub(crate) secrecy_level: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) embedding: Option<Vec<f32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) community: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) centrality: Option<f64>,
    #[serde(default)]
    pub(crate) provenance: Vec<Provenance>,
    #[serde(default)]
    pub(crate) hidden: bool,
    /// Fields carried through from imports but not interpreted
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Node {
    /// Create a node with default attributes for its category
    pub fn new(id: impl Into<NodeId>, label: impl Into<String>, category: Category) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            category,
            description: String::new(),
            jurisdiction: Jurisdiction::Other,
            valid_time: ValidTime::default(),
            position: Position::default(),
            size: DEFAULT_NODE_SIZE,
            color: category.color().to_string(),
            financial_weight: 0.0,
            secrecy_level: 1,
            embedding: None,
            community: None,
            centrality: None,
            provenance: Vec::new(),
            hidden: false,
            extra: serde_json::Map::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_jurisdiction(mut self, jurisdiction: Jurisdiction) -> Self {
        self.jurisdiction = jurisdiction;
        self
    }

    pub fn with_valid_time(mut self, valid_time: ValidTime) -> Self {
        self.valid_time = valid_time;
        self
    }

    pub fn with_position(mut self, position: Position) -> Self {
        self.position = position;
        self
    }

    pub fn with_financial_weight(mut self, weight: f64) -> Self {
        self.set_financial_weight(weight);
        self
    }

    pub fn with_secrecy_level(mut self, level: i64) -> Self {
        self.set_secrecy_level(level);
        self
    }

    pub fn with_provenance(mut self, provenance: Provenance) -> Self {
        self.attest(provenance);
        self
    }

    pub fn id(&self) -> &NodeId {
        &self.id
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn size(&self) -> f64 {
        self.size
    }

    pub fn color(&self) -> &str {
        &self.color
    }

    pub fn financial_weight(&self) -> f64 {
        self.financial_weight
    }

    pub fn secrecy_level(&self) -> u8 {
        self.secrecy_level
    }

    pub fn embedding(&self) -> Option<&[f32]> {
        self.embedding.as_deref()
    }

    pub fn community(&self) -> Option<usize> {
        self.community
    }

    pub fn centrality(&self) -> Option<f64> {
        self.centrality
    }

    pub fn provenance(&self) -> &[Provenance] {
        &self.provenance
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    /// Append a provenance record. Existing records are never replaced.
    pub fn attest(&mut self, provenance: Provenance) {
        self.provenance.push(provenance);
    }

    /// Manual position edit
    pub fn set_position(&mut self, position: Position) {
        self.position = position;
    }

    /// Manual size edit
    pub fn set_size(&mut self, size: f64) {
        self.size = size.max(0.0);
    }

    /// Manual color edit
    pub fn set_color(&mut self, color: impl Into<String>) {
        self.color = color.into();
    }

    /// Clamped to [0, 1]; NaN becomes 0.
    pub fn set_financial_weight(&mut self, weight: f64) {
        self.financial_weight = if weight.is_nan() { 0.0 } else { weight.clamp(0.0, 1.0) };
    }

    /// Clamped to 1..=5
    pub fn set_secrecy_level(&mut self, level: i64) {
        self.secrecy_level = level.clamp(1, 5) as u8;
    }

    /// Manual embedding edit (e.g. a vector supplied by an import)
    pub fn set_embedding(&mut self, embedding: Option<Vec<f32>>) {
        self.embedding = embedding;
    }

    /// Text used when embedding this node for similarity search
    pub fn embedding_text(&self) -> String {
        format!(
            "{} ({}), jurisdiction {}, secrecy level {}",
            self.label, self.category, self.jurisdiction, self.secrecy_level
        )
    }
}
