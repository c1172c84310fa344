//! Provenance records: how a node or edge came to be in the graph

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How a fact was acquired
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    Archival,
    Inference,
    Interpolation,
}

/// Classification of the source a fact came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Primary,
    Secondary,
    Hostile,
    Myth,
    AiInference,
}

/// Attestation of where a fact came from and how reliable it is.
///
/// Records attached to a node or edge form an append-only history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    /// Name of the source (document title, archive, model)
    pub source: String,
    /// Confidence in the fact (0.0 - 1.0)
    pub confidence: f64,
    pub method: Method,
    pub classification: Classification,
    /// Model tag for AI-derived facts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Provenance {
    /// Create a provenance record with full confidence
    pub fn new(source: impl Into<String>, method: Method, classification: Classification) -> Self {
        Self {
            source: source.into(),
            confidence: 1.0,
            method,
            classification,
            model: None,
            created_at: Utc::now(),
        }
    }

    /// A primary archival record, the default for ingested documents
    pub fn archival(source: impl Into<String>) -> Self {
        Self::new(source, Method::Archival, Classification::Primary)
    }

    /// A record for a fact proposed by a language model
    pub fn ai_inference(source: impl Into<String>, model: Option<String>) -> Self {
        Self {
            model,
            ..Self::new(source, Method::Inference, Classification::AiInference)
        }
    }

    /// Set the confidence, clamped to [0, 1]
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = if confidence.is_nan() { 0.0 } else { confidence.clamp(0.0, 1.0) };
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}
