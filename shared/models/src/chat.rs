//! Chat models exchanged with the analysis backend.
//!
//! The backend answers a query with one of several response shapes sharing a
//! `type` discriminator. They are modelled as the closed [`BackendResponse`]
//! union so every consumer has to handle each shape explicitly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct ChatRequest {
    #[validate(
        length(max = 4000, message = "Query must be at most 4000 characters"),
        custom = "validate_not_blank"
    )]
    pub query: String,
}

impl ChatRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
        }
    }
}

fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("required"));
    }
    Ok(())
}

/// Every response shape the chat endpoint may return.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BackendResponse {
    SimpleDialogue(SimpleDialogue),
    Simulation(DisputeSimulation),
    Cases(DisputeCases),
    HighlightedClause(HighlightedClause),
    Highlights(HighlightRationale),
}

impl BackendResponse {
    /// Values of the `type` discriminator this union understands.
    pub const KINDS: [&'static str; 5] = [
        "simple_dialogue",
        "simulation",
        "cases",
        "highlighted_clause",
        "highlights",
    ];

    pub fn kind(&self) -> &'static str {
        match self {
            Self::SimpleDialogue(_) => "simple_dialogue",
            Self::Simulation(_) => "simulation",
            Self::Cases(_) => "cases",
            Self::HighlightedClause(_) => "highlighted_clause",
            Self::Highlights(_) => "highlights",
        }
    }

    /// Clause texts the backend wants highlighted, if any.
    pub fn highlights(&self) -> Option<&[String]> {
        match self {
            Self::SimpleDialogue(r) => r.highlights.as_deref(),
            Self::Simulation(r) => r.highlights.as_deref(),
            Self::Cases(r) => r.highlights.as_deref(),
            Self::HighlightedClause(r) => Some(&r.highlights),
            Self::Highlights(r) => Some(&r.highlights),
        }
    }

    pub fn status(&self) -> Option<&str> {
        match self {
            Self::SimpleDialogue(r) => Some(&r.status),
            Self::Simulation(r) => Some(&r.status),
            Self::Cases(r) => Some(&r.status),
            Self::HighlightedClause(r) => r.status.as_deref(),
            Self::Highlights(r) => r.status.as_deref(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.status() == Some("error")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimpleDialogue {
    pub message: String,
    #[serde(default)]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub highlights: Option<Vec<String>>,
}

/// A role-played dispute between a customer and an agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DisputeSimulation {
    pub simulations: Vec<SimulationTurn>,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub highlights: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimulationTurn {
    pub id: u32,
    pub situation: String,
    pub user: String,
    pub agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DisputeCases {
    pub message: String,
    #[serde(default)]
    pub status: String,
    pub disputes: Vec<DisputeCase>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub highlights: Option<Vec<String>>,
}

/// A precedent dispute as summarised by the backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DisputeCase {
    pub title: String,
    pub summary: String,
    #[serde(rename = "key points")]
    pub key_points: String,
    #[serde(rename = "judge result")]
    pub judge_result: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HighlightedClause {
    pub message: String,
    pub highlights: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HighlightRationale {
    pub rationale: String,
    pub highlights: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// One entry of a review session's chat transcript.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub id: Uuid,
    pub role: ChatRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<BackendResponse>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role: ChatRole::User,
            content: content.into(),
            timestamp: Utc::now(),
            response: None,
        }
    }

    pub fn assistant(content: impl Into<String>, response: Option<BackendResponse>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role: ChatRole::Assistant,
            content: content.into(),
            timestamp: Utc::now(),
            response,
        }
    }
}
