use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// --- Labels ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum LabelSource {
    /// Assigned by the categorization oracle; counts against the label budget.
    Ai,
    /// Mirrors a currently-trending topic; never budgeted, never forms edges.
    Trending,
}

impl std::fmt::Display for LabelSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LabelSource::Ai => write!(f, "ai"),
            LabelSource::Trending => write!(f, "trending"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Label {
    pub name: String,
    pub source: LabelSource,
    /// A historical label is kept on the entity for continuity but no longer
    /// participates in strength ranking.
    #[serde(default)]
    pub is_historical: bool,
}

impl Label {
    pub fn ai(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: LabelSource::Ai,
            is_historical: false,
        }
    }

    pub fn trending(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: LabelSource::Trending,
            is_historical: false,
        }
    }
}

// --- Visit statistics ---

/// Per-entity view statistics. Keyed in the StatsMap by the slug of `title`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct StatsEntry {
    pub title: String,
    pub views: u64,
    #[serde(default)]
    pub labels: Vec<Label>,
    #[serde(default)]
    pub last_visited: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_classified: Option<DateTime<Utc>>,
}

impl StatsEntry {
    pub fn is_classified(&self) -> bool {
        !self.labels.is_empty()
    }
}

/// The whole visit-statistics table, persisted as one document.
pub type StatsMap = BTreeMap<String, StatsEntry>;

// --- Classification ---

/// Persisted oracle output for one entity. Written once, treated as
/// immutable until an administrative reset deletes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub title: String,
    pub labels: Vec<Label>,
    pub explanation: String,
    pub timestamp: DateTime<Utc>,
}

/// One row of the candidate table offered to the oracle: an existing AI
/// label and how many entities currently hold it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct LabelStrength {
    pub label: String,
    pub strength: u32,
}

// --- Ranked read ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedEntity {
    pub slug: String,
    pub title: String,
    pub views: u64,
    pub labels: Vec<Label>,
    pub is_classified: bool,
}

// --- Derived graph (ephemeral, never persisted) ---

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphNode {
    pub slug: String,
    pub title: String,
    pub views: u64,
    pub labels: Vec<Label>,
    pub size: f64,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphEdge {
    pub a: String,
    pub b: String,
    pub shared_labels: Vec<Label>,
    pub primary_label: String,
    pub strength: f64,
}

/// Trending topics document, stored at `trending/topics`. Topics are free
/// text; matching against entities happens on slugified form.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrendingTopics {
    #[serde(default)]
    pub topics: Vec<String>,
}
