use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One curated FAQ record. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaqEntry {
    pub question: String,
    pub answer: String,
    pub source: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub entry_index: usize,
    pub score: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingDecision {
    FromCorpus,
    FromFallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            created_at: Utc::now(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            created_at: Utc::now(),
        }
    }
}

/// How the generative fallback call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackOutcome {
    Generated,
    RateLimited,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Route {
    Corpus {
        entry_index: usize,
        score: f32,
    },
    Fallback {
        score: Option<f32>,
        outcome: FallbackOutcome,
    },
}

impl Route {
    pub fn decision(&self) -> RoutingDecision {
        match self {
            Route::Corpus { .. } => RoutingDecision::FromCorpus,
            Route::Fallback { .. } => RoutingDecision::FromFallback,
        }
    }

    pub fn score(&self) -> Option<f32> {
        match self {
            Route::Corpus { score, .. } => Some(*score),
            Route::Fallback { score, .. } => *score,
        }
    }

    /// The served FAQ entry, only for corpus replies.
    pub fn entry_index(&self) -> Option<usize> {
        match self {
            Route::Corpus { entry_index, .. } => Some(*entry_index),
            Route::Fallback { .. } => None,
        }
    }
}

/// The assistant's answer to a single query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reply {
    pub content: String,
    pub route: Route,
}
