//! Trend record types

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use trendwatch_util::TrendKey;

/// One trending topic as persisted.
///
/// `title` and `created_at` are written once; later sightings only move
/// `hot_score` and `updated_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendRecord {
    pub key: TrendKey,
    pub title: String,
    pub source: String,
    pub hot_score: f64,
    pub created_at: DateTime<Local>,
    pub updated_at: DateTime<Local>,
}

impl TrendRecord {
    /// A record seen for the first time at `now`
    pub fn first_seen(
        key: TrendKey,
        title: impl Into<String>,
        source: impl Into<String>,
        hot_score: f64,
        now: DateTime<Local>,
    ) -> Self {
        Self {
            key,
            title: title.into(),
            source: source.into(),
            hot_score,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A single write inside an atomic batch
#[derive(Debug, Clone, PartialEq)]
pub enum TrendMutation {
    /// Create a record; fails if the key already exists
    Insert(TrendRecord),

    /// Refresh an existing record; fails if the key is unknown
    Touch {
        key: TrendKey,
        hot_score: f64,
        updated_at: DateTime<Local>,
    },
}
