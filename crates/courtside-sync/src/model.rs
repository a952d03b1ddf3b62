use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle of a match as reported by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchStatus {
    Scheduled,
    Live,
    Completed,
    Cancelled,
}

impl MatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::Scheduled => "SCHEDULED",
            MatchStatus::Live => "LIVE",
            MatchStatus::Completed => "COMPLETED",
            MatchStatus::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tracked match. `id` is stable for the lifetime of the match and unique
/// within a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Match {
    pub id: String,
    pub team_a_name: String,
    pub team_b_name: String,
    #[serde(default)]
    pub composition_a: Vec<u32>,
    #[serde(default)]
    pub composition_b: Vec<u32>,
    pub status: MatchStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default)]
    pub current_set: u32,
    #[serde(default)]
    pub score_a: u32,
    #[serde(default)]
    pub score_b: u32,
    /// Serving rotation of team A; only meaningful while LIVE.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation_a: Option<u8>,
    /// Serving rotation of team B; only meaningful while LIVE.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation_b: Option<u8>,
}

impl Match {
    pub fn new(
        id: impl Into<String>,
        team_a_name: impl Into<String>,
        team_b_name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            team_a_name: team_a_name.into(),
            team_b_name: team_b_name.into(),
            composition_a: Vec::new(),
            composition_b: Vec::new(),
            status: MatchStatus::Scheduled,
            created_at: None,
            current_set: 0,
            score_a: 0,
            score_b: 0,
            rotation_a: None,
            rotation_b: None,
        }
    }

    pub fn is_live(&self) -> bool {
        self.status == MatchStatus::Live
    }
}

/// Canonical partial update for one match. Every field except `match_id` is
/// optional and `None` means "unchanged", never "clear".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchUpdate {
    pub match_id: String,
    pub status: Option<MatchStatus>,
    pub current_set: Option<u32>,
    pub score_a: Option<u32>,
    pub score_b: Option<u32>,
    pub rotation_a: Option<u8>,
    pub rotation_b: Option<u8>,
    /// Server-side change markers such as `point_scored` or `set_completed`.
    pub changes: Option<BTreeSet<String>>,
}

impl MatchUpdate {
    pub fn new(match_id: impl Into<String>) -> Self {
        Self {
            match_id: match_id.into(),
            ..Default::default()
        }
    }

    pub fn with_status(mut self, status: MatchStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_current_set(mut self, current_set: u32) -> Self {
        self.current_set = Some(current_set);
        self
    }

    pub fn with_score(mut self, score_a: u32, score_b: u32) -> Self {
        self.score_a = Some(score_a);
        self.score_b = Some(score_b);
        self
    }

    pub fn with_score_a(mut self, score_a: u32) -> Self {
        self.score_a = Some(score_a);
        self
    }

    pub fn with_rotation(mut self, rotation_a: u8, rotation_b: u8) -> Self {
        self.rotation_a = Some(rotation_a);
        self.rotation_b = Some(rotation_b);
        self
    }

    pub fn with_change(mut self, change: impl Into<String>) -> Self {
        self.changes
            .get_or_insert_with(BTreeSet::new)
            .insert(change.into());
        self
    }

    /// Names of the entity fields this update overwrites.
    pub fn touched_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.status.is_some() {
            fields.push("status");
        }
        if self.current_set.is_some() {
            fields.push("current_set");
        }
        if self.score_a.is_some() {
            fields.push("score_a");
        }
        if self.score_b.is_some() {
            fields.push("score_b");
        }
        if self.rotation_a.is_some() {
            fields.push("rotation_a");
        }
        if self.rotation_b.is_some() {
            fields.push("rotation_b");
        }
        fields
    }
}
