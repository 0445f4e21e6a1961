//! Records produced by the crawl and consumed by the pair deriver.
//!
//! Field names are the on-disk corpus format: a persisted corpus is a JSON
//! array of [`Discussion`] objects.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A discussion as it appears on a listing page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscussionSummary {
    pub title: String,
    pub link: String,
    pub metadata: DiscussionMetadata,
}

/// Counters and classification shown next to a listing entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscussionMetadata {
    pub views: u64,
    pub comments: u64,
    pub date: DateTime<Utc>,
    pub category: String,
    pub status: DiscussionStatus,
    /// Whether the entry carried the closed glyph next to its status tag.
    pub closed: bool,
}

/// Status tag rendered in front of a listing entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiscussionStatus {
    Open,
    Answered,
    Poll,
    Question,
    Closed,
}

impl DiscussionStatus {
    /// Tags the forum renders, in the order they are checked.
    pub const TAGGED: [Self; 4] = [Self::Answered, Self::Poll, Self::Question, Self::Closed];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "Open",
            Self::Answered => "Answered",
            Self::Poll => "Poll",
            Self::Question => "Question",
            Self::Closed => "Closed",
        }
    }

    /// Classify the text of a listing entry's first label.
    ///
    /// Returns `None` when the label is not a status tag, which means the
    /// entry has no tag and is open.
    #[must_use]
    pub fn from_tag_text(text: &str) -> Option<Self> {
        Self::TAGGED
            .into_iter()
            .find(|status| text.contains(status.as_str()))
    }

    /// Whether the forum may render an accepted-answer block for this discussion.
    #[must_use]
    pub fn is_answered(&self) -> bool {
        matches!(self, Self::Answered)
    }
}

/// A discussion summary enriched with its root post and comment thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Discussion {
    #[serde(flatten)]
    pub summary: DiscussionSummary,
    /// Root post details; absent when the discussion page could not be parsed.
    #[serde(flatten)]
    pub details: Option<DiscussionDetails>,
    #[serde(default)]
    pub comments: Vec<Comment>,
}

impl Discussion {
    /// A discussion that has not been enriched.
    #[must_use]
    pub fn from_summary(summary: DiscussionSummary) -> Self {
        Self {
            summary,
            details: None,
            comments: Vec::new(),
        }
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.summary.title
    }

    #[must_use]
    pub fn link(&self) -> &str {
        &self.summary.link
    }

    /// Root post text, empty when the discussion was not enriched.
    #[must_use]
    pub fn description(&self) -> &str {
        self.details
            .as_ref()
            .map_or("", |details| details.description.as_str())
    }

    #[must_use]
    pub fn is_enriched(&self) -> bool {
        self.details.is_some()
    }
}

/// Fields read from a discussion's root page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscussionDetails {
    pub author: Option<String>,
    pub author_post_count: Option<u64>,
    pub author_role_title: Option<String>,
    pub description: String,
    pub image: Option<String>,
    pub tags: Vec<String>,
}

/// One post in a discussion's comment thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub comment_author: String,
    pub comment_author_post_count: u64,
    pub comment_author_role_title: String,
    pub comment_date_created: DateTime<Utc>,
    pub comment_text: String,
}

/// An instruction-tuning example derived from a comment thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstructionPair {
    pub instruction: String,
    pub context: String,
    pub response: String,
}
