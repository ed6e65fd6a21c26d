use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// How long a subscription's channel set stays trustworthy before the
/// discovery agent is asked for a fresh one.
pub const CHANNEL_REFRESH_DAYS: i64 = 30;

/// Kind of place candidates are mined from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChannelType {
    SearchQuery,
    Directory,
    Community,
    JobBoard,
}

impl ChannelType {
    /// All source types in the fixed order the fallback selector walks them.
    pub const ALL: [ChannelType; 4] = [
        ChannelType::SearchQuery,
        ChannelType::Directory,
        ChannelType::Community,
        ChannelType::JobBoard,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelType::SearchQuery => "search-query",
            ChannelType::Directory => "directory",
            ChannelType::Community => "community",
            ChannelType::JobBoard => "job-board",
        }
    }
}

impl std::fmt::Display for ChannelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A verified real profile proving a channel actually yields candidates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelExample {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub description: String,
}

impl ChannelExample {
    /// An example only counts as verified with a non-empty name and url.
    pub fn is_verified(&self) -> bool {
        !self.name.trim().is_empty() && !self.url.trim().is_empty()
    }
}

/// A mineable source of candidate profiles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Channel {
    pub channel_type: ChannelType,
    pub name: String,
    /// Search string to mine (search-query channels). Either this or
    /// `platform_url` must be present.
    #[serde(default)]
    pub search_query: Option<String>,
    /// Concrete location to mine (directory/community/job-board channels).
    #[serde(default)]
    pub platform_url: Option<String>,
    #[serde(default)]
    pub description: String,
    /// Expected yield, 1-10, as judged by the search agent.
    #[serde(default)]
    pub score: u8,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub example: Option<ChannelExample>,
}

impl Channel {
    pub fn has_verified_example(&self) -> bool {
        self.example.as_ref().map(|e| e.is_verified()).unwrap_or(false)
    }
}

/// A raw profile pulled from one source, before any ranking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub source: ChannelType,
    pub name: String,
    #[serde(default)]
    pub profile_url: Option<String>,
    #[serde(default)]
    pub handle: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    /// Opaque per-source payload, carried through scoring untouched.
    #[serde(default)]
    pub raw_profile: serde_json::Value,
    /// Arbitrary per-source metrics (follower counts, post counts, ...).
    #[serde(default)]
    pub source_signals: HashMap<String, serde_json::Value>,
}

impl Candidate {
    /// Deduplication key: first non-empty of profile url, handle, name,
    /// lowercased.
    pub fn identity_key(&self) -> Option<String> {
        identity_key(
            self.profile_url.as_deref(),
            self.handle.as_deref(),
            &self.name,
        )
    }
}

/// A candidate after ranking, annotated with a match rationale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub name: String,
    #[serde(default)]
    pub profile_url: Option<String>,
    #[serde(default)]
    pub handle: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub match_reason: String,
    /// Which channel the candidate came from, as reported by the ranker.
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub company_size: Option<String>,
    /// Re-attached from the collected pool after selection.
    #[serde(default)]
    pub raw_profile: serde_json::Value,
}

impl ScoredCandidate {
    pub fn identity_key(&self) -> Option<String> {
        identity_key(
            self.profile_url.as_deref(),
            self.handle.as_deref(),
            &self.name,
        )
    }
}

fn identity_key(profile_url: Option<&str>, handle: Option<&str>, name: &str) -> Option<String> {
    for field in [profile_url, handle, Some(name)] {
        if let Some(value) = field {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_lowercase());
            }
        }
    }
    None
}

/// Everything collected in one fan-out pass, keyed by source type. Sources
/// that failed or returned nothing are present with empty entries.
#[derive(Debug, Clone, Default)]
pub struct CollectedCandidates {
    pub by_source: HashMap<ChannelType, Vec<Candidate>>,
}

impl CollectedCandidates {
    pub fn total(&self) -> usize {
        self.by_source.values().map(|v| v.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    pub fn get(&self, source: ChannelType) -> &[Candidate] {
        self.by_source.get(&source).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// All candidates in fixed source order, for prompt building and lookups.
    pub fn iter_ordered(&self) -> impl Iterator<Item = &Candidate> {
        ChannelType::ALL
            .iter()
            .filter_map(|source| self.by_source.get(source))
            .flatten()
    }
}

/// Structured preference signal learned from user ratings. Replaced
/// wholesale on every analysis run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LearnedProfile {
    #[serde(default)]
    pub preferred_seniority: Vec<String>,
    #[serde(default)]
    pub preferred_company_sizes: Vec<String>,
    #[serde(default)]
    pub preferred_skills: Vec<String>,
    #[serde(default)]
    pub preferred_backgrounds: Vec<String>,
    #[serde(default)]
    pub avoid: Vec<String>,
}

/// A user's verdict on one delivered candidate, 1-5.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateRating {
    pub candidate_id: String,
    pub candidate: ScoredCandidate,
    pub rating: u8,
    pub rated_at: DateTime<Utc>,
}

/// Binds a user, their query, the mineable channel set, the learned profile
/// and the mining schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub id: Uuid,
    pub user_id: String,
    pub query: String,
    pub channels: Vec<Channel>,
    #[serde(default)]
    pub learned_profile: Option<LearnedProfile>,
    #[serde(default)]
    pub last_discovery_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_daily_run_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Subscription {
    pub fn new(id: Uuid, user_id: impl Into<String>, query: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            user_id: user_id.into(),
            query: query.into(),
            channels: Vec::new(),
            learned_profile: None,
            last_discovery_at: None,
            last_daily_run_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// When the channel set must be rediscovered. `None` means channels were
    /// never discovered, which also makes a refresh due.
    pub fn next_discovery_due(&self) -> Option<DateTime<Utc>> {
        self.last_discovery_at
            .map(|at| at + Duration::days(CHANNEL_REFRESH_DAYS))
    }

    pub fn discovery_due(&self, now: DateTime<Utc>) -> bool {
        match self.next_discovery_due() {
            Some(due) => now >= due,
            None => true,
        }
    }
}

/// One side of the refinement conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: String,
    pub content: String,
}

/// Conversation state for the query-refinement phase. Created per refinement
/// request and discarded once a refined query is approved.
#[derive(Debug, Clone)]
pub struct DiscoverySession {
    pub query: String,
    pub round_count: u32,
    pub history: Vec<ChatTurn>,
    pub refined_query: Option<String>,
}

impl DiscoverySession {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            round_count: 0,
            history: Vec::new(),
            refined_query: None,
        }
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.history.push(ChatTurn {
            role: "user".to_string(),
            content: content.into(),
        });
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.history.push(ChatTurn {
            role: "assistant".to_string(),
            content: content.into(),
        });
    }
}

/// Optional hints forwarded to the channel search agent.
#[derive(Debug, Clone, Default)]
pub struct DiscoveryConstraints {
    /// Context about the hiring company (size, stage, stack).
    pub company_context: Option<String>,
    /// Hard constraints, one per entry (location, work arrangement, ...).
    pub constraints: Vec<String>,
}

/// Outcome of one exploration round.
#[derive(Debug, Clone)]
pub enum ExplorationResult {
    /// Persona understanding, general category list and clarifying
    /// questions, clamped to the delivery budget.
    Exploration { message: String },
    /// A synthesized refined query. Requires explicit user approval before
    /// channel discovery proceeds; this is a gate, not a transition.
    RefinedQuery { refined_query: String },
}

#[derive(Debug, thiserror::Error)]
pub enum MinerError {
    /// User-facing, non-retryable within the cycle (unverified channel
    /// batch, empty collection union, bad rating input).
    #[error("validation error: {0}")]
    Validation(String),

    /// Channel search subprocess exceeded its wall clock.
    #[error("channel search timed out after {seconds}s; output tail:\n{output_tail}")]
    Timeout { seconds: u64, output_tail: String },

    /// Channel search subprocess failed outright (bad exit, bad protocol,
    /// reported error).
    #[error("channel search failed: {0}")]
    Search(String),

    /// Malformed reasoning-service output. Absorbed locally by the
    /// extraction cascade or fallback selection, never user-facing.
    #[error("parse error: {0}")]
    Parse(String),

    #[error("subscription not found: {id}")]
    SubscriptionNotFound { id: Uuid },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("general error: {0}")]
    General(String),
}

pub type Result<T> = std::result::Result<T, MinerError>;
