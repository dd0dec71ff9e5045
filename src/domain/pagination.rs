//! Pagination state machine
//!
//! Traversal strategy is an explicit finite-state machine. [`transition`] is the only
//! function that moves between phases; the resolver in `crawling::pagination` feeds it
//! events and owns the surrounding [`PaginationState`].

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Detected pagination idiom
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaginationStrategy {
    NextLink,
    NumberedPages,
    CursorBased,
    InfiniteScroll,
    #[default]
    Unknown,
}

impl fmt::Display for PaginationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NextLink => "next_link",
            Self::NumberedPages => "numbered_pages",
            Self::CursorBased => "cursor_based",
            Self::InfiniteScroll => "infinite_scroll",
            Self::Unknown => "unknown",
        })
    }
}

/// Why traversal stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExhaustionReason {
    /// The next candidate was already visited
    LoopDetected,
    /// The page markup repeated an earlier listing page
    RepeatedContent,
    MaxPages,
    NoCandidate,
    EmptyListing,
    Cancelled,
    FetchFailed,
}

impl ExhaustionReason {
    /// Cycle-guard reasons surface as `PaginationLoopDetected`
    pub const fn is_loop(self) -> bool {
        matches!(self, Self::LoopDetected | Self::RepeatedContent)
    }
}

/// Phase of the resolver state machine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum ResolverPhase {
    #[default]
    Unknown,
    NextLink,
    /// `param` is set when pages are synthesized from a query parameter
    NumberedPages { param: Option<String> },
    /// `param` is the query parameter carrying the cursor, when known
    CursorBased { param: Option<String> },
    InfiniteScroll,
    Exhausted {
        strategy: PaginationStrategy,
        reason: ExhaustionReason,
    },
}

impl ResolverPhase {
    pub const fn strategy(&self) -> PaginationStrategy {
        match self {
            Self::Unknown => PaginationStrategy::Unknown,
            Self::NextLink => PaginationStrategy::NextLink,
            Self::NumberedPages { .. } => PaginationStrategy::NumberedPages,
            Self::CursorBased { .. } => PaginationStrategy::CursorBased,
            Self::InfiniteScroll => PaginationStrategy::InfiniteScroll,
            Self::Exhausted { strategy, .. } => *strategy,
        }
    }

    pub const fn is_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted { .. })
    }

    /// A strategy has been selected (terminal phases included)
    pub const fn is_locked(&self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

/// Input to the state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolverEvent {
    /// A detector produced a candidate on an unlocked resolver
    Detected(ResolverPhase),
    /// The locked strategy produced its next candidate
    Advanced,
    Exhaust(ExhaustionReason),
}

/// The single transition function.
///
/// - `Unknown` + `Detected(p)` locks into `p` (detections of `Unknown`/`Exhausted` are ignored).
/// - A locked phase ignores further detections.
/// - Any non-terminal phase + `Exhaust(r)` becomes `Exhausted`, keeping the strategy.
/// - `Exhausted` is terminal.
pub fn transition(phase: ResolverPhase, event: ResolverEvent) -> ResolverPhase {
    match (phase, event) {
        (exhausted @ ResolverPhase::Exhausted { .. }, _) => exhausted,
        (current, ResolverEvent::Exhaust(reason)) => ResolverPhase::Exhausted {
            strategy: current.strategy(),
            reason,
        },
        (ResolverPhase::Unknown, ResolverEvent::Detected(next))
            if !matches!(next, ResolverPhase::Unknown | ResolverPhase::Exhausted { .. }) =>
        {
            next
        }
        (current, ResolverEvent::Detected(_) | ResolverEvent::Advanced) => current,
    }
}

/// Where traversal currently stands
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Position {
    #[default]
    Start,
    Page(u32),
    Cursor(String),
}

impl Position {
    /// Page number for numbered traversal; the start page is page 1
    pub const fn page_number(&self) -> u32 {
        match self {
            Self::Page(n) => *n,
            Self::Start | Self::Cursor(_) => 1,
        }
    }
}

/// Traversal state, owned and mutated only by the pagination resolver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PaginationState {
    pub phase: ResolverPhase,
    /// Normalized URLs of listing pages seen or emitted
    pub visited_urls: HashSet<String>,
    pub position: Position,
    pub pages_visited: u32,
    /// Normalized URL of the previous listing page
    pub last_url: Option<String>,
    /// Markup digests of listing pages seen so far
    pub seen_digests: HashSet<String>,
}

impl PaginationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub const fn strategy(&self) -> PaginationStrategy {
        self.phase.strategy()
    }

    pub const fn is_exhausted(&self) -> bool {
        self.phase.is_exhausted()
    }

    pub const fn exhaustion(&self) -> Option<ExhaustionReason> {
        match &self.phase {
            ResolverPhase::Exhausted { reason, .. } => Some(*reason),
            _ => None,
        }
    }

    pub fn apply(&mut self, event: ResolverEvent) {
        let phase = std::mem::take(&mut self.phase);
        self.phase = transition(phase, event);
    }

    pub fn exhaust(&mut self, reason: ExhaustionReason) {
        self.apply(ResolverEvent::Exhaust(reason));
    }

    pub fn has_visited(&self, normalized_url: &str) -> bool {
        self.visited_urls.contains(normalized_url)
    }

    /// Returns `false` when the URL was already present
    pub fn mark_visited(&mut self, normalized_url: &str) -> bool {
        self.visited_urls.insert(normalized_url.to_string())
    }
}
