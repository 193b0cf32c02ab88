//! Clauses: tagged spans of document text

use crate::position::{ranges_intersect, Position};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;
use ulid::Ulid;

/// Clause identifier
///
/// Generated ids are ULIDs; ids coming from parsers or the backend are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClauseId(pub String);

impl ClauseId {
    /// Generate a fresh clause id
    #[inline]
    #[must_use]
    pub fn generate() -> Self {
        Self(Ulid::new().to_string())
    }

    /// Borrow as string
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ClauseId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ClauseId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Functional classification of a clause
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClauseKind {
    /// Preamble / informational section
    Info,
    /// Regular contract clause
    #[default]
    Clause,
    /// Appendix
    Appendix,
    /// Annex
    Annex,
    /// Exhibit
    Exhibit,
    /// Playbook guideline (reference documents)
    Guideline,
}

impl ClauseKind {
    /// All kinds, in declaration order
    pub const ALL: [ClauseKind; 6] = [
        ClauseKind::Info,
        ClauseKind::Clause,
        ClauseKind::Appendix,
        ClauseKind::Annex,
        ClauseKind::Exhibit,
        ClauseKind::Guideline,
    ];

    /// Wire name (`CLAUSE`, `APPENDIX`, ...)
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ClauseKind::Info => "INFO",
            ClauseKind::Clause => "CLAUSE",
            ClauseKind::Appendix => "APPENDIX",
            ClauseKind::Annex => "ANNEX",
            ClauseKind::Exhibit => "EXHIBIT",
            ClauseKind::Guideline => "GUIDELINE",
        }
    }
}

impl Display for ClauseKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClauseKind {
    type Err = String;

    /// Accepts wire names with or without a `_START` suffix, case-insensitively
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        let base = upper.strip_suffix("_START").unwrap_or(&upper);
        ClauseKind::ALL
            .into_iter()
            .find(|k| k.as_str() == base)
            .ok_or_else(|| format!("unknown clause kind: {s}"))
    }
}

/// A named, tagged span of document text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clause {
    /// Clause id
    pub id: ClauseId,
    /// Clause kind
    #[serde(rename = "type")]
    pub kind: ClauseKind,
    /// Display header
    pub header: String,
    /// Inclusive start
    pub start: Position,
    /// Exclusive end; `None` while the clause is unterminated
    pub end: Option<Position>,
    /// Free-form tags
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

impl Clause {
    /// Header given to clauses created interactively or by merge
    pub const DEFAULT_HEADER: &'static str = "New Clause";

    /// Create an unterminated clause at `start`
    #[inline]
    #[must_use]
    pub fn open(kind: ClauseKind, start: Position) -> Self {
        Self {
            id: ClauseId::generate(),
            kind,
            header: Self::DEFAULT_HEADER.to_string(),
            start,
            end: None,
            tags: BTreeSet::new(),
        }
    }

    /// Create a terminated clause
    #[inline]
    #[must_use]
    pub fn closed(id: impl Into<ClauseId>, kind: ClauseKind, start: Position, end: Position) -> Self {
        Self {
            id: id.into(),
            kind,
            header: Self::DEFAULT_HEADER.to_string(),
            start,
            end: Some(end),
            tags: BTreeSet::new(),
        }
    }

    /// With header
    #[inline]
    #[must_use]
    pub fn with_header(mut self, header: impl Into<String>) -> Self {
        self.header = header.into();
        self
    }

    /// With tags
    #[inline]
    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Whether the closing boundary has been placed
    #[inline]
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.end.is_some()
    }

    /// `[start, end)` when terminated
    #[inline]
    #[must_use]
    pub fn range(&self) -> Option<(Position, Position)> {
        self.end.map(|end| (self.start, end))
    }

    /// Containment: terminated and `start <= point < end`
    #[inline]
    #[must_use]
    pub fn is_inside(&self, point: Position) -> bool {
        self.end.is_some_and(|end| self.start <= point && point < end)
    }

    /// Half-open intersection with another range; unterminated clauses never intersect
    #[inline]
    #[must_use]
    pub fn intersects(&self, start: Position, end: Position) -> bool {
        self.range()
            .is_some_and(|(s, e)| ranges_intersect(s, e, start, end))
    }

    /// Whether this clause lies fully within `[start, end]`
    #[inline]
    #[must_use]
    pub fn is_enclosed_by(&self, start: Position, end: Position) -> bool {
        self.end.is_some_and(|e| self.start >= start && e <= end)
    }
}

/// Metadata edit for a clause; positions are never patched
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClausePatch {
    /// New header
    pub header: Option<String>,
    /// New kind
    pub kind: Option<ClauseKind>,
    /// Replacement tag set
    pub tags: Option<BTreeSet<String>>,
}

impl ClausePatch {
    /// Apply onto a clause
    pub fn apply(&self, clause: &mut Clause) {
        if let Some(header) = &self.header {
            clause.header.clone_from(header);
        }
        if let Some(kind) = self.kind {
            clause.kind = kind;
        }
        if let Some(tags) = &self.tags {
            clause.tags.clone_from(tags);
        }
    }
}
