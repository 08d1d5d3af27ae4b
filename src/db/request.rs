use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

const ALL: &str = "all";

/// One kind of live handle a caller can ask for.
///
/// Variants are declared in the lexicographic order of their names, so the
/// derived `Ord` sorts them the same way their names sort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Connection,
    Cursor,
    Engine,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 3] = [
        ArtifactKind::Connection,
        ArtifactKind::Cursor,
        ArtifactKind::Engine,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Connection => "connection",
            ArtifactKind::Cursor => "cursor",
            ArtifactKind::Engine => "engine",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArtifactKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "connection" => Ok(ArtifactKind::Connection),
            "cursor" => Ok(ArtifactKind::Cursor),
            "engine" => Ok(ArtifactKind::Engine),
            _ => Err(Error::InvalidArtifactKind(s.to_string())),
        }
    }
}

/// Raw, unvalidated request for connection artifacts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ConnectionRequest {
    /// Nothing was asked for; resolves to a single connection.
    #[default]
    Default,
    Single(String),
    Many(Vec<String>),
}

impl ConnectionRequest {
    pub fn is_default(&self) -> bool {
        match self {
            ConnectionRequest::Default => true,
            ConnectionRequest::Many(names) => names.is_empty(),
            ConnectionRequest::Single(_) => false,
        }
    }

    /// Use `fallback` when nothing was requested explicitly.
    pub fn or(self, fallback: ConnectionRequest) -> ConnectionRequest {
        if self.is_default() {
            fallback
        } else {
            self
        }
    }
}

impl From<&str> for ConnectionRequest {
    fn from(value: &str) -> Self {
        ConnectionRequest::Single(value.to_string())
    }
}

impl From<String> for ConnectionRequest {
    fn from(value: String) -> Self {
        ConnectionRequest::Single(value)
    }
}

impl From<Vec<String>> for ConnectionRequest {
    fn from(value: Vec<String>) -> Self {
        ConnectionRequest::Many(value)
    }
}

impl From<Vec<&str>> for ConnectionRequest {
    fn from(value: Vec<&str>) -> Self {
        ConnectionRequest::Many(value.into_iter().map(str::to_string).collect())
    }
}

impl From<&[&str]> for ConnectionRequest {
    fn from(value: &[&str]) -> Self {
        ConnectionRequest::Many(value.iter().map(|s| s.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for ConnectionRequest {
    fn from(value: [&str; N]) -> Self {
        ConnectionRequest::Many(value.iter().map(|s| s.to_string()).collect())
    }
}

impl From<&[ArtifactKind]> for ConnectionRequest {
    fn from(value: &[ArtifactKind]) -> Self {
        ConnectionRequest::Many(value.iter().map(|k| k.as_str().to_string()).collect())
    }
}

impl<T: Into<ConnectionRequest>> From<Option<T>> for ConnectionRequest {
    fn from(value: Option<T>) -> Self {
        value.map_or(ConnectionRequest::Default, Into::into)
    }
}

/// One creation step of a resolved plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlanStep {
    Connection,
    Cursor,
    /// Opens one connection and derives the cursor from it.
    CombinedConnectionCursor,
    Engine,
}

impl PlanStep {
    /// Number of artifacts this step hands back.
    pub fn artifact_count(&self) -> usize {
        match self {
            PlanStep::CombinedConnectionCursor => 2,
            _ => 1,
        }
    }
}

impl From<ArtifactKind> for PlanStep {
    fn from(kind: ArtifactKind) -> Self {
        match kind {
            ArtifactKind::Connection => PlanStep::Connection,
            ArtifactKind::Cursor => PlanStep::Cursor,
            ArtifactKind::Engine => PlanStep::Engine,
        }
    }
}

impl fmt::Display for PlanStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanStep::Connection => f.write_str("connection"),
            PlanStep::Cursor => f.write_str("cursor"),
            PlanStep::CombinedConnectionCursor => f.write_str("connection+cursor"),
            PlanStep::Engine => f.write_str("engine"),
        }
    }
}

/// Deduplicated, ordered creation plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalPlan {
    steps: Vec<PlanStep>,
}

impl CanonicalPlan {
    fn from_kinds(kinds: &BTreeSet<ArtifactKind>) -> Self {
        let sorted: Vec<ArtifactKind> = kinds.iter().copied().collect();
        let mut steps = Vec::with_capacity(sorted.len());

        let rest = if sorted.starts_with(&[ArtifactKind::Connection, ArtifactKind::Cursor]) {
            steps.push(PlanStep::CombinedConnectionCursor);
            &sorted[2..]
        } else {
            &sorted[..]
        };
        steps.extend(rest.iter().copied().map(PlanStep::from));

        Self { steps }
    }

    pub fn steps(&self) -> &[PlanStep] {
        &self.steps
    }

    pub fn iter(&self) -> impl Iterator<Item = &PlanStep> {
        self.steps.iter()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn artifact_count(&self) -> usize {
        self.steps.iter().map(PlanStep::artifact_count).sum()
    }

    pub fn includes(&self, kind: ArtifactKind) -> bool {
        self.steps.iter().any(|step| match (step, kind) {
            (PlanStep::CombinedConnectionCursor, ArtifactKind::Connection)
            | (PlanStep::CombinedConnectionCursor, ArtifactKind::Cursor) => true,
            (step, kind) => *step == PlanStep::from(kind),
        })
    }
}

impl<'a> IntoIterator for &'a CanonicalPlan {
    type Item = &'a PlanStep;
    type IntoIter = std::slice::Iter<'a, PlanStep>;

    fn into_iter(self) -> Self::IntoIter {
        self.steps.iter()
    }
}

impl fmt::Display for CanonicalPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.steps.iter().map(|s| s.to_string()).collect();
        f.write_str(&names.join(", "))
    }
}

fn expand(name: &str) -> Result<Vec<ArtifactKind>> {
    if name.trim().eq_ignore_ascii_case(ALL) {
        return Ok(ArtifactKind::ALL.to_vec());
    }
    name.parse::<ArtifactKind>().map(|kind| vec![kind])
}

/// Normalize a connection-type request into a canonical plan.
///
/// Names are case-insensitive and deduplicated; input order is irrelevant.
/// When both a connection and a cursor are requested they collapse into a
/// single [`PlanStep::CombinedConnectionCursor`] so the cursor is always taken
/// from the returned connection. An empty request resolves to one connection.
pub fn resolve(request: impl Into<ConnectionRequest>) -> Result<CanonicalPlan> {
    let request = request.into();
    let mut kinds = BTreeSet::new();

    match &request {
        ConnectionRequest::Single(name) => kinds.extend(expand(name)?),
        ConnectionRequest::Many(names) => {
            for name in names {
                kinds.extend(expand(name)?);
            }
        }
        ConnectionRequest::Default => {}
    }

    if kinds.is_empty() {
        kinds.insert(ArtifactKind::Connection);
    }

    Ok(CanonicalPlan::from_kinds(&kinds))
}
