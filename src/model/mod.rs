//! Core data types for the issue store.
//!
//! This module defines the stored entity and its identifier types:
//! - `IssueRecord` - The stored unit of tracked discussion
//! - `ProjectId` - Owning project identifier
//! - `Iri` / `OboId` - Ontology entity references carried by a record
//! - `IssueStatus` - Lifecycle state of the remote issue
//! - `TrackerRef` - Remote tracker metadata (inert payload)
//!
//! Identifier types are opaque here: their internal grammar belongs to the
//! project-management and ontology subsystems. They only need equality,
//! hashing and ordering so they can serve as index keys and set elements.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Identifier of an ontology-authoring project.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(String);

impl ProjectId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An ontology entity IRI.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Iri(String);

impl Iri {
    #[must_use]
    pub fn new(iri: impl Into<String>) -> Self {
        Self(iri.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Iri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An OBO-style ontology entity identifier (e.g. `GO:0008150`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OboId(String);

impl OboId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OboId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle status of the underlying tracker issue.
///
/// Stored verbatim; unknown values from newer tracker integrations pass
/// through as `Custom`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum IssueStatus {
    #[default]
    Open,
    Closed,
    #[serde(untagged)]
    Custom(String),
}

impl IssueStatus {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
            Self::Custom(value) => value,
        }
    }
}

impl fmt::Display for IssueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for IssueStatus {
    type Err = crate::error::StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "open" => Ok(Self::Open),
            "closed" => Ok(Self::Closed),
            other => Ok(Self::Custom(other.to_string())),
        }
    }
}

/// Metadata linking a record back to its remote tracker issue.
///
/// Inert payload from the store's perspective: persisted as a single JSON
/// column and never indexed or queried.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TrackerRef {
    /// Tracker system name (e.g. "github").
    pub system: String,

    /// Issue number within the tracker, if the tracker is numeric.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<i64>,

    /// Canonical URL of the remote issue.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// The stored issue record.
///
/// A record belongs to exactly one project, which is immutable after
/// creation. The `iris` and `obo_ids` sets are the indexed entity
/// references; everything else is opaque payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IssueRecord {
    /// Unique record id (primary key).
    pub id: String,

    /// Owning project. A record cannot move between projects.
    pub project_id: ProjectId,

    /// Ontology entity IRIs this issue is attached to.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub iris: BTreeSet<Iri>,

    /// OBO-style identifiers this issue is attached to.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub obo_ids: BTreeSet<OboId>,

    /// Issue title.
    pub title: String,

    /// Issue body text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,

    /// Tracker-side lifecycle status.
    #[serde(default)]
    pub status: IssueStatus,

    /// Remote tracker metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracker: Option<TrackerRef>,

    /// Creation timestamp.
    pub created_at: DateTime<Utc>,

    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl IssueRecord {
    /// Create a record with empty entity-reference sets and no payload
    /// beyond the title. Timestamps are set to now.
    #[must_use]
    pub fn new(id: impl Into<String>, project_id: ProjectId, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            project_id,
            iris: BTreeSet::new(),
            obo_ids: BTreeSet::new(),
            title: title.into(),
            body: None,
            status: IssueStatus::Open,
            tracker: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// True when the record references no ontology entity at all.
    ///
    /// Valid state: an issue that has not yet been linked to any entity.
    #[must_use]
    pub fn is_unlinked(&self) -> bool {
        self.iris.is_empty() && self.obo_ids.is_empty()
    }
}
