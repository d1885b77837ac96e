//! Queued mutations

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Kind of remote mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationKind {
    Insert,
    Update,
    Delete,
}

impl MutationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Describes the mutation a remote call performs, so it can be queued if
/// the call cannot reach the backend.
///
/// Reads pass `None` instead and are never queued.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutationInfo {
    pub kind: MutationKind,
    /// Remote collection or table, e.g. `registrations`
    pub resource: String,
    /// Opaque body handed back to the replayer
    pub payload: serde_json::Value,
}

impl MutationInfo {
    pub fn new(kind: MutationKind, resource: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            kind,
            resource: resource.into(),
            payload,
        }
    }

    pub fn insert(resource: impl Into<String>, payload: serde_json::Value) -> Self {
        Self::new(MutationKind::Insert, resource, payload)
    }

    pub fn update(resource: impl Into<String>, payload: serde_json::Value) -> Self {
        Self::new(MutationKind::Update, resource, payload)
    }

    pub fn delete(resource: impl Into<String>, payload: serde_json::Value) -> Self {
        Self::new(MutationKind::Delete, resource, payload)
    }

    /// `<kind>:<resource>`, used as the operation name in retry logs.
    pub fn label(&self) -> String {
        format!("{}:{}", self.kind, self.resource)
    }
}

/// A mutation waiting to be replayed against the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingOperation {
    /// `<enqueue millis>-<uuid simple>`
    pub id: String,
    pub kind: MutationKind,
    pub resource: String,
    pub payload: serde_json::Value,
    pub enqueued_at: DateTime<Utc>,
    /// Failed replay passes so far
    #[serde(default)]
    pub attempts: u32,
}

impl PendingOperation {
    pub fn new(info: MutationInfo, enqueued_at: DateTime<Utc>) -> Self {
        Self {
            id: Self::generate_id(enqueued_at),
            kind: info.kind,
            resource: info.resource,
            payload: info.payload,
            enqueued_at,
            attempts: 0,
        }
    }

    fn generate_id(at: DateTime<Utc>) -> String {
        format!("{}-{}", at.timestamp_millis(), Uuid::new_v4().simple())
    }

    /// Enqueued strictly before `cutoff`.
    pub fn is_older_than(&self, cutoff: DateTime<Utc>) -> bool {
        self.enqueued_at < cutoff
    }

    pub fn label(&self) -> String {
        format!("{}:{}", self.kind, self.resource)
    }
}
