//! Task record types for the `DoItNow` remote collection.
//!
//! Defines the closed category and priority sets, the identifiers shared by
//! the client and the remote tier, and the document shape stored remotely
//! (one record per task, scoped by `ownerId`).

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum allowed task title length, in UTF-16 code units.
pub const MAX_TASK_TITLE_LENGTH: usize = 20;

/// Prefix carried by identifiers minted locally before the remote tier
/// has assigned a canonical one.
pub const TEMPORARY_ID_PREFIX: &str = "local-";

/// Returns the length of `title` in UTF-16 code units.
///
/// Titles are limited in code units rather than `char`s so that a title
/// accepted here is also accepted by clients that count the same way.
#[must_use]
pub fn title_units(title: &str) -> usize {
    title.encode_utf16().count()
}

/// Opaque task identifier.
///
/// Assigned by the remote tier on first persistence. Identifiers minted by
/// [`TaskId::temporary`] stand in until the write is acknowledged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// Wraps an existing identifier string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Mints a fresh time-ordered identifier (UUID v7).
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// Mints a locally-unique temporary identifier.
    #[must_use]
    pub fn temporary() -> Self {
        Self(format!("{TEMPORARY_ID_PREFIX}{}", Uuid::now_v7()))
    }

    /// Whether this identifier was minted by [`TaskId::temporary`].
    #[must_use]
    pub fn is_temporary(&self) -> bool {
        self.0.starts_with(TEMPORARY_ID_PREFIX)
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of the user owning a task. All queries and writes are
/// scoped to one owner.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(String);

impl OwnerId {
    /// Wraps an owner identifier string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Error returned when a string names no known category or priority.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: {value:?}")]
pub struct UnknownVariant {
    /// Which enumeration was being parsed.
    pub kind: &'static str,
    /// The rejected input.
    pub value: String,
}

/// Lowercases and strips separators so `"Me time"`, `"me-time"` and
/// `"MeTime"` compare equal.
fn normalize(s: &str) -> String {
    s.chars()
        .filter(|c| !matches!(c, ' ' | '-' | '_'))
        .flat_map(char::to_lowercase)
        .collect()
}

/// The fixed set of task categories.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    /// Work.
    #[default]
    Work,
    /// Daily chores.
    Daily,
    /// Vacation.
    Vacation,
    /// Personal time.
    #[serde(rename = "Me time")]
    MeTime,
    /// Health.
    Health,
}

impl Category {
    /// Every category, in selector order.
    pub const ALL: [Self; 5] = [
        Self::Work,
        Self::Daily,
        Self::Vacation,
        Self::MeTime,
        Self::Health,
    ];

    /// The wire and display name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Work => "Work",
            Self::Daily => "Daily",
            Self::Vacation => "Vacation",
            Self::MeTime => "Me time",
            Self::Health => "Health",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = normalize(s);
        Self::ALL
            .into_iter()
            .find(|c| normalize(c.as_str()) == wanted)
            .ok_or_else(|| UnknownVariant {
                kind: "category",
                value: s.to_string(),
            })
    }
}

/// Task priority.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Priority {
    /// High.
    High,
    /// Medium.
    #[default]
    Medium,
    /// Low.
    Low,
}

impl Priority {
    /// Every priority, highest first.
    pub const ALL: [Self; 3] = [Self::High, Self::Medium, Self::Low];

    /// The wire and display name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = normalize(s);
        Self::ALL
            .into_iter()
            .find(|p| normalize(p.as_str()) == wanted)
            .ok_or_else(|| UnknownVariant {
                kind: "priority",
                value: s.to_string(),
            })
    }
}

/// A task record as stored in the remote collection.
///
/// `dueDate` travels as an ISO-8601 string; `createdAt` is assigned by the
/// remote tier. A record missing any required field does not decode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDocument {
    /// Owning user.
    pub owner_id: OwnerId,
    /// Task title.
    pub title: String,
    /// Category (closed set).
    pub category: Category,
    /// Priority (closed set).
    pub priority: Priority,
    /// Due date as an ISO-8601 string.
    pub due_date: String,
    /// Completion instant; absent while the task is pending.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// Server-assigned creation instant.
    pub created_at: DateTime<Utc>,
}

/// A remote record as delivered by a subscription: the identifier the
/// remote tier assigned plus the untyped body.
///
/// Bodies stay untyped until the reconciler decodes them, so a single bad
/// record never spoils the rest of a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteDocument {
    /// Remote-assigned identifier.
    pub id: TaskId,
    /// Record body.
    pub data: serde_json::Value,
}

/// Payload of an append write: the record schema minus the fields the
/// remote tier assigns (`id`, `createdAt`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTaskRecord {
    /// Owning user.
    pub owner_id: OwnerId,
    /// Task title, already trimmed and validated.
    pub title: String,
    /// Category.
    pub category: Category,
    /// Priority.
    pub priority: Priority,
    /// Due date as an ISO-8601 string.
    pub due_date: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
}

impl NewTaskRecord {
    /// Completes the record with the server-assigned creation instant.
    #[must_use]
    pub fn into_document(self, created_at: DateTime<Utc>) -> TaskDocument {
        TaskDocument {
            owner_id: self.owner_id,
            title: self.title,
            category: self.category,
            priority: self.priority,
            due_date: self.due_date,
            completed_at: None,
            description: self.description,
            created_at,
        }
    }
}
