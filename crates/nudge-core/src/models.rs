use crate::recurrence::RepeatRule;
use crate::time::MinuteKey;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A messaging recipient.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct Contact {
    pub id: i64,
    /// External chat identifier; negative for groups and channels.
    pub chat_id: i64,
    /// Handle without the leading `@`.
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Contact {
    /// `@handle` when known, the chat id otherwise.
    pub fn label(&self) -> String {
        match &self.username {
            Some(username) => format!("@{username}"),
            None => self.chat_id.to_string(),
        }
    }
}

/// Data for creating or completing a contact.
#[derive(Debug, Clone, Default)]
pub struct NewContact {
    pub chat_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// A reminder's content and recurrence policy.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub id: i64,
    pub message: String,
    pub repeat: RepeatRule,
    pub created_at: DateTime<Utc>,
}

/// One concrete firing instant of an event (an `event_times` row).
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRow)]
pub struct Occurrence {
    pub id: i64,
    pub event_id: i64,
    pub fire_at: MinuteKey,
}

/// One parsed reminder definition, ready for the store.
#[derive(Debug, Clone, PartialEq)]
pub struct ReminderIntent {
    pub text: String,
    pub fire_times: Vec<MinuteKey>,
    /// Numeric chat ids or handles, resolved at save time.
    pub raw_targets: Vec<String>,
    pub repeat: RepeatRule,
}

/// One due (occurrence, recipient) pair. An occurrence with three recipients
/// yields three rows.
#[derive(Debug, Clone, PartialEq)]
pub struct DueReminder {
    pub occurrence_id: i64,
    pub event_id: i64,
    pub fire_at: MinuteKey,
    pub text: String,
    pub repeat: RepeatRule,
    pub chat_id: i64,
}

/// An event flattened for reporting.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ExportRecord {
    pub event_id: i64,
    pub text: String,
    pub repeat: RepeatRule,
    pub fire_times: Vec<MinuteKey>,
    /// `@handle` when known, the chat id otherwise.
    pub recipients: Vec<String>,
}

/// Row counts per relation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub contacts: i64,
    pub events: i64,
    pub occurrences: i64,
    pub links: i64,
}

/// Result of moving an occurrence to a new instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    /// The occurrence now fires at the given minute.
    Moved(MinuteKey),
    /// A sibling occurrence already fired at that minute, so this one was
    /// folded into it and removed.
    Merged(MinuteKey),
}

impl MoveOutcome {
    pub fn fire_at(&self) -> MinuteKey {
        match *self {
            MoveOutcome::Moved(at) | MoveOutcome::Merged(at) => at,
        }
    }
}

/// Result of deleting one occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeletedReminder {
    pub event_id: i64,
    /// True when the owning one-time event had no occurrences left and was
    /// removed together with its contact links.
    pub event_removed: bool,
}
