use crate::db::{DbPool, StoreConfig};
use crate::error::CoreError;
use crate::models::{
    Contact, DeletedReminder, DueReminder, Event, ExportRecord, MoveOutcome, NewContact, Occurrence,
    ReminderIntent, StoreStats,
};
use crate::recurrence::RepeatRule;
use crate::time::MinuteKey;
use async_trait::async_trait;
use sqlx::FromRow;

// Domain modules
pub mod contacts;
pub mod events;
pub mod reminders;
pub mod unit_of_work;

// Traits are defined in this module and implemented in respective domain modules

/// Raw shape of a due-reminder join row.
#[derive(Debug, Clone, FromRow)]
pub struct DueReminderRow {
    pub occurrence_id: i64,
    pub event_id: i64,
    pub fire_at: MinuteKey,
    pub message: String,
    pub repeat_rule: Option<String>,
    pub chat_id: i64,
}

impl From<DueReminderRow> for DueReminder {
    fn from(row: DueReminderRow) -> Self {
        Self {
            occurrence_id: row.occurrence_id,
            event_id: row.event_id,
            fire_at: row.fire_at,
            text: row.message,
            repeat: RepeatRule::from_storage(row.repeat_rule.as_deref()),
            chat_id: row.chat_id,
        }
    }
}

/// Domain-specific trait for contact operations
#[async_trait]
pub trait ContactRepository: Send + Sync {
    /// Creates the contact or fills its previously empty name/handle fields.
    async fn upsert_contact(&self, contact: NewContact) -> Result<Contact, CoreError>;
    async fn find_contact_by_chat_id(&self, chat_id: i64) -> Result<Option<Contact>, CoreError>;
    async fn find_contact_by_username(&self, username: &str) -> Result<Option<Contact>, CoreError>;
    async fn find_contacts(&self) -> Result<Vec<Contact>, CoreError>;
    /// Resolves raw targets (chat ids or handles) to known chat ids.
    async fn resolve_targets(&self, raw_targets: &[String]) -> Result<Vec<i64>, CoreError>;
}

/// Domain-specific trait for bulk event operations
#[async_trait]
pub trait EventRepository: Send + Sync {
    /// Stores each intent in its own transaction; returns how many committed.
    async fn save_events(&self, intents: &[ReminderIntent]) -> Result<usize, CoreError>;
    /// Clears every event, then stores the intents, all in one transaction.
    async fn replace_all(&self, intents: &[ReminderIntent]) -> Result<usize, CoreError>;
    /// Deletes one-time events whose occurrences all lie before the current minute.
    async fn delete_past_events(&self) -> Result<usize, CoreError>;
    async fn delete_past_events_before(&self, minute: MinuteKey) -> Result<usize, CoreError>;
    async fn find_event(&self, event_id: i64) -> Result<Option<Event>, CoreError>;
    async fn get_all_for_export(&self) -> Result<Vec<ExportRecord>, CoreError>;
    async fn stats(&self) -> Result<StoreStats, CoreError>;
}

/// Domain-specific trait for per-occurrence operations used by dispatch
#[async_trait]
pub trait ReminderRepository: Send + Sync {
    async fn find_occurrence(&self, occurrence_id: i64) -> Result<Option<Occurrence>, CoreError>;
    async fn find_occurrences_for_event(&self, event_id: i64) -> Result<Vec<Occurrence>, CoreError>;
    async fn postpone_reminder(&self, occurrence_id: i64, days: u32) -> Result<MoveOutcome, CoreError>;
    async fn postpone_reminder_by_month(&self, occurrence_id: i64, months: u32) -> Result<MoveOutcome, CoreError>;
    async fn reschedule_reminder_at(&self, occurrence_id: i64, at: MinuteKey) -> Result<MoveOutcome, CoreError>;
    async fn delete_reminder(&self, occurrence_id: i64) -> Result<DeletedReminder, CoreError>;
    async fn get_due_reminders_at_exact(&self, minute: MinuteKey) -> Result<Vec<DueReminder>, CoreError>;
    /// Inclusive range, ordered by occurrence id.
    async fn get_due_reminders_in_window(&self, from: MinuteKey, to: MinuteKey) -> Result<Vec<DueReminder>, CoreError>;
}

/// Main repository trait that composes all domain traits
pub trait Repository: ContactRepository + EventRepository + ReminderRepository {}

/// SQLite implementation of the repository pattern
pub struct SqliteRepository {
    pool: DbPool,
    config: StoreConfig,
}

impl SqliteRepository {
    pub fn new(pool: DbPool) -> Self {
        Self::with_config(pool, StoreConfig::default())
    }

    pub fn with_config(pool: DbPool, config: StoreConfig) -> Self {
        Self { pool, config }
    }

    /// Get a reference to the database pool for internal use across modules
    pub(crate) fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub(crate) fn config(&self) -> &StoreConfig {
        &self.config
    }
}

impl Repository for SqliteRepository {}
