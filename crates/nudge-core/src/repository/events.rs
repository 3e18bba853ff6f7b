use crate::error::CoreError;
use crate::models::{Event, ExportRecord, ReminderIntent, StoreStats};
use crate::recurrence::RepeatRule;
use crate::repository::unit_of_work::{self, TRANSIENT_RETRIES};
use crate::repository::SqliteRepository;
use crate::targets;
use crate::time::{now_minute, MinuteKey};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Acquire, SqliteConnection};
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, error, info, warn};

#[async_trait]
impl super::EventRepository for SqliteRepository {
    async fn save_events(&self, intents: &[ReminderIntent]) -> Result<usize, CoreError> {
        let mut saved = 0;

        for (index, intent) in intents.iter().enumerate() {
            let outcome = unit_of_work::execute(
                "save_event",
                TRANSIENT_RETRIES,
                self.config().retry_delay,
                move || self.save_intent(intent),
            )
            .await;

            match outcome {
                Ok(event_id) => {
                    saved += 1;
                    debug!(index, event_id, "Reminder saved");
                }
                Err(err) => log_rejected_intent(index, intent, &err),
            }
        }

        info!(saved, total = intents.len(), "Reminder batch stored");
        Ok(saved)
    }

    async fn replace_all(&self, intents: &[ReminderIntent]) -> Result<usize, CoreError> {
        let saved = unit_of_work::execute(
            "replace_all",
            TRANSIENT_RETRIES,
            self.config().retry_delay,
            move || self.replace_all_once(intents),
        )
        .await?;

        info!(saved, total = intents.len(), "Reminder set replaced");
        Ok(saved)
    }

    async fn delete_past_events(&self) -> Result<usize, CoreError> {
        self.delete_past_events_before(now_minute()).await
    }

    async fn delete_past_events_before(&self, minute: MinuteKey) -> Result<usize, CoreError> {
        let deleted = unit_of_work::execute(
            "delete_past_events",
            TRANSIENT_RETRIES,
            self.config().retry_delay,
            move || self.delete_past_events_once(minute),
        )
        .await?;

        if deleted > 0 {
            info!(deleted, before = %minute, "Expired one-time events removed");
        }
        Ok(deleted)
    }

    async fn find_event(&self, event_id: i64) -> Result<Option<Event>, CoreError> {
        let row: Option<(i64, String, Option<String>, DateTime<Utc>)> =
            sqlx::query_as("SELECT id, message, repeat_rule, created_at FROM events WHERE id = $1")
                .bind(event_id)
                .fetch_optional(self.pool())
                .await?;

        Ok(row.map(|(id, message, repeat_rule, created_at)| Event {
            id,
            message,
            repeat: RepeatRule::from_storage(repeat_rule.as_deref()),
            created_at,
        }))
    }

    async fn get_all_for_export(&self) -> Result<Vec<ExportRecord>, CoreError> {
        let events: Vec<(i64, String, Option<String>)> =
            sqlx::query_as("SELECT id, message, repeat_rule FROM events ORDER BY id")
                .fetch_all(self.pool())
                .await?;

        let mut records = Vec::with_capacity(events.len());
        let mut index_by_event = HashMap::with_capacity(events.len());
        for (event_id, text, repeat_rule) in events {
            index_by_event.insert(event_id, records.len());
            records.push(ExportRecord {
                event_id,
                text,
                repeat: RepeatRule::from_storage(repeat_rule.as_deref()),
                fire_times: Vec::new(),
                recipients: Vec::new(),
            });
        }

        let times: Vec<(i64, MinuteKey)> =
            sqlx::query_as("SELECT event_id, fire_at FROM event_times ORDER BY event_id, fire_at")
                .fetch_all(self.pool())
                .await?;
        for (event_id, fire_at) in times {
            if let Some(&i) = index_by_event.get(&event_id) {
                records[i].fire_times.push(fire_at);
            }
        }

        let recipients: Vec<(i64, i64, Option<String>)> = sqlx::query_as(
            r#"SELECT ec.event_id, c.chat_id, c.username
            FROM event_contacts ec
            JOIN contacts c ON c.id = ec.contact_id
            ORDER BY ec.event_id, c.id"#,
        )
        .fetch_all(self.pool())
        .await?;
        for (event_id, chat_id, username) in recipients {
            if let Some(&i) = index_by_event.get(&event_id) {
                let label = match username {
                    Some(username) => format!("@{username}"),
                    None => chat_id.to_string(),
                };
                records[i].recipients.push(label);
            }
        }

        Ok(records)
    }

    async fn stats(&self) -> Result<StoreStats, CoreError> {
        let (contacts, events, occurrences, links): (i64, i64, i64, i64) = sqlx::query_as(
            r#"SELECT
                (SELECT COUNT(*) FROM contacts),
                (SELECT COUNT(*) FROM events),
                (SELECT COUNT(*) FROM event_times),
                (SELECT COUNT(*) FROM event_contacts)"#,
        )
        .fetch_one(self.pool())
        .await?;

        Ok(StoreStats { contacts, events, occurrences, links })
    }
}

impl SqliteRepository {
    async fn save_intent(&self, intent: &ReminderIntent) -> Result<i64, CoreError> {
        let mut tx = self.pool().begin().await?;
        let event_id = Self::insert_intent(&mut tx, intent).await?;
        tx.commit().await?;
        Ok(event_id)
    }

    async fn replace_all_once(&self, intents: &[ReminderIntent]) -> Result<usize, CoreError> {
        let mut tx = self.pool().begin().await?;

        sqlx::query("DELETE FROM event_contacts").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM event_times").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM events").execute(&mut *tx).await?;

        let mut saved = 0;
        for (index, intent) in intents.iter().enumerate() {
            // Nested unit of work: a savepoint, so one bad intent only undoes itself.
            let mut unit = (&mut *tx).begin().await?;
            match Self::insert_intent(&mut unit, intent).await {
                Ok(_) => {
                    unit.commit().await?;
                    saved += 1;
                }
                Err(err) => {
                    unit.rollback().await?;
                    log_rejected_intent(index, intent, &err);
                }
            }
        }

        tx.commit().await?;
        Ok(saved)
    }

    async fn delete_past_events_once(&self, minute: MinuteKey) -> Result<usize, CoreError> {
        let mut tx = self.pool().begin().await?;

        let expired: Vec<(i64,)> = sqlx::query_as(
            r#"SELECT e.id FROM events e
            JOIN event_times t ON t.event_id = e.id
            WHERE e.repeat_rule IS NULL
            GROUP BY e.id
            HAVING MAX(t.fire_at) < $1"#,
        )
        .bind(minute)
        .fetch_all(&mut *tx)
        .await?;

        for (event_id,) in &expired {
            Self::delete_event_subtree(&mut tx, *event_id).await?;
        }

        tx.commit().await?;
        Ok(expired.len())
    }

    /// Inserts an event with its occurrences and contact links.
    ///
    /// Fails without writing anything the caller would keep when the text is
    /// empty, there is no fire time, or no target resolves to a contact; the
    /// caller's transaction is expected to roll back on error.
    pub(crate) async fn insert_intent(
        conn: &mut SqliteConnection,
        intent: &ReminderIntent,
    ) -> Result<i64, CoreError> {
        let text = intent.text.trim();
        if text.is_empty() {
            return Err(CoreError::InvalidInput("reminder text is empty".to_string()));
        }

        let fire_times: BTreeSet<MinuteKey> = intent.fire_times.iter().copied().collect();
        if fire_times.is_empty() {
            return Err(CoreError::InvalidInput("reminder has no fire times".to_string()));
        }

        let chat_ids = targets::resolve_targets(conn, &intent.raw_targets).await?;
        if chat_ids.is_empty() {
            return Err(CoreError::NoRecipients(intent.raw_targets.join(", ")));
        }

        let event_id = sqlx::query("INSERT INTO events (message, repeat_rule) VALUES ($1, $2)")
            .bind(text)
            .bind(intent.repeat.to_storage())
            .execute(&mut *conn)
            .await?
            .last_insert_rowid();
        if event_id <= 0 {
            return Err(CoreError::Integrity(format!("event insert returned id {event_id}")));
        }

        for fire_at in &fire_times {
            sqlx::query("INSERT INTO event_times (event_id, fire_at) VALUES ($1, $2)")
                .bind(event_id)
                .bind(*fire_at)
                .execute(&mut *conn)
                .await?;
        }

        let mut linked = 0;
        for chat_id in &chat_ids {
            let contact_id = Self::ensure_contact(conn, *chat_id).await?;
            linked += sqlx::query(
                "INSERT INTO event_contacts (event_id, contact_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            )
            .bind(event_id)
            .bind(contact_id)
            .execute(&mut *conn)
            .await?
            .rows_affected();
        }
        if linked == 0 {
            return Err(CoreError::NoRecipients(format!("event {event_id} could not be linked")));
        }

        Ok(event_id)
    }

    /// Removes an event together with its occurrences and contact links.
    pub(crate) async fn delete_event_subtree(
        conn: &mut SqliteConnection,
        event_id: i64,
    ) -> Result<bool, CoreError> {
        sqlx::query("DELETE FROM event_contacts WHERE event_id = $1")
            .bind(event_id)
            .execute(&mut *conn)
            .await?;
        sqlx::query("DELETE FROM event_times WHERE event_id = $1")
            .bind(event_id)
            .execute(&mut *conn)
            .await?;
        let removed = sqlx::query("DELETE FROM events WHERE id = $1")
            .bind(event_id)
            .execute(&mut *conn)
            .await?
            .rows_affected();
        Ok(removed > 0)
    }
}

fn log_rejected_intent(index: usize, intent: &ReminderIntent, err: &CoreError) {
    match err {
        CoreError::NoRecipients(_) => {
            warn!(index, targets = ?intent.raw_targets, "Reminder skipped: no target resolved to a contact")
        }
        CoreError::InvalidInput(reason) => warn!(index, reason = %reason, "Reminder skipped"),
        other => error!(index, error = %other, "Reminder could not be saved"),
    }
}
