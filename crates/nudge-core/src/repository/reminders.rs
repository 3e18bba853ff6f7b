use crate::error::CoreError;
use crate::models::{DeletedReminder, DueReminder, MoveOutcome, Occurrence};
use crate::recurrence::RepeatRule;
use crate::repository::unit_of_work::{self, TRANSIENT_RETRIES};
use crate::repository::{DueReminderRow, SqliteRepository};
use crate::time::MinuteKey;
use async_trait::async_trait;
use tracing::debug;

const DUE_SELECT: &str = r#"SELECT
        t.id AS occurrence_id,
        t.event_id AS event_id,
        t.fire_at AS fire_at,
        e.message AS message,
        e.repeat_rule AS repeat_rule,
        c.chat_id AS chat_id
    FROM event_times t
    JOIN events e ON e.id = t.event_id
    JOIN event_contacts ec ON ec.event_id = e.id
    JOIN contacts c ON c.id = ec.contact_id"#;

/// Computes the new fire time of an occurrence from its current one.
type NextFireAt = dyn Fn(MinuteKey) -> Result<MinuteKey, CoreError> + Send + Sync;

#[async_trait]
impl super::ReminderRepository for SqliteRepository {
    async fn find_occurrence(&self, occurrence_id: i64) -> Result<Option<Occurrence>, CoreError> {
        let occurrence = sqlx::query_as("SELECT id, event_id, fire_at FROM event_times WHERE id = $1")
            .bind(occurrence_id)
            .fetch_optional(self.pool())
            .await?;
        Ok(occurrence)
    }

    async fn find_occurrences_for_event(&self, event_id: i64) -> Result<Vec<Occurrence>, CoreError> {
        let occurrences = sqlx::query_as(
            "SELECT id, event_id, fire_at FROM event_times WHERE event_id = $1 ORDER BY fire_at",
        )
        .bind(event_id)
        .fetch_all(self.pool())
        .await?;
        Ok(occurrences)
    }

    async fn postpone_reminder(&self, occurrence_id: i64, days: u32) -> Result<MoveOutcome, CoreError> {
        let step = move |at: MinuteKey| at.plus_days(days);
        self.move_occurrence("postpone_reminder", occurrence_id, &step).await
    }

    async fn postpone_reminder_by_month(&self, occurrence_id: i64, months: u32) -> Result<MoveOutcome, CoreError> {
        let step = move |at: MinuteKey| at.plus_months(months);
        self.move_occurrence("postpone_reminder_by_month", occurrence_id, &step).await
    }

    async fn reschedule_reminder_at(&self, occurrence_id: i64, at: MinuteKey) -> Result<MoveOutcome, CoreError> {
        let step = move |_: MinuteKey| -> Result<MinuteKey, CoreError> { Ok(at) };
        self.move_occurrence("reschedule_reminder_at", occurrence_id, &step).await
    }

    async fn delete_reminder(&self, occurrence_id: i64) -> Result<DeletedReminder, CoreError> {
        unit_of_work::execute(
            "delete_reminder",
            TRANSIENT_RETRIES,
            self.config().retry_delay,
            move || self.delete_reminder_once(occurrence_id),
        )
        .await
    }

    async fn get_due_reminders_at_exact(&self, minute: MinuteKey) -> Result<Vec<DueReminder>, CoreError> {
        let rows: Vec<DueReminderRow> =
            sqlx::query_as(&format!("{DUE_SELECT} WHERE t.fire_at = $1 ORDER BY t.id, c.id"))
                .bind(minute)
                .fetch_all(self.pool())
                .await?;
        Ok(rows.into_iter().map(DueReminder::from).collect())
    }

    async fn get_due_reminders_in_window(&self, from: MinuteKey, to: MinuteKey) -> Result<Vec<DueReminder>, CoreError> {
        let rows: Vec<DueReminderRow> = sqlx::query_as(&format!(
            "{DUE_SELECT} WHERE t.fire_at BETWEEN $1 AND $2 ORDER BY t.id, c.id"
        ))
        .bind(from)
        .bind(to)
        .fetch_all(self.pool())
        .await?;
        Ok(rows.into_iter().map(DueReminder::from).collect())
    }
}

impl SqliteRepository {
    async fn move_occurrence(
        &self,
        operation: &str,
        occurrence_id: i64,
        next: &NextFireAt,
    ) -> Result<MoveOutcome, CoreError> {
        unit_of_work::execute(
            operation,
            TRANSIENT_RETRIES,
            self.config().retry_delay,
            move || self.move_occurrence_once(occurrence_id, next),
        )
        .await
    }

    async fn move_occurrence_once(
        &self,
        occurrence_id: i64,
        next: &NextFireAt,
    ) -> Result<MoveOutcome, CoreError> {
        let mut tx = self.pool().begin().await?;

        let occurrence: Occurrence =
            sqlx::query_as("SELECT id, event_id, fire_at FROM event_times WHERE id = $1")
                .bind(occurrence_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| CoreError::NotFound(format!("occurrence {occurrence_id}")))?;

        let target = next(occurrence.fire_at)?;
        if target == occurrence.fire_at {
            tx.commit().await?;
            return Ok(MoveOutcome::Moved(target));
        }

        let sibling: Option<(i64,)> =
            sqlx::query_as("SELECT id FROM event_times WHERE event_id = $1 AND fire_at = $2")
                .bind(occurrence.event_id)
                .bind(target)
                .fetch_optional(&mut *tx)
                .await?;

        let outcome = if sibling.is_some() {
            sqlx::query("DELETE FROM event_times WHERE id = $1")
                .bind(occurrence_id)
                .execute(&mut *tx)
                .await?;
            MoveOutcome::Merged(target)
        } else {
            sqlx::query("UPDATE event_times SET fire_at = $1 WHERE id = $2")
                .bind(target)
                .bind(occurrence_id)
                .execute(&mut *tx)
                .await?;
            MoveOutcome::Moved(target)
        };

        tx.commit().await?;
        debug!(occurrence_id, from = %occurrence.fire_at, to = %target, ?outcome, "Occurrence moved");
        Ok(outcome)
    }

    async fn delete_reminder_once(&self, occurrence_id: i64) -> Result<DeletedReminder, CoreError> {
        let mut tx = self.pool().begin().await?;

        let (event_id,): (i64,) = sqlx::query_as("SELECT event_id FROM event_times WHERE id = $1")
            .bind(occurrence_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("occurrence {occurrence_id}")))?;

        sqlx::query("DELETE FROM event_times WHERE id = $1")
            .bind(occurrence_id)
            .execute(&mut *tx)
            .await?;

        let (remaining, repeat_rule): (i64, Option<String>) = sqlx::query_as(
            r#"SELECT
                (SELECT COUNT(*) FROM event_times WHERE event_id = $1),
                (SELECT repeat_rule FROM events WHERE id = $1)"#,
        )
        .bind(event_id)
        .fetch_one(&mut *tx)
        .await?;

        // Repeating events keep existing even without occurrences; they are
        // normally advanced rather than deleted, so this only happens on explicit removal.
        let one_time = !RepeatRule::from_storage(repeat_rule.as_deref()).is_repeating();
        let event_removed = if remaining == 0 && one_time {
            Self::delete_event_subtree(&mut tx, event_id).await?
        } else {
            false
        };

        tx.commit().await?;
        debug!(occurrence_id, event_id, event_removed, "Occurrence deleted");
        Ok(DeletedReminder { event_id, event_removed })
    }
}
