//! The reminder dispatch pass.
//!
//! One pass collects due occurrences, sends each one to all of its recipients
//! and then makes exactly one lifecycle decision for it:
//!
//! - at least one recipient got the message: the occurrence is finalized
//!   (deleted when one-time, advanced by its repeat interval otherwise);
//! - nobody got it and the last failure looks permanent: postponed one day;
//! - nobody got it for any other reason: retried on the next minute.

use crate::error::CoreError;
use crate::messaging::{MessagingPort, SendFailure};
use crate::models::DueReminder;
use crate::recurrence::RepeatRule;
use crate::repository::ReminderRepository;
use crate::time::{now_minute, MinuteKey};
use std::collections::{BTreeSet, HashMap};
use std::time::Duration;
use tracing::{debug, error, info, warn};

pub const MAX_LOOKBACK_MINUTES: u32 = 1440;

/// Days an occurrence is pushed back when its recipients refuse messages.
const PERMANENT_FAILURE_BACKOFF_DAYS: u32 = 1;

/// Minutes until a transiently failed occurrence is tried again.
const TRANSIENT_RETRY_MINUTES: i64 = 1;

#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// How many minutes back (including the current one) a pass looks for
    /// due occurrences. `1` means the current minute only.
    pub lookback_minutes: u32,
    pub send_timeout: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            lookback_minutes: 1,
            send_timeout: Duration::from_secs(15),
        }
    }
}

impl DispatchConfig {
    pub fn effective_lookback(&self) -> u32 {
        self.lookback_minutes.clamp(1, MAX_LOOKBACK_MINUTES)
    }
}

/// Counters describing one dispatch pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Successful individual sends.
    pub sent: usize,
    pub failed_sends: usize,
    /// Distinct due occurrences found.
    pub occurrences: usize,
    pub finalized: usize,
    pub retried: usize,
    pub postponed: usize,
    pub skipped: usize,
    /// Occurrences whose lifecycle update could not be stored.
    pub failed_updates: usize,
}

/// A due occurrence with all of its recipients.
#[derive(Debug, Clone, PartialEq)]
pub struct DueOccurrence {
    pub occurrence_id: i64,
    pub event_id: i64,
    pub fire_at: MinuteKey,
    pub text: String,
    pub repeat: RepeatRule,
    pub chat_ids: BTreeSet<i64>,
}

/// Folds per-recipient rows into one entry per occurrence, keeping the order
/// in which occurrences first appear.
pub fn group_by_occurrence(rows: Vec<DueReminder>) -> Vec<DueOccurrence> {
    let mut grouped: Vec<DueOccurrence> = Vec::new();
    let mut index: HashMap<i64, usize> = HashMap::new();

    for row in rows {
        match index.get(&row.occurrence_id) {
            Some(&i) => {
                grouped[i].chat_ids.insert(row.chat_id);
            }
            None => {
                index.insert(row.occurrence_id, grouped.len());
                grouped.push(DueOccurrence {
                    occurrence_id: row.occurrence_id,
                    event_id: row.event_id,
                    fire_at: row.fire_at,
                    text: row.text,
                    repeat: row.repeat,
                    chat_ids: BTreeSet::from([row.chat_id]),
                });
            }
        }
    }

    grouped
}

/// What happens to an occurrence after its sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Delivered: delete or advance according to the repeat rule.
    Finalize(RepeatRule),
    /// Nobody reachable for a lasting reason: try again tomorrow.
    BackOff,
    /// Nobody reached, probably temporarily: try again next minute.
    RetrySoon,
}

pub fn resolve_outcome(delivered: usize, last_failure: Option<&SendFailure>, repeat: RepeatRule) -> Outcome {
    if delivered > 0 {
        Outcome::Finalize(repeat)
    } else if last_failure.is_some_and(SendFailure::is_permanent) {
        Outcome::BackOff
    } else {
        Outcome::RetrySoon
    }
}

pub struct DispatchEngine<R, M> {
    repository: R,
    messenger: M,
    config: DispatchConfig,
}

impl<R, M> DispatchEngine<R, M>
where
    R: ReminderRepository + Send + Sync,
    M: MessagingPort,
{
    pub fn new(repository: R, messenger: M, config: DispatchConfig) -> Self {
        Self {
            repository,
            messenger,
            config,
        }
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    pub fn messenger(&self) -> &M {
        &self.messenger
    }

    /// Runs one pass for the minute `now` (the current local minute when
    /// `None`). Only a failure to read due occurrences aborts the pass.
    pub async fn dispatch(&self, now: Option<MinuteKey>) -> Result<DispatchReport, CoreError> {
        let now = now.unwrap_or_else(now_minute);
        let lookback = self.config.effective_lookback();

        let rows = if lookback == 1 {
            self.repository.get_due_reminders_at_exact(now).await?
        } else {
            let from = now.plus_minutes(-(i64::from(lookback) - 1))?;
            self.repository.get_due_reminders_in_window(from, now).await?
        };

        let due = group_by_occurrence(rows);
        let mut report = DispatchReport {
            occurrences: due.len(),
            ..Default::default()
        };

        if due.is_empty() {
            debug!(%now, lookback, "Nothing due");
            return Ok(report);
        }

        for occurrence in &due {
            self.process(occurrence, now, &mut report).await;
        }

        info!(
            %now,
            occurrences = report.occurrences,
            sent = report.sent,
            failed_sends = report.failed_sends,
            finalized = report.finalized,
            retried = report.retried,
            postponed = report.postponed,
            skipped = report.skipped,
            failed_updates = report.failed_updates,
            "Dispatch pass finished"
        );
        Ok(report)
    }

    async fn process(&self, occurrence: &DueOccurrence, now: MinuteKey, report: &mut DispatchReport) {
        let occurrence_id = occurrence.occurrence_id;

        if occurrence.text.trim().is_empty() {
            warn!(occurrence_id, "Skipping occurrence with empty text");
            report.skipped += 1;
            return;
        }
        if occurrence.chat_ids.is_empty() {
            warn!(occurrence_id, "Skipping occurrence without recipients");
            report.skipped += 1;
            return;
        }

        let mut delivered = 0;
        let mut last_failure = None;
        for &chat_id in &occurrence.chat_ids {
            match self.send_bounded(chat_id, &occurrence.text).await {
                Ok(()) => {
                    delivered += 1;
                    debug!(occurrence_id, chat_id, "Reminder delivered");
                }
                Err(failure) => {
                    warn!(occurrence_id, chat_id, %failure, "Reminder delivery failed");
                    report.failed_sends += 1;
                    last_failure = Some(failure);
                }
            }
        }
        report.sent += delivered;

        let outcome = resolve_outcome(delivered, last_failure.as_ref(), occurrence.repeat);
        match self.apply(occurrence, outcome, now).await {
            Ok(()) => match outcome {
                Outcome::Finalize(_) => report.finalized += 1,
                Outcome::BackOff => report.postponed += 1,
                Outcome::RetrySoon => report.retried += 1,
            },
            Err(err) => {
                error!(occurrence_id, ?outcome, error = %err, "Failed to record reminder outcome");
                report.failed_updates += 1;
            }
        }
    }

    async fn send_bounded(&self, chat_id: i64, text: &str) -> Result<(), SendFailure> {
        match tokio::time::timeout(self.config.send_timeout, self.messenger.send(chat_id, text)).await {
            Ok(result) => result,
            Err(_) => Err(SendFailure::timeout()),
        }
    }

    async fn apply(&self, occurrence: &DueOccurrence, outcome: Outcome, now: MinuteKey) -> Result<(), CoreError> {
        let id = occurrence.occurrence_id;
        match outcome {
            Outcome::Finalize(repeat) => match repeat.advance(occurrence.fire_at)? {
                None => {
                    let deleted = self.repository.delete_reminder(id).await?;
                    debug!(occurrence_id = id, event_removed = deleted.event_removed, "One-time reminder done");
                }
                Some(next) => {
                    let moved = self.repository.reschedule_reminder_at(id, next).await?;
                    debug!(occurrence_id = id, next = %moved.fire_at(), "Repeating reminder advanced");
                }
            },
            Outcome::BackOff => {
                let moved = self
                    .repository
                    .postpone_reminder(id, PERMANENT_FAILURE_BACKOFF_DAYS)
                    .await?;
                info!(occurrence_id = id, next = %moved.fire_at(), "Recipients unreachable, postponed");
            }
            Outcome::RetrySoon => {
                let at = now.plus_minutes(TRANSIENT_RETRY_MINUTES)?;
                self.repository.reschedule_reminder_at(id, at).await?;
                info!(occurrence_id = id, next = %at, "Delivery failed, retrying next minute");
            }
        }
        Ok(())
    }
}
