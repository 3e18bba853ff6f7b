use async_trait::async_trait;
use nudge_core::db::establish_connection;
use nudge_core::dispatch::{DispatchConfig, DispatchEngine};
use nudge_core::error::CoreError;
use nudge_core::ingest::parse_intents;
use nudge_core::messaging::{MessagingPort, SendFailure};
use nudge_core::models::*;
use nudge_core::recurrence::RepeatRule;
use nudge_core::repository::{ContactRepository, EventRepository, ReminderRepository, SqliteRepository};
use nudge_core::time::MinuteKey;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tempfile::TempDir;

const ALICE: i64 = 123456789;
const BOB: i64 = 234567891;
const CAROL: i64 = 345678912;

/// Helper function to create a test database
async fn setup_test_db() -> (SqliteRepository, TempDir) {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
    let db_path = temp_dir.path().join("test.db");

    let pool = establish_connection(&db_path.to_string_lossy())
        .await
        .expect("Failed to establish test database connection");

    (SqliteRepository::new(pool), temp_dir)
}

fn at(s: &str) -> MinuteKey {
    s.parse().expect("valid minute key")
}

fn intent(text: &str, times: &[&str], targets: &[&str], repeat: RepeatRule) -> ReminderIntent {
    ReminderIntent {
        text: text.to_string(),
        fire_times: times.iter().map(|t| at(t)).collect(),
        raw_targets: targets.iter().map(|t| t.to_string()).collect(),
        repeat,
    }
}

/// Saves one intent and returns its only export record.
async fn save_one(repo: &SqliteRepository, intent: ReminderIntent) -> ExportRecord {
    let saved = repo.save_events(&[intent]).await.expect("Failed to save intent");
    assert_eq!(saved, 1);
    let mut records = repo.get_all_for_export().await.unwrap();
    records.pop().expect("event stored")
}

async fn occurrences(repo: &SqliteRepository, event_id: i64) -> Vec<Occurrence> {
    repo.find_occurrences_for_event(event_id).await.unwrap()
}

#[derive(Clone)]
enum Reply {
    Deliver,
    Fail(SendFailure),
    Hang,
}

/// Scripted messenger: replies per chat id, delivering by default.
#[derive(Default)]
struct FakeMessenger {
    replies: HashMap<i64, Reply>,
    sent: Mutex<Vec<(i64, String)>>,
}

impl FakeMessenger {
    fn with(mut self, chat_id: i64, reply: Reply) -> Self {
        self.replies.insert(chat_id, reply);
        self
    }

    fn attempts(&self) -> Vec<(i64, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessagingPort for FakeMessenger {
    async fn send(&self, chat_id: i64, text: &str) -> Result<(), SendFailure> {
        self.sent.lock().unwrap().push((chat_id, text.to_string()));
        match self.replies.get(&chat_id).cloned().unwrap_or(Reply::Deliver) {
            Reply::Deliver => Ok(()),
            Reply::Fail(failure) => Err(failure),
            Reply::Hang => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(())
            }
        }
    }
}

fn engine(repo: SqliteRepository, messenger: FakeMessenger) -> DispatchEngine<SqliteRepository, FakeMessenger> {
    DispatchEngine::new(
        repo,
        messenger,
        DispatchConfig {
            lookback_minutes: 1,
            send_timeout: Duration::from_millis(50),
        },
    )
}

fn forbidden() -> SendFailure {
    SendFailure::http(403, Some(403), Some("Forbidden: bot was blocked by the user".into()))
}

fn server_error() -> SendFailure {
    SendFailure::http(502, Some(502), Some("Bad Gateway".into()))
}

#[tokio::test]
async fn test_monthly_reminder_advances_one_month() {
    let (repo, _temp_dir) = setup_test_db().await;
    let alice = ALICE.to_string();
    let record = save_one(
        &repo,
        intent("Платеж", &["2025-08-06 14:30"], &[alice.as_str()], RepeatRule::Monthly(1)),
    )
    .await;

    let engine = engine(repo, FakeMessenger::default());
    let report = engine.dispatch(Some(at("2025-08-06 14:30"))).await.unwrap();

    assert_eq!(report.sent, 1);
    assert_eq!(report.finalized, 1);
    assert_eq!(engine.messenger().attempts(), vec![(ALICE, "Платеж".to_string())]);

    let remaining = occurrences(engine.repository(), record.event_id).await;
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].fire_at, at("2025-09-06 14:30"));
}

#[tokio::test]
async fn test_daily_reminder_advances_by_interval() {
    let (repo, _temp_dir) = setup_test_db().await;
    let records = {
        let intents = parse_intents(&format!(
            r#"[{{"text": "Standup", "fire_times": ["2025-08-06 09:00"], "targets": [{ALICE}], "recurrence": 2}}]"#
        ))
        .unwrap();
        assert_eq!(repo.save_events(&intents).await.unwrap(), 1);
        repo.get_all_for_export().await.unwrap()
    };

    let engine = engine(repo, FakeMessenger::default());
    let report = engine.dispatch(Some(at("2025-08-06 09:00"))).await.unwrap();
    assert_eq!(report.sent, 1);

    let remaining = occurrences(engine.repository(), records[0].event_id).await;
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].fire_at, at("2025-08-08 09:00"));

    // Nothing is due at the old minute any more.
    let again = engine.dispatch(Some(at("2025-08-06 09:00"))).await.unwrap();
    assert_eq!(again.occurrences, 0);
}

#[tokio::test]
async fn test_one_time_reminder_is_removed_after_delivery() {
    let (repo, _temp_dir) = setup_test_db().await;
    let alice = ALICE.to_string();
    save_one(&repo, intent("Dentist", &["2025-08-06 10:00"], &[alice.as_str()], RepeatRule::None)).await;

    let engine = engine(repo, FakeMessenger::default());
    let report = engine.dispatch(Some(at("2025-08-06 10:00"))).await.unwrap();
    assert_eq!(report.sent, 1);

    let stats = engine.repository().stats().await.unwrap();
    assert_eq!(stats.events, 0);
    assert_eq!(stats.occurrences, 0);
    assert_eq!(stats.links, 0);
    assert_eq!(stats.contacts, 1);
}

#[tokio::test]
async fn test_one_time_event_survives_while_siblings_remain() {
    let (repo, _temp_dir) = setup_test_db().await;
    let alice = ALICE.to_string();
    let record = save_one(
        &repo,
        intent("Pills", &["2025-08-06 10:00", "2025-08-06 22:00"], &[alice.as_str()], RepeatRule::None),
    )
    .await;

    let engine = engine(repo, FakeMessenger::default());
    engine.dispatch(Some(at("2025-08-06 10:00"))).await.unwrap();

    let remaining = occurrences(engine.repository(), record.event_id).await;
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].fire_at, at("2025-08-06 22:00"));

    engine.dispatch(Some(at("2025-08-06 22:00"))).await.unwrap();
    assert_eq!(engine.repository().stats().await.unwrap().events, 0);
}

#[tokio::test]
async fn test_many_recipients_yield_one_decision() {
    let (repo, _temp_dir) = setup_test_db().await;
    let (a, b, c) = (ALICE.to_string(), BOB.to_string(), CAROL.to_string());
    let record = save_one(
        &repo,
        intent("Team sync", &["2025-08-06 09:00"], &[a.as_str(), b.as_str(), c.as_str()], RepeatRule::Daily(1)),
    )
    .await;

    let engine = engine(repo, FakeMessenger::default());
    let report = engine.dispatch(Some(at("2025-08-06 09:00"))).await.unwrap();

    assert_eq!(report.occurrences, 1);
    assert_eq!(report.sent, 3);
    assert_eq!(report.finalized, 1);
    let remaining = occurrences(engine.repository(), record.event_id).await;
    assert_eq!(remaining[0].fire_at, at("2025-08-07 09:00"));
}

#[tokio::test]
async fn test_partial_delivery_finalizes_like_full_delivery() {
    let (repo, _temp_dir) = setup_test_db().await;
    let (a, b, c) = (ALICE.to_string(), BOB.to_string(), CAROL.to_string());
    save_one(&repo, intent("Party", &["2025-08-06 18:00"], &[a.as_str(), b.as_str(), c.as_str()], RepeatRule::None)).await;

    let messenger = FakeMessenger::default().with(BOB, Reply::Fail(server_error()));
    let engine = engine(repo, messenger);
    let report = engine.dispatch(Some(at("2025-08-06 18:00"))).await.unwrap();

    assert_eq!(report.sent, 2);
    assert_eq!(report.failed_sends, 1);
    assert_eq!(report.finalized, 1);
    assert_eq!(report.retried, 0);
    assert_eq!(engine.messenger().attempts().len(), 3);
    assert_eq!(engine.repository().stats().await.unwrap().events, 0);
}

#[tokio::test]
async fn test_permanent_failure_postpones_one_day() {
    let (repo, _temp_dir) = setup_test_db().await;
    let (a, b, c) = (ALICE.to_string(), BOB.to_string(), CAROL.to_string());
    let record = save_one(
        &repo,
        intent("Blocked", &["2025-08-06 12:00"], &[a.as_str(), b.as_str(), c.as_str()], RepeatRule::None),
    )
    .await;

    let messenger = FakeMessenger::default()
        .with(ALICE, Reply::Fail(forbidden()))
        .with(BOB, Reply::Fail(forbidden()))
        .with(CAROL, Reply::Fail(forbidden()));
    let engine = engine(repo, messenger);
    let report = engine.dispatch(Some(at("2025-08-06 12:00"))).await.unwrap();

    assert_eq!(report.sent, 0);
    assert_eq!(report.postponed, 1);
    let remaining = occurrences(engine.repository(), record.event_id).await;
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].fire_at, at("2025-08-07 12:00"));
}

#[tokio::test]
async fn test_timeouts_retry_next_minute() {
    let (repo, _temp_dir) = setup_test_db().await;
    let (a, b, c) = (ALICE.to_string(), BOB.to_string(), CAROL.to_string());
    let record = save_one(
        &repo,
        intent("Flaky", &["2025-08-06 12:00"], &[a.as_str(), b.as_str(), c.as_str()], RepeatRule::Monthly(1)),
    )
    .await;

    let messenger = FakeMessenger::default()
        .with(ALICE, Reply::Hang)
        .with(BOB, Reply::Hang)
        .with(CAROL, Reply::Hang);
    let engine = engine(repo, messenger);
    let report = engine.dispatch(Some(at("2025-08-06 12:00"))).await.unwrap();

    assert_eq!(report.sent, 0);
    assert_eq!(report.failed_sends, 3);
    assert_eq!(report.retried, 1);
    let remaining = occurrences(engine.repository(), record.event_id).await;
    assert_eq!(remaining[0].fire_at, at("2025-08-06 12:01"));
}

#[tokio::test]
async fn test_last_failure_decides_between_backoff_and_retry() {
    let (repo, _temp_dir) = setup_test_db().await;
    let (a, b) = (ALICE.to_string(), BOB.to_string());
    let record = save_one(&repo, intent("Mixed", &["2025-08-06 12:00"], &[a.as_str(), b.as_str()], RepeatRule::None)).await;

    // Recipients are contacted in chat id order, so BOB fails last.
    let messenger = FakeMessenger::default()
        .with(ALICE, Reply::Fail(forbidden()))
        .with(BOB, Reply::Fail(server_error()));
    let engine = engine(repo, messenger);
    engine.dispatch(Some(at("2025-08-06 12:00"))).await.unwrap();

    let remaining = occurrences(engine.repository(), record.event_id).await;
    assert_eq!(remaining[0].fire_at, at("2025-08-06 12:01"));
}

#[tokio::test]
async fn test_lookback_window_catches_missed_minutes() {
    let (repo, _temp_dir) = setup_test_db().await;
    let alice = ALICE.to_string();
    repo.save_events(&[
        intent("too old", &["2025-08-06 08:55"], &[alice.as_str()], RepeatRule::None),
        intent("missed", &["2025-08-06 08:57"], &[alice.as_str()], RepeatRule::None),
        intent("now", &["2025-08-06 09:00"], &[alice.as_str()], RepeatRule::None),
        intent("future", &["2025-08-06 09:01"], &[alice.as_str()], RepeatRule::None),
    ])
    .await
    .unwrap();

    let window = repo
        .get_due_reminders_in_window(at("2025-08-06 08:56"), at("2025-08-06 09:00"))
        .await
        .unwrap();
    let texts: Vec<_> = window.iter().map(|r| r.text.as_str()).collect();
    assert_eq!(texts, vec!["missed", "now"]);

    let engine = DispatchEngine::new(
        repo,
        FakeMessenger::default(),
        DispatchConfig {
            lookback_minutes: 5,
            send_timeout: Duration::from_millis(50),
        },
    );
    let report = engine.dispatch(Some(at("2025-08-06 09:00"))).await.unwrap();
    assert_eq!(report.occurrences, 2);
    assert_eq!(report.sent, 2);

    let left: Vec<_> = engine
        .repository()
        .get_all_for_export()
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.text)
        .collect();
    assert_eq!(left, vec!["too old".to_string(), "future".to_string()]);
}

#[tokio::test]
async fn test_exact_query_returns_one_row_per_recipient() {
    let (repo, _temp_dir) = setup_test_db().await;
    let (a, b) = (ALICE.to_string(), BOB.to_string());
    save_one(&repo, intent("Both", &["2025-08-06 09:00"], &[a.as_str(), b.as_str()], RepeatRule::Daily(1))).await;

    let rows = repo.get_due_reminders_at_exact(at("2025-08-06 09:00")).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r.occurrence_id == rows[0].occurrence_id));
    assert!(rows.iter().all(|r| r.repeat == RepeatRule::Daily(1)));

    assert!(repo.get_due_reminders_at_exact(at("2025-08-06 09:01")).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_replace_all_with_empty_list_clears_events() {
    let (repo, _temp_dir) = setup_test_db().await;
    let alice = ALICE.to_string();
    save_one(&repo, intent("Old", &["2025-08-06 09:00"], &[alice.as_str()], RepeatRule::None)).await;

    let saved = repo.replace_all(&[]).await.unwrap();
    assert_eq!(saved, 0);

    let stats = repo.stats().await.unwrap();
    assert_eq!(stats.events, 0);
    assert_eq!(stats.occurrences, 0);
    assert_eq!(stats.links, 0);
}

#[tokio::test]
async fn test_replace_all_skips_bad_intents_only() {
    let (repo, _temp_dir) = setup_test_db().await;
    let alice = ALICE.to_string();
    save_one(&repo, intent("Old", &["2025-08-06 09:00"], &[alice.as_str()], RepeatRule::None)).await;

    let saved = repo
        .replace_all(&[
            intent("Nobody", &["2025-08-07 09:00"], &["@nobody_known"], RepeatRule::None),
            intent("New", &["2025-08-07 10:00"], &[alice.as_str()], RepeatRule::Daily(1)),
            intent("   ", &["2025-08-07 11:00"], &[alice.as_str()], RepeatRule::None),
        ])
        .await
        .unwrap();
    assert_eq!(saved, 1);

    let records = repo.get_all_for_export().await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].text, "New");
    assert_eq!(records[0].repeat, RepeatRule::Daily(1));
}

#[tokio::test]
async fn test_unresolvable_targets_store_nothing() {
    let (repo, _temp_dir) = setup_test_db().await;

    let saved = repo
        .save_events(&[intent("Lost", &["2025-08-06 09:00"], &["@ghost_user", "12", "not valid!"], RepeatRule::None)])
        .await
        .unwrap();
    assert_eq!(saved, 0);

    let stats = repo.stats().await.unwrap();
    assert_eq!(stats, StoreStats::default());
}

#[tokio::test]
async fn test_save_events_commits_each_intent_independently() {
    let (repo, _temp_dir) = setup_test_db().await;
    let alice = ALICE.to_string();

    let saved = repo
        .save_events(&[
            intent("First", &["2025-08-06 09:00"], &[alice.as_str()], RepeatRule::None),
            intent("No times", &[], &[alice.as_str()], RepeatRule::None),
            intent("Third", &["2025-08-06 09:00", "2025-08-06 09:00"], &[alice.as_str(), alice.as_str()], RepeatRule::None),
        ])
        .await
        .unwrap();
    assert_eq!(saved, 2);

    let stats = repo.stats().await.unwrap();
    assert_eq!(stats.events, 2);
    // Duplicate times and targets collapse.
    assert_eq!(stats.occurrences, 2);
    assert_eq!(stats.links, 2);
    assert_eq!(stats.contacts, 1);
}

#[tokio::test]
async fn test_handles_resolve_through_known_contacts() {
    let (repo, _temp_dir) = setup_test_db().await;
    repo.upsert_contact(NewContact {
        chat_id: ALICE,
        username: Some("@alice_bot".into()),
        ..Default::default()
    })
    .await
    .unwrap();

    let resolved = repo
        .resolve_targets(&["@alice_bot".into(), "alice_bot".into(), BOB.to_string(), "@unknown_one".into()])
        .await
        .unwrap();
    assert_eq!(resolved, vec![ALICE, BOB]);

    let record = save_one(&repo, intent("Hi", &["2025-08-06 09:00"], &["@alice_bot"], RepeatRule::None)).await;
    assert_eq!(record.recipients, vec!["@alice_bot".to_string()]);
}

#[tokio::test]
async fn test_upserted_handles_are_visible_to_every_connection() {
    let (repo, _temp_dir) = setup_test_db().await;

    for i in 0..20 {
        let chat_id = 500_000_000 + i;
        let handle = format!("user_{i:02}");
        repo.upsert_contact(NewContact {
            chat_id,
            username: Some(format!("@{handle}")),
            ..Default::default()
        })
        .await
        .unwrap();

        let found = repo.find_contact_by_username(&handle).await.unwrap();
        assert_eq!(found.map(|c| c.chat_id), Some(chat_id), "lookup {i}");
        let resolved = repo.resolve_targets(&[format!("@{handle}")]).await.unwrap();
        assert_eq!(resolved, vec![chat_id], "resolve {i}");
    }

    assert_eq!(repo.find_contacts().await.unwrap().len(), 20);
}

#[tokio::test]
async fn test_upsert_contact_only_fills_missing_fields() {
    let (repo, _temp_dir) = setup_test_db().await;

    let created = repo
        .upsert_contact(NewContact {
            chat_id: ALICE,
            first_name: Some("Alice".into()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(created.username, None);

    let filled = repo
        .upsert_contact(NewContact {
            chat_id: ALICE,
            username: Some("alice_bot".into()),
            first_name: Some("Alicia".into()),
            last_name: Some("Liddell".into()),
        })
        .await
        .unwrap();
    assert_eq!(filled.id, created.id);
    assert_eq!(filled.username.as_deref(), Some("alice_bot"));
    assert_eq!(filled.first_name.as_deref(), Some("Alice"));
    assert_eq!(filled.last_name.as_deref(), Some("Liddell"));

    let found = repo.find_contact_by_username("@alice_bot").await.unwrap().unwrap();
    assert_eq!(found.chat_id, ALICE);
    assert_eq!(repo.find_contacts().await.unwrap().len(), 1);
    assert!(repo.find_contact_by_chat_id(BOB).await.unwrap().is_none());
}

#[tokio::test]
async fn test_delete_past_events_keeps_repeating_and_future() {
    let (repo, _temp_dir) = setup_test_db().await;
    let alice = ALICE.to_string();
    repo.save_events(&[
        intent("past once", &["2025-08-01 09:00", "2025-08-02 09:00"], &[alice.as_str()], RepeatRule::None),
        intent("past repeating", &["2025-08-01 09:00"], &[alice.as_str()], RepeatRule::Daily(1)),
        intent("partly future", &["2025-08-01 09:00", "2025-08-10 09:00"], &[alice.as_str()], RepeatRule::None),
        intent("due now", &["2025-08-06 09:00"], &[alice.as_str()], RepeatRule::None),
    ])
    .await
    .unwrap();

    let deleted = repo.delete_past_events_before(at("2025-08-06 09:00")).await.unwrap();
    assert_eq!(deleted, 1);

    let texts: Vec<_> = repo
        .get_all_for_export()
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.text)
        .collect();
    assert_eq!(texts, vec!["past repeating", "partly future", "due now"]);
    assert_eq!(repo.stats().await.unwrap().links, 3);
}

#[tokio::test]
async fn test_delete_past_events_uses_the_current_minute() {
    let (repo, _temp_dir) = setup_test_db().await;
    let alice = ALICE.to_string();
    repo.save_events(&[
        intent("long gone", &["2020-01-01 09:00"], &[alice.as_str()], RepeatRule::None),
        intent("far ahead", &["2999-01-01 09:00"], &[alice.as_str()], RepeatRule::None),
        intent("old but daily", &["2020-01-01 09:00"], &[alice.as_str()], RepeatRule::Daily(1)),
    ])
    .await
    .unwrap();

    assert_eq!(repo.delete_past_events().await.unwrap(), 1);
    assert_eq!(repo.delete_past_events().await.unwrap(), 0);

    let texts: Vec<_> = repo
        .get_all_for_export()
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.text)
        .collect();
    assert_eq!(texts, vec!["far ahead", "old but daily"]);
}

#[tokio::test]
async fn test_delete_reminder_of_repeating_event_keeps_event() {
    let (repo, _temp_dir) = setup_test_db().await;
    let alice = ALICE.to_string();
    let record = save_one(&repo, intent("Weekly", &["2025-08-06 09:00"], &[alice.as_str()], RepeatRule::Daily(7))).await;
    let occurrence = occurrences(&repo, record.event_id).await[0];

    let event = repo.find_event(record.event_id).await.unwrap().unwrap();
    assert_eq!(event.message, "Weekly");
    assert_eq!(event.repeat, RepeatRule::Daily(7));

    let deleted = repo.delete_reminder(occurrence.id).await.unwrap();
    assert_eq!(deleted.event_id, record.event_id);
    assert!(!deleted.event_removed);

    let stats = repo.stats().await.unwrap();
    assert_eq!(stats.events, 1);
    assert_eq!(stats.occurrences, 0);

    assert!(matches!(repo.delete_reminder(occurrence.id).await, Err(CoreError::NotFound(_))));
    assert!(repo.find_event(record.event_id + 1).await.unwrap().is_none());
}

#[tokio::test]
async fn test_postpone_onto_sibling_merges() {
    let (repo, _temp_dir) = setup_test_db().await;
    let alice = ALICE.to_string();
    let record = save_one(
        &repo,
        intent("Twice", &["2025-08-06 09:00", "2025-08-07 09:00"], &[alice.as_str()], RepeatRule::Daily(1)),
    )
    .await;
    let first = occurrences(&repo, record.event_id).await[0];

    let outcome = repo.postpone_reminder(first.id, 1).await.unwrap();
    assert_eq!(outcome, MoveOutcome::Merged(at("2025-08-07 09:00")));

    let remaining = occurrences(&repo, record.event_id).await;
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].fire_at, at("2025-08-07 09:00"));
}

#[tokio::test]
async fn test_month_postpone_clamps_to_month_end() {
    let (repo, _temp_dir) = setup_test_db().await;
    let alice = ALICE.to_string();
    let record = save_one(&repo, intent("Rent", &["2025-01-31 08:00"], &[alice.as_str()], RepeatRule::Monthly(1))).await;
    let occurrence = occurrences(&repo, record.event_id).await[0];

    let outcome = repo.postpone_reminder_by_month(occurrence.id, 1).await.unwrap();
    assert_eq!(outcome, MoveOutcome::Moved(at("2025-02-28 08:00")));

    let outcome = repo.reschedule_reminder_at(occurrence.id, at("2025-03-01 07:30")).await.unwrap();
    assert_eq!(outcome.fire_at(), at("2025-03-01 07:30"));
    let stored = repo.find_occurrence(occurrence.id).await.unwrap().unwrap();
    assert_eq!(stored.fire_at, at("2025-03-01 07:30"));
}

#[tokio::test]
async fn test_moving_missing_occurrence_is_not_found() {
    let (repo, _temp_dir) = setup_test_db().await;
    assert!(matches!(repo.postpone_reminder(42, 1).await, Err(CoreError::NotFound(_))));
    assert!(matches!(
        repo.reschedule_reminder_at(42, at("2025-08-06 09:00")).await,
        Err(CoreError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_export_lists_times_and_recipients() {
    let (repo, _temp_dir) = setup_test_db().await;
    repo.upsert_contact(NewContact {
        chat_id: ALICE,
        username: Some("alice_bot".into()),
        ..Default::default()
    })
    .await
    .unwrap();
    let bob = BOB.to_string();
    repo.save_events(&[intent(
        "Review",
        &["2025-08-07 09:00", "2025-08-06 09:00"],
        &["@alice_bot", bob.as_str()],
        RepeatRule::Monthly(3),
    )])
    .await
    .unwrap();

    let records = repo.get_all_for_export().await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].fire_times, vec![at("2025-08-06 09:00"), at("2025-08-07 09:00")]);
    assert_eq!(records[0].recipients, vec!["@alice_bot".to_string(), BOB.to_string()]);

    let json = serde_json::to_value(&records[0]).unwrap();
    assert_eq!(json["repeat"], "3m");
    assert_eq!(json["fire_times"][0], "2025-08-06 09:00");
}
