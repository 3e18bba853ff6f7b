//! # Nudge Core Library
//!
//! Stores reminders and delivers them to chat recipients at the minute they
//! are due, then deletes, advances or reschedules them depending on how
//! delivery went.
//!
//! ## Core Modules
//!
//! - [`time`]: Minute-precision instants and the permissive time parser
//! - [`recurrence`]: Repeat rules (none, every N days, every N months)
//! - [`targets`]: Chat id and handle classification and resolution
//! - [`db`]: Database connection and migration management
//! - [`repository`]: Contact, event and occurrence persistence
//! - [`messaging`]: Outbound message port and the Telegram adapter
//! - [`dispatch`]: The per-minute dispatch pass
//! - [`ingest`]: JSON reminder definitions
//! - [`error`]: Error types
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use nudge_core::{
//!     db,
//!     dispatch::{DispatchConfig, DispatchEngine},
//!     ingest,
//!     messaging::{TelegramConfig, TelegramMessenger},
//!     repository::{EventRepository, SqliteRepository},
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let pool = db::establish_connection("reminders.db").await?;
//!     let repo = SqliteRepository::new(pool);
//!
//!     let intents = ingest::parse_intents(
//!         r#"[{"text": "Standup", "fire_times": ["2025-08-06 09:00"], "targets": ["123456789"], "recurrence": 1}]"#,
//!     )?;
//!     repo.save_events(&intents).await?;
//!
//!     let messenger = TelegramMessenger::new(&TelegramConfig {
//!         bot_token: "123:abc".to_string(),
//!         ..Default::default()
//!     })?;
//!     let engine = DispatchEngine::new(repo, messenger, DispatchConfig::default());
//!     let report = engine.dispatch(None).await?;
//!     println!("sent {} messages", report.sent);
//!
//!     Ok(())
//! }
//! ```

pub mod db;
pub mod dispatch;
pub mod error;
pub mod ingest;
pub mod messaging;
pub mod models;
pub mod recurrence;
pub mod repository;
pub mod targets;
pub mod time;
