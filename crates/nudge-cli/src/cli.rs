use clap::{ArgAction, ArgGroup, Parser, Subcommand};
use std::path::PathBuf;

/// Reminder bot: stores reminders and delivers them to Telegram chats on time
#[derive(Parser, Debug)]
#[command(author, version, long_about = None)]
pub struct Cli {
    /// Configuration file (defaults to ./nudge.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// More log output (-v debug, -vv trace); RUST_LOG takes precedence
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Deliver everything due now, once
    Dispatch(DispatchCommand),
    /// Dispatch at the start of every minute until interrupted
    Run,
    /// Load reminder definitions from a JSON file
    Import(ImportCommand),
    /// Show every stored reminder
    Export(ExportCommand),
    /// Remove one-time reminders whose times have all passed
    Cleanup,
    /// Push an occurrence back by days or months
    Postpone(PostponeCommand),
    /// Move an occurrence to an explicit time
    Reschedule(RescheduleCommand),
    /// Delete a single occurrence
    Delete(DeleteCommand),
    /// Manage contacts
    #[command(subcommand)]
    Contact(ContactCommand),
    /// Show row counts
    Stats,
}

#[derive(Parser, Debug, Clone)]
pub struct DispatchCommand {
    /// Dispatch as if it were this minute (e.g. "2025-08-06 14:30")
    #[arg(long)]
    pub now: Option<String>,
}

#[derive(Parser, Debug, Clone)]
pub struct ImportCommand {
    /// JSON file with an array of reminder definitions
    pub file: PathBuf,
    /// Drop all existing reminders first (one transaction)
    #[arg(long)]
    pub replace: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct ExportCommand {
    /// Print JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug, Clone)]
#[command(group(ArgGroup::new("step").required(true).args(["days", "months"])))]
pub struct PostponeCommand {
    /// Occurrence id
    pub id: i64,
    #[arg(long)]
    pub days: Option<u32>,
    #[arg(long)]
    pub months: Option<u32>,
}

#[derive(Parser, Debug, Clone)]
pub struct RescheduleCommand {
    /// Occurrence id
    pub id: i64,
    /// New fire time (e.g. "2025-08-06 14:30", "tomorrow 9:00")
    pub time: String,
}

#[derive(Parser, Debug, Clone)]
pub struct DeleteCommand {
    /// Occurrence id
    pub id: i64,
    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub force: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ContactCommand {
    /// Add a contact or fill in its missing details
    Add(ContactAddCommand),
    /// List contacts
    List,
}

#[derive(Parser, Debug, Clone)]
pub struct ContactAddCommand {
    /// Telegram chat id (negative for groups)
    #[arg(allow_hyphen_values = true)]
    pub chat_id: i64,
    #[arg(long)]
    pub username: Option<String>,
    #[arg(long)]
    pub first_name: Option<String>,
    #[arg(long)]
    pub last_name: Option<String>,
}
