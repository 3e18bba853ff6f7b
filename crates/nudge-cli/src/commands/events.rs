use anyhow::{Context, Result};
use chrono_tz::Tz;
use nudge_core::ingest::parse_intents;
use nudge_core::repository::Repository;
use nudge_core::time::now_minute_in;

use crate::cli::{ExportCommand, ImportCommand};
use crate::views::table::{display_reminders, display_stats};

pub async fn import_reminders(repo: &impl Repository, command: ImportCommand) -> Result<()> {
    let input = std::fs::read_to_string(&command.file)
        .with_context(|| format!("Cannot read {}", command.file.display()))?;
    let intents = parse_intents(&input)?;

    let saved = if command.replace {
        repo.replace_all(&intents).await?
    } else {
        repo.save_events(&intents).await?
    };

    let verb = if command.replace { "Replaced all reminders with" } else { "Imported" };
    println!("{verb} {saved} of {} reminders.", intents.len());
    if saved < intents.len() {
        println!("{} skipped (empty text, no valid time or no known recipient).", intents.len() - saved);
    }
    Ok(())
}

pub async fn export_reminders(repo: &impl Repository, command: ExportCommand, tz: &Tz) -> Result<()> {
    let records = repo.get_all_for_export().await?;
    if command.json {
        println!("{}", serde_json::to_string_pretty(&records)?);
    } else {
        display_reminders(&records, tz);
    }
    Ok(())
}

pub async fn cleanup(repo: &impl Repository, tz: &Tz) -> Result<()> {
    let removed = repo.delete_past_events_before(now_minute_in(tz)).await?;
    println!("Removed {removed} expired reminders.");
    Ok(())
}

pub async fn stats(repo: &impl Repository) -> Result<()> {
    let stats = repo.stats().await?;
    display_stats(&stats);
    Ok(())
}
