use anyhow::Result;
use dialoguer::Confirm;
use nudge_core::error::CoreError;
use nudge_core::models::{MoveOutcome, Occurrence};
use nudge_core::repository::Repository;
use nudge_core::time::to_minute_key;

use crate::cli::{DeleteCommand, PostponeCommand, RescheduleCommand};

async fn find(repo: &impl Repository, id: i64) -> Result<Occurrence> {
    repo.find_occurrence(id)
        .await?
        .ok_or_else(|| CoreError::NotFound(format!("Occurrence {id} does not exist")).into())
}

fn report_move(id: i64, outcome: MoveOutcome) {
    match outcome {
        MoveOutcome::Moved(at) => println!("Occurrence {id} now fires at {at}."),
        MoveOutcome::Merged(at) => {
            println!("Occurrence {id} merged into the existing occurrence at {at}.")
        }
    }
}

pub async fn postpone(repo: &impl Repository, command: PostponeCommand) -> Result<()> {
    find(repo, command.id).await?;
    let outcome = match (command.days, command.months) {
        (_, Some(months)) => repo.postpone_reminder_by_month(command.id, months).await?,
        (Some(days), None) => repo.postpone_reminder(command.id, days).await?,
        (None, None) => {
            return Err(CoreError::InvalidInput("either --days or --months is required".into()).into())
        }
    };
    report_move(command.id, outcome);
    Ok(())
}

pub async fn reschedule(repo: &impl Repository, command: RescheduleCommand) -> Result<()> {
    let at = to_minute_key(&command.time)?;
    let outcome = repo.reschedule_reminder_at(command.id, at).await?;
    report_move(command.id, outcome);
    Ok(())
}

pub async fn delete(repo: &impl Repository, command: DeleteCommand) -> Result<()> {
    let occurrence = find(repo, command.id).await?;

    if !command.force {
        let text = repo
            .find_event(occurrence.event_id)
            .await?
            .map(|event| event.message)
            .unwrap_or_default();
        let confirmation = Confirm::new()
            .with_prompt(format!(
                "Delete '{}' firing at {} (occurrence {})?",
                text, occurrence.fire_at, occurrence.id
            ))
            .default(false)
            .interact()
            .unwrap_or(false);

        if !confirmation {
            println!("Deletion cancelled.");
            return Ok(());
        }
    }

    let deleted = repo.delete_reminder(occurrence.id).await?;
    if deleted.event_removed {
        println!("Deleted occurrence {} and its event {}.", occurrence.id, deleted.event_id);
    } else {
        println!("Deleted occurrence {}.", occurrence.id);
    }
    Ok(())
}
