use anyhow::Result;
use nudge_core::models::NewContact;
use nudge_core::repository::Repository;

use crate::cli::{ContactAddCommand, ContactCommand};
use crate::views::table::display_contacts;

pub async fn contact_command(repo: &impl Repository, command: ContactCommand) -> Result<()> {
    match command {
        ContactCommand::Add(add) => add_contact(repo, add).await,
        ContactCommand::List => list_contacts(repo).await,
    }
}

async fn add_contact(repo: &impl Repository, command: ContactAddCommand) -> Result<()> {
    let contact = repo
        .upsert_contact(NewContact {
            chat_id: command.chat_id,
            username: command.username,
            first_name: command.first_name,
            last_name: command.last_name,
        })
        .await?;
    println!("Saved contact {} (chat {}).", contact.label(), contact.chat_id);
    Ok(())
}

async fn list_contacts(repo: &impl Repository) -> Result<()> {
    let contacts = repo.find_contacts().await?;
    display_contacts(&contacts);
    Ok(())
}
