use crate::error::CoreError;
use crate::models::{Contact, NewContact};
use crate::repository::SqliteRepository;
use crate::targets;
use async_trait::async_trait;
use sqlx::SqliteConnection;

const CONTACT_COLUMNS: &str = "id, chat_id, username, first_name, last_name, created_at";

#[async_trait]
impl super::ContactRepository for SqliteRepository {
    async fn upsert_contact(&self, contact: NewContact) -> Result<Contact, CoreError> {
        let username = normalize_username(contact.username.as_deref());
        let first_name = non_blank(contact.first_name);
        let last_name = non_blank(contact.last_name);

        let mut tx = self.pool().begin().await?;

        // COALESCE keeps whatever is already stored: fields are only ever filled, never cleared.
        // The statement is drained with fetch_all so it is reset before the commit.
        let mut saved: Vec<Contact> = sqlx::query_as(&format!(
            r#"INSERT INTO contacts (chat_id, username, first_name, last_name)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT(chat_id) DO UPDATE SET
                username = COALESCE(contacts.username, excluded.username),
                first_name = COALESCE(contacts.first_name, excluded.first_name),
                last_name = COALESCE(contacts.last_name, excluded.last_name)
            RETURNING {CONTACT_COLUMNS}"#
        ))
        .bind(contact.chat_id)
        .bind(username)
        .bind(first_name)
        .bind(last_name)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        saved
            .pop()
            .ok_or_else(|| CoreError::Integrity(format!("upsert of contact {} returned no row", contact.chat_id)))
    }

    async fn find_contact_by_chat_id(&self, chat_id: i64) -> Result<Option<Contact>, CoreError> {
        let contact = sqlx::query_as(&format!("SELECT {CONTACT_COLUMNS} FROM contacts WHERE chat_id = $1"))
            .bind(chat_id)
            .fetch_optional(self.pool())
            .await?;
        Ok(contact)
    }

    async fn find_contact_by_username(&self, username: &str) -> Result<Option<Contact>, CoreError> {
        let Some(username) = normalize_username(Some(username)) else {
            return Ok(None);
        };
        let contact = sqlx::query_as(&format!("SELECT {CONTACT_COLUMNS} FROM contacts WHERE username = $1"))
            .bind(username)
            .fetch_optional(self.pool())
            .await?;
        Ok(contact)
    }

    async fn find_contacts(&self) -> Result<Vec<Contact>, CoreError> {
        let contacts = sqlx::query_as(&format!("SELECT {CONTACT_COLUMNS} FROM contacts ORDER BY id"))
            .fetch_all(self.pool())
            .await?;
        Ok(contacts)
    }

    async fn resolve_targets(&self, raw_targets: &[String]) -> Result<Vec<i64>, CoreError> {
        let mut conn = self.pool().acquire().await?;
        let resolved = targets::resolve_targets(&mut conn, raw_targets).await?;
        Ok(resolved.into_iter().collect())
    }
}

impl SqliteRepository {
    /// Ensures a contact row exists for `chat_id` and returns its internal id.
    pub(crate) async fn ensure_contact(conn: &mut SqliteConnection, chat_id: i64) -> Result<i64, CoreError> {
        sqlx::query("INSERT INTO contacts (chat_id) VALUES ($1) ON CONFLICT(chat_id) DO NOTHING")
            .bind(chat_id)
            .execute(&mut *conn)
            .await?;

        let (contact_id,): (i64,) = sqlx::query_as("SELECT id FROM contacts WHERE chat_id = $1")
            .bind(chat_id)
            .fetch_one(&mut *conn)
            .await?;

        if contact_id <= 0 {
            return Err(CoreError::Integrity(format!(
                "contact for chat {chat_id} has invalid id {contact_id}"
            )));
        }
        Ok(contact_id)
    }
}

/// Strips the `@` sigil; blank handles are treated as absent.
fn normalize_username(raw: Option<&str>) -> Option<String> {
    raw.map(|u| u.trim().trim_start_matches('@').to_string())
        .filter(|u| !u.is_empty())
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}
