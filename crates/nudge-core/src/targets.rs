//! Raw recipient references to chat identifiers.

use crate::error::CoreError;
use sqlx::SqliteConnection;
use std::collections::BTreeSet;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    ChatId(i64),
    /// Handle without the leading `@`.
    Handle(String),
}

/// Classifies one raw target.
///
/// `-?\d{5,20}` is a chat id, `@?[A-Za-z0-9_]{5,32}` is a handle; anything
/// else is `None`.
pub fn classify(raw: &str) -> Option<Target> {
    let s = raw.trim();

    let digits = s.strip_prefix('-').unwrap_or(s);
    if (5..=20).contains(&digits.len()) && digits.bytes().all(|b| b.is_ascii_digit()) {
        // 20 digits can exceed i64; such ids cannot exist on the messenger side.
        return s.parse::<i64>().ok().map(Target::ChatId);
    }

    let handle = s.strip_prefix('@').unwrap_or(s);
    if (5..=32).contains(&handle.len())
        && handle.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
    {
        return Some(Target::Handle(handle.to_string()));
    }

    None
}

/// Resolves raw targets to a deduplicated set of chat ids.
///
/// Handles are looked up case-sensitively in `contacts`. Unknown handles and
/// malformed tokens are dropped; an empty set is a normal result.
pub async fn resolve_targets(
    conn: &mut SqliteConnection,
    raw_targets: &[String],
) -> Result<BTreeSet<i64>, CoreError> {
    let mut resolved = BTreeSet::new();

    for raw in raw_targets {
        match classify(raw) {
            Some(Target::ChatId(chat_id)) => {
                resolved.insert(chat_id);
            }
            Some(Target::Handle(handle)) => {
                let found: Option<(i64,)> =
                    sqlx::query_as("SELECT chat_id FROM contacts WHERE username = $1")
                        .bind(&handle)
                        .fetch_optional(&mut *conn)
                        .await?;
                match found {
                    Some((chat_id,)) => {
                        resolved.insert(chat_id);
                    }
                    None => debug!(handle = %handle, "Handle not known, target dropped"),
                }
            }
            None => warn!(target = %raw, "Malformed target dropped"),
        }
    }

    Ok(resolved)
}
