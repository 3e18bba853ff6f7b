use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Database error")]
    Database(#[from] sqlx::Error),

    #[error("Migration error")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("IO error")]
    Io(#[from] std::io::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid time format: {0}")]
    InvalidTimeFormat(String),

    #[error("No resolvable recipients: {0}")]
    NoRecipients(String),

    #[error("Integrity violation: {0}")]
    Integrity(String),

    #[error("Messaging error: {0}")]
    Messaging(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

// SQLite primary result codes for SQLITE_BUSY and SQLITE_LOCKED.
const SQLITE_BUSY: &str = "5";
const SQLITE_LOCKED: &str = "6";

impl CoreError {
    /// Returns true for lock contention errors that are worth one retry.
    pub fn is_transient(&self) -> bool {
        match self {
            CoreError::Database(sqlx::Error::Database(db)) => {
                if let Some(code) = db.code() {
                    // Extended codes (e.g. 517 = BUSY_SNAPSHOT) keep the primary code in the low byte.
                    let primary = code
                        .parse::<i32>()
                        .map(|c| (c & 0xff).to_string())
                        .unwrap_or_else(|_| code.to_string());
                    if primary == SQLITE_BUSY || primary == SQLITE_LOCKED {
                        return true;
                    }
                }
                let message = db.message().to_lowercase();
                message.contains("database is locked") || message.contains("database table is locked")
            }
            CoreError::Database(sqlx::Error::PoolTimedOut) => true,
            _ => false,
        }
    }
}
