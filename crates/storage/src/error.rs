//! Store error types and the retry classification used by the persister.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("username '{0}' is already taken")]
    DuplicateUsername(String),
}

impl StoreError {
    /// Whether a caller may retry the failed operation as-is. Constraint
    /// violations are never transient; a message from an unknown author
    /// stays rejected no matter how often it is replayed.
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Database(err) => match err {
                sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => true,
                sqlx::Error::Database(db) => db
                    .code()
                    .map(|code| transient_sqlstate(&code))
                    .unwrap_or(false),
                _ => false,
            },
            _ => false,
        }
    }
}

/// Connection failures (class 08), serialization/deadlock (class 40), and
/// operator intervention such as a shutdown in progress (class 57) are worth
/// retrying.
pub fn transient_sqlstate(code: &str) -> bool {
    code.starts_with("08") || code.starts_with("40") || code.starts_with("57")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_sqlstate_classes() {
        assert!(transient_sqlstate("08006")); // connection failure
        assert!(transient_sqlstate("40001")); // serialization failure
        assert!(transient_sqlstate("40P01")); // deadlock detected
        assert!(transient_sqlstate("57P01")); // admin shutdown

        assert!(!transient_sqlstate("23502")); // not-null violation
        assert!(!transient_sqlstate("23503")); // foreign key violation
        assert!(!transient_sqlstate("23505")); // unique violation
        assert!(!transient_sqlstate("42601")); // syntax error
    }

    #[test]
    fn io_and_pool_errors_are_transient() {
        let io = StoreError::Database(sqlx::Error::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "reset",
        )));
        assert!(io.is_transient());
        assert!(StoreError::Database(sqlx::Error::PoolTimedOut).is_transient());
    }

    #[test]
    fn logical_errors_are_permanent() {
        assert!(!StoreError::Database(sqlx::Error::RowNotFound).is_transient());
        assert!(!StoreError::DuplicateUsername("alice".into()).is_transient());
    }
}
