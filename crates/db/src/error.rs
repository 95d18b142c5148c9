/// Errors from the persistence layer.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A unique constraint named `uq_*` rejected the write.
    #[error("Duplicate value violates unique constraint: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    /// Unique violations (SQLSTATE 23505) on `uq_*` constraints become
    /// [`StoreError::Conflict`]; everything else is passed through.
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.code().as_deref() == Some("23505") {
                if let Some(constraint) = db_err.constraint().filter(|c| c.starts_with("uq_")) {
                    tracing::debug!(constraint, "Unique constraint rejected write");
                    return StoreError::Conflict(constraint.to_string());
                }
            }
        }
        tracing::debug!(error = %err, "Database error");
        StoreError::Database(err)
    }
}
