use crate::types::DbId;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// A flow step ran before the step that populates its inputs.
    #[error("Precondition missing: {0}")]
    PreconditionMissing(String),

    /// A selection refers to a field label or id absent from the catalog.
    #[error("Unknown field: {0}")]
    UnknownField(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
