//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async CRUD methods
//! that accept `&PgPool` as the first argument. Registry repositories take
//! the owner id on every call and never touch another owner's rows.

pub mod saved_pipe_repo;
pub mod saved_template_repo;
pub mod user_repo;

pub use saved_pipe_repo::SavedPipeRepo;
pub use saved_template_repo::SavedTemplateRepo;
pub use user_repo::UserRepo;
