pub mod auth;
pub mod pipefy;
pub mod pipes;
pub mod templates;
