//! Store traits injected into the API, and their Postgres implementation.

use async_trait::async_trait;
use openpipes_core::types::DbId;

use crate::error::StoreError;
use crate::models::saved_pipe::{CreateSavedPipe, SavedPipe, UpdateSavedPipe};
use crate::models::saved_template::{CreateSavedTemplate, SavedTemplate, UpdateSavedTemplate};
use crate::models::user::{CreateUser, User};
use crate::repositories::{SavedPipeRepo, SavedTemplateRepo, UserRepo};
use crate::DbPool;

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// User accounts and their stored Pipefy token ciphertext.
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn create_user(&self, input: &CreateUser) -> Result<User, StoreError>;

    async fn find_user_by_id(&self, id: DbId) -> Result<Option<User>, StoreError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn get_pipefy_token(&self, user_id: DbId) -> Result<Option<String>, StoreError>;

    /// Returns `false` when the user does not exist.
    async fn set_pipefy_token(&self, user_id: DbId, ciphertext: &str) -> Result<bool, StoreError>;

    /// Whether the backing store is reachable.
    async fn health_check(&self) -> Result<(), StoreError>;
}

/// Saved pipes and saved templates. Every call is scoped to `owner_id`;
/// rows of other owners behave exactly like missing rows.
#[async_trait]
pub trait RegistryStore: Send + Sync {
    async fn list_pipes(&self, owner_id: DbId) -> Result<Vec<SavedPipe>, StoreError>;

    async fn find_pipe(&self, owner_id: DbId, id: DbId) -> Result<Option<SavedPipe>, StoreError>;

    async fn create_pipe(
        &self,
        owner_id: DbId,
        input: &CreateSavedPipe,
    ) -> Result<SavedPipe, StoreError>;

    async fn update_pipe(
        &self,
        owner_id: DbId,
        id: DbId,
        input: &UpdateSavedPipe,
    ) -> Result<Option<SavedPipe>, StoreError>;

    async fn delete_pipe(&self, owner_id: DbId, id: DbId) -> Result<bool, StoreError>;

    async fn list_templates(&self, owner_id: DbId) -> Result<Vec<SavedTemplate>, StoreError>;

    async fn find_template(
        &self,
        owner_id: DbId,
        id: DbId,
    ) -> Result<Option<SavedTemplate>, StoreError>;

    async fn create_template(
        &self,
        owner_id: DbId,
        input: &CreateSavedTemplate,
    ) -> Result<SavedTemplate, StoreError>;

    async fn update_template(
        &self,
        owner_id: DbId,
        id: DbId,
        input: &UpdateSavedTemplate,
    ) -> Result<Option<SavedTemplate>, StoreError>;

    async fn delete_template(&self, owner_id: DbId, id: DbId) -> Result<bool, StoreError>;
}

// ---------------------------------------------------------------------------
// Postgres
// ---------------------------------------------------------------------------

/// Both stores backed by the Postgres repositories.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[async_trait]
impl AccountStore for PgStore {
    async fn create_user(&self, input: &CreateUser) -> Result<User, StoreError> {
        Ok(UserRepo::create(&self.pool, input).await?)
    }

    async fn find_user_by_id(&self, id: DbId) -> Result<Option<User>, StoreError> {
        Ok(UserRepo::find_by_id(&self.pool, id).await?)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(UserRepo::find_by_email(&self.pool, email).await?)
    }

    async fn get_pipefy_token(&self, user_id: DbId) -> Result<Option<String>, StoreError> {
        Ok(UserRepo::get_pipefy_token(&self.pool, user_id).await?)
    }

    async fn set_pipefy_token(&self, user_id: DbId, ciphertext: &str) -> Result<bool, StoreError> {
        Ok(UserRepo::set_pipefy_token(&self.pool, user_id, ciphertext).await?)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(crate::health_check(&self.pool).await?)
    }
}

#[async_trait]
impl RegistryStore for PgStore {
    async fn list_pipes(&self, owner_id: DbId) -> Result<Vec<SavedPipe>, StoreError> {
        Ok(SavedPipeRepo::list_by_owner(&self.pool, owner_id).await?)
    }

    async fn find_pipe(&self, owner_id: DbId, id: DbId) -> Result<Option<SavedPipe>, StoreError> {
        Ok(SavedPipeRepo::find_by_id(&self.pool, owner_id, id).await?)
    }

    async fn create_pipe(
        &self,
        owner_id: DbId,
        input: &CreateSavedPipe,
    ) -> Result<SavedPipe, StoreError> {
        Ok(SavedPipeRepo::create(&self.pool, owner_id, input).await?)
    }

    async fn update_pipe(
        &self,
        owner_id: DbId,
        id: DbId,
        input: &UpdateSavedPipe,
    ) -> Result<Option<SavedPipe>, StoreError> {
        Ok(SavedPipeRepo::update(&self.pool, owner_id, id, input).await?)
    }

    async fn delete_pipe(&self, owner_id: DbId, id: DbId) -> Result<bool, StoreError> {
        Ok(SavedPipeRepo::delete(&self.pool, owner_id, id).await?)
    }

    async fn list_templates(&self, owner_id: DbId) -> Result<Vec<SavedTemplate>, StoreError> {
        Ok(SavedTemplateRepo::list_by_owner(&self.pool, owner_id).await?)
    }

    async fn find_template(
        &self,
        owner_id: DbId,
        id: DbId,
    ) -> Result<Option<SavedTemplate>, StoreError> {
        Ok(SavedTemplateRepo::find_by_id(&self.pool, owner_id, id).await?)
    }

    async fn create_template(
        &self,
        owner_id: DbId,
        input: &CreateSavedTemplate,
    ) -> Result<SavedTemplate, StoreError> {
        Ok(SavedTemplateRepo::create(&self.pool, owner_id, input).await?)
    }

    async fn update_template(
        &self,
        owner_id: DbId,
        id: DbId,
        input: &UpdateSavedTemplate,
    ) -> Result<Option<SavedTemplate>, StoreError> {
        Ok(SavedTemplateRepo::update(&self.pool, owner_id, id, input).await?)
    }

    async fn delete_template(&self, owner_id: DbId, id: DbId) -> Result<bool, StoreError> {
        Ok(SavedTemplateRepo::delete(&self.pool, owner_id, id).await?)
    }
}
