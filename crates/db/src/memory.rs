//! In-process implementation of both stores, for tests.
//!
//! Mirrors the Postgres schema's observable behavior: sequential ids,
//! `uq_*` uniqueness, owner scoping and `COALESCE`-style partial updates.

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use openpipes_core::types::DbId;

use crate::error::StoreError;
use crate::models::saved_pipe::{CreateSavedPipe, SavedPipe, UpdateSavedPipe};
use crate::models::saved_template::{CreateSavedTemplate, SavedTemplate, UpdateSavedTemplate};
use crate::models::user::{CreateUser, User};
use crate::store::{AccountStore, RegistryStore};

#[derive(Default)]
struct Tables {
    next_id: DbId,
    users: Vec<User>,
    pipes: Vec<SavedPipe>,
    templates: Vec<SavedTemplate>,
}

impl Tables {
    fn next_id(&mut self) -> DbId {
        self.next_id += 1;
        self.next_id
    }
}

/// Shared in-memory tables. Clones see the same data.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn create_user(&self, input: &CreateUser) -> Result<User, StoreError> {
        let mut tables = self.lock();
        if tables.users.iter().any(|u| u.email == input.email) {
            return Err(StoreError::Conflict("uq_users_email".into()));
        }
        let now = Utc::now();
        let user = User {
            id: tables.next_id(),
            email: input.email.clone(),
            full_name: input.full_name.clone(),
            password_hash: input.password_hash.clone(),
            pipefy_token_ciphertext: None,
            created_at: now,
            updated_at: now,
        };
        tables.users.push(user.clone());
        Ok(user)
    }

    async fn find_user_by_id(&self, id: DbId) -> Result<Option<User>, StoreError> {
        Ok(self.lock().users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self.lock().users.iter().find(|u| u.email == email).cloned())
    }

    async fn get_pipefy_token(&self, user_id: DbId) -> Result<Option<String>, StoreError> {
        Ok(self
            .lock()
            .users
            .iter()
            .find(|u| u.id == user_id)
            .and_then(|u| u.pipefy_token_ciphertext.clone()))
    }

    async fn set_pipefy_token(&self, user_id: DbId, ciphertext: &str) -> Result<bool, StoreError> {
        let mut tables = self.lock();
        match tables.users.iter_mut().find(|u| u.id == user_id) {
            Some(user) => {
                user.pipefy_token_ciphertext = Some(ciphertext.to_string());
                user.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[async_trait]
impl RegistryStore for MemoryStore {
    async fn list_pipes(&self, owner_id: DbId) -> Result<Vec<SavedPipe>, StoreError> {
        let mut pipes: Vec<SavedPipe> = self
            .lock()
            .pipes
            .iter()
            .filter(|p| p.owner_id == owner_id)
            .cloned()
            .collect();
        pipes.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(pipes)
    }

    async fn find_pipe(&self, owner_id: DbId, id: DbId) -> Result<Option<SavedPipe>, StoreError> {
        Ok(self
            .lock()
            .pipes
            .iter()
            .find(|p| p.id == id && p.owner_id == owner_id)
            .cloned())
    }

    async fn create_pipe(
        &self,
        owner_id: DbId,
        input: &CreateSavedPipe,
    ) -> Result<SavedPipe, StoreError> {
        let mut tables = self.lock();
        if tables
            .pipes
            .iter()
            .any(|p| p.owner_id == owner_id && p.name == input.name)
        {
            return Err(StoreError::Conflict("uq_saved_pipes_owner_name".into()));
        }
        let now = Utc::now();
        let pipe = SavedPipe {
            id: tables.next_id(),
            owner_id,
            name: input.name.clone(),
            pipe_id: input.pipe_id.clone(),
            created_at: now,
            updated_at: now,
        };
        tables.pipes.push(pipe.clone());
        Ok(pipe)
    }

    async fn update_pipe(
        &self,
        owner_id: DbId,
        id: DbId,
        input: &UpdateSavedPipe,
    ) -> Result<Option<SavedPipe>, StoreError> {
        let mut tables = self.lock();
        if let Some(name) = &input.name {
            if tables
                .pipes
                .iter()
                .any(|p| p.owner_id == owner_id && p.id != id && &p.name == name)
            {
                return Err(StoreError::Conflict("uq_saved_pipes_owner_name".into()));
            }
        }
        let Some(pipe) = tables
            .pipes
            .iter_mut()
            .find(|p| p.id == id && p.owner_id == owner_id)
        else {
            return Ok(None);
        };
        if let Some(name) = &input.name {
            pipe.name = name.clone();
        }
        if let Some(pipe_id) = &input.pipe_id {
            pipe.pipe_id = pipe_id.clone();
        }
        pipe.updated_at = Utc::now();
        Ok(Some(pipe.clone()))
    }

    async fn delete_pipe(&self, owner_id: DbId, id: DbId) -> Result<bool, StoreError> {
        let mut tables = self.lock();
        let before = tables.pipes.len();
        tables
            .pipes
            .retain(|p| !(p.id == id && p.owner_id == owner_id));
        Ok(tables.pipes.len() < before)
    }

    async fn list_templates(&self, owner_id: DbId) -> Result<Vec<SavedTemplate>, StoreError> {
        let mut templates: Vec<SavedTemplate> = self
            .lock()
            .templates
            .iter()
            .filter(|t| t.owner_id == owner_id)
            .cloned()
            .collect();
        templates.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(templates)
    }

    async fn find_template(
        &self,
        owner_id: DbId,
        id: DbId,
    ) -> Result<Option<SavedTemplate>, StoreError> {
        Ok(self
            .lock()
            .templates
            .iter()
            .find(|t| t.id == id && t.owner_id == owner_id)
            .cloned())
    }

    async fn create_template(
        &self,
        owner_id: DbId,
        input: &CreateSavedTemplate,
    ) -> Result<SavedTemplate, StoreError> {
        let mut tables = self.lock();
        if tables
            .templates
            .iter()
            .any(|t| t.owner_id == owner_id && t.name == input.name)
        {
            return Err(StoreError::Conflict("uq_saved_templates_owner_name".into()));
        }
        let now = Utc::now();
        let template = SavedTemplate {
            id: tables.next_id(),
            owner_id,
            name: input.name.clone(),
            pipe_id: input.pipe_id.clone(),
            phase_id: input.phase_id.clone(),
            field_ids: input.field_ids.clone(),
            default_assignee_id: input.default_assignee_id.clone(),
            created_at: now,
            updated_at: now,
        };
        tables.templates.push(template.clone());
        Ok(template)
    }

    async fn update_template(
        &self,
        owner_id: DbId,
        id: DbId,
        input: &UpdateSavedTemplate,
    ) -> Result<Option<SavedTemplate>, StoreError> {
        let mut tables = self.lock();
        if let Some(name) = &input.name {
            if tables
                .templates
                .iter()
                .any(|t| t.owner_id == owner_id && t.id != id && &t.name == name)
            {
                return Err(StoreError::Conflict("uq_saved_templates_owner_name".into()));
            }
        }
        let Some(template) = tables
            .templates
            .iter_mut()
            .find(|t| t.id == id && t.owner_id == owner_id)
        else {
            return Ok(None);
        };
        if let Some(name) = &input.name {
            template.name = name.clone();
        }
        if let Some(pipe_id) = &input.pipe_id {
            template.pipe_id = pipe_id.clone();
        }
        if let Some(phase_id) = &input.phase_id {
            template.phase_id = phase_id.clone();
        }
        if let Some(field_ids) = &input.field_ids {
            template.field_ids = field_ids.clone();
        }
        if let Some(assignee) = &input.default_assignee_id {
            template.default_assignee_id = Some(assignee.clone());
        }
        template.updated_at = Utc::now();
        Ok(Some(template.clone()))
    }

    async fn delete_template(&self, owner_id: DbId, id: DbId) -> Result<bool, StoreError> {
        let mut tables = self.lock();
        let before = tables.templates.len();
        tables
            .templates
            .retain(|t| !(t.id == id && t.owner_id == owner_id));
        Ok(tables.templates.len() < before)
    }
}
