//! Per-caller working set for the multi-step update flow.
//!
//! The flow spans several HTTP requests (phases -> fields -> selection ->
//! template -> upload). Each step reads the context left by the previous one
//! from a [`SessionStore`] keyed by caller id. Entries expire after a fixed
//! time-to-live and are dropped explicitly when a flow completes.
//!
//! Steps for the same caller are not serialized against each other: two
//! browser tabs driving the same account see last-write-wins semantics.

use std::time::Duration;

use moka::future::Cache;
use serde::Serialize;

use crate::error::CoreError;
use crate::pipe::{Field, Member, Phase};
use crate::types::DbId;

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

/// Field selection recorded by the "prepare selection" step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FieldSelection {
    pub labels: Vec<String>,
    pub field_ids: Vec<String>,
    pub assignee_fields: Vec<Field>,
}

/// Everything a caller's flow has loaded so far.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionContext {
    pub pipe_id: Option<String>,
    pub phases: Vec<Phase>,
    pub members: Vec<Member>,
    pub phase_id: Option<String>,
    /// `None` until a phase's fields have been fetched.
    pub fields: Option<Vec<Field>>,
    pub selection: Option<FieldSelection>,
}

/// A partial update produced by one flow step.
#[derive(Debug, Clone)]
pub enum SessionPatch {
    /// A pipe's phases and members were fetched. Restarts the flow.
    PipeLoaded {
        pipe_id: String,
        phases: Vec<Phase>,
        members: Vec<Member>,
    },
    /// A phase's fields were fetched. Clears any earlier selection.
    FieldsLoaded { phase_id: String, fields: Vec<Field> },
    /// A field selection was validated.
    SelectionPrepared(FieldSelection),
}

impl SessionContext {
    /// Merge a patch into this context.
    pub fn apply(&mut self, patch: SessionPatch) {
        match patch {
            SessionPatch::PipeLoaded {
                pipe_id,
                phases,
                members,
            } => {
                *self = SessionContext {
                    pipe_id: Some(pipe_id),
                    phases,
                    members,
                    ..SessionContext::default()
                };
            }
            SessionPatch::FieldsLoaded { phase_id, fields } => {
                self.phase_id = Some(phase_id);
                self.fields = Some(fields);
                self.selection = None;
            }
            SessionPatch::SelectionPrepared(selection) => {
                self.selection = Some(selection);
            }
        }
    }

    /// The loaded pipe id, or `PreconditionMissing` if phases were never fetched.
    pub fn require_pipe(&self) -> Result<&str, CoreError> {
        self.pipe_id.as_deref().ok_or_else(|| {
            CoreError::PreconditionMissing("Fetch the pipe phases first".into())
        })
    }

    /// The loaded field catalog, or `PreconditionMissing` if fields were never fetched.
    pub fn require_fields(&self) -> Result<&[Field], CoreError> {
        self.fields.as_deref().ok_or_else(|| {
            CoreError::PreconditionMissing("Fetch the phase fields first".into())
        })
    }

    /// The prepared selection, or `PreconditionMissing`.
    pub fn require_selection(&self) -> Result<&FieldSelection, CoreError> {
        self.selection.as_ref().ok_or_else(|| {
            CoreError::PreconditionMissing("Prepare the field selection first".into())
        })
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Default lifetime of an idle flow.
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(3600);

/// Default maximum number of concurrent flows kept in memory.
pub const DEFAULT_SESSION_CAPACITY: u64 = 10_000;

/// Concurrent, TTL-bounded map from caller id to [`SessionContext`].
///
/// Cheaply cloneable; clones share the same entries.
#[derive(Clone)]
pub struct SessionStore {
    inner: Cache<DbId, SessionContext>,
}

impl SessionStore {
    /// Create a store whose entries expire `ttl` after their last write.
    pub fn new(ttl: Duration, max_capacity: u64) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    /// Current context for `caller`, if one is live.
    pub async fn get(&self, caller: DbId) -> Option<SessionContext> {
        self.inner.get(&caller).await
    }

    /// Current context for `caller`, or `PreconditionMissing` when the flow
    /// was never started (or has expired).
    pub async fn require(&self, caller: DbId) -> Result<SessionContext, CoreError> {
        self.get(caller).await.ok_or_else(|| {
            CoreError::PreconditionMissing(
                "No active session. Fetch the pipe phases first".into(),
            )
        })
    }

    /// Merge `patch` into the caller's context, creating it if absent.
    ///
    /// Returns the merged context.
    pub async fn put(&self, caller: DbId, patch: SessionPatch) -> SessionContext {
        self.inner
            .entry(caller)
            .and_upsert_with(|existing| {
                let mut context = existing.map(|e| e.into_value()).unwrap_or_default();
                context.apply(patch);
                std::future::ready(context)
            })
            .await
            .into_value()
    }

    /// Drop the caller's context.
    pub async fn invalidate(&self, caller: DbId) {
        self.inner.invalidate(&caller).await;
    }

    /// Run expiry and eviction housekeeping now instead of lazily.
    pub async fn run_pending_tasks(&self) {
        self.inner.run_pending_tasks().await;
    }

    /// Approximate number of live contexts.
    pub fn entry_count(&self) -> u64 {
        self.inner.entry_count()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION_TTL, DEFAULT_SESSION_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn pipe_loaded(pipe_id: &str) -> SessionPatch {
        SessionPatch::PipeLoaded {
            pipe_id: pipe_id.into(),
            phases: vec![Phase {
                id: "ph1".into(),
                name: "Backlog".into(),
            }],
            members: vec![],
        }
    }

    fn fields_loaded() -> SessionPatch {
        SessionPatch::FieldsLoaded {
            phase_id: "ph1".into(),
            fields: vec![Field {
                id: "f1".into(),
                label: "Name".into(),
                field_type: "short_text".into(),
            }],
        }
    }

    fn selection() -> SessionPatch {
        SessionPatch::SelectionPrepared(FieldSelection {
            labels: vec!["Name".into()],
            field_ids: vec!["f1".into()],
            assignee_fields: vec![],
        })
    }

    #[tokio::test]
    async fn put_merges_successive_steps() {
        let store = SessionStore::default();
        store.put(7, pipe_loaded("p1")).await;
        store.put(7, fields_loaded()).await;
        let ctx = store.put(7, selection()).await;

        assert_eq!(ctx.require_pipe().unwrap(), "p1");
        assert_eq!(ctx.require_fields().unwrap().len(), 1);
        assert_eq!(ctx.require_selection().unwrap().field_ids, vec!["f1"]);
        assert_eq!(store.get(7).await.unwrap().phase_id.as_deref(), Some("ph1"));
    }

    #[tokio::test]
    async fn loading_a_pipe_restarts_the_flow() {
        let store = SessionStore::default();
        store.put(1, pipe_loaded("p1")).await;
        store.put(1, fields_loaded()).await;
        store.put(1, selection()).await;

        let ctx = store.put(1, pipe_loaded("p2")).await;
        assert_eq!(ctx.pipe_id.as_deref(), Some("p2"));
        assert_matches!(ctx.require_fields(), Err(CoreError::PreconditionMissing(_)));
        assert_matches!(ctx.require_selection(), Err(CoreError::PreconditionMissing(_)));
    }

    #[tokio::test]
    async fn reloading_fields_clears_selection() {
        let store = SessionStore::default();
        store.put(1, pipe_loaded("p1")).await;
        store.put(1, fields_loaded()).await;
        store.put(1, selection()).await;

        let ctx = store.put(1, fields_loaded()).await;
        assert!(ctx.selection.is_none());
    }

    #[tokio::test]
    async fn callers_are_isolated() {
        let store = SessionStore::default();
        store.put(1, pipe_loaded("p1")).await;
        assert!(store.get(2).await.is_none());
        assert_matches!(store.require(2).await, Err(CoreError::PreconditionMissing(_)));
    }

    #[tokio::test]
    async fn fields_without_pipe_still_require_pipe() {
        let store = SessionStore::default();
        let ctx = store.put(3, fields_loaded()).await;
        assert_matches!(ctx.require_pipe(), Err(CoreError::PreconditionMissing(_)));
    }

    #[tokio::test]
    async fn invalidate_drops_context() {
        let store = SessionStore::default();
        store.put(1, pipe_loaded("p1")).await;
        store.invalidate(1).await;
        assert!(store.get(1).await.is_none());
    }

    #[tokio::test]
    async fn entries_expire_after_ttl() {
        let store = SessionStore::new(Duration::from_millis(50), 100);
        store.put(1, pipe_loaded("p1")).await;
        assert!(store.get(1).await.is_some());

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(store.get(1).await.is_none());
    }
}
