use std::sync::Arc;

use openpipes_core::session::SessionStore;
use openpipes_core::vault::TokenVault;
use openpipes_db::{AccountStore, RegistryStore};
use openpipes_pipefy::{BulkUpdater, Catalog};

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
/// Everything is constructed in `main` (or by the test harness) and injected
/// here; handlers never reach for globals.
#[derive(Clone)]
pub struct AppState {
    /// User accounts and stored Pipefy token ciphertext.
    pub accounts: Arc<dyn AccountStore>,
    /// Saved pipes and saved templates.
    pub registry: Arc<dyn RegistryStore>,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Cipher for the stored Pipefy tokens.
    pub vault: Arc<TokenVault>,
    /// Per-caller flow state.
    pub sessions: SessionStore,
    /// Pipefy read side.
    pub catalog: Catalog,
    /// Pipefy bulk writes.
    pub bulk: BulkUpdater,
}
