//! In-memory credential store over `RwLock`-guarded maps.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use super::{CredentialStore, check_client_for_save, check_code_for_save, require_client_id};
use crate::error::{StoreError, StoreResult};
use crate::server::oauth::types::{AuthorizationCode, Client, now_unix};

/// In-memory credential store.
///
/// Expiry is lazy: a stale code is dropped when a read finds it, there is no sweeper.
#[derive(Clone, Default)]
pub struct MemoryStore {
    auth_codes: Arc<RwLock<HashMap<String, AuthorizationCode>>>,
    clients: Arc<RwLock<HashMap<String, Client>>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove a code if it is still the stale one a reader observed.
    async fn evict_if_stale(&self, client_id: &str, now: i64) {
        let mut codes = self.auth_codes.write().await;
        if codes.get(client_id).is_some_and(|c| c.is_expired_at(now)) {
            codes.remove(client_id);
            tracing::debug!(client_id = %client_id, "Evicted expired authorization code");
        }
    }
}

#[async_trait::async_trait]
impl CredentialStore for MemoryStore {
    async fn save_authorization_code(&self, code: &AuthorizationCode) -> StoreResult<()> {
        check_code_for_save(code)?;
        self.auth_codes.write().await.insert(code.client_id.clone(), code.clone());
        Ok(())
    }

    async fn get_authorization_code(&self, client_id: &str) -> StoreResult<AuthorizationCode> {
        if client_id.is_empty() {
            return Err(StoreError::not_found("authorization code"));
        }

        let now = now_unix();
        {
            let codes = self.auth_codes.read().await;
            match codes.get(client_id) {
                None => return Err(StoreError::not_found("authorization code")),
                Some(code) if !code.is_expired_at(now) => return Ok(code.clone()),
                Some(_) => {}
            }
        }

        self.evict_if_stale(client_id, now).await;
        Err(StoreError::not_found("authorization code"))
    }

    async fn delete_authorization_code(&self, client_id: &str) -> StoreResult<()> {
        if client_id.is_empty() {
            return Err(StoreError::not_found("authorization code"));
        }

        let removed = self.auth_codes.write().await.remove(client_id);
        match removed {
            Some(code) if !code.is_expired_at(now_unix()) => Ok(()),
            _ => Err(StoreError::not_found("authorization code")),
        }
    }

    async fn get_client(&self, id: &str) -> StoreResult<Client> {
        require_client_id(id)?;
        let clients = self.clients.read().await;
        clients.get(id).cloned().ok_or_else(|| StoreError::not_found("client"))
    }

    async fn create_client(&self, client: &Client) -> StoreResult<()> {
        check_client_for_save(client)?;
        self.clients.write().await.insert(client.id.clone(), client.clone());
        Ok(())
    }

    async fn update_client(&self, client: &Client) -> StoreResult<()> {
        check_client_for_save(client)?;
        let mut clients = self.clients.write().await;
        match clients.get_mut(&client.id) {
            Some(existing) => {
                *existing = client.clone();
                Ok(())
            }
            None => Err(StoreError::not_found("client")),
        }
    }

    async fn delete_client(&self, id: &str) -> StoreResult<()> {
        require_client_id(id)?;
        self.clients
            .write()
            .await
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found("client"))
    }

    async fn list_clients(&self) -> StoreResult<Vec<Client>> {
        Ok(self.clients.read().await.values().cloned().collect())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore").finish()
    }
}
