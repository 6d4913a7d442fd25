//! Remote key/value credential store with a local read cache.
//!
//! Layout:
//! - `auth_code:<client_id>`: JSON [`AuthorizationCode`], TTL = `expires_at - now`
//! - `client:<id>`: JSON [`Client`], no TTL
//!
//! Reads go through a `moka` cache (10 s for codes, 60 s for clients). Every write
//! and delete invalidates the local entry before returning, so a caller always
//! reads its own writes. A read whose backend `GET` overlapped a write does not
//! leave its (possibly older) value in the cache.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use moka::future::Cache;

use super::{CredentialStore, check_client_for_save, check_code_for_save, require_client_id};
use crate::config::{Config, oauth};
use crate::error::{StoreError, StoreResult};
use crate::server::oauth::types::{AuthorizationCode, Client, now_unix};

const CODE_PREFIX: &str = "auth_code:";
const CLIENT_PREFIX: &str = "client:";

/// Minimal key/value operations the cached store needs from its backend.
///
/// Implementations must be safe for concurrent use and `del` must be atomic:
/// of several racing deletes for one key, exactly one reports `true`.
#[async_trait::async_trait]
pub trait KvBackend: Send + Sync + 'static {
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Write without expiry.
    async fn set(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Write with a server-side TTL.
    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> StoreResult<()>;

    /// Overwrite only if the key already exists. Returns whether it was written.
    async fn set_if_exists(&self, key: &str, value: &str) -> StoreResult<bool>;

    /// Remove a key. Returns whether it existed.
    async fn del(&self, key: &str) -> StoreResult<bool>;

    /// All keys starting with `prefix`.
    async fn keys(&self, prefix: &str) -> StoreResult<Vec<String>>;
}

fn code_key(client_id: &str) -> String {
    format!("{CODE_PREFIX}{client_id}")
}

fn client_key(id: &str) -> String {
    format!("{CLIENT_PREFIX}{id}")
}

/// Cache a value read from the backend unless a write happened since `seen`.
///
/// Writers bump `writes` after the backend write and invalidate afterwards, so
/// either the writer's invalidate or the re-check here removes a stale fill.
async fn fill<V>(cache: &Cache<String, V>, writes: &AtomicU64, seen: u64, key: &str, value: V)
where
    V: Clone + Send + Sync + 'static,
{
    cache.insert(key.to_string(), value).await;
    if writes.load(Ordering::SeqCst) != seen {
        cache.invalidate(key).await;
    }
}

/// Credential store over a [`KvBackend`] with client-side read caching.
pub struct CachedRemoteStore<B> {
    backend: B,
    codes: Cache<String, AuthorizationCode>,
    clients: Cache<String, Client>,
    code_writes: AtomicU64,
    client_writes: AtomicU64,
    op_timeout: Duration,
}

impl<B: KvBackend> CachedRemoteStore<B> {
    /// Create a store with the default cache windows.
    #[must_use]
    pub fn new(backend: B) -> Self {
        Self::with_settings(
            backend,
            oauth::CODE_CACHE_TTL,
            oauth::CLIENT_CACHE_TTL,
            oauth::CACHE_MAX_SIZE,
            oauth::STORE_OP_TIMEOUT,
        )
    }

    /// Create a store using the cache and timeout settings from `config`.
    #[must_use]
    pub fn from_config(backend: B, config: &Config) -> Self {
        Self::with_settings(
            backend,
            config.code_cache_ttl,
            config.client_cache_ttl,
            config.cache_max_size,
            config.store_op_timeout,
        )
    }

    #[must_use]
    pub fn with_settings(
        backend: B,
        code_ttl: Duration,
        client_ttl: Duration,
        max_size: u64,
        op_timeout: Duration,
    ) -> Self {
        Self {
            backend,
            codes: Cache::builder().max_capacity(max_size).time_to_live(code_ttl).build(),
            clients: Cache::builder().max_capacity(max_size).time_to_live(client_ttl).build(),
            code_writes: AtomicU64::new(0),
            client_writes: AtomicU64::new(0),
            op_timeout,
        }
    }

    /// The underlying backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Run one backend call under the operation timeout.
    async fn call<T>(&self, op: impl Future<Output = StoreResult<T>>) -> StoreResult<T> {
        match tokio::time::timeout(self.op_timeout, op).await {
            Ok(result) => result,
            Err(elapsed) => Err(StoreError::backend(elapsed)),
        }
    }

    async fn fetch_code(&self, key: &str) -> StoreResult<Option<AuthorizationCode>> {
        if let Some(code) = self.codes.get(key).await {
            return Ok(Some(code));
        }
        let seen = self.code_writes.load(Ordering::SeqCst);
        let Some(raw) = self.call(self.backend.get(key)).await? else {
            return Ok(None);
        };
        let code: AuthorizationCode = serde_json::from_str(&raw)?;
        fill(&self.codes, &self.code_writes, seen, key, code.clone()).await;
        Ok(Some(code))
    }

    async fn fetch_client(&self, key: &str) -> StoreResult<Option<Client>> {
        if let Some(client) = self.clients.get(key).await {
            return Ok(Some(client));
        }
        let seen = self.client_writes.load(Ordering::SeqCst);
        let Some(raw) = self.call(self.backend.get(key)).await? else {
            return Ok(None);
        };
        let client: Client = serde_json::from_str(&raw)?;
        fill(&self.clients, &self.client_writes, seen, key, client.clone()).await;
        Ok(Some(client))
    }

    /// Must run after the backend write has completed.
    async fn code_written(&self, key: &str) {
        self.code_writes.fetch_add(1, Ordering::SeqCst);
        self.codes.invalidate(key).await;
    }

    /// Must run after the backend write has completed.
    async fn client_written(&self, key: &str) {
        self.client_writes.fetch_add(1, Ordering::SeqCst);
        self.clients.invalidate(key).await;
    }
}

#[async_trait::async_trait]
impl<B: KvBackend> CredentialStore for CachedRemoteStore<B> {
    async fn save_authorization_code(&self, code: &AuthorizationCode) -> StoreResult<()> {
        check_code_for_save(code)?;
        let ttl = code.expires_at - now_unix();
        if ttl <= 0 {
            return Err(StoreError::Expired);
        }

        let key = code_key(&code.client_id);
        let raw = serde_json::to_string(code)?;
        self.codes.invalidate(&key).await;
        self.call(self.backend.set_ex(&key, &raw, ttl as u64)).await?;
        self.code_written(&key).await;
        Ok(())
    }

    async fn get_authorization_code(&self, client_id: &str) -> StoreResult<AuthorizationCode> {
        if client_id.is_empty() {
            return Err(StoreError::not_found("authorization code"));
        }

        let key = code_key(client_id);
        let Some(code) = self.fetch_code(&key).await? else {
            return Err(StoreError::not_found("authorization code"));
        };

        // TTL should already have evicted it; clock skew between minting and
        // storing can leave a stale record behind.
        if code.is_expired() {
            self.codes.invalidate(&key).await;
            match self.call(self.backend.del(&key)).await {
                Ok(_) => self.code_written(&key).await,
                Err(err) => {
                    tracing::warn!(client_id = %client_id, error = %err, "Failed to delete stale authorization code");
                }
            }
            return Err(StoreError::not_found("authorization code"));
        }
        Ok(code)
    }

    async fn delete_authorization_code(&self, client_id: &str) -> StoreResult<()> {
        if client_id.is_empty() {
            return Err(StoreError::not_found("authorization code"));
        }

        let key = code_key(client_id);
        self.codes.invalidate(&key).await;
        let removed = self.call(self.backend.del(&key)).await?;
        self.code_written(&key).await;
        if removed { Ok(()) } else { Err(StoreError::not_found("authorization code")) }
    }

    async fn get_client(&self, id: &str) -> StoreResult<Client> {
        require_client_id(id)?;
        self.fetch_client(&client_key(id)).await?.ok_or_else(|| StoreError::not_found("client"))
    }

    async fn create_client(&self, client: &Client) -> StoreResult<()> {
        check_client_for_save(client)?;
        let key = client_key(&client.id);
        let raw = serde_json::to_string(client)?;
        self.call(self.backend.set(&key, &raw)).await?;
        self.client_written(&key).await;
        Ok(())
    }

    async fn update_client(&self, client: &Client) -> StoreResult<()> {
        check_client_for_save(client)?;
        let key = client_key(&client.id);
        let raw = serde_json::to_string(client)?;
        let written = self.call(self.backend.set_if_exists(&key, &raw)).await?;
        self.client_written(&key).await;
        if written { Ok(()) } else { Err(StoreError::not_found("client")) }
    }

    async fn delete_client(&self, id: &str) -> StoreResult<()> {
        require_client_id(id)?;
        let key = client_key(id);
        let removed = self.call(self.backend.del(&key)).await?;
        self.client_written(&key).await;
        if removed { Ok(()) } else { Err(StoreError::not_found("client")) }
    }

    async fn list_clients(&self) -> StoreResult<Vec<Client>> {
        let keys = self.call(self.backend.keys(CLIENT_PREFIX)).await?;
        let mut clients = Vec::with_capacity(keys.len());
        for key in keys {
            // Deleted between SCAN and GET: skip
            if let Some(raw) = self.call(self.backend.get(&key)).await? {
                clients.push(serde_json::from_str(&raw)?);
            }
        }
        Ok(clients)
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}

impl<B> std::fmt::Debug for CachedRemoteStore<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedRemoteStore")
            .field("cached_codes", &self.codes.entry_count())
            .field("cached_clients", &self.clients.entry_count())
            .field("op_timeout", &self.op_timeout)
            .finish()
    }
}
