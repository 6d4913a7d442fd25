//! Credential store for authorization codes and registered clients.
//!
//! Two implementations share one contract:
//! - [`MemoryStore`]: guarded in-process maps, lazy expiry, nothing survives a restart.
//! - [`CachedRemoteStore`]: Redis-backed records with server-side TTL and a short-lived
//!   local read cache that is invalidated on every write.
//!
//! Every method is safe to call concurrently without external locking.

mod cached;
mod memory;
mod redis_backend;

pub use cached::{CachedRemoteStore, KvBackend};
pub use memory::MemoryStore;
pub use redis_backend::RedisBackend;

use std::sync::Arc;

use crate::config::Config;
use crate::error::{StoreError, StoreResult};

use super::types::{AuthorizationCode, Client, now_unix};

/// Credential store backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum StoreKind {
    /// In-process maps (lost on restart)
    #[default]
    Memory,
    /// Redis with client-side read cache
    Redis,
}

/// Persistence contract for authorization codes and OAuth clients.
///
/// Codes are keyed by `client_id`: saving a code replaces any pending code for
/// the same client.
#[async_trait::async_trait]
pub trait CredentialStore: Send + Sync {
    /// Store a code, replacing any pending code for the same client.
    async fn save_authorization_code(&self, code: &AuthorizationCode) -> StoreResult<()>;

    /// Fetch the pending code for a client. Expired codes are reported as absent.
    async fn get_authorization_code(&self, client_id: &str) -> StoreResult<AuthorizationCode>;

    /// Remove the pending code for a client.
    ///
    /// Exactly one of several concurrent deletes for the same client succeeds;
    /// the others observe `NotFound`.
    async fn delete_authorization_code(&self, client_id: &str) -> StoreResult<()>;

    async fn get_client(&self, id: &str) -> StoreResult<Client>;

    /// Store a new client. An id collision overwrites the existing record.
    async fn create_client(&self, client: &Client) -> StoreResult<()>;

    /// Replace an existing client record.
    async fn update_client(&self, client: &Client) -> StoreResult<()>;

    async fn delete_client(&self, id: &str) -> StoreResult<()>;

    /// All registered clients, in no particular order.
    async fn list_clients(&self) -> StoreResult<Vec<Client>>;

    /// Short backend name for logs and readiness output.
    fn backend_name(&self) -> &'static str;
}

/// Open the store selected by `config.store`.
pub async fn open_store(config: &Config) -> StoreResult<Arc<dyn CredentialStore>> {
    match config.store {
        StoreKind::Memory => {
            tracing::info!("Using in-memory credential store");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreKind::Redis => {
            tracing::info!(redis_url = %redact_url(&config.redis_url), "Connecting to Redis credential store");
            let backend = RedisBackend::connect(&config.redis_url).await?;
            Ok(Arc::new(CachedRemoteStore::from_config(backend, config)))
        }
    }
}

/// Validate a code before it is written.
pub(crate) fn check_code_for_save(code: &AuthorizationCode) -> StoreResult<()> {
    if code.client_id.is_empty() {
        return Err(StoreError::invalid("authorization code has no client_id"));
    }
    if code.code.is_empty() {
        return Err(StoreError::invalid("authorization code is empty"));
    }
    if code.is_expired_at(now_unix()) {
        return Err(StoreError::Expired);
    }
    Ok(())
}

/// Validate a client before it is written.
pub(crate) fn check_client_for_save(client: &Client) -> StoreResult<()> {
    if client.id.is_empty() {
        return Err(StoreError::invalid("client has no id"));
    }
    if client.redirect_uris.is_empty() {
        return Err(StoreError::invalid("client has no redirect_uris"));
    }
    Ok(())
}

pub(crate) fn require_client_id(id: &str) -> StoreResult<()> {
    if id.is_empty() {
        return Err(StoreError::invalid("client id is empty"));
    }
    Ok(())
}

pub(crate) fn redact_url(raw: &str) -> String {
    match url::Url::parse(raw) {
        Ok(mut parsed) if parsed.password().is_some() => {
            let _ = parsed.set_password(Some("***"));
            parsed.to_string()
        }
        _ => raw.to_string(),
    }
}


#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::testing::MockKv;
    use super::*;

    fn client(id: &str, scope: &str) -> Client {
        Client {
            id: id.to_string(),
            secret: "s3cret".to_string(),
            redirect_uris: vec!["http://localhost:9999/cb".to_string()],
            grant_types: vec!["authorization_code".to_string()],
            response_types: vec!["code".to_string()],
            token_endpoint_auth_method: "client_secret_post".to_string(),
            scope: scope.to_string(),
            client_name: None,
            issued_at: 1_700_000_000,
            secret_expires_at: 0,
        }
    }

    fn outcome<T: std::fmt::Debug>(result: StoreResult<T>) -> String {
        match result {
            Ok(value) => format!("ok:{value:?}"),
            Err(StoreError::InvalidArgument(_)) => "InvalidArgument".to_string(),
            Err(StoreError::NotFound(_)) => "NotFound".to_string(),
            Err(StoreError::Expired) => "Expired".to_string(),
            Err(StoreError::BackendUnavailable(_)) => "BackendUnavailable".to_string(),
            Err(StoreError::Serialization(_)) => "Serialization".to_string(),
        }
    }

    /// Run one fixed call sequence and record every observable result.
    async fn script(store: &dyn CredentialStore) -> Vec<String> {
        let mut log = Vec::new();
        let mut code = AuthorizationCode::issue(
            "client-a",
            "http://localhost:9999/cb",
            vec!["openid".into(), "email".into()],
            Duration::from_secs(600),
        );
        code.code = "fixed-code".to_string();
        code.created_at = now_unix();
        code.expires_at = code.created_at + 600;

        log.push(outcome(store.get_client("client-a").await));
        log.push(outcome(store.get_client("").await));
        log.push(outcome(store.create_client(&client("client-a", "openid")).await));
        log.push(outcome(store.create_client(&client("", "openid")).await));
        log.push(outcome(store.get_client("client-a").await.map(|c| c.scope)));
        log.push(outcome(store.update_client(&client("client-a", "openid email")).await));
        log.push(outcome(store.get_client("client-a").await.map(|c| c.scope)));
        log.push(outcome(store.update_client(&client("ghost", "openid")).await));
        log.push(outcome(store.list_clients().await.map(|c| c.len())));

        log.push(outcome(store.get_authorization_code("client-a").await));
        log.push(outcome(store.save_authorization_code(&code).await));
        log.push(outcome(store.get_authorization_code("client-a").await.map(|c| c.code)));
        log.push(outcome(store.get_authorization_code("").await));
        log.push(outcome(store.delete_authorization_code("client-a").await));
        log.push(outcome(store.delete_authorization_code("client-a").await));
        log.push(outcome(store.delete_authorization_code("").await));

        let mut stale = code.clone();
        stale.expires_at = now_unix() - 1;
        log.push(outcome(store.save_authorization_code(&stale).await));
        let mut orphan = code.clone();
        orphan.client_id = String::new();
        log.push(outcome(store.save_authorization_code(&orphan).await));

        log.push(outcome(store.delete_client("client-a").await));
        log.push(outcome(store.delete_client("client-a").await));
        log.push(outcome(store.list_clients().await.map(|c| c.len())));
        log
    }

    #[tokio::test]
    async fn test_store_parity() {
        let memory = MemoryStore::new();
        let remote = CachedRemoteStore::new(MockKv::new());

        let memory_log = script(&memory).await;
        let remote_log = script(&remote).await;

        assert_eq!(memory_log, remote_log);
        assert_eq!(memory_log[0], "NotFound");
        assert_eq!(memory_log[1], "InvalidArgument");
        assert_eq!(memory_log[6], "ok:\"openid email\"");
        assert_eq!(memory_log[7], "NotFound");
        assert_eq!(memory_log[11], "ok:\"fixed-code\"");
        assert_eq!(memory_log[13], "ok:()");
        assert_eq!(memory_log[14], "NotFound");
        assert_eq!(memory_log[16], "Expired");
        assert_eq!(memory_log[17], "InvalidArgument");
        assert_eq!(memory_log[20], "ok:0");
    }

    #[tokio::test]
    async fn test_concurrent_delete_has_single_winner() {
        let stores: Vec<Arc<dyn CredentialStore>> =
            vec![Arc::new(MemoryStore::new()), Arc::new(CachedRemoteStore::new(MockKv::new()))];

        for store in stores {
            let code = AuthorizationCode::issue(
                "racer",
                "http://localhost/cb",
                vec![],
                Duration::from_secs(60),
            );
            store.save_authorization_code(&code).await.unwrap();

            let handles: Vec<_> = (0..16)
                .map(|_| {
                    let store = Arc::clone(&store);
                    tokio::spawn(async move { store.delete_authorization_code("racer").await })
                })
                .collect();

            let mut wins = 0;
            for handle in handles {
                if handle.await.unwrap().is_ok() {
                    wins += 1;
                }
            }
            assert_eq!(wins, 1, "backend {}", store.backend_name());
        }
    }

    #[test]
    fn test_redact_url() {
        assert_eq!(redact_url("redis://:hunter2@cache:6379/0"), "redis://:***@cache:6379/0");
        assert_eq!(redact_url("redis://cache:6379"), "redis://cache:6379");
    }
}
