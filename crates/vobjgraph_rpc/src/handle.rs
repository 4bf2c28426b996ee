//! Shared, explicitly closed store handle for async callers.
//!
//! # Invariants
//! - Every store call runs on the blocking pool, one at a time.
//! - After `close`, calls fail with `RpcError::Closed`; nothing reopens
//!   the store implicitly.

use crate::error::{RpcError, RpcResult};
use log::info;
use std::path::Path;
use std::sync::{Arc, Mutex};
use vobjgraph_core::{ObjectService, RepoResult, SqliteObjectRepository, Store};

/// Cloneable handle to one open store.
#[derive(Clone)]
pub struct StoreHandle {
    inner: Arc<Mutex<Option<Store>>>,
}

impl StoreHandle {
    pub fn open(path: impl AsRef<Path>) -> RpcResult<Self> {
        Ok(Self::from_store(Store::open(path)?))
    }

    pub fn open_in_memory() -> RpcResult<Self> {
        Ok(Self::from_store(Store::open_in_memory()?))
    }

    pub fn from_store(store: Store) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Some(store))),
        }
    }

    /// Runs `operation` against the store on the blocking pool.
    pub async fn run<T, F>(&self, operation: F) -> RpcResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&ObjectService<SqliteObjectRepository<'_>>) -> RepoResult<T> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || {
            let guard = inner.lock().map_err(|_| RpcError::LockPoisoned)?;
            let store = guard.as_ref().ok_or(RpcError::Closed)?;
            let service = store.service()?;
            operation(&service).map_err(RpcError::from)
        })
        .await?
    }

    /// Closes the store. Closing twice is a no-op.
    pub async fn close(&self) -> RpcResult<()> {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || {
            let store = inner.lock().map_err(|_| RpcError::LockPoisoned)?.take();
            match store {
                Some(store) => {
                    store.close()?;
                    info!("event=store_close module=rpc status=ok");
                    Ok(())
                }
                None => Ok(()),
            }
        })
        .await?
    }

    pub fn is_open(&self) -> bool {
        self.inner
            .lock()
            .map(|guard| guard.is_some())
            .unwrap_or(false)
    }
}
