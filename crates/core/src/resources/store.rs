//! The handle store.

use std::collections::{HashMap, HashSet};

use bytes::Bytes;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::types::{HandleId, HandleKind, MediaHandle};
use crate::metrics;

#[derive(Debug, Default)]
struct StoreInner {
    handles: HashMap<HandleId, MediaHandle>,
    revoked: HashSet<HandleId>,
}

/// Tracks every live media handle and enforces exactly-once revocation.
#[derive(Debug, Default)]
pub struct HandleStore {
    inner: RwLock<StoreInner>,
}

impl HandleStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an input handle for freshly submitted bytes.
    pub async fn create_input(
        &self,
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        data: Bytes,
    ) -> HandleId {
        self.create(HandleKind::Input, file_name.into(), content_type.into(), data)
            .await
    }

    /// Register an output handle for a completed conversion.
    pub async fn create_output(
        &self,
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        data: Bytes,
    ) -> HandleId {
        self.create(HandleKind::Output, file_name.into(), content_type.into(), data)
            .await
    }

    async fn create(
        &self,
        kind: HandleKind,
        file_name: String,
        content_type: String,
        data: Bytes,
    ) -> HandleId {
        let id = HandleId::generate();
        let handle = MediaHandle {
            id: id.clone(),
            kind,
            file_name,
            content_type,
            data,
        };

        let mut inner = self.inner.write().await;
        inner.handles.insert(id.clone(), handle);
        debug!(handle = %id, ?kind, "handle created");
        id
    }

    /// Look up a live handle.
    pub async fn get(&self, id: &HandleId) -> Option<MediaHandle> {
        self.inner.read().await.handles.get(id).cloned()
    }

    /// Revoke a handle, releasing its bytes. Returns true if the handle was
    /// live and is now revoked; a second revocation of the same id is a
    /// no-op that returns false.
    pub async fn revoke(&self, id: &HandleId) -> bool {
        let mut inner = self.inner.write().await;
        if inner.revoked.contains(id) {
            warn!(handle = %id, "handle already revoked");
            return false;
        }

        match inner.handles.remove(id) {
            Some(handle) => {
                inner.revoked.insert(id.clone());
                metrics::HANDLES_REVOKED.inc();
                debug!(handle = %id, kind = ?handle.kind, "handle revoked");
                true
            }
            None => {
                warn!(handle = %id, "revoke of unknown handle");
                false
            }
        }
    }

    /// Revoke every outstanding handle. Used at application teardown.
    pub async fn revoke_all(&self) -> usize {
        let mut inner = self.inner.write().await;
        let ids: Vec<HandleId> = inner.handles.keys().cloned().collect();
        for id in &ids {
            inner.handles.remove(id);
            inner.revoked.insert(id.clone());
            metrics::HANDLES_REVOKED.inc();
        }
        if !ids.is_empty() {
            debug!(count = ids.len(), "revoked all outstanding handles");
        }
        ids.len()
    }

    /// Number of live handles.
    pub async fn live_count(&self) -> usize {
        self.inner.read().await.handles.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_and_get() {
        let store = HandleStore::new();
        let id = store
            .create_input("clip.webm", "video/webm", Bytes::from_static(b"webm"))
            .await;

        let handle = store.get(&id).await.unwrap();
        assert_eq!(handle.kind, HandleKind::Input);
        assert_eq!(handle.file_name, "clip.webm");
        assert_eq!(handle.content_type, "video/webm");
        assert_eq!(handle.data.as_ref(), b"webm");
    }

    #[tokio::test]
    async fn test_revoke_exactly_once() {
        let store = HandleStore::new();
        let id = store
            .create_output("out.mp4", "video/mp4", Bytes::from_static(b"mp4"))
            .await;

        assert!(store.revoke(&id).await);
        assert!(!store.revoke(&id).await);
        assert!(store.get(&id).await.is_none());
    }

    #[tokio::test]
    async fn test_revoke_unknown_handle() {
        let store = HandleStore::new();
        assert!(!store.revoke(&HandleId::from("no-such-handle")).await);
    }

    #[tokio::test]
    async fn test_revoke_all() {
        let store = HandleStore::new();
        let a = store
            .create_input("a.webm", "video/webm", Bytes::from_static(b"a"))
            .await;
        let b = store
            .create_output("b.mp4", "video/mp4", Bytes::from_static(b"b"))
            .await;

        assert_eq!(store.live_count().await, 2);
        assert_eq!(store.revoke_all().await, 2);
        assert_eq!(store.live_count().await, 0);

        // The sweep counts as the one revocation for each handle.
        assert!(!store.revoke(&a).await);
        assert!(!store.revoke(&b).await);
    }

    #[tokio::test]
    async fn test_revoke_all_empty() {
        let store = HandleStore::new();
        assert_eq!(store.revoke_all().await, 0);
    }
}
