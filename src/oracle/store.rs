//! In-memory document store.

use crate::error::DocGenError;
use crate::oracle::{DocumentStore, StoredDocument};
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::debug;

/// A process-local [`DocumentStore`]. Contents are lost on drop.
#[derive(Debug, Default)]
pub struct MemoryStore {
    docs: RwLock<HashMap<String, StoredDocument>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.docs.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned<E>(_: E) -> DocGenError {
    DocGenError::Internal("document store lock poisoned".into())
}

impl DocumentStore for MemoryStore {
    fn save(&self, id: &str, doc: StoredDocument) -> BoxFuture<'_, Result<(), DocGenError>> {
        let id = id.to_string();
        Box::pin(async move {
            debug!("Storing document '{}' ({} chars)", id, doc.content.len());
            self.docs.write().map_err(poisoned)?.insert(id, doc);
            Ok(())
        })
    }

    fn get(&self, id: &str) -> BoxFuture<'_, Result<Option<StoredDocument>, DocGenError>> {
        let id = id.to_string();
        Box::pin(async move { Ok(self.docs.read().map_err(poisoned)?.get(&id).cloned()) })
    }

    fn delete(&self, id: &str) -> BoxFuture<'_, Result<bool, DocGenError>> {
        let id = id.to_string();
        Box::pin(async move { Ok(self.docs.write().map_err(poisoned)?.remove(&id).is_some()) })
    }

    fn all(&self) -> BoxFuture<'_, Result<Vec<(String, StoredDocument)>, DocGenError>> {
        Box::pin(async move {
            Ok(self
                .docs
                .read()
                .map_err(poisoned)?
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect())
        })
    }
}
