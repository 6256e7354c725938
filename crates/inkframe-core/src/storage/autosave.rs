//! Auto-save functionality for document persistence.
//!
//! Saves go to the remote store when one is configured; transient remote
//! failures fall back to the local store so no edit is lost.

use super::{DrawingDocument, RemoteStorage, Storage, StorageResult};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default auto-save interval in seconds.
pub const DEFAULT_AUTOSAVE_INTERVAL_SECS: u64 = 30;

/// Key for the "last opened" document.
pub const LAST_DOCUMENT_KEY: &str = "__last_document__";

/// Where a save ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Accepted by the remote store at this version.
    Remote { version: u64 },
    /// No remote store configured; saved locally.
    Local,
    /// The remote store failed transiently; saved locally instead.
    LocalFallback,
}

/// Manages the dirty flag, save interval and save routing for one drawing.
pub struct AutoSaveManager<S: Storage> {
    storage: Arc<S>,
    remote: Option<Arc<dyn RemoteStorage>>,
    interval: Duration,
    last_save: Option<Instant>,
    dirty: bool,
    current_doc_id: Option<String>,
    /// Remote version the next save expects to replace.
    remote_version: u64,
}

impl<S: Storage> AutoSaveManager<S> {
    /// Local-only manager.
    pub fn new(storage: Arc<S>) -> Self {
        Self {
            storage,
            remote: None,
            interval: Duration::from_secs(DEFAULT_AUTOSAVE_INTERVAL_SECS),
            last_save: None,
            dirty: false,
            current_doc_id: None,
            remote_version: 0,
        }
    }

    /// Manager that saves remotely and falls back to `storage`.
    pub fn with_remote(storage: Arc<S>, remote: Arc<dyn RemoteStorage>) -> Self {
        Self {
            remote: Some(remote),
            ..Self::new(storage)
        }
    }

    pub fn set_interval(&mut self, interval: Duration) {
        self.interval = interval;
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Mark the document as having unsaved changes.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn set_document_id(&mut self, id: Option<String>) {
        self.current_doc_id = id;
    }

    pub fn document_id(&self) -> Option<&str> {
        self.current_doc_id.as_deref()
    }

    /// Last remote version this manager saw.
    pub fn remote_version(&self) -> u64 {
        self.remote_version
    }

    /// Dirty and the interval has elapsed (or never saved).
    pub fn should_save(&self) -> bool {
        if !self.dirty {
            return false;
        }

        match self.last_save {
            Some(last) => last.elapsed() >= self.interval,
            None => true,
        }
    }

    /// Save if needed. Returns the outcome when a save was performed.
    pub async fn maybe_save(
        &mut self,
        document: &DrawingDocument,
    ) -> StorageResult<Option<SaveOutcome>> {
        if !self.should_save() {
            return Ok(None);
        }
        self.save(document).await.map(Some)
    }

    /// Save immediately.
    ///
    /// A version conflict from the remote store is returned as an error and
    /// leaves the document dirty.
    pub async fn save(&mut self, document: &DrawingDocument) -> StorageResult<SaveOutcome> {
        let outcome = match self.remote.clone() {
            Some(remote) => match remote.save(document, self.remote_version).await {
                Ok(version) => {
                    self.remote_version = version;
                    self.save_local(document).await?;
                    SaveOutcome::Remote { version }
                }
                Err(e) if e.is_transient() => {
                    log::warn!("remote save failed, keeping a local copy: {e}");
                    self.save_local(document).await?;
                    SaveOutcome::LocalFallback
                }
                Err(e) => return Err(e),
            },
            None => {
                self.save_local(document).await?;
                SaveOutcome::Local
            }
        };

        self.last_save = Some(Instant::now());
        self.dirty = false;
        Ok(outcome)
    }

    async fn save_local(&self, document: &DrawingDocument) -> StorageResult<()> {
        let doc_id = self
            .current_doc_id
            .clone()
            .unwrap_or_else(|| document.id.clone());
        self.storage.save(&doc_id, document).await?;
        // Mirrored under the restore key for load_last.
        self.storage.save(LAST_DOCUMENT_KEY, document).await
    }

    /// Load a document from the local store.
    pub async fn load(&mut self, id: &str) -> StorageResult<DrawingDocument> {
        let doc = self.storage.load(id).await?;
        self.opened(&doc);
        self.current_doc_id = Some(id.to_string());
        Ok(doc)
    }

    /// Fetch a document from the remote store and track its version.
    pub async fn fetch_remote(&mut self, id: &str) -> StorageResult<DrawingDocument> {
        let Some(remote) = self.remote.clone() else {
            return self.load(id).await;
        };
        let doc = remote.fetch(id).await?;
        self.opened(&doc);
        self.remote_version = doc.version;
        Ok(doc)
    }

    /// Try to load the last opened document.
    pub async fn load_last(&mut self) -> Option<DrawingDocument> {
        match self.storage.load(LAST_DOCUMENT_KEY).await {
            Ok(doc) => {
                self.opened(&doc);
                Some(doc)
            }
            Err(e) => {
                log::debug!("no last document to restore: {e}");
                None
            }
        }
    }

    fn opened(&mut self, doc: &DrawingDocument) {
        self.current_doc_id = Some(doc.id.clone());
        self.dirty = false;
        self.last_save = Some(Instant::now());
    }

    pub async fn delete(&self, id: &str) -> StorageResult<()> {
        self.storage.delete(id).await
    }

    /// List saved document IDs, without the restore key.
    pub async fn list_documents(&self) -> StorageResult<Vec<String>> {
        let mut docs = self.storage.list().await?;
        docs.retain(|id| id != LAST_DOCUMENT_KEY);
        Ok(docs)
    }

    pub async fn exists(&self, id: &str) -> StorageResult<bool> {
        self.storage.exists(id).await
    }
}
