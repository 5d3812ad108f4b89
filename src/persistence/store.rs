//! Save engine
//!
//! Owns the single live [`StateDocument`] and moves it between memory and
//! slot files. Storage failures never panic: each one is logged and handed
//! back as a `StoreError`, and the live document is untouched by a failed
//! load.
//!
//! Hook pairs are asymmetric on failure. `AfterSave` fires after every save
//! attempt so it can serve as a completion signal; `AfterLoad` fires only
//! when a document was installed.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::io::AsyncWriteExt;
use tokio::sync::{OwnedMutexGuard, RwLock};
use tokio::task::JoinHandle;

use super::catalog::SlotCatalog;
use super::codec::JsonCodec;
use super::error::StoreError;
use super::hooks::{HookPoint, LifecycleHooks, SaveTarget};
use super::paths::{PathResolver, slot_file_name};
use super::slot_id::SlotId;
use crate::settings::EngineSettings;
use crate::state::{Clock, StateDocument, SystemClock};

/// Result of a load that didn't fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// A document was decoded and is now live
    Loaded,
    /// The slot exists but was never written; live document unchanged
    Vacant,
}

/// Per-slot mutual exclusion
///
/// Operations on one slot run one at a time, so the file on disk always
/// matches the last save that completed. Different slots never contend.
/// An entry lives only while some operation holds or waits for it.
#[derive(Debug, Default)]
struct SlotLocks {
    slots: Mutex<HashMap<SlotId, Arc<tokio::sync::Mutex<()>>>>,
}

impl SlotLocks {
    fn map(&self) -> std::sync::MutexGuard<'_, HashMap<SlotId, Arc<tokio::sync::Mutex<()>>>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn acquire(&self, slot: &SlotId) -> SlotGuard<'_> {
        let lock = Arc::clone(self.map().entry(slot.clone()).or_default());
        SlotGuard {
            locks: self,
            slot: slot.clone(),
            guard: Some(lock.lock_owned().await),
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.map().len()
    }
}

/// Held for the duration of one slot operation
struct SlotGuard<'a> {
    locks: &'a SlotLocks,
    slot: SlotId,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        // Release first so our own clone of the Arc is gone
        drop(self.guard.take());
        let mut slots = self.locks.map();
        if slots
            .get(&self.slot)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            slots.remove(&self.slot);
        }
    }
}

/// Slot-based save/load engine for one application state document
pub struct SaveEngine<P> {
    settings: EngineSettings,
    resolver: PathResolver,
    codec: JsonCodec,
    clock: Arc<dyn Clock>,
    hooks: LifecycleHooks,
    live: RwLock<StateDocument<P>>,
    slot_locks: SlotLocks,
}

impl<P> std::fmt::Debug for SaveEngine<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SaveEngine")
            .field("root", &self.resolver.root())
            .field("application_version", &self.settings.application_version)
            .field("hooks", &self.hooks)
            .finish_non_exhaustive()
    }
}

impl<P> SaveEngine<P>
where
    P: Serialize + DeserializeOwned + Default + Send + Sync + 'static,
{
    /// Engine on the wall clock, starting from a default document
    pub fn new(settings: EngineSettings) -> Self {
        Self::with_clock(settings, Arc::new(SystemClock))
    }

    pub fn with_clock(settings: EngineSettings, clock: Arc<dyn Clock>) -> Self {
        let resolver = PathResolver::with_saves_dir(&settings.storage_base, &settings.saves_dir);
        let codec = if settings.pretty {
            JsonCodec::pretty()
        } else {
            JsonCodec::compact()
        };

        Self {
            settings,
            resolver,
            codec,
            clock,
            hooks: LifecycleHooks::new(),
            live: RwLock::new(StateDocument::default()),
            slot_locks: SlotLocks::default(),
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    /// Subscription point for lifecycle observers
    pub fn hooks(&self) -> &LifecycleHooks {
        &self.hooks
    }

    /// Enumeration over the same storage root
    pub fn catalog(&self) -> SlotCatalog {
        SlotCatalog::new(self.resolver.clone(), self.codec)
    }

    /// Copy of the live document
    pub async fn snapshot(&self) -> StateDocument<P>
    where
        P: Clone,
    {
        self.live.read().await.clone()
    }

    /// Mutate the live document in place
    pub async fn update<R>(&self, f: impl FnOnce(&mut StateDocument<P>) -> R) -> R {
        let mut live = self.live.write().await;
        f(&mut live)
    }

    /// Replace the live document with one the caller already has
    ///
    /// Used when a document was picked out of a [`crate::Catalog`]. Fires the
    /// load hook pair.
    pub async fn install(&self, doc: StateDocument<P>) -> Result<(), StoreError> {
        let target = SaveTarget::Memory;
        self.hooks.dispatch(HookPoint::BeforeLoad, &target)?;
        self.install_loaded(doc, &target).await.map(|_| ())
    }

    /// Save the live document to the reserved `default` slot
    pub async fn quick_save(&self) -> Result<PathBuf, StoreError> {
        self.save_to_slot(crate::consts::DEFAULT_SLOT_ID).await
    }

    /// Load the reserved `default` slot
    pub async fn quick_load(&self) -> Result<LoadOutcome, StoreError> {
        self.load_from_slot(crate::consts::DEFAULT_SLOT_ID).await
    }

    /// Stamp and save the live document under a slot id
    ///
    /// `raw` is sanitized first. Returns the file written. The live document
    /// is stamped only once every `BeforeSave` observer has accepted the save;
    /// stamping and encoding happen under one write guard, so the bytes written
    /// always belong to this slot.
    pub async fn save_to_slot(&self, raw: &str) -> Result<PathBuf, StoreError> {
        let slot = SlotId::sanitize(raw);
        let _guard = self.slot_locks.acquire(&slot).await;

        let target = SaveTarget::Slot(slot.clone());
        self.hooks.dispatch(HookPoint::BeforeSave, &target)?;

        let result = match self.stamp_and_encode(&slot).await {
            Ok(bytes) => match self.resolver.slot_path(&slot).await {
                Ok(path) => write_atomic(&path, &bytes).await.map(|()| path),
                Err(e) => Err(e),
            },
            Err(e) => Err(e),
        };
        self.finish_save(&target, result)
    }

    /// Save the live document to an explicit path (export)
    ///
    /// Metadata is written as-is; the parent directory must exist.
    pub async fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), StoreError> {
        let path = path.as_ref();
        let target = SaveTarget::File(path.to_path_buf());
        self.hooks.dispatch(HookPoint::BeforeSave, &target)?;

        let result = self.write_live(path).await;
        self.finish_save(&target, result)
    }

    /// Load a slot into the live document
    ///
    /// `raw` is sanitized first. The loaded document's `slot_id` is forced to
    /// the slot it was read from.
    pub async fn load_from_slot(&self, raw: &str) -> Result<LoadOutcome, StoreError> {
        let slot = SlotId::sanitize(raw);
        let _guard = self.slot_locks.acquire(&slot).await;

        let target = SaveTarget::Slot(slot.clone());
        self.hooks.dispatch(HookPoint::BeforeLoad, &target)?;

        let result = match self.resolver.slot_path(&slot).await {
            Ok(path) => self.codec.read_file(&path).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(mut doc) => {
                if doc.slot_id != slot {
                    log::debug!(
                        "Save file for slot '{slot}' carried id '{}', restamping",
                        doc.slot_id
                    );
                    doc.slot_id = slot;
                }
                self.install_loaded(doc, &target).await
            }
            Err(e) => self.fail_load(&target, e),
        }
    }

    /// Load a document from an explicit path (import)
    pub async fn load_from_file(&self, path: impl AsRef<Path>) -> Result<LoadOutcome, StoreError> {
        let path = path.as_ref();
        let target = SaveTarget::File(path.to_path_buf());
        self.hooks.dispatch(HookPoint::BeforeLoad, &target)?;

        match self.codec.read_file(path).await {
            Ok(doc) => self.install_loaded(doc, &target).await,
            Err(e) => self.fail_load(&target, e),
        }
    }

    /// Stamp the live document for `slot` and encode it without releasing it
    ///
    /// If encoding fails the previous metadata is put back.
    async fn stamp_and_encode(&self, slot: &SlotId) -> Result<Vec<u8>, StoreError> {
        let now = self.clock.now();
        let mut live = self.live.write().await;
        let previous = (
            live.slot_id.clone(),
            std::mem::take(&mut live.application_version),
            live.saved_at,
        );
        live.stamp(slot, &self.settings.application_version, now);

        match self.codec.encode(&*live) {
            Ok(bytes) => Ok(bytes),
            Err(e) => {
                let (slot_id, application_version, saved_at) = previous;
                live.slot_id = slot_id;
                live.application_version = application_version;
                live.saved_at = saved_at;
                let path = self.resolver.root().join(slot_file_name(slot));
                Err(StoreError::encode(path, e))
            }
        }
    }

    async fn write_live(&self, path: &Path) -> Result<(), StoreError> {
        let bytes = {
            let live = self.live.read().await;
            self.codec
                .encode(&*live)
                .map_err(|e| StoreError::encode(path, e))?
        };
        write_atomic(path, &bytes).await
    }

    fn finish_save<T>(
        &self,
        target: &SaveTarget,
        result: Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        match &result {
            Ok(_) => log::info!("Saved {target}"),
            Err(e) => log::error!("Error saving {target}: {e}"),
        }
        self.hooks.dispatch(HookPoint::AfterSave, target)?;
        result
    }

    async fn install_loaded(
        &self,
        doc: StateDocument<P>,
        target: &SaveTarget,
    ) -> Result<LoadOutcome, StoreError> {
        *self.live.write().await = doc;
        log::info!("Loaded {target}");
        self.hooks.dispatch(HookPoint::AfterLoad, target)?;
        Ok(LoadOutcome::Loaded)
    }

    fn fail_load(&self, target: &SaveTarget, e: StoreError) -> Result<LoadOutcome, StoreError> {
        if e.is_empty_slot() {
            log::warn!("No saved data in {target}, keeping current state");
            return Ok(LoadOutcome::Vacant);
        }
        log::error!("Error loading {target}: {e}");
        Err(e)
    }
}

impl<P> SaveEngine<P>
where
    P: Serialize + DeserializeOwned + Default + Send + Sync + 'static,
{
    /// Run [`SaveEngine::save_to_slot`] as its own task
    ///
    /// Dropping the handle detaches the save; failures are still logged.
    pub fn detach_save_to_slot(
        self: &Arc<Self>,
        raw: impl Into<String>,
    ) -> JoinHandle<Result<PathBuf, StoreError>> {
        let engine = Arc::clone(self);
        let raw = raw.into();
        tokio::spawn(async move { engine.save_to_slot(&raw).await })
    }

    /// Run [`SaveEngine::load_from_slot`] as its own task
    pub fn detach_load_from_slot(
        self: &Arc<Self>,
        raw: impl Into<String>,
    ) -> JoinHandle<Result<LoadOutcome, StoreError>> {
        let engine = Arc::clone(self);
        let raw = raw.into();
        tokio::spawn(async move { engine.load_from_slot(&raw).await })
    }
}

/// Wait for a detached operation
pub async fn settle<T>(handle: JoinHandle<Result<T, StoreError>>) -> Result<T, StoreError> {
    handle
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
}

/// Write `bytes` to `path` without ever exposing a partial file
///
/// Data goes to a uniquely named temp file in the same directory, is synced,
/// then renamed over the target.
async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("save");
    let temp_path = path.with_file_name(format!(".{file_name}.{}.tmp", uuid::Uuid::new_v4()));

    let written = async {
        let mut file = tokio::fs::File::create(&temp_path)
            .await
            .map_err(|source| StoreError::io("creating temp save file", &temp_path, source))?;
        file.write_all(bytes)
            .await
            .map_err(|source| StoreError::io("writing temp save file", &temp_path, source))?;
        file.sync_all()
            .await
            .map_err(|source| StoreError::io("syncing temp save file", &temp_path, source))?;
        tokio::fs::rename(&temp_path, path)
            .await
            .map_err(|source| StoreError::io("replacing save file", path, source))
    }
    .await;

    if written.is_err() {
        let _ = tokio::fs::remove_file(&temp_path).await;
        return written;
    }

    #[cfg(unix)]
    if let Some(parent) = path.parent() {
        // Best effort: makes the rename itself durable
        if let Ok(dir) = tokio::fs::File::open(parent).await {
            let _ = dir.sync_all().await;
        }
    }

    Ok(())
}
