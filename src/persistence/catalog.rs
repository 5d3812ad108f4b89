//! Slot enumeration
//!
//! Listing ids only looks at file names. Loading every document decodes every
//! slot file, O(slots x document size): do it once at startup and keep the
//! result rather than calling it on a hot path.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use serde::de::DeserializeOwned;

use super::codec::JsonCodec;
use super::error::StoreError;
use super::paths::{PathResolver, slot_id_from_file_name};
use super::slot_id::SlotId;
use crate::state::StateDocument;

/// A slot file that couldn't be loaded during [`SlotCatalog::load_all_documents`]
#[derive(Debug)]
pub struct CatalogFailure {
    pub slot_id: SlotId,
    pub error: StoreError,
}

/// Every decodable slot document, keyed by slot id
///
/// Enumeration skips what it can't read instead of aborting; anything skipped
/// (other than never-written placeholders) is listed in `failures`.
#[derive(Debug)]
pub struct Catalog<P> {
    pub documents: BTreeMap<SlotId, StateDocument<P>>,
    pub failures: Vec<CatalogFailure>,
}

impl<P> Default for Catalog<P> {
    fn default() -> Self {
        Self {
            documents: BTreeMap::new(),
            failures: Vec::new(),
        }
    }
}

impl<P> Catalog<P> {
    /// No slot file failed to load
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn get(&self, slot: &str) -> Option<&StateDocument<P>> {
        self.documents.get(slot)
    }
}

/// Read-only view over the slot files under one storage root
#[derive(Debug, Clone)]
pub struct SlotCatalog {
    resolver: PathResolver,
    codec: JsonCodec,
}

impl SlotCatalog {
    pub fn new(resolver: PathResolver, codec: JsonCodec) -> Self {
        Self { resolver, codec }
    }

    /// Ids of every slot file in the save directory
    pub async fn list_slot_ids(&self) -> Result<BTreeSet<SlotId>, StoreError> {
        Ok(self
            .slot_files()
            .await?
            .into_iter()
            .map(|(slot, _)| slot)
            .collect())
    }

    /// Decode every slot file
    ///
    /// Only a failure to read the directory itself is returned as an error.
    pub async fn load_all_documents<P: DeserializeOwned>(&self) -> Result<Catalog<P>, StoreError> {
        let mut catalog = Catalog::default();

        for (slot, path) in self.slot_files().await? {
            match self.codec.read_file::<P>(&path).await {
                Ok(mut doc) => {
                    // A copied or renamed file still belongs to the slot it is stored under
                    doc.slot_id = slot.clone();
                    catalog.documents.insert(slot, doc);
                }
                Err(e) if e.is_empty_slot() => {
                    log::debug!("Skipping empty save slot '{slot}'");
                }
                Err(error) => {
                    log::warn!("Skipping unreadable save slot '{slot}': {error}");
                    catalog.failures.push(CatalogFailure {
                        slot_id: slot,
                        error,
                    });
                }
            }
        }

        Ok(catalog)
    }

    /// Slot files in name order, derived from file names alone
    async fn slot_files(&self) -> Result<Vec<(SlotId, PathBuf)>, StoreError> {
        let root = self.resolver.root_path().await?;
        let mut entries = tokio::fs::read_dir(&root)
            .await
            .map_err(|source| StoreError::io("listing save directory", &root, source))?;

        let mut files = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|source| StoreError::io("listing save directory", &root, source))?
        {
            let name = entry.file_name();
            let Some(slot) = name.to_str().and_then(slot_id_from_file_name) else {
                continue;
            };
            let is_file = entry
                .file_type()
                .await
                .map(|t| t.is_file())
                .unwrap_or(false);
            if is_file {
                files.push((slot, entry.path()));
            }
        }

        files.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(files)
    }
}
