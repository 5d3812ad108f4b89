//! Save/load persistence
//!
//! Features:
//! - Sanitized slot ids mapped to `<root>/saves/<slot>.json`
//! - JSON documents with stamped metadata (slot, version, RFC 3339 time)
//! - Atomic writes (temp file → rename), per-slot locking
//! - Lifecycle observers around every save and load
//! - Slot enumeration and bulk loading for save pickers

pub mod catalog;
pub mod codec;
pub mod error;
pub mod hooks;
pub mod paths;
pub mod slot_id;
pub mod store;

pub use catalog::{Catalog, CatalogFailure, SlotCatalog};
pub use codec::JsonCodec;
pub use error::{DecodeError, StoreError};
pub use hooks::{HookError, HookEvent, HookPoint, LifecycleHooks, ObserverId, SaveTarget};
pub use paths::{PathResolver, slot_file_name, slot_id_from_file_name};
pub use slot_id::SlotId;
pub use store::{LoadOutcome, SaveEngine, settle};
