//! Save Slots - named save slots for one application state document
//!
//! Core modules:
//! - `persistence`: Slot ids, storage layout, codec, save engine, catalog
//! - `state`: The persisted document and the clock that stamps it
//! - `settings`: Where saves live and how they are written

pub mod persistence;
pub mod settings;
pub mod state;

pub use persistence::{
    Catalog, HookError, HookPoint, LoadOutcome, SaveEngine, SaveTarget, SlotCatalog, SlotId,
    StoreError,
};
pub use settings::EngineSettings;
pub use state::{Clock, FixedClock, StateDocument, SystemClock};

/// Storage constants
pub mod consts {
    /// Slot used by quick save / quick load, and the fallback for unusable ids
    pub const DEFAULT_SLOT_ID: &str = "default";
    /// Subdirectory of the storage base holding slot files
    pub const SAVES_DIR: &str = "saves";
    /// Slot file extension
    pub const SLOT_EXTENSION: &str = "json";
}
