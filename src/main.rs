//! Save Slots demo entry point
//!
//! Saves a small document into a slot, then lists and loads every slot under
//! the storage base.
//!
//! Usage: `save-slots [STORAGE_BASE] [SLOT]`

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use save_slots::{EngineSettings, HookPoint, SaveEngine};

/// Demo payload
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct GpsData {
    last_visited_location: String,
    last_passenger_id: u32,
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = std::env::args().skip(1);
    let settings = match args.next() {
        Some(base) => EngineSettings::default().with_storage_base(PathBuf::from(base)),
        None => EngineSettings::default(),
    };
    let slot = args.next().unwrap_or_default();

    log::info!("Save Slots starting (saves in {})", settings.saves_root().display());
    let engine: SaveEngine<GpsData> = SaveEngine::new(settings);

    engine.hooks().subscribe(HookPoint::AfterSave, |event| {
        log::info!("Finished saving {}", event.target);
        Ok(())
    });

    // Continue from the previous run if there is one
    if let Err(e) = engine.load_from_slot(&slot).await {
        log::warn!("Starting from a fresh document: {e}");
    }

    engine
        .update(|doc| {
            doc.payload.last_visited_location = "Gas Station".to_string();
            doc.payload.last_passenger_id += 1;
        })
        .await;

    // Empty slot argument means the quick-save slot
    if let Err(e) = engine.save_to_slot(&slot).await {
        log::error!("Demo save failed: {e}");
    }

    let catalog = engine.catalog();
    match catalog.list_slot_ids().await {
        Ok(ids) => {
            for id in ids {
                println!("Save Id: {id}");
            }
        }
        Err(e) => log::error!("Could not list slots: {e}"),
    }

    match catalog.load_all_documents::<GpsData>().await {
        Ok(all) => {
            for (id, doc) in &all.documents {
                let when = doc
                    .saved_at
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| "never".to_string());
                println!("{id} ({when}): {:?}", doc.payload);
            }
            for failure in &all.failures {
                println!("{} could not be loaded: {}", failure.slot_id, failure.error);
            }
        }
        Err(e) => log::error!("Could not load slots: {e}"),
    }
}
