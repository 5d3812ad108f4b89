//! The persisted state document
//!
//! Everything that ends up in a save file lives here: engine-stamped metadata
//! plus the host application's payload, flattened into one JSON object.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::persistence::SlotId;

/// Full persistable snapshot of the application
///
/// `P` is the host-defined payload. Its fields are written next to the
/// metadata fields, so they must not reuse the names `SaveId`,
/// `ApplicationVersion` or `SaveDateTime`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateDocument<P> {
    /// Slot this document was last saved to
    #[serde(rename = "SaveId", default)]
    pub slot_id: SlotId,
    /// Application version at save time
    #[serde(rename = "ApplicationVersion", default)]
    pub application_version: String,
    /// Save time (RFC 3339, UTC); `None` until first saved
    #[serde(rename = "SaveDateTime", default)]
    pub saved_at: Option<DateTime<Utc>>,
    /// Application-defined state
    #[serde(flatten)]
    pub payload: P,
}

impl<P: Default> Default for StateDocument<P> {
    fn default() -> Self {
        Self::new(P::default())
    }
}

impl<P> StateDocument<P> {
    /// Fresh, never-saved document around `payload`
    pub fn new(payload: P) -> Self {
        Self {
            slot_id: SlotId::default_slot(),
            application_version: String::new(),
            saved_at: None,
            payload,
        }
    }

    /// Apply the metadata the engine writes on every slot save
    pub fn stamp(&mut self, slot_id: &SlotId, application_version: &str, now: DateTime<Utc>) {
        self.slot_id = slot_id.clone();
        self.application_version = application_version.to_string();
        self.saved_at = Some(now);
    }
}

/// Source of "now" for save timestamps
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock pinned to a single instant (tests, replays)
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    struct Gps {
        last_location: String,
        passenger_id: u32,
    }

    #[test]
    fn test_default_document() {
        let doc: StateDocument<Gps> = StateDocument::default();
        assert!(doc.slot_id.is_default());
        assert!(doc.application_version.is_empty());
        assert!(doc.saved_at.is_none());
        assert_eq!(doc.payload, Gps::default());
    }

    #[test]
    fn test_stamp() {
        let mut doc: StateDocument<Gps> = StateDocument::default();
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        doc.stamp(&SlotId::sanitize("slot 2"), "1.2.3", now);
        assert_eq!(doc.slot_id.as_str(), "slot_2");
        assert_eq!(doc.application_version, "1.2.3");
        assert_eq!(doc.saved_at, Some(now));
    }

    #[test]
    fn test_payload_is_flattened() {
        let mut doc = StateDocument::new(Gps {
            last_location: "Bus Stop".into(),
            passenger_id: 2,
        });
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        doc.stamp(&SlotId::default_slot(), "0.1.0", now);

        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(value["SaveId"], "default");
        assert_eq!(value["ApplicationVersion"], "0.1.0");
        assert_eq!(value["SaveDateTime"], "2024-05-01T12:00:00Z");
        assert_eq!(value["last_location"], "Bus Stop");
        assert_eq!(value["passenger_id"], 2);
    }

    #[test]
    fn test_fixed_clock() {
        let at = Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(FixedClock(at).now(), at);
    }
}
