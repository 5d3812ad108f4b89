//! Lifecycle notifications around save and load
//!
//! Observers run synchronously on the task performing the operation, in the
//! order they subscribed. Observers are not isolated from each other: the
//! first one that returns an error stops the dispatch and the engine hands
//! that error back to its caller. A panicking observer unwinds through the
//! engine call as well.

use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;

use super::slot_id::SlotId;

/// Notification points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookPoint {
    BeforeSave,
    /// Fires after every save attempt, successful or not
    AfterSave,
    BeforeLoad,
    /// Fires only when a document was actually installed
    AfterLoad,
}

impl HookPoint {
    pub fn as_str(&self) -> &'static str {
        match self {
            HookPoint::BeforeSave => "before-save",
            HookPoint::AfterSave => "after-save",
            HookPoint::BeforeLoad => "before-load",
            HookPoint::AfterLoad => "after-load",
        }
    }
}

impl fmt::Display for HookPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a save or load operation is aimed at
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveTarget {
    Slot(SlotId),
    /// Explicit path (export / import)
    File(PathBuf),
    /// Document handed to the engine directly
    Memory,
}

impl fmt::Display for SaveTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SaveTarget::Slot(slot) => write!(f, "slot '{slot}'"),
            SaveTarget::File(path) => write!(f, "file {}", path.display()),
            SaveTarget::Memory => f.write_str("in-memory document"),
        }
    }
}

/// Passed to every observer
#[derive(Debug, Clone, Copy)]
pub struct HookEvent<'a> {
    pub point: HookPoint,
    pub target: &'a SaveTarget,
}

/// Returned by an observer to abort the rest of a dispatch
#[derive(Debug, Error)]
#[error("lifecycle observer failed during {point}: {message}")]
pub struct HookError {
    pub point: HookPoint,
    pub message: String,
}

impl HookError {
    pub fn new(point: HookPoint, message: impl Into<String>) -> Self {
        Self {
            point,
            message: message.into(),
        }
    }
}

/// Handle for removing an observer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

type Observer = Arc<dyn Fn(&HookEvent<'_>) -> Result<(), HookError> + Send + Sync>;

struct Subscription {
    id: ObserverId,
    point: HookPoint,
    observer: Observer,
}

/// Observer registry for the four hook points
#[derive(Default)]
pub struct LifecycleHooks {
    next_id: AtomicU64,
    subscriptions: Mutex<Vec<Subscription>>,
}

impl fmt::Debug for LifecycleHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleHooks")
            .field("observers", &self.lock().len())
            .finish()
    }
}

impl LifecycleHooks {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Subscription>> {
        // A panicking observer never holds this lock, poisoning carries no meaning here
        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn subscribe<F>(&self, point: HookPoint, observer: F) -> ObserverId
    where
        F: Fn(&HookEvent<'_>) -> Result<(), HookError> + Send + Sync + 'static,
    {
        let id = ObserverId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().push(Subscription {
            id,
            point,
            observer: Arc::new(observer),
        });
        id
    }

    /// Returns false if the observer was already gone
    pub fn unsubscribe(&self, id: ObserverId) -> bool {
        let mut subscriptions = self.lock();
        let before = subscriptions.len();
        subscriptions.retain(|s| s.id != id);
        subscriptions.len() != before
    }

    pub fn observer_count(&self, point: HookPoint) -> usize {
        self.lock().iter().filter(|s| s.point == point).count()
    }

    /// Run every observer of `point` in registration order
    pub fn dispatch(&self, point: HookPoint, target: &SaveTarget) -> Result<(), HookError> {
        let observers: Vec<Observer> = self
            .lock()
            .iter()
            .filter(|s| s.point == point)
            .map(|s| Arc::clone(&s.observer))
            .collect();

        let event = HookEvent { point, target };
        for observer in observers {
            observer(&event)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder(
        log: &Arc<Mutex<Vec<String>>>,
        label: &'static str,
    ) -> impl Fn(&HookEvent<'_>) -> Result<(), HookError> + Send + Sync + 'static {
        let log = Arc::clone(log);
        move |event: &HookEvent<'_>| {
            log.lock().unwrap().push(format!("{label}:{}", event.point));
            Ok(())
        }
    }

    #[test]
    fn test_dispatch_in_registration_order() {
        let hooks = LifecycleHooks::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        hooks.subscribe(HookPoint::BeforeSave, recorder(&log, "a"));
        hooks.subscribe(HookPoint::AfterSave, recorder(&log, "x"));
        hooks.subscribe(HookPoint::BeforeSave, recorder(&log, "b"));

        hooks
            .dispatch(HookPoint::BeforeSave, &SaveTarget::Slot(SlotId::default_slot()))
            .unwrap();

        assert_eq!(*log.lock().unwrap(), vec!["a:before-save", "b:before-save"]);
    }

    #[test]
    fn test_failing_observer_stops_dispatch() {
        let hooks = LifecycleHooks::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        hooks.subscribe(HookPoint::BeforeLoad, recorder(&log, "first"));
        hooks.subscribe(HookPoint::BeforeLoad, |event| {
            Err(HookError::new(event.point, "not now"))
        });
        hooks.subscribe(HookPoint::BeforeLoad, recorder(&log, "never"));

        let err = hooks
            .dispatch(HookPoint::BeforeLoad, &SaveTarget::Memory)
            .unwrap_err();

        assert_eq!(err.point, HookPoint::BeforeLoad);
        assert_eq!(err.message, "not now");
        assert_eq!(*log.lock().unwrap(), vec!["first:before-load"]);
    }

    #[test]
    fn test_unsubscribe() {
        let hooks = LifecycleHooks::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let id = hooks.subscribe(HookPoint::AfterLoad, recorder(&log, "gone"));
        assert_eq!(hooks.observer_count(HookPoint::AfterLoad), 1);

        assert!(hooks.unsubscribe(id));
        assert!(!hooks.unsubscribe(id));
        hooks.dispatch(HookPoint::AfterLoad, &SaveTarget::Memory).unwrap();

        assert!(log.lock().unwrap().is_empty());
        assert_eq!(hooks.observer_count(HookPoint::AfterLoad), 0);
    }

    #[test]
    fn test_observer_may_subscribe_during_dispatch() {
        let hooks = Arc::new(LifecycleHooks::new());
        let inner = Arc::clone(&hooks);
        hooks.subscribe(HookPoint::AfterSave, move |_| {
            inner.subscribe(HookPoint::AfterSave, |_| Ok(()));
            Ok(())
        });

        hooks.dispatch(HookPoint::AfterSave, &SaveTarget::Memory).unwrap();
        assert_eq!(hooks.observer_count(HookPoint::AfterSave), 2);
    }
}
