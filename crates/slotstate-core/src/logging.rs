//! Store Instrumentation
//!
//! Structured events emitted around enqueue, drain, commit, rejection, getter
//! resolution and subscriber changes. Emission is off by default and can be
//! filtered per slot and per event kind through the [`LogManager`].

use crate::slot::SlotId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::ops::BitOr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

// ----------------------------------------------------------------------------
// Event Kinds
// ----------------------------------------------------------------------------

/// Kinds of store events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    StateGetter,
    StateGetterResolved,
    StateSuspended,
    SubscriberAdded,
    SubscriberRemoved,
    SubscriberNotification,
    Reducer,
    LazyReducer,
    ReduceByDelegate,
    LazyReduceByDelegate,
    ReducerStarted,
    ReducerResolved,
    ReducerRejected,
    StorageLoaded,
    StorageSaved,
}

impl EventKind {
    pub const ALL: [EventKind; 15] = [
        EventKind::StateGetter,
        EventKind::StateGetterResolved,
        EventKind::StateSuspended,
        EventKind::SubscriberAdded,
        EventKind::SubscriberRemoved,
        EventKind::SubscriberNotification,
        EventKind::Reducer,
        EventKind::LazyReducer,
        EventKind::ReduceByDelegate,
        EventKind::LazyReduceByDelegate,
        EventKind::ReducerStarted,
        EventKind::ReducerResolved,
        EventKind::ReducerRejected,
        EventKind::StorageLoaded,
        EventKind::StorageSaved,
    ];

    const fn bit(self) -> u32 {
        1 << self as u32
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Set of event kinds, serialized as a list of names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Vec<EventKind>", into = "Vec<EventKind>")]
pub struct EventKinds(u32);

impl EventKinds {
    pub const NONE: EventKinds = EventKinds(0);
    pub const ALL: EventKinds = EventKinds((1 << EventKind::ALL.len()) - 1);

    pub const fn contains(self, kind: EventKind) -> bool {
        self.0 & kind.bit() != 0
    }

    pub const fn with(self, kind: EventKind) -> Self {
        EventKinds(self.0 | kind.bit())
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn iter(self) -> impl Iterator<Item = EventKind> {
        EventKind::ALL.into_iter().filter(move |kind| self.contains(*kind))
    }
}

impl Default for EventKinds {
    fn default() -> Self {
        EventKinds::ALL
    }
}

impl From<EventKind> for EventKinds {
    fn from(kind: EventKind) -> Self {
        EventKinds(kind.bit())
    }
}

impl From<Vec<EventKind>> for EventKinds {
    fn from(kinds: Vec<EventKind>) -> Self {
        kinds.into_iter().fold(EventKinds::NONE, EventKinds::with)
    }
}

impl From<EventKinds> for Vec<EventKind> {
    fn from(kinds: EventKinds) -> Self {
        kinds.iter().collect()
    }
}

impl BitOr for EventKind {
    type Output = EventKinds;

    fn bitor(self, rhs: EventKind) -> EventKinds {
        EventKinds::from(self).with(rhs)
    }
}

impl BitOr<EventKind> for EventKinds {
    type Output = EventKinds;

    fn bitor(self, rhs: EventKind) -> EventKinds {
        self.with(rhs)
    }
}

// ----------------------------------------------------------------------------
// Log Configuration
// ----------------------------------------------------------------------------

/// Log levels for store events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "TRACE"),
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warn => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

/// How a matching event is rendered
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub prefix: String,
    pub level: LogLevel,
    /// Include the Debug rendering of the slot value and arguments
    pub log_data: bool,
    /// Include getter wait time and reducer run time
    pub log_duration: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            prefix: "slotstate:".to_string(),
            level: LogLevel::Info,
            log_data: false,
            log_duration: false,
        }
    }
}

impl LogConfig {
    /// Everything at debug level, for tests and local diagnosis
    pub fn verbose() -> Self {
        Self {
            level: LogLevel::Debug,
            log_data: true,
            log_duration: true,
            ..Self::default()
        }
    }
}

// ----------------------------------------------------------------------------
// Events and Loggers
// ----------------------------------------------------------------------------

/// Structured store event handed to a [`StoreLogger`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreEvent {
    pub slot: SlotId,
    pub kind: EventKind,
    pub value: Option<String>,
    pub args: Option<String>,
    pub duration: Option<Duration>,
}

/// Sink for store events
///
/// Events may be emitted while a slot is locked, so implementations must not
/// call back into the store.
pub trait StoreLogger: Send + Sync {
    fn log_event(&self, config: &LogConfig, event: &StoreEvent);
}

/// Writes events through `tracing`
#[derive(Debug, Clone, Default)]
pub struct ConsoleLogger;

impl StoreLogger for ConsoleLogger {
    fn log_event(&self, config: &LogConfig, event: &StoreEvent) {
        let value = event.value.as_deref().unwrap_or("-");
        let args = event.args.as_deref().unwrap_or("-");
        let duration_ms = event.duration.map(|d| d.as_secs_f64() * 1000.0);

        macro_rules! emit {
            ($mac:ident) => {
                tracing::$mac!(
                    target: "slotstate::events",
                    slot = %event.slot,
                    kind = %event.kind,
                    value,
                    args,
                    duration_ms,
                    "{}",
                    config.prefix
                )
            };
        }

        match config.level {
            LogLevel::Trace => emit!(trace),
            LogLevel::Debug => emit!(debug),
            LogLevel::Info => emit!(info),
            LogLevel::Warn => emit!(warn),
            LogLevel::Error => emit!(error),
        }
    }
}

/// No-op logger for when logging is disabled
#[derive(Debug, Clone, Default)]
pub struct NoOpLogger;

impl StoreLogger for NoOpLogger {
    fn log_event(&self, _config: &LogConfig, _event: &StoreEvent) {}
}

/// Logger wrapper for object safety
#[derive(Clone)]
pub enum LoggerWrapper {
    Console(ConsoleLogger),
    NoOp(NoOpLogger),
    Custom(Arc<dyn StoreLogger>),
}

impl LoggerWrapper {
    pub fn log_event(&self, config: &LogConfig, event: &StoreEvent) {
        match self {
            LoggerWrapper::Console(logger) => logger.log_event(config, event),
            LoggerWrapper::NoOp(logger) => logger.log_event(config, event),
            LoggerWrapper::Custom(logger) => logger.log_event(config, event),
        }
    }
}

impl Default for LoggerWrapper {
    fn default() -> Self {
        LoggerWrapper::Console(ConsoleLogger)
    }
}

impl fmt::Debug for LoggerWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoggerWrapper::Console(_) => f.write_str("LoggerWrapper::Console"),
            LoggerWrapper::NoOp(_) => f.write_str("LoggerWrapper::NoOp"),
            LoggerWrapper::Custom(_) => f.write_str("LoggerWrapper::Custom"),
        }
    }
}

// ----------------------------------------------------------------------------
// Log Manager
// ----------------------------------------------------------------------------

type KindConfigs = HashMap<EventKind, LogConfig>;

/// Filtering and dispatch of store events
///
/// A slot-specific configuration for an event kind wins over the global one;
/// an event with neither is dropped.
#[derive(Debug)]
pub struct LogManager {
    enabled: AtomicBool,
    logger: LoggerWrapper,
    global: RwLock<KindConfigs>,
    per_slot: RwLock<HashMap<SlotId, KindConfigs>>,
}

impl LogManager {
    pub fn new(logger: LoggerWrapper) -> Self {
        Self {
            enabled: AtomicBool::new(false),
            logger,
            global: RwLock::new(HashMap::new()),
            per_slot: RwLock::new(HashMap::new()),
        }
    }

    pub fn turn_on(&self) {
        self.enabled.store(true, Ordering::SeqCst);
    }

    pub fn turn_off(&self) {
        self.enabled.store(false, Ordering::SeqCst);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Apply `config` to `kinds`, for the listed slots or globally when
    /// `slots` is empty
    pub fn configure(&self, slots: &[SlotId], kinds: EventKinds, config: LogConfig) {
        if slots.is_empty() {
            let mut global = self.global.write().unwrap_or_else(PoisonError::into_inner);
            for kind in kinds.iter() {
                global.insert(kind, config.clone());
            }
            return;
        }

        let mut per_slot = self.per_slot.write().unwrap_or_else(PoisonError::into_inner);
        for slot in slots {
            let configs = per_slot.entry(slot.clone()).or_default();
            for kind in kinds.iter() {
                configs.insert(kind, config.clone());
            }
        }
    }

    /// Drop every global and per-slot configuration
    pub fn reset(&self) {
        self.global
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.per_slot
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Configuration that applies to `kind` on `slot`, if logging is on
    pub fn config_for(&self, slot: &SlotId, kind: EventKind) -> Option<LogConfig> {
        if !self.is_enabled() {
            return None;
        }

        let per_slot = self.per_slot.read().unwrap_or_else(PoisonError::into_inner);
        if let Some(config) = per_slot.get(slot).and_then(|configs| configs.get(&kind)) {
            return Some(config.clone());
        }
        drop(per_slot);

        self.global
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&kind)
            .cloned()
    }

    pub fn log<V: fmt::Debug + ?Sized>(
        &self,
        slot: &SlotId,
        kind: EventKind,
        value: Option<&V>,
        args: Option<&str>,
        duration: Option<Duration>,
    ) {
        let Some(config) = self.config_for(slot, kind) else {
            return;
        };

        let event = StoreEvent {
            slot: slot.clone(),
            kind,
            value: if config.log_data {
                value.map(|v| format!("{:?}", v))
            } else {
                None
            },
            args: if config.log_data {
                args.map(str::to_string)
            } else {
                None
            },
            duration: if config.log_duration { duration } else { None },
        };

        self.logger.log_event(&config, &event);
    }
}

impl Default for LogManager {
    fn default() -> Self {
        Self::new(LoggerWrapper::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<StoreEvent>>,
    }

    impl StoreLogger for Recorder {
        fn log_event(&self, _config: &LogConfig, event: &StoreEvent) {
            self.events.lock().unwrap().push(event.clone());
        }
    }

    fn manager() -> (LogManager, Arc<Recorder>) {
        let recorder = Arc::new(Recorder::default());
        let manager = LogManager::new(LoggerWrapper::Custom(recorder.clone()));
        (manager, recorder)
    }

    #[test]
    fn test_event_kinds_set_operations() {
        let kinds = EventKind::Reducer | EventKind::ReducerResolved;
        assert!(kinds.contains(EventKind::Reducer));
        assert!(!kinds.contains(EventKind::StateGetter));
        assert_eq!(kinds.iter().count(), 2);
        assert_eq!(EventKinds::ALL.iter().count(), EventKind::ALL.len());
        assert!(EventKinds::NONE.is_empty());
    }

    #[test]
    fn test_disabled_by_default() {
        let (manager, recorder) = manager();
        manager.configure(&[], EventKinds::ALL, LogConfig::default());
        manager.log(&SlotId::new("a"), EventKind::Reducer, Some(&1), None, None);
        assert!(recorder.events.lock().unwrap().is_empty());
    }

    #[test]
    fn test_slot_config_overrides_global() {
        let (manager, recorder) = manager();
        manager.turn_on();
        manager.configure(&[], EventKind::Reducer.into(), LogConfig::default());
        manager.configure(
            &[SlotId::new("loud")],
            EventKind::Reducer.into(),
            LogConfig::verbose(),
        );

        manager.log(&SlotId::new("quiet"), EventKind::Reducer, Some(&1), Some("(1,)"), None);
        manager.log(&SlotId::new("loud"), EventKind::Reducer, Some(&2), Some("(2,)"), None);
        manager.log(&SlotId::new("loud"), EventKind::StateGetter, Some(&3), None, None);

        let events = recorder.events.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].value, None);
        assert_eq!(events[1].value.as_deref(), Some("2"));
        assert_eq!(events[1].args.as_deref(), Some("(2,)"));
    }

    #[test]
    fn test_reset_clears_configuration() {
        let (manager, recorder) = manager();
        manager.turn_on();
        manager.configure(&[], EventKinds::ALL, LogConfig::default());
        manager.reset();
        manager.log(&SlotId::new("a"), EventKind::Reducer, Some(&1), None, None);
        assert!(recorder.events.lock().unwrap().is_empty());
    }

    #[test]
    fn test_event_kinds_deserialize_from_names() {
        let kinds: EventKinds = serde_json::from_str(r#"["Reducer","StateGetter"]"#).unwrap();
        assert_eq!(kinds, EventKind::Reducer | EventKind::StateGetter);
    }
}
