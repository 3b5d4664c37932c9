//! Lightweight begin/mark/end instrumentation.
//!
//! A [`Profiler`] is an explicit context handed to whatever wants to emit
//! events. Emission is gated per [`ProfilingKey`]: a scope created for a
//! disabled key returns from every call before reading the clock.
//!
//! ```
//! use nori::profiling::{MemorySink, Profiler, ProfilingKey, ProfilingMessageType};
//!
//! let sink = MemorySink::default();
//! let profiler = Profiler::new(sink.clone());
//! let key = ProfilingKey::new("frame");
//! profiler.enable(&key);
//!
//! {
//!     let mut scope = profiler.begin(&key);
//!     scope.mark_text("culling done");
//! }
//!
//! let kinds: Vec<_> = sink.events().iter().map(|e| e.message_type).collect();
//! assert_eq!(
//!     kinds,
//!     vec![ProfilingMessageType::Begin, ProfilingMessageType::Mark, ProfilingMessageType::End]
//! );
//! ```

use std::{
    collections::{BTreeMap, HashSet},
    fmt,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU32, Ordering},
    },
    time::{Duration, Instant},
};

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::NoriError;

/// Maximum number of numeric attachments carried by one event.
pub const MAX_CUSTOM_VALUES: usize = 4;

/// Identifies a family of profiling events.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProfilingKey {
    name: Arc<str>,
}

impl ProfilingKey {
    pub fn new(name: &str) -> Self {
        Self { name: name.into() }
    }

    /// A key nested under this one, named `parent.child`.
    pub fn child(&self, name: &str) -> Self {
        Self {
            name: format!("{}.{}", self.name, name).into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for ProfilingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ProfilingKey").field(&self.name).finish()
    }
}

impl fmt::Display for ProfilingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProfilingMessageType {
    Begin,
    Mark,
    End,
}

/// Numeric value attached to an event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProfilingCustomValue {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
}

impl From<i32> for ProfilingCustomValue {
    fn from(value: i32) -> Self {
        Self::Int(value)
    }
}

impl From<i64> for ProfilingCustomValue {
    fn from(value: i64) -> Self {
        Self::Long(value)
    }
}

impl From<f32> for ProfilingCustomValue {
    fn from(value: f32) -> Self {
        Self::Float(value)
    }
}

impl From<f64> for ProfilingCustomValue {
    fn from(value: f64) -> Self {
        Self::Double(value)
    }
}

impl fmt::Display for ProfilingCustomValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProfilingCustomValue::Int(value) => write!(f, "{value}"),
            ProfilingCustomValue::Long(value) => write!(f, "{value}"),
            ProfilingCustomValue::Float(value) => write!(f, "{value}"),
            ProfilingCustomValue::Double(value) => write!(f, "{value}"),
        }
    }
}

/// Value stored under a scope attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Text(String),
    Value(ProfilingCustomValue),
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<ProfilingCustomValue> for AttributeValue {
    fn from(value: ProfilingCustomValue) -> Self {
        Self::Value(value)
    }
}

impl From<i32> for AttributeValue {
    fn from(value: i32) -> Self {
        Self::Value(value.into())
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        Self::Value(value.into())
    }
}

impl From<f32> for AttributeValue {
    fn from(value: f32) -> Self {
        Self::Value(value.into())
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        Self::Value(value.into())
    }
}

/// An emitted event. Owns copies of the scope's text and attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfilingEvent {
    pub profiling_id: u32,
    pub key: ProfilingKey,
    pub message_type: ProfilingMessageType,
    /// Time since the profiler was created.
    pub timestamp: Duration,
    /// Time since the most recent Begin of the emitting scope.
    pub elapsed: Duration,
    pub text: Option<String>,
    pub attributes: BTreeMap<String, AttributeValue>,
    pub custom_values: [Option<ProfilingCustomValue>; MAX_CUSTOM_VALUES],
}

/// Receives every event emitted through a [`Profiler`].
pub trait ProfilingSink: Send + Sync {
    fn process_event(&self, event: ProfilingEvent);

    fn flush(&self) {}
}

/// Forwards events to the `log` facade at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl ProfilingSink for LogSink {
    fn process_event(&self, event: ProfilingEvent) {
        let values = event
            .custom_values
            .iter()
            .flatten()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");

        log::debug!(
            target: "nori::profiling",
            "[{}] #{} {:?} at {:?} (elapsed {:?}) {} [{}]",
            event.key,
            event.profiling_id,
            event.message_type,
            event.timestamp,
            event.elapsed,
            event.text.as_deref().unwrap_or(""),
            values
        );
    }

    fn flush(&self) {
        log::logger().flush();
    }
}

/// Keeps events in memory. Clones share the same buffer.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    events: Arc<Mutex<Vec<ProfilingEvent>>>,
}

impl MemorySink {
    pub fn events(&self) -> Vec<ProfilingEvent> {
        self.events.lock().clone()
    }

    pub fn drain(&self) -> Vec<ProfilingEvent> {
        std::mem::take(&mut *self.events.lock())
    }
}

impl ProfilingSink for MemorySink {
    fn process_event(&self, event: ProfilingEvent) {
        self.events.lock().push(event);
    }
}

/// Which keys a profiler starts with enabled.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProfilerSettings {
    #[serde(default)]
    pub enable_all: bool,
    #[serde(default)]
    pub enabled_keys: Vec<String>,
}

impl ProfilerSettings {
    pub fn load_from_json(path: &str) -> Result<Self, NoriError> {
        let bytes = std::fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

struct ProfilerInner {
    enable_all: AtomicBool,
    enabled: RwLock<HashSet<ProfilingKey>>,
    next_id: AtomicU32,
    origin: Instant,
    sink: Box<dyn ProfilingSink>,
}

/// Shared profiling context. Cloning yields another handle to the same state.
#[derive(Clone)]
pub struct Profiler {
    inner: Arc<ProfilerInner>,
}

impl Profiler {
    /// Creates a profiler with every key disabled.
    pub fn new(sink: impl ProfilingSink + 'static) -> Self {
        Self {
            inner: Arc::new(ProfilerInner {
                enable_all: AtomicBool::new(false),
                enabled: RwLock::new(HashSet::new()),
                next_id: AtomicU32::new(1),
                origin: Instant::now(),
                sink: Box::new(sink),
            }),
        }
    }

    pub fn from_settings(
        settings: &ProfilerSettings,
        sink: impl ProfilingSink + 'static,
    ) -> Result<Self, NoriError> {
        let profiler = Self::new(sink);

        for name in &settings.enabled_keys {
            if name.trim().is_empty() {
                return Err(NoriError::InvalidInput(
                    "profiling key names cannot be empty".into(),
                ));
            }
            profiler.enable(&ProfilingKey::new(name.trim()));
        }

        if settings.enable_all {
            profiler.enable_all();
        }

        Ok(profiler)
    }

    pub fn enable(&self, key: &ProfilingKey) {
        self.inner.enabled.write().insert(key.clone());
    }

    pub fn disable(&self, key: &ProfilingKey) {
        self.inner.enabled.write().remove(key);
    }

    pub fn enable_all(&self) {
        self.inner.enable_all.store(true, Ordering::Release);
    }

    /// Disables every key, including those enabled individually.
    pub fn disable_all(&self) {
        self.inner.enable_all.store(false, Ordering::Release);
        self.inner.enabled.write().clear();
    }

    pub fn is_enabled(&self, key: &ProfilingKey) -> bool {
        self.inner.enable_all.load(Ordering::Acquire) || self.inner.enabled.read().contains(key)
    }

    /// A scope for `key` that has not emitted anything yet.
    pub fn scope(&self, key: &ProfilingKey) -> ProfilingState {
        ProfilingState {
            profiler: self.clone(),
            profiling_id: self.inner.next_id.fetch_add(1, Ordering::Relaxed),
            key: key.clone(),
            enabled: self.is_enabled(key),
            start_time: Duration::ZERO,
            begin_text: None,
            attributes: BTreeMap::new(),
            ended: false,
            dispose_hook: None,
        }
    }

    /// A scope for `key` that has already emitted its Begin event.
    pub fn begin(&self, key: &ProfilingKey) -> ProfilingState {
        let mut state = self.scope(key);
        state.begin();
        state
    }

    /// Disables all keys and flushes the sink. Scopes still alive stop
    /// emitting once they call [`ProfilingState::check_if_enabled`].
    pub fn shutdown(&self) {
        self.disable_all();
        self.inner.sink.flush();
    }

    fn now(&self) -> Duration {
        self.inner.origin.elapsed()
    }

    fn process_event(&self, event: ProfilingEvent) {
        self.inner.sink.process_event(event);
    }
}

impl fmt::Debug for Profiler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Profiler")
            .field("enable_all", &self.inner.enable_all.load(Ordering::Relaxed))
            .field("enabled", &*self.inner.enabled.read())
            .finish_non_exhaustive()
    }
}

type DisposeHook = Box<dyn FnOnce(&mut ProfilingState) + Send>;

/// State of one profiled region.
///
/// Dropping an enabled scope runs its dispose hook (if any) and then emits an
/// End event, unless an End was already emitted since the last Begin.
pub struct ProfilingState {
    profiler: Profiler,
    profiling_id: u32,
    key: ProfilingKey,
    enabled: bool,
    start_time: Duration,
    begin_text: Option<String>,
    attributes: BTreeMap<String, AttributeValue>,
    ended: bool,
    dispose_hook: Option<DisposeHook>,
}

impl ProfilingState {
    pub fn profiling_id(&self) -> u32 {
        self.profiling_id
    }

    pub fn key(&self) -> &ProfilingKey {
        &self.key
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Re-reads the enabled flag for this scope's key, so long running scopes
    /// pick up keys toggled at runtime.
    pub fn check_if_enabled(&mut self) {
        self.enabled = self.profiler.is_enabled(&self.key);
    }

    /// Runs right before the automatic End emitted on drop.
    pub fn set_dispose_hook(&mut self, hook: impl FnOnce(&mut ProfilingState) + Send + 'static) {
        self.dispose_hook = Some(Box::new(hook));
    }

    /// Stored only while profiling is enabled for this scope.
    pub fn set_attribute(&mut self, key: &str, value: impl Into<AttributeValue>) {
        if !self.enabled {
            return;
        }
        self.attributes.insert(key.to_string(), value.into());
    }

    pub fn attribute(&self, key: &str) -> Option<&AttributeValue> {
        self.attributes.get(key)
    }

    pub fn elapsed(&self) -> Duration {
        self.profiler.now().saturating_sub(self.start_time)
    }

    pub fn begin(&mut self) {
        self.emit_event(ProfilingMessageType::Begin, None, &[]);
    }

    pub fn begin_text(&mut self, text: &str) {
        self.emit_event(ProfilingMessageType::Begin, Some(text), &[]);
    }

    /// Panics if more than [`MAX_CUSTOM_VALUES`] values are given.
    pub fn begin_values(&mut self, text: Option<&str>, values: &[ProfilingCustomValue]) {
        self.emit_event(ProfilingMessageType::Begin, text, values);
    }

    pub fn mark(&mut self) {
        self.emit_event(ProfilingMessageType::Mark, None, &[]);
    }

    pub fn mark_text(&mut self, text: &str) {
        self.emit_event(ProfilingMessageType::Mark, Some(text), &[]);
    }

    pub fn mark_values(&mut self, text: Option<&str>, values: &[ProfilingCustomValue]) {
        self.emit_event(ProfilingMessageType::Mark, text, values);
    }

    pub fn end(&mut self) {
        self.emit_event(ProfilingMessageType::End, None, &[]);
    }

    pub fn end_text(&mut self, text: &str) {
        self.emit_event(ProfilingMessageType::End, Some(text), &[]);
    }

    pub fn end_values(&mut self, text: Option<&str>, values: &[ProfilingCustomValue]) {
        self.emit_event(ProfilingMessageType::End, text, values);
    }

    fn emit_event(
        &mut self,
        message_type: ProfilingMessageType,
        text: Option<&str>,
        values: &[ProfilingCustomValue],
    ) {
        if !self.enabled {
            return;
        }

        let timestamp = self.profiler.now();

        let text = match text {
            Some(text) => Some(text.to_string()),
            None if message_type != ProfilingMessageType::Mark => self.begin_text.clone(),
            None => None,
        };

        match message_type {
            ProfilingMessageType::Begin => {
                self.start_time = timestamp;
                self.begin_text = text.clone();
                self.ended = false;
            }
            ProfilingMessageType::End => {
                self.begin_text = None;
                self.ended = true;
            }
            ProfilingMessageType::Mark => {}
        }

        assert!(
            values.len() <= MAX_CUSTOM_VALUES,
            "at most {MAX_CUSTOM_VALUES} custom values can be attached to an event"
        );
        let mut custom_values = [None; MAX_CUSTOM_VALUES];
        for (slot, value) in custom_values.iter_mut().zip(values) {
            *slot = Some(*value);
        }

        self.profiler.process_event(ProfilingEvent {
            profiling_id: self.profiling_id,
            key: self.key.clone(),
            message_type,
            timestamp,
            elapsed: timestamp.saturating_sub(self.start_time),
            text,
            attributes: self.attributes.clone(),
            custom_values,
        });
    }
}

impl Drop for ProfilingState {
    fn drop(&mut self) {
        if !self.enabled {
            return;
        }

        if let Some(hook) = self.dispose_hook.take() {
            hook(self);
        }

        if !self.ended {
            self.end();
        }
    }
}

impl fmt::Debug for ProfilingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProfilingState")
            .field("profiling_id", &self.profiling_id)
            .field("key", &self.key)
            .field("enabled", &self.enabled)
            .field("attributes", &self.attributes)
            .finish_non_exhaustive()
    }
}
