//! In-memory log capture for tests.
//!
//! ```ignore
//! let (logs, _guard) = capture_logs();
//! fanout.broadcast(&update);
//! assert!(logs.has_event(Level::WARN, "evicting slow observer"));
//! ```

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::field::{Field, Visit};
use tracing::level_filters::LevelFilter;
use tracing::subscriber::DefaultGuard;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;

/// One recorded event.
#[derive(Clone, Debug)]
pub struct LogRecord {
    /// Event level.
    pub level: Level,
    /// The `message` field.
    pub message: String,
    /// Every other field, in recording order.
    pub fields: Vec<(&'static str, String)>,
}

impl LogRecord {
    /// Value of field `name`, if recorded.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Shared sink the capture layer writes into.
#[derive(Clone, Default)]
pub struct CapturedLogs {
    records: Arc<Mutex<Vec<LogRecord>>>,
}

impl CapturedLogs {
    /// Snapshot of everything recorded so far.
    pub fn records(&self) -> Vec<LogRecord> {
        self.lock().clone()
    }

    /// Whether an event at `level` has a message containing `needle`.
    pub fn has_event(&self, level: Level, needle: &str) -> bool {
        self.find(level, needle).is_some()
    }

    /// First event at `level` whose message contains `needle`.
    pub fn find(&self, level: Level, needle: &str) -> Option<LogRecord> {
        self.lock()
            .iter()
            .find(|r| r.level == level && r.message.contains(needle))
            .cloned()
    }

    /// Whether any event carries `name = value`.
    pub fn has_field(&self, name: &str, value: &str) -> bool {
        self.lock().iter().any(|r| r.field(name) == Some(value))
    }

    fn lock(&self) -> MutexGuard<'_, Vec<LogRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Default)]
struct Recorder {
    message: String,
    fields: Vec<(&'static str, String)>,
}

impl Recorder {
    fn put(&mut self, field: &Field, value: String) {
        if field.name() == "message" {
            self.message = value;
        } else {
            self.fields.push((field.name(), value));
        }
    }
}

impl Visit for Recorder {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.put(field, value.to_owned());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.put(field, format!("{value:?}"));
    }
}

struct CaptureLayer(CapturedLogs);

impl<S: Subscriber> Layer<S> for CaptureLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut recorder = Recorder::default();
        event.record(&mut recorder);
        self.0.lock().push(LogRecord {
            level: *event.metadata().level(),
            message: recorder.message,
            fields: recorder.fields,
        });
    }
}

/// Capture every event on the current thread until the guard drops.
pub fn capture_logs() -> (CapturedLogs, DefaultGuard) {
    let logs = CapturedLogs::default();
    let guard = tracing_subscriber::registry()
        .with(CaptureLayer(logs.clone()))
        .with(LevelFilter::TRACE)
        .set_default();
    (logs, guard)
}
