//! Per-session logger handle.
//!
//! Every session owns a [`SessionLog`]: the host it speaks for plus a
//! `log::Log` sink. The sink defaults to whatever logger the process
//! installed through the `log` facade, but can be swapped for any other
//! implementation when the session is built.

use std::fmt;
use std::sync::Arc;

use log::{Level, Log, Metadata, Record};

const TARGET: &str = "netops::session";

/// Forwards to the process-wide logger installed with `log::set_logger`.
struct GlobalLogger;

impl Log for GlobalLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        log::logger().enabled(metadata)
    }

    fn log(&self, record: &Record<'_>) {
        log::logger().log(record);
    }

    fn flush(&self) {
        log::logger().flush();
    }
}

/// Logger handle bound to one host.
///
/// Events are emitted as `log::Record`s with target `netops::session` and a
/// message prefixed by the host name.
#[derive(Clone)]
pub struct SessionLog {
    host: Arc<str>,
    sink: Arc<dyn Log>,
}

impl SessionLog {
    /// Log to the process-wide logger.
    pub fn new(host: impl Into<String>) -> Self {
        Self::with_sink(host, Arc::new(GlobalLogger))
    }

    /// Log to a specific sink.
    pub fn with_sink(host: impl Into<String>, sink: Arc<dyn Log>) -> Self {
        Self {
            host: Arc::from(host.into()),
            sink,
        }
    }

    /// The host this handle logs for.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Emit one event.
    pub fn log(&self, level: Level, args: fmt::Arguments<'_>) {
        let metadata = Metadata::builder().level(level).target(TARGET).build();
        if !self.sink.enabled(&metadata) {
            return;
        }
        self.sink.log(
            &Record::builder()
                .metadata(metadata)
                .args(format_args!("{}: {}", self.host, args))
                .module_path_static(Some(module_path!()))
                .build(),
        );
    }

    pub fn debug(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Debug, args);
    }

    pub fn info(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Info, args);
    }

    pub fn warn(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Warn, args);
    }

    pub fn error(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Error, args);
    }
}

impl fmt::Debug for SessionLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionLog")
            .field("host", &self.host)
            .finish_non_exhaustive()
    }
}

/// A `log::Log` that keeps every record in memory.
#[cfg(test)]
#[derive(Default)]
pub(crate) struct CaptureLog {
    records: std::sync::Mutex<Vec<(Level, String)>>,
}

#[cfg(test)]
impl CaptureLog {
    pub(crate) fn records(&self) -> Vec<(Level, String)> {
        self.records.lock().unwrap().clone()
    }

    pub(crate) fn contains(&self, level: Level, needle: &str) -> bool {
        self.records()
            .iter()
            .any(|(l, message)| *l == level && message.contains(needle))
    }
}

#[cfg(test)]
impl Log for CaptureLog {
    fn enabled(&self, _metadata: &Metadata<'_>) -> bool {
        true
    }

    fn log(&self, record: &Record<'_>) {
        self.records
            .lock()
            .unwrap()
            .push((record.level(), record.args().to_string()));
    }

    fn flush(&self) {}
}
