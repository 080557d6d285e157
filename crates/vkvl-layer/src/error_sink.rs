//! Reporting surface shared by every check.
//!
//! A check reports a failure through [`ErrorSink::log_error`] and ORs the
//! returned "skip" flag into its own result. Nothing in the layer treats a
//! report as a Rust error; the intercepted call is always forwarded.

use std::fmt;

use parking_lot::Mutex;
use smallvec::SmallVec;
use tracing::error;

use vkvl_core::TypedHandle;

/// Objects named by one report. Almost always one to three entries.
pub type LogObjectList = SmallVec<[TypedHandle; 4]>;

/// Where in the API call a failure was found, e.g.
/// `vkCmdExecuteCommands(): pCommandBuffers[1]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    function: &'static str,
    path: String,
}

impl Location {
    pub fn new(function: &'static str) -> Self {
        Self {
            function,
            path: String::new(),
        }
    }

    pub fn function(&self) -> &'static str {
        self.function
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Descend into a struct member.
    pub fn dot(&self, field: &str) -> Self {
        let path = if self.path.is_empty() {
            field.to_string()
        } else {
            format!("{}.{}", self.path, field)
        };
        Self {
            function: self.function,
            path,
        }
    }

    /// Descend into an array element.
    pub fn index(&self, field: &str, index: usize) -> Self {
        self.dot(&format!("{}[{}]", field, index))
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}()", self.function)
        } else {
            write!(f, "{}(): {}", self.function, self.path)
        }
    }
}

/// One accepted validation failure.
#[derive(Debug, Clone)]
pub struct Report {
    pub vuid: String,
    pub objects: LogObjectList,
    pub location: Location,
    pub message: String,
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[ {} ] {} {}", self.vuid, self.location, self.message)
    }
}

/// Destination for validation failures.
///
/// Implementations must not call back into the validator.
pub trait ErrorSink: Send + Sync {
    /// Record a failure. Returns the "skip" signal callers OR into their result.
    fn log_error(&self, report: Report) -> bool;
}

/// Default sink: every report becomes a `tracing` error event.
#[derive(Debug, Default)]
pub struct LogSink;

impl ErrorSink for LogSink {
    fn log_error(&self, report: Report) -> bool {
        let objects = report
            .objects
            .iter()
            .map(|o| o.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        error!(
            vuid = %report.vuid,
            location = %report.location,
            objects = %objects,
            "{}",
            report.message
        );
        true
    }
}

/// Sink that keeps every report in memory, for embedding and tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    reports: Mutex<Vec<Report>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<Report> {
        self.reports.lock().clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.reports.lock().iter().map(|r| r.to_string()).collect()
    }

    pub fn has(&self, vuid: &str) -> bool {
        self.reports.lock().iter().any(|r| r.vuid == vuid)
    }

    pub fn count(&self, vuid: &str) -> usize {
        self.reports.lock().iter().filter(|r| r.vuid == vuid).count()
    }

    /// Messages of every report carrying `vuid`.
    pub fn messages_for(&self, vuid: &str) -> Vec<String> {
        self.reports
            .lock()
            .iter()
            .filter(|r| r.vuid == vuid)
            .map(|r| r.message.clone())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.lock().is_empty()
    }

    pub fn len(&self) -> usize {
        self.reports.lock().len()
    }

    pub fn clear(&self) {
        self.reports.lock().clear();
    }
}

impl ErrorSink for MemorySink {
    fn log_error(&self, report: Report) -> bool {
        self.reports.lock().push(report);
        true
    }
}
