use std::sync::Arc;
use std::sync::mpsc;

use crate::error::Result;
use crate::model::BuildSnapshot;
use crate::watch::Event;

/// Remote job API consumed by the watcher.
pub trait JobSource: Send + Sync {
    fn fetch_status(&self, id: &str) -> Result<BuildSnapshot>;
    /// Full accumulated console log, not a delta.
    fn fetch_log(&self, id: &str) -> Result<String>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureReport {
    pub id: String,
    pub number: u64,
    pub url: String,
    pub message: String,
}

impl FailureReport {
    pub fn from_snapshot(snapshot: &BuildSnapshot) -> Self {
        Self {
            id: snapshot.id.clone(),
            number: snapshot.number,
            url: snapshot.url.clone(),
            message: snapshot.message.clone(),
        }
    }
}

/// Invoked once when the watched job finishes as failed.
pub trait FailureReporter {
    fn report_failure(&self, report: &FailureReport);
}

pub trait EventSink: Send + Sync {
    fn emit(&self, ev: Event);
}

pub struct ChannelSink {
    tx: mpsc::Sender<Event>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<Event>) -> Self {
        Self { tx }
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, ev: Event) {
        // The receiver is gone once the session ended; late results are dropped.
        let _ = self.tx.send(ev);
    }
}

/// Consecutive log fetch failures before the diagnostic is raised to `warn`.
const LOG_FAILURE_WARN_AFTER: u32 = 3;

/// Issues fetch pairs and gates unchanged logs.
///
/// Owned by the controller; the fetch workers only get the source, the id and
/// the sink, so nothing here is shared with them.
pub struct Poller {
    source: Arc<dyn JobSource>,
    id: String,
    last_log_len: Option<usize>,
    log_failures: u32,
    issued: usize,
}

impl Poller {
    pub fn new(source: Arc<dyn JobSource>, id: impl Into<String>) -> Self {
        Self {
            source,
            id: id.into(),
            last_log_len: None,
            log_failures: 0,
            issued: 0,
        }
    }

    /// Starts the status and log fetches on their own threads.
    pub fn spawn_fetch(&mut self, sink: Arc<dyn EventSink>) {
        self.issued = self.issued.saturating_add(1);
        tracing::debug!(id = %self.id, tick = self.issued, "fetching status and log");

        let source = Arc::clone(&self.source);
        let id = self.id.clone();
        let status_sink = Arc::clone(&sink);
        std::thread::spawn(move || {
            let ev = match source.fetch_status(&id) {
                Ok(snapshot) => Event::StatusArrived(snapshot),
                Err(e) => Event::FatalError(e.context(format!("fetching status of job {id}"))),
            };
            status_sink.emit(ev);
        });

        let source = Arc::clone(&self.source);
        let id = self.id.clone();
        std::thread::spawn(move || {
            let ev = match source.fetch_log(&id) {
                Ok(text) => Event::LogArrived(Some(text)),
                Err(e) => {
                    tracing::debug!(id = %id, error = %e, "log fetch failed");
                    Event::LogArrived(None)
                }
            };
            sink.emit(ev);
        });
    }

    /// Number of fetch pairs issued so far.
    pub fn issued(&self) -> usize {
        self.issued
    }

    /// Returns the raw log when it differs in length from the last accepted one.
    pub fn accept_log(&mut self, raw: Option<String>) -> Option<String> {
        let Some(raw) = raw else {
            self.log_failures = self.log_failures.saturating_add(1);
            if self.log_failures == LOG_FAILURE_WARN_AFTER {
                tracing::warn!(
                    id = %self.id,
                    failures = self.log_failures,
                    "console log unavailable; keeping the last known log"
                );
            }
            return None;
        };
        self.log_failures = 0;
        if self.last_log_len == Some(raw.len()) {
            return None;
        }
        self.last_log_len = Some(raw.len());
        Some(raw)
    }
}
