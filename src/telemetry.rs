//! Application telemetry events and sinks.
//!
//! Magpie runs unattended, so a handful of structured events capture the
//! operational signals worth keeping: the active schema version and the
//! outcome of each crawl run. Events go to a pluggable sink; the default
//! stderr sink emits JSON lines for local inspection and is never
//! transmitted anywhere.

use std::io;

use serde::{Deserialize, Serialize};

/// A structured telemetry event emitted by magpie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TelemetryEvent {
    /// Records the current database schema version after migrations apply.
    SchemaVersionRecorded {
        /// Diesel migration version string (e.g. `20260829000000`).
        schema_version: String,
    },
    /// Records the outcome of a crawl run.
    CrawlCompleted {
        /// Repositories whose crawl finished and advanced the watermark.
        succeeded: u64,
        /// Repositories whose crawl failed and left the watermark untouched.
        failed: u64,
    },
}

/// A sink that can record telemetry events.
pub trait TelemetrySink: Send + Sync {
    /// Records a telemetry event.
    fn record(&self, event: TelemetryEvent);
}

/// Telemetry sink that drops all events.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTelemetrySink;

impl TelemetrySink for NoopTelemetrySink {
    fn record(&self, _event: TelemetryEvent) {}
}

/// Records telemetry events to stderr as JSON lines (JSONL).
#[derive(Debug, Default)]
pub struct StderrJsonlTelemetrySink;

impl TelemetrySink for StderrJsonlTelemetrySink {
    fn record(&self, event: TelemetryEvent) {
        let Ok(serialised) = serde_json::to_string(&event) else {
            return;
        };

        let _ignored = writeln_stderr(&serialised);
    }
}

fn writeln_stderr(message: &str) -> io::Result<()> {
    use io::Write;

    let mut stderr = io::stderr().lock();
    writeln!(stderr, "{message}")
}

#[cfg(test)]
mod tests {
    use super::{TelemetryEvent, TelemetrySink};

    #[derive(Debug, Default)]
    struct RecordingSink {
        events: std::sync::Mutex<Vec<TelemetryEvent>>,
    }

    impl RecordingSink {
        fn take(&self) -> Vec<TelemetryEvent> {
            self.events
                .lock()
                .expect("events mutex should be available")
                .drain(..)
                .collect()
        }
    }

    impl TelemetrySink for RecordingSink {
        fn record(&self, event: TelemetryEvent) {
            self.events
                .lock()
                .expect("events mutex should be available")
                .push(event);
        }
    }

    #[test]
    fn recording_sink_captures_crawl_outcome() {
        let sink = RecordingSink::default();
        sink.record(TelemetryEvent::CrawlCompleted {
            succeeded: 3,
            failed: 1,
        });

        assert_eq!(
            sink.take(),
            vec![TelemetryEvent::CrawlCompleted {
                succeeded: 3,
                failed: 1,
            }]
        );
    }

    #[test]
    fn crawl_completed_serialises_with_snake_case_tag() {
        let event = TelemetryEvent::CrawlCompleted {
            succeeded: 1,
            failed: 0,
        };
        let serialised = serde_json::to_value(&event).expect("event should serialise");
        assert_eq!(
            serialised
                .get("type")
                .and_then(serde_json::Value::as_str),
            Some("crawl_completed")
        );
    }
}
