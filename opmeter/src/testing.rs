//! In-process capture of emitted records, for asserting on a meter's
//! lifecycle in tests. Gated behind the `testing` feature (also active for
//! the crate's own `#[cfg(test)]` suite): a thread-local sink that
//! intercepts [`crate::backend::emit`] calls instead of routing them
//! through a real `slog` drain.

use crate::marker::Marker;
use parking_lot::Mutex;
use slog::Level;
use std::cell::Cell;
use thread_local::ThreadLocal;

/// A single captured record: the logger it was emitted on, its level,
/// marker, rendered message, and structured fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestRecord {
    /// The derived logger name the record was emitted on.
    pub logger: String,
    /// The record's `slog` level.
    pub level: Level,
    /// The marker tag as rendered text (e.g. `"MsgOk"`).
    pub marker: String,
    /// The rendered human-readable message.
    pub message: String,
    /// The structured key-value fields attached to the record.
    pub fields: Vec<(String, String)>,
}

struct TestSink {
    records: Mutex<Vec<TestRecord>>,
}

static ACTIVE: ThreadLocal<Cell<bool>> = ThreadLocal::new();
static SINK: ThreadLocal<TestSink> = ThreadLocal::new();

fn sink() -> &'static TestSink {
    SINK.get_or(|| TestSink {
        records: Mutex::new(Vec::new()),
    })
}

/// Runs `body` with record capture enabled on the current thread, and
/// returns everything captured during that call. Any meter created within
/// `body` emits into the in-process sink instead of the real `slog` drain.
pub fn with_test_records(body: impl FnOnce()) -> Vec<TestRecord> {
    sink().records.lock().clear();
    let was_active = ACTIVE.get_or(|| Cell::new(false)).replace(true);

    body();

    ACTIVE.get_or(|| Cell::new(false)).set(was_active);
    sink().records.lock().clone()
}

/// Called by [`crate::backend::emit`] before touching the real `slog`
/// drain. Returns `true` (and records the call) if capture is active on
/// this thread.
pub(crate) fn try_capture(
    logger_name: &str,
    level: Level,
    marker: Marker,
    message: &str,
    fields: &[(String, String)],
) -> bool {
    if !ACTIVE.get_or(|| Cell::new(false)).get() {
        return false;
    }

    sink().records.lock().push(TestRecord {
        logger: logger_name.to_string(),
        level,
        marker: marker.to_string(),
        message: message.to_string(),
        fields: fields.to_vec(),
    });

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Meter;

    #[test]
    fn captures_records_emitted_during_body() {
        let records = with_test_records(|| {
            let mut m = Meter::new("test_cat", None, None);
            m.start();
            m.ok();
        });

        assert!(records.iter().any(|r| r.marker == "MsgStart"));
        assert!(records.iter().any(|r| r.marker == "MsgOk"));
        assert!(records.iter().any(|r| r.marker == "DataOk"));
    }

    #[test]
    fn capture_is_cleared_between_calls() {
        with_test_records(|| {
            let mut m = Meter::new("test_cat2", None, None);
            m.start();
            m.ok();
        });

        let second = with_test_records(|| {
            let mut m = Meter::new("test_cat3", None, None);
            m.start();
            m.ok();
        });

        assert!(second.iter().all(|r| r.logger.contains("test_cat3")));
    }
}
