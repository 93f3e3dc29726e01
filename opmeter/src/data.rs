//! The value record underlying every [`crate::Meter`].

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use uuid::Uuid;

/// The literal substituted for a `None` context value.
pub const NULL_CONTEXT_VALUE: &str = "<null>";

static SESSION_UUID: Lazy<Uuid> = Lazy::new(Uuid::new_v4);

/// Returns the process-wide session id shared by every meter.
pub(crate) fn session_uuid() -> Uuid {
    *SESSION_UUID
}

/// The lifecycle state of a [`crate::Meter`].
///
/// The three terminal states are indistinguishable for the purpose of
/// rejecting further mutation, but distinguishable by which outcome path
/// field on [`MeterData`] is populated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Constructed, not yet started or terminated.
    Created,
    /// Started; increments, progress, and termination are all valid.
    Started,
    /// Terminated successfully.
    Ok,
    /// Terminated as rejected.
    Rejected,
    /// Terminated as failed.
    Failed,
}

impl State {
    /// True for any of the three terminal states.
    pub fn is_terminal(self) -> bool {
        matches!(self, State::Ok | State::Rejected | State::Failed)
    }
}

/// The value record for a single meter instance: identity, attributes,
/// timestamps, counters, and outcome, plus the field-by-field invariants this
/// type upholds.
#[derive(Debug, Clone)]
pub struct MeterData {
    pub(crate) session_uuid: Uuid,
    pub(crate) category: String,
    pub(crate) operation: Option<String>,
    pub(crate) parent: Option<String>,
    pub(crate) position: u64,

    pub(crate) description: Option<String>,
    pub(crate) expected_iterations: Option<u64>,
    pub(crate) time_limit_ms: Option<u64>,
    pub(crate) context: IndexMap<String, String>,

    pub(crate) create_time: u64,
    pub(crate) start_time: u64,
    pub(crate) stop_time: u64,

    pub(crate) current_iteration: u64,

    pub(crate) ok_path: Option<String>,
    pub(crate) reject_path: Option<String>,
    pub(crate) fail_path: Option<String>,
    pub(crate) fail_message: Option<String>,
}

impl MeterData {
    pub(crate) fn new(
        category: String,
        operation: Option<String>,
        parent: Option<String>,
        position: u64,
        create_time: u64,
    ) -> Self {
        Self {
            session_uuid: session_uuid(),
            category,
            operation,
            parent,
            position,
            description: None,
            expected_iterations: None,
            time_limit_ms: None,
            context: IndexMap::new(),
            create_time,
            start_time: 0,
            stop_time: 0,
            current_iteration: 0,
            ok_path: None,
            reject_path: None,
            fail_path: None,
            fail_message: None,
        }
    }

    /// The stable identifier of this meter instance:
    /// `session_uuid/category[/operation]#position`.
    pub fn full_id(&self) -> String {
        match &self.operation {
            Some(op) => format!(
                "{}/{}/{}#{}",
                self.session_uuid, self.category, op, self.position
            ),
            None => format!("{}/{}#{}", self.session_uuid, self.category, self.position),
        }
    }

    /// The logger name this meter was constructed from.
    pub fn category(&self) -> &str {
        &self.category
    }

    /// The optional sub-name of this meter.
    pub fn operation(&self) -> Option<&str> {
        self.operation.as_deref()
    }

    /// The opaque full id of the enclosing meter, if any.
    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    /// The unique, strictly increasing position for this meter's
    /// `(category, operation)` pair.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// The caller-set description, if any.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// The declared expected iteration count, if any.
    pub fn expected_iterations(&self) -> Option<u64> {
        self.expected_iterations
    }

    /// The declared time budget in milliseconds, if any.
    pub fn time_limit_ms(&self) -> Option<u64> {
        self.time_limit_ms
    }

    /// A read-only view of the current context entries, in insertion order.
    pub fn context(&self) -> &IndexMap<String, String> {
        &self.context
    }

    /// Nanosecond timestamp this meter was constructed at. Always positive.
    pub fn create_time(&self) -> u64 {
        self.create_time
    }

    /// Nanosecond timestamp `start()` was accepted at, or `0` if not started.
    pub fn start_time(&self) -> u64 {
        self.start_time
    }

    /// Nanosecond timestamp of termination, or `0` if not yet terminated.
    pub fn stop_time(&self) -> u64 {
        self.stop_time
    }

    /// The current iteration counter.
    pub fn current_iteration(&self) -> u64 {
        self.current_iteration
    }

    /// The outcome path set by a successful termination, if any.
    pub fn ok_path(&self) -> Option<&str> {
        self.ok_path.as_deref()
    }

    /// The outcome path set by a rejection, if any.
    pub fn reject_path(&self) -> Option<&str> {
        self.reject_path.as_deref()
    }

    /// The outcome path set by a failure, if any.
    pub fn fail_path(&self) -> Option<&str> {
        self.fail_path.as_deref()
    }

    /// The message carried by a throwable-derived failure, if any.
    pub fn fail_message(&self) -> Option<&str> {
        self.fail_message.as_deref()
    }

    /// The elapsed nanoseconds between `create_time` and `stop_time` (or
    /// `now`, if not yet stopped), used to classify `Slow` status and to
    /// render the duration segment.
    pub(crate) fn elapsed_since_create(&self, now: u64) -> u64 {
        let end = if self.stop_time > 0 { self.stop_time } else { now };
        end.saturating_sub(self.create_time)
    }

    /// The elapsed nanoseconds since `start_time` (or `0` if not started).
    pub(crate) fn elapsed_since_start(&self, now: u64) -> u64 {
        if self.start_time == 0 {
            return 0;
        }
        let end = if self.stop_time > 0 { self.stop_time } else { now };
        end.saturating_sub(self.start_time)
    }
}
