//! The [`Meter`] state machine: applies validator verdicts, mutates
//! [`MeterData`], emits lifecycle log pairs, and manages the thread-local
//! current-instance stack.

use crate::backend::{self, logger_names};
use crate::data::{MeterData, State, NULL_CONTEXT_VALUE};
use crate::identity::next_position;
use crate::marker::Marker;
use crate::path::{IntoPathArg, Path, PathArg};
use crate::renderer::{self, Status};
use crate::scope::{self, CurrentMeterInfo};
use crate::time_source::{self, TimeSource};
use crate::validator::{self, TerminationOutcome};
use slog::Level;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Ok,
    Reject,
    Fail,
}

/// An instrumented, single-thread-use unit of work.
///
/// See the [crate-level docs](crate) for the lifecycle diagram. A `Meter`
/// is exclusively owned by the caller that constructed it (and, while
/// started, has a lightweight identity pushed onto a thread-local stack so
/// nested [`Meter::sub`] calls can discover their parent).
pub struct Meter {
    data: MeterData,
    state: State,
    time_source: Arc<dyn TimeSource>,
    message_logger: String,
    data_logger: String,
    path_hint: Option<String>,
    pushed_on_stack: bool,
    last_progress_nanos: u64,
}

impl Meter {
    /// Constructs a new meter in the `Created` state. `category` is the
    /// logger name this meter's records are routed through; `operation` is
    /// an optional sub-name; `parent_id` is the opaque full id of an
    /// enclosing meter, if any (see [`Meter::sub`] for the common way to
    /// set this).
    ///
    /// No log record is emitted by construction itself.
    pub fn new(category: impl Into<String>, operation: Option<&str>, parent_id: Option<&str>) -> Self {
        let category = category.into();
        let operation = operation.map(str::to_string);
        let parent_id = parent_id.map(str::to_string);
        let time_source = time_source::system();
        let position = next_position(&category, operation.as_deref());
        let now = time_source.now_nanos();

        let (message_logger, data_logger) = logger_names(&category);

        Meter {
            data: MeterData::new(category, operation, parent_id, position, now),
            state: State::Created,
            time_source,
            message_logger,
            data_logger,
            path_hint: None,
            pushed_on_stack: false,
            last_progress_nanos: 0,
        }
    }

    /// Overrides this meter's clock. Must be called before [`Meter::start`];
    /// behaviour after that point is unspecified. Used in tests to make
    /// elapsed-time-dependent assertions deterministic.
    pub fn with_time_source(mut self, time_source: Arc<dyn TimeSource>) -> Self {
        self.time_source = time_source;
        self
    }

    /// A read-only view of this meter's current state and attributes.
    pub fn data(&self) -> &MeterData {
        &self.data
    }

    /// This meter's current lifecycle state.
    pub fn state(&self) -> State {
        self.state
    }

    /// This meter's stable full identifier.
    pub fn full_id(&self) -> String {
        self.data.full_id()
    }

    fn now(&self) -> u64 {
        self.time_source.now_nanos()
    }

    // ---- configuration (valid only pre-termination) ----

    /// Sets this meter's description. Refused once terminated.
    pub fn description(&mut self, text: impl Into<String>) -> &mut Self {
        if validator::check_configurable(&self.message_logger, self.state, &self.data.full_id()) {
            self.data.description = Some(text.into());
        }
        self
    }

    /// Sets this meter's description from an already-formatted string, or
    /// clears it if `formatted` is `None`. A `None` formatted value both
    /// clears any previously set description and emits `Illegal`, per
    /// any other invalid format is accepted without logging.
    pub fn description_fmt(&mut self, formatted: Option<impl Into<String>>) -> &mut Self {
        let full_id = self.data.full_id();
        if !validator::check_configurable(&self.message_logger, self.state, &full_id) {
            return self;
        }

        match formatted {
            Some(text) => self.data.description = Some(text.into()),
            None => {
                self.data.description = None;
                validator::log_violation_for_format(&self.message_logger, &full_id);
            }
        }
        self
    }

    /// Declares an expected iteration count. Must be positive; refused
    /// (`Illegal`) otherwise.
    pub fn iterations(&mut self, n: u64) -> &mut Self {
        let full_id = self.data.full_id();
        if validator::check_configurable(&self.message_logger, self.state, &full_id)
            && validator::check_positive(&self.message_logger, n, "iterations", &full_id)
        {
            self.data.expected_iterations = Some(n);
        }
        self
    }

    /// Declares a time budget in milliseconds. Must be positive; refused
    /// (`Illegal`) otherwise.
    pub fn limit_ms(&mut self, n: u64) -> &mut Self {
        let full_id = self.data.full_id();
        if validator::check_configurable(&self.message_logger, self.state, &full_id)
            && validator::check_positive(&self.message_logger, n, "limit_ms", &full_id)
        {
            self.data.time_limit_ms = Some(n);
        }
        self
    }

    /// Sets a context entry. A `None` value is stored as the literal string
    /// `"<null>"`. Repeated calls with the same key
    /// overwrite the previous value while preserving its original position.
    pub fn ctx(&mut self, key: impl Into<String>, value: Option<impl Into<String>>) -> &mut Self {
        if validator::check_configurable(&self.message_logger, self.state, &self.data.full_id()) {
            let value = value.map(Into::into).unwrap_or_else(|| NULL_CONTEXT_VALUE.to_string());
            self.data.context.insert(key.into(), value);
        }
        self
    }

    /// Sets a key-only context marker, equivalent to `ctx(key, None)`.
    pub fn ctx_key(&mut self, key: impl Into<String>) -> &mut Self {
        self.ctx(key, None::<String>)
    }

    /// Conditionally sets a key-only context marker. If `cond` is `false`,
    /// this returns immediately with **no validation, no log record, and no
    /// mutation** — even on a terminated meter. This is intentional,
    /// if surprising. `name_false` is accepted only for signature symmetry
    /// with the two-label form and is never read.
    pub fn ctx_if(
        &mut self,
        cond: bool,
        name_true: impl Into<String>,
        _name_false: Option<impl Into<String>>,
    ) -> &mut Self {
        if !cond {
            return self;
        }
        self.ctx_key(name_true)
    }

    /// Accepts a path hint. Always refused (`Illegal`) while `Created`;
    /// while `Started`, the hint is accepted but does not itself set
    /// `ok_path`/`reject_path`/`fail_path` — only a terminal call does
    /// that.
    pub fn path(&mut self, p: impl Into<String>) -> &mut Self {
        let full_id = self.data.full_id();
        if self.state == State::Created {
            validator::log_violation_for_path_in_created(&self.message_logger, &full_id);
            return self;
        }
        if self.state == State::Started {
            self.path_hint = Some(p.into());
        }
        self
    }

    /// The hint most recently set via [`Meter::path`], if any.
    pub fn path_hint(&self) -> Option<&str> {
        self.path_hint.as_deref()
    }

    // ---- start ----

    /// Transitions `Created -> Started`. Refused (`InconsistentStart`) from
    /// any other state, in which case `start_time` is left untouched and no
    /// start records are re-emitted.
    pub fn start(&mut self) -> &mut Self {
        let full_id = self.data.full_id();
        if !validator::check_start(&self.message_logger, self.state, &full_id) {
            return self;
        }

        let now = self.now();
        self.data.start_time = now;
        self.last_progress_nanos = now;
        self.state = State::Started;

        scope::stack().push(CurrentMeterInfo {
            full_id: full_id.clone(),
            category: self.data.category.clone(),
        });
        self.pushed_on_stack = true;

        self.emit_pair(Status::Started, Level::Debug, Marker::MsgStart, Marker::DataStart, now);
        self
    }

    // ---- increments (valid only in Started) ----

    /// Increments the iteration counter by one.
    pub fn inc(&mut self) -> &mut Self {
        self.inc_by(1)
    }

    /// Increments the iteration counter by `n`. Refused (`Illegal`) if
    /// `n == 0`; the state precondition (must be `Started`) is checked
    /// first.
    pub fn inc_by(&mut self, n: u64) -> &mut Self {
        let full_id = self.data.full_id();
        if !validator::check_started_for_increment(&self.message_logger, self.state, &full_id) {
            return self;
        }
        if validator::check_positive(&self.message_logger, n, "inc_by", &full_id) {
            self.data.current_iteration = self.data.current_iteration.saturating_add(n);
        }
        self
    }

    /// Sets the iteration counter to `n`. Refused (`Illegal`) if `n == 0`
    /// or if `n` does not move the counter forward. The state precondition
    /// is checked before either argument check.
    pub fn inc_to(&mut self, n: u64) -> &mut Self {
        let full_id = self.data.full_id();
        if !validator::check_started_for_increment(&self.message_logger, self.state, &full_id) {
            return self;
        }
        if !validator::check_positive(&self.message_logger, n, "inc_to", &full_id) {
            return self;
        }
        if validator::check_forward(&self.message_logger, n, self.data.current_iteration, &full_id) {
            self.data.current_iteration = n;
        }
        self
    }

    // ---- progress (valid only in Started) ----

    /// Emits a progress checkpoint if at least `progress_period_ms` (per
    /// [`crate::Config`]) have elapsed since the last one (or since start).
    /// Refused (`InconsistentProgress`) if not started; otherwise silently
    /// swallowed if the period has not yet elapsed.
    pub fn progress(&mut self) -> &mut Self {
        let full_id = self.data.full_id();
        if !validator::check_started_for_progress(&self.message_logger, self.state, &full_id) {
            return self;
        }

        let now = self.now();
        let cfg = backend::config();
        let period_nanos = cfg.progress_period_ms.saturating_mul(1_000_000);

        if now.saturating_sub(self.last_progress_nanos) < period_nanos {
            return self;
        }

        self.last_progress_nanos = now;
        self.emit_pair(Status::Progress, Level::Info, Marker::MsgProgress, Marker::DataProgress, now);
        self
    }

    // ---- termination ----

    /// Terminates successfully, with no outcome path.
    pub fn ok(&mut self) -> &mut Self {
        self.terminate(Outcome::Ok, PathArg::None)
    }

    /// Terminates successfully with the given outcome path. `None` is
    /// accepted and triggers `Illegal` (the termination still proceeds,
    /// with `ok_path` left unset).
    pub fn ok_with(&mut self, path: impl IntoPathArg) -> &mut Self {
        self.terminate(Outcome::Ok, path.into_path_arg())
    }

    /// Terminates as rejected, with no outcome path.
    pub fn reject(&mut self) -> &mut Self {
        self.terminate(Outcome::Reject, PathArg::None)
    }

    /// Terminates as rejected with the given outcome path.
    pub fn reject_with(&mut self, path: impl IntoPathArg) -> &mut Self {
        self.terminate(Outcome::Reject, path.into_path_arg())
    }

    /// Terminates as failed, with no outcome path.
    pub fn fail(&mut self) -> &mut Self {
        self.terminate(Outcome::Fail, PathArg::None)
    }

    /// Terminates as failed with the given outcome path.
    pub fn fail_with(&mut self, path: impl IntoPathArg) -> &mut Self {
        self.terminate(Outcome::Fail, path.into_path_arg())
    }

    /// Terminates as failed using a Rust error as the throwable-equivalent
    /// argument: `fail_path` is set to `err`'s type name, `fail_message`
    /// to its `Display` rendering.
    pub fn fail_err<E: std::error::Error + ?Sized>(&mut self, err: &E) -> &mut Self {
        let path = Path::exception(std::any::type_name::<E>(), Some(err.to_string()));
        self.terminate(Outcome::Fail, PathArg::Value(path))
    }

    fn terminate(&mut self, outcome: Outcome, path_arg: PathArg) -> &mut Self {
        let full_id = self.data.full_id();
        let verdict = validator::check_termination(&self.message_logger, self.state, &full_id);

        let self_correcting = match verdict {
            TerminationOutcome::Refused => return self,
            TerminationOutcome::SelfCorrecting => true,
            TerminationOutcome::Normal => false,
        };

        if matches!(path_arg, PathArg::Null) {
            validator::log_null_path(&self.message_logger, &full_id);
        }

        match &path_arg {
            PathArg::Value(p) => match outcome {
                Outcome::Fail => {
                    let (path, message) = p.fail_coercion();
                    self.data.fail_path = Some(path);
                    self.data.fail_message = message;
                }
                Outcome::Ok => self.data.ok_path = Some(p.to_path_string()),
                Outcome::Reject => self.data.reject_path = Some(p.to_path_string()),
            },
            PathArg::None | PathArg::Null => {}
        }

        let now = self.now();
        self.data.stop_time = now;

        if self_correcting {
            let marker = match outcome {
                Outcome::Ok => Marker::InconsistentOk,
                Outcome::Reject => Marker::InconsistentReject,
                Outcome::Fail => Marker::InconsistentFail,
            };
            validator::log_self_correcting(&self.message_logger, marker, &full_id);
        } else {
            validator::warn_if_mis_nested(
                &self.message_logger,
                scope::stack().is_not_current(&full_id),
                &full_id,
            );
            if self.pushed_on_stack {
                scope::stack().pop();
                self.pushed_on_stack = false;
            }
        }

        self.state = match outcome {
            Outcome::Ok => State::Ok,
            Outcome::Reject => State::Rejected,
            Outcome::Fail => State::Failed,
        };

        let (status, msg_marker, data_marker, level) = match outcome {
            Outcome::Ok => (Status::Ok, Marker::MsgOk, Marker::DataOk, Level::Info),
            Outcome::Reject => (Status::Reject, Marker::MsgReject, Marker::DataReject, Level::Info),
            Outcome::Fail => (Status::Fail, Marker::MsgFail, Marker::DataFail, Level::Error),
        };
        self.emit_pair(status, level, msg_marker, data_marker, now);

        // The terminal log record above already carries the full context;
        // the live accessor returns an empty map after termination for all
        // three outcomes.
        self.data.context.clear();

        self
    }

    // ---- sub-meter creation ----

    /// Creates a new meter in the `Created` state whose category equals
    /// this meter's, whose operation is `self.operation / child_op` (or
    /// whichever of the two is set, or `None` if both are), whose parent is
    /// this meter's full id, and whose context is a snapshot of this
    /// meter's context at the moment of the call. Never mutates `self`.
    pub fn sub(&self, child_op: Option<&str>) -> Meter {
        let operation = match (&self.data.operation, child_op) {
            (Some(parent_op), Some(child)) => Some(format!("{parent_op}/{child}")),
            (Some(parent_op), None) => Some(parent_op.clone()),
            (None, Some(child)) => Some(child.to_string()),
            (None, None) => None,
        };

        let full_id = self.data.full_id();
        let mut child = Meter::new(self.data.category.clone(), operation.as_deref(), Some(full_id.as_str()));
        child.data.context = self.data.context.clone();
        child
    }

    // ---- thread-local current instance ----

    /// The top of the thread-local current-instance stack, or a sentinel
    /// with the reserved category `"UNKNOWN"` if no meter is currently
    /// started on this thread.
    pub fn current() -> CurrentMeterInfo {
        scope::stack().current()
    }

    /// `true` iff this meter is not the top of the thread-local
    /// current-instance stack (used to diagnose mis-nesting at
    /// termination; mis-nesting does not block termination).
    pub fn is_not_current(&self) -> bool {
        scope::stack().is_not_current(&self.data.full_id())
    }

    // ---- rendering helpers ----

    fn emit_pair(&self, status: Status, level: Level, msg_marker: Marker, data_marker: Marker, now: u64) {
        let cfg = backend::config();
        let slow = renderer::is_slow(&self.data, now);

        if backend::is_logger_enabled(&self.message_logger, level) {
            let message = renderer::render_message(&self.data, status, slow, &cfg, now);
            backend::emit(&self.message_logger, level, msg_marker, &message, &[]);
        }

        if backend::is_logger_enabled(&self.data_logger, Level::Trace) {
            let fields = renderer::render_data(&self.data, status, slow, now);
            backend::emit(&self.data_logger, Level::Trace, data_marker, "", &fields);
        }
    }
}

impl Drop for Meter {
    /// Emits `InconsistentFinalized` if this meter was started but never
    /// terminated. Does nothing for meters that never
    /// started, were fully terminated, or belong to the reserved `UNKNOWN`
    /// sentinel category.
    fn drop(&mut self) {
        if self.state == State::Started && self.data.category != scope::UNKNOWN_CATEGORY {
            validator::log_finalized_leak(&self.message_logger, &self.data.full_id());
        }
        if self.pushed_on_stack {
            scope::stack().pop();
        }
    }
}
