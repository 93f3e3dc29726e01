//! Pure predicates for every caller-facing [`crate::Meter`] operation.
//!
//! Each predicate, on failure, both emits the error record (level `ERROR`,
//! a caller call-site location, a message of the form `"<reason>; id=<full_id>"`)
//! and returns `false`. A returned `false` must cause the calling method to
//! exit without mutating state.

use crate::backend;
use crate::data::State;
use crate::marker::Marker;
use slog::Level;

/// Emits the validator's `ERROR`-level record for a refused or
/// self-correcting operation.
#[track_caller]
fn log_violation(logger_name: &str, marker: Marker, reason: &str, full_id: &str) {
    let location = std::panic::Location::caller();
    let message = format!("{reason}; id={full_id}");
    backend::emit(
        logger_name,
        Level::Error,
        marker,
        &message,
        &[(
            "caller".to_string(),
            format!("{}:{}", location.file(), location.line()),
        )],
    );
}

/// Validates `description`/`description_fmt`/`iterations`/`limit_ms`/`ctx`
/// calls: permitted only pre-termination.
#[track_caller]
pub(crate) fn check_configurable(logger_name: &str, state: State, full_id: &str) -> bool {
    if state.is_terminal() {
        log_violation(logger_name, Marker::Illegal, "meter already terminated", full_id);
        return false;
    }
    true
}

/// Emits the `Illegal` record for `description_fmt(None)`; the description
/// is still cleared by the caller.
#[track_caller]
pub(crate) fn log_violation_for_format(logger_name: &str, full_id: &str) {
    log_violation(
        logger_name,
        Marker::Illegal,
        "formatted description must not be null",
        full_id,
    );
}

/// Emits the `Illegal` record for `path()` called before `start()`.
#[track_caller]
pub(crate) fn log_violation_for_path_in_created(logger_name: &str, full_id: &str) {
    log_violation(
        logger_name,
        Marker::Illegal,
        "path hint is not valid before start",
        full_id,
    );
}

/// Validates a positive-integer argument (`iterations`, `limit_ms`, `inc_by`, `inc_to`).
#[track_caller]
pub(crate) fn check_positive(logger_name: &str, value: u64, what: &str, full_id: &str) -> bool {
    if value == 0 {
        log_violation(
            logger_name,
            Marker::Illegal,
            &format!("{what} must be positive"),
            full_id,
        );
        return false;
    }
    true
}

/// Validates `start()`: refused (`InconsistentStart`) unless `state == Created`.
#[track_caller]
pub(crate) fn check_start(logger_name: &str, state: State, full_id: &str) -> bool {
    if state != State::Created {
        log_violation(
            logger_name,
            Marker::InconsistentStart,
            "meter already started or terminated",
            full_id,
        );
        return false;
    }
    true
}

/// Validates `inc`/`inc_by`/`inc_to`: refused (`InconsistentIncrement`)
/// unless `state == Started`. The state precondition is checked before any
/// argument validity.
#[track_caller]
pub(crate) fn check_started_for_increment(logger_name: &str, state: State, full_id: &str) -> bool {
    if state != State::Started {
        log_violation(
            logger_name,
            Marker::InconsistentIncrement,
            "meter not started",
            full_id,
        );
        return false;
    }
    true
}

/// Validates `progress()`: refused (`InconsistentProgress`) unless
/// `state == Started`.
#[track_caller]
pub(crate) fn check_started_for_progress(logger_name: &str, state: State, full_id: &str) -> bool {
    if state != State::Started {
        log_violation(
            logger_name,
            Marker::InconsistentProgress,
            "meter not started",
            full_id,
        );
        return false;
    }
    true
}

/// Validates `inc_to(n)`: refused if `n` is non-forward relative to the
/// current iteration count. Only called after the state and positivity
/// checks both pass.
#[track_caller]
pub(crate) fn check_forward(logger_name: &str, n: u64, current: u64, full_id: &str) -> bool {
    if n <= current {
        log_violation(
            logger_name,
            Marker::Illegal,
            "inc_to must move the iteration counter forward",
            full_id,
        );
        return false;
    }
    true
}

/// Validates a termination call (`ok`/`reject`/`fail`): refused (`Illegal`)
/// from any terminal state. Returns `Outcome::Refused` in that case,
/// `Outcome::SelfCorrecting` from `Created` (flags `Inconsistent*` but
/// proceeds), or `Outcome::Normal` from `Started`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TerminationOutcome {
    Normal,
    SelfCorrecting,
    Refused,
}

#[track_caller]
pub(crate) fn check_termination(logger_name: &str, state: State, full_id: &str) -> TerminationOutcome {
    match state {
        State::Started => TerminationOutcome::Normal,
        State::Created => TerminationOutcome::SelfCorrecting,
        State::Ok | State::Rejected | State::Failed => {
            log_violation(
                logger_name,
                Marker::Illegal,
                "meter already terminated",
                full_id,
            );
            TerminationOutcome::Refused
        }
    }
}

/// Emits the `InconsistentOk`/`InconsistentReject`/`InconsistentFail`
/// warning record for a self-correcting termination from `Created`.
#[track_caller]
pub(crate) fn log_self_correcting(logger_name: &str, marker: Marker, full_id: &str) {
    log_violation(
        logger_name,
        marker,
        "terminated without ever being started",
        full_id,
    );
}

/// Emits the `Illegal` record for a null path argument passed to a
/// termination method; the termination still proceeds.
#[track_caller]
pub(crate) fn log_null_path(logger_name: &str, full_id: &str) {
    log_violation(logger_name, Marker::Illegal, "path must not be null", full_id);
}

/// Emits the mis-nesting warning when a meter terminates while it is not
/// the top of the thread-local current-instance stack. Non-blocking:
/// always returns regardless of the nesting state, it just logs.
pub(crate) fn warn_if_mis_nested(logger_name: &str, is_not_current: bool, full_id: &str) {
    if is_not_current {
        backend::emit(
            logger_name,
            Level::Error,
            Marker::Bug,
            &format!("meter out of order; id={full_id}"),
            &[],
        );
    }
}

/// Emits `InconsistentFinalized` for a meter dropped while started but not
/// stopped.
pub(crate) fn log_finalized_leak(logger_name: &str, full_id: &str) {
    backend::emit(
        logger_name,
        Level::Error,
        Marker::InconsistentFinalized,
        &format!("meter finalized while still started; id={full_id}"),
        &[],
    );
}

/// Emits `InconsistentException` for a [`crate::executor::safe_call`] whose
/// supplied wrapper itself failed, forcing the generic fallback wrapper.
pub(crate) fn log_inconsistent_exception(full_id: &str) {
    backend::emit(
        "opmeter::bug",
        Level::Error,
        Marker::InconsistentException,
        &format!("safeCall could not instantiate wrapping exception; id={full_id}"),
        &[],
    );
}

/// Emits the `Bug` record used by [`crate::executor`] wrappers when an
/// internal library method itself panics or errors unexpectedly.
pub(crate) fn log_bug(method_name: &str, cause: &str) {
    backend::emit(
        "opmeter::bug",
        Level::Error,
        Marker::Bug,
        &format!("internal error in {method_name}: {cause}"),
        &[],
    );
}
