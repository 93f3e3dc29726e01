//! High-level adapters that compose a [`crate::Meter`] with a user callback
//! and translate the callback's `Result` into a termination.
//!
//! A callback's `Err` terminates the meter (`fail`, or `reject` when it
//! matches a classifier) and is also propagated back to the caller.

use crate::meter::Meter;
use crate::path::Path;
use std::error::Error as StdError;
use std::fmt;

/// The generic wrapping error used by [`safe_call`] when no wrapper is
/// supplied, and the fallback used when a supplied wrapper itself fails.
#[derive(Debug)]
pub struct Failure {
    message: String,
    source: Option<crate::Error>,
}

impl Failure {
    /// A bare failure with no wrapped cause.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// A failure wrapping an original error as its `source`.
    pub fn wrapping(message: impl Into<String>, source: crate::Error) -> Self {
        Self {
            message: message.into(),
            source: Some(source),
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl StdError for Failure {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match &self.source {
            Some(e) => Some(e.as_ref()),
            None => None,
        }
    }
}

/// A single classifier passed to [`run_or_reject`] / [`call_or_reject`]:
/// names the reject path to use when a callback's error matches a given
/// Rust error type.
pub struct RejectMatch {
    reject_path: String,
    matches: Box<dyn Fn(&(dyn StdError + 'static)) -> bool + Send + Sync>,
}

impl RejectMatch {
    /// Builds a classifier that matches errors of type `E`, using
    /// `reject_path` as the literal reject path when it matches.
    pub fn of<E: StdError + 'static>(reject_path: impl Into<String>) -> Self {
        Self {
            reject_path: reject_path.into(),
            matches: Box::new(|e| e.is::<E>()),
        }
    }

    fn matches(&self, err: &(dyn StdError + Send + Sync + 'static)) -> bool {
        (self.matches)(err)
    }
}

fn ensure_started(meter: &mut Meter) {
    if meter.state() == crate::State::Created {
        meter.start();
    }
}

/// Runs `f`, starting `meter` first if it has not been started. Terminates
/// with `ok()` if `f` returns `Ok` and the meter is still non-terminal (the
/// callback may have terminated it itself); terminates with `fail(err)` and
/// re-raises if `f` returns `Err`.
pub fn run<F>(meter: &mut Meter, f: F) -> crate::Result<()>
where
    F: FnOnce(&mut Meter) -> crate::Result<()>,
{
    ensure_started(meter);
    match f(meter) {
        Ok(()) => {
            if !meter.state().is_terminal() {
                meter.ok();
            }
            Ok(())
        }
        Err(err) => {
            if !meter.state().is_terminal() {
                meter.fail_err(err.as_ref());
            }
            Err(err)
        }
    }
}

/// Like [`run`], but returns the callback's value. If the meter is still
/// non-terminal after `f` returns `Ok(value)`, terminates with `ok()` and a
/// synthetic description `"result=<value>"`.
pub fn call<T, F>(meter: &mut Meter, f: F) -> crate::Result<T>
where
    T: fmt::Display,
    F: FnOnce(&mut Meter) -> crate::Result<T>,
{
    ensure_started(meter);
    match f(meter) {
        Ok(value) => {
            if !meter.state().is_terminal() {
                meter.description(format!("result={value}"));
                meter.ok();
            }
            Ok(value)
        }
        Err(err) => {
            if !meter.state().is_terminal() {
                meter.fail_err(err.as_ref());
            }
            Err(err)
        }
    }
}

/// Like [`run`], but errors matching one of `classifiers` terminate via
/// `reject` with that classifier's reject path instead of `fail`.
pub fn run_or_reject<F>(meter: &mut Meter, classifiers: &[RejectMatch], f: F) -> crate::Result<()>
where
    F: FnOnce(&mut Meter) -> crate::Result<()>,
{
    ensure_started(meter);
    match f(meter) {
        Ok(()) => {
            if !meter.state().is_terminal() {
                meter.ok();
            }
            Ok(())
        }
        Err(err) => {
            if !meter.state().is_terminal() {
                terminate_classified(meter, classifiers, err.as_ref());
            }
            Err(err)
        }
    }
}

/// Value-returning variant of [`run_or_reject`].
pub fn call_or_reject<T, F>(meter: &mut Meter, classifiers: &[RejectMatch], f: F) -> crate::Result<T>
where
    T: fmt::Display,
    F: FnOnce(&mut Meter) -> crate::Result<T>,
{
    ensure_started(meter);
    match f(meter) {
        Ok(value) => {
            if !meter.state().is_terminal() {
                meter.description(format!("result={value}"));
                meter.ok();
            }
            Ok(value)
        }
        Err(err) => {
            if !meter.state().is_terminal() {
                terminate_classified(meter, classifiers, err.as_ref());
            }
            Err(err)
        }
    }
}

/// Identical to [`call_or_reject`]; kept as a separate name for callers who
/// want to spell out that the callback's error is treated as a checked
/// failure mode rather than an unexpected one. No behavioral difference.
pub fn call_or_reject_checked<T, F>(meter: &mut Meter, classifiers: &[RejectMatch], f: F) -> crate::Result<T>
where
    T: fmt::Display,
    F: FnOnce(&mut Meter) -> crate::Result<T>,
{
    call_or_reject(meter, classifiers, f)
}

fn terminate_classified(meter: &mut Meter, classifiers: &[RejectMatch], err: &(dyn StdError + Send + Sync + 'static)) {
    match classifiers.iter().find(|c| c.matches(err)) {
        Some(m) => {
            meter.reject_with(Some(Path::text(m.reject_path.clone())));
        }
        None => {
            meter.fail_err(err);
        }
    }
}

/// Runs `f`, terminates via `fail` on error exactly like [`run`]/[`call`],
/// then re-raises the error wrapped by `wrap` (or, if `wrap` is `None` or
/// itself returns `Err`, wrapped in a generic [`Failure`]). The
/// wrap-failed-so-fall-back-to-generic path also emits `InconsistentException`,
/// immediately below.
pub fn safe_call<T, F, W>(meter: &mut Meter, wrap: Option<W>, f: F) -> crate::Result<T>
where
    F: FnOnce(&mut Meter) -> crate::Result<T>,
    W: FnOnce(crate::Error) -> crate::Result<crate::Error>,
{
    ensure_started(meter);
    match f(meter) {
        Ok(value) => {
            if !meter.state().is_terminal() {
                meter.ok();
            }
            Ok(value)
        }
        Err(err) => {
            if !meter.state().is_terminal() {
                meter.fail_err(err.as_ref());
            }

            let wrapped = match wrap {
                Some(w) => match w(err) {
                    Ok(wrapped) => wrapped,
                    Err(original) => {
                        crate::validator::log_inconsistent_exception(&meter.full_id());
                        Box::new(Failure::wrapping("safeCall wrapped exception.", original))
                    }
                },
                None => Box::new(Failure::new("safeCall wrapped exception.")),
            };
            Err(wrapped)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::with_test_records;

    #[derive(Debug)]
    struct BadInput;
    impl fmt::Display for BadInput {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("bad input")
        }
    }
    impl StdError for BadInput {}

    #[test]
    fn run_terminates_ok_when_callback_succeeds() {
        with_test_records(|| {
            let mut m = Meter::new("exec::run", None, None);
            run(&mut m, |_| Ok(())).unwrap();
            assert_eq!(m.state(), crate::State::Ok);
        });
    }

    #[test]
    fn run_terminates_fail_and_propagates_error() {
        with_test_records(|| {
            let mut m = Meter::new("exec::run_fail", None, None);
            let result = run(&mut m, |_| Err(Box::new(BadInput) as crate::Error));
            assert!(result.is_err());
            assert_eq!(m.state(), crate::State::Failed);
        });
    }

    #[test]
    fn call_sets_synthetic_description_from_result() {
        with_test_records(|| {
            let mut m = Meter::new("exec::call", None, None);
            let value = call(&mut m, |_| Ok(42)).unwrap();
            assert_eq!(value, 42);
            assert_eq!(m.data().description(), Some("result=42"));
        });
    }

    #[test]
    fn run_or_reject_uses_matching_classifier() {
        with_test_records(|| {
            let mut m = Meter::new("exec::reject", None, None);
            let classifiers = [RejectMatch::of::<BadInput>("BadInput")];
            let result = run_or_reject(&mut m, &classifiers, |_| Err(Box::new(BadInput) as crate::Error));
            assert!(result.is_err());
            assert_eq!(m.state(), crate::State::Rejected);
            assert_eq!(m.data().reject_path(), Some("BadInput"));
        });
    }

    #[test]
    fn run_or_reject_falls_back_to_fail_for_unmatched_errors() {
        with_test_records(|| {
            let mut m = Meter::new("exec::reject_unmatched", None, None);
            let classifiers: [RejectMatch; 0] = [];
            let result = run_or_reject(&mut m, &classifiers, |_| Err(Box::new(BadInput) as crate::Error));
            assert!(result.is_err());
            assert_eq!(m.state(), crate::State::Failed);
        });
    }

    #[test]
    fn safe_call_wraps_with_generic_failure_when_no_wrapper_given() {
        with_test_records(|| {
            let mut m = Meter::new("exec::safe", None, None);
            let result: crate::Result<()> =
                safe_call(&mut m, None::<fn(crate::Error) -> crate::Result<crate::Error>>, |_| {
                    Err(Box::new(BadInput) as crate::Error)
                });
            let err = result.unwrap_err();
            assert_eq!(err.to_string(), "safeCall wrapped exception.");
            assert_eq!(m.state(), crate::State::Failed);
        });
    }

    #[test]
    fn callback_that_terminates_itself_is_not_re_terminated() {
        with_test_records(|| {
            let mut m = Meter::new("exec::self_terminate", None, None);
            run(&mut m, |meter| {
                meter.reject();
                Ok(())
            })
            .unwrap();
            assert_eq!(m.state(), crate::State::Rejected);
        });
    }
}
