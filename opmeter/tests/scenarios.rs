//! End-to-end meter lifecycle scenarios, run with `--features testing` so
//! records are captured in-process instead of going through a real `slog`
//! drain. One test per scenario family described by the source design's
//! concrete examples.

use opmeter::testing::with_test_records;
use opmeter::{Meter, Path, RejectMatch, State};

#[test]
fn happy_path_single_operation() {
    let records = with_test_records(|| {
        let mut m = Meter::new("scenario::happy", Some("op"), None);
        m.start();
        m.ok();
        assert_eq!(m.state(), State::Ok);
    });

    assert!(records.iter().any(|r| r.marker == "MsgStart"));
    assert!(records.iter().any(|r| r.marker == "DataStart"));
    assert!(records.iter().any(|r| r.marker == "MsgOk"));
    assert!(records.iter().any(|r| r.marker == "DataOk"));
}

#[test]
fn progress_emits_once_then_is_rate_limited_within_the_default_period() {
    use opmeter::FixedTimeSource;
    use std::sync::Arc;

    // progress_period_ms defaults to 2000ms (2e9 ns). start() at t=0; the
    // first progress() lands 3s later (past the period, so it emits and
    // becomes the new rate-limit baseline); the second lands 1ns after
    // that (well within the period, so it's swallowed).
    let records = with_test_records(|| {
        let mut m = Meter::new("scenario::progress", Some("op"), None)
            .with_time_source(Arc::new(FixedTimeSource::new([
                0,
                3_000_000_000,
                3_000_000_001,
                4_000_000_000,
            ])));
        m.start();
        m.inc();
        m.inc();
        m.progress();
        m.progress();
        m.ok();
    });

    assert_eq!(records.iter().filter(|r| r.marker == "MsgProgress").count(), 1);
}

#[test]
fn slow_ok_with_path_sets_outcome_and_slow_flag() {
    let records = with_test_records(|| {
        let mut m = Meter::new("scenario::slow", Some("op"), None);
        m.limit_ms(1).start();
        std::thread::sleep(std::time::Duration::from_millis(5));
        m.ok_with(Some(Path::text("abc")));
        assert_eq!(m.data().ok_path(), Some("abc"));
    });

    let msg_ok = records.iter().find(|r| r.marker == "MsgOk").unwrap();
    assert!(msg_ok.message.contains("Slow"));
    assert!(msg_ok.message.contains("[abc]"));
}

#[test]
fn self_correcting_fail_without_start_leaves_start_time_at_zero() {
    let records = with_test_records(|| {
        let mut m = Meter::new("scenario::self_correct", Some("op"), None);
        m.fail_with(Some(Path::named("technical_error")));
        assert_eq!(m.state(), State::Failed);
        assert_eq!(m.data().start_time(), 0);
        assert_eq!(m.data().fail_path(), Some("technical_error"));
    });

    assert!(records.iter().any(|r| r.marker == "InconsistentFail"));
    assert!(records.iter().any(|r| r.marker == "MsgFail"));
}

#[test]
fn post_terminal_mutation_is_refused_and_logged() {
    let records = with_test_records(|| {
        let mut m = Meter::new("scenario::post_terminal", Some("op"), None);
        m.start();
        m.ok();

        m.inc();
        m.ctx("k", Some("v"));

        assert_eq!(m.data().current_iteration(), 0);
        assert!(m.data().context().get("k").is_none());
    });

    assert!(records.iter().any(|r| r.marker == "InconsistentIncrement"));
    assert!(records.iter().any(|r| r.marker == "Illegal"));
}

#[test]
fn nested_sub_meter_inherits_context_and_nests_operation() {
    let records = with_test_records(|| {
        let mut parent = Meter::new("scenario::nested", Some("parentOp"), None);
        parent.ctx("user", Some("alice"));
        parent.ctx("action", Some("import"));
        parent.start();

        let mut child = parent.sub(Some("child"));
        assert_eq!(child.data().operation(), Some("parentOp/child"));
        assert_eq!(child.data().parent(), Some(parent.full_id().as_str()));

        // The context is inherited and still live here, before termination.
        assert_eq!(
            child.data().context().get("user").map(String::as_str),
            Some("alice")
        );
        assert_eq!(
            child.data().context().get("action").map(String::as_str),
            Some("import")
        );

        child.start();
        child.ok();

        parent.ok();
    });

    // After termination the live accessor is cleared; the context survives
    // only in the already-emitted terminal data record. Disambiguate from
    // the parent's own `DataOk` (same logger) by the `operation` field.
    let child_data_ok = records
        .iter()
        .find(|r| {
            r.marker == "DataOk"
                && r.fields
                    .iter()
                    .any(|(k, v)| k == "operation" && v == "parentOp/child")
        })
        .expect("child meter should have emitted a DataOk record");
    let field = |key: &str| {
        child_data_ok
            .fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    };
    assert_eq!(field("ctx.user"), Some("alice"));
    assert_eq!(field("ctx.action"), Some("import"));
}

#[derive(Debug)]
struct NotFound;
impl std::fmt::Display for NotFound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("not found")
    }
}
impl std::error::Error for NotFound {}

#[test]
fn run_or_reject_routes_matched_errors_to_reject() {
    with_test_records(|| {
        let mut m = Meter::new("scenario::executor", None, None);
        let classifiers = [RejectMatch::of::<NotFound>("NotFound")];

        let outcome = opmeter::run_or_reject(&mut m, &classifiers, |_| {
            Err(Box::new(NotFound) as opmeter::Error)
        });

        assert!(outcome.is_err());
        assert_eq!(m.state(), State::Rejected);
        assert_eq!(m.data().reject_path(), Some("NotFound"));
    });
}

#[test]
fn call_returns_value_and_terminates_ok_with_synthetic_description() {
    with_test_records(|| {
        let mut m = Meter::new("scenario::call", None, None);
        let value = opmeter::call(&mut m, |_| Ok::<_, opmeter::Error>(7)).unwrap();
        assert_eq!(value, 7);
        assert_eq!(m.state(), State::Ok);
        assert_eq!(m.data().description(), Some("result=7"));
    });
}
