//! Produces the human-readable message and the structured data payload
//! from a [`crate::MeterData`] snapshot plus a [`Status`].
//!
//! Exact numeric typography (how many significant figures, which SI
//! threshold a duration crosses at) is not pinned to any external tool's
//! output; this module implements a reasonable, internally consistent
//! rendering scheme.

use crate::config::Config;
use crate::data::MeterData;

/// The renderer's label for a specific record kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// A meter was created but not yet started (only emitted if the caller
    /// chooses to log scheduling).
    Scheduled,
    /// A meter started.
    Started,
    /// A progress checkpoint.
    Progress,
    /// A meter terminated successfully.
    Ok,
    /// A meter was rejected.
    Reject,
    /// A meter failed.
    Fail,
}

impl Status {
    fn label(self) -> &'static str {
        match self {
            Status::Scheduled => "SCHEDULED",
            Status::Started => "STARTED",
            Status::Progress => "PROGRESS",
            Status::Ok => "OK",
            Status::Reject => "REJECT",
            Status::Fail => "FAIL",
        }
    }

    /// Whether this status's message includes the duration/rate segments;
    /// `Scheduled` and `Started` describe a point in time, not a span.
    fn includes_duration(self) -> bool {
        !matches!(self, Status::Scheduled | Status::Started)
    }
}

/// Renders the human-readable single-line message for `data` at `status`,
/// observing `now` for any still-running elapsed-time calculation.
pub(crate) fn render_message(data: &MeterData, status: Status, slow: bool, cfg: &Config, now: u64) -> String {
    let mut segments: Vec<String> = Vec::new();

    if cfg.print_status {
        if slow {
            segments.push(format!("{} (Slow):", status.label()));
        } else {
            segments.push(format!("{}:", status.label()));
        }
    }

    let mut scope = String::new();
    if cfg.print_category {
        scope.push_str(&data.category);
        if data.operation.is_some() || cfg.print_position {
            scope.push('/');
        }
    }
    if let Some(op) = &data.operation {
        scope.push_str(op);
    }
    if cfg.print_position {
        scope.push('#');
        scope.push_str(&data.position.to_string());
    }
    if !scope.is_empty() {
        segments.push(scope);
    }

    let path = outcome_path(data, status);
    if let Some(p) = path {
        // attach directly to the scope segment, producing an `"op[abc]"` shape
        if let Some(last) = segments.last_mut() {
            last.push('[');
            last.push_str(p);
            last.push(']');
        }
    }

    if status.includes_duration() {
        if let Some(iter_fragment) = iteration_fragment(data) {
            segments.push(iter_fragment);
        }

        let elapsed = data.elapsed_since_create(now);
        if elapsed > 0 {
            segments.push(format_duration(elapsed));
        }

        if let Some(rate) = rate_fragment(data, now) {
            segments.push(rate);
        }

        if !data.context.is_empty() {
            segments.push(format_context(data));
        }
    }

    segments.push(data.session_uuid.to_string());

    segments.join(" ")
}

fn outcome_path<'a>(data: &'a MeterData, status: Status) -> Option<&'a str> {
    match status {
        Status::Ok => data.ok_path.as_deref(),
        Status::Reject => data.reject_path.as_deref(),
        Status::Fail => data.fail_path.as_deref(),
        _ => None,
    }
}

fn iteration_fragment(data: &MeterData) -> Option<String> {
    if data.current_iteration == 0 && data.expected_iterations.is_none() {
        return None;
    }
    match data.expected_iterations {
        Some(expected) if expected > 0 => Some(format!("{}/{}", data.current_iteration, expected)),
        _ => Some(data.current_iteration.to_string()),
    }
}

fn rate_fragment(data: &MeterData, now: u64) -> Option<String> {
    if data.current_iteration == 0 {
        return None;
    }
    let elapsed_ns = data.elapsed_since_start(now);
    if elapsed_ns == 0 {
        return None;
    }
    let elapsed_s = elapsed_ns as f64 / 1_000_000_000.0;
    let per_sec = data.current_iteration as f64 / elapsed_s;
    let per_iter_ns = elapsed_ns as f64 / data.current_iteration as f64;
    Some(format!(
        "{} {}",
        format_throughput(per_sec),
        format_duration(per_iter_ns.round() as u64)
    ))
}

fn format_context(data: &MeterData) -> String {
    data.context
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(",")
}

/// Formats a nanosecond duration using the smallest unit (`ns`, `us`, `ms`,
/// `s`) that keeps roughly three significant figures.
pub(crate) fn format_duration(nanos: u64) -> String {
    const US: f64 = 1_000.0;
    const MS: f64 = 1_000_000.0;
    const S: f64 = 1_000_000_000.0;

    let n = nanos as f64;
    if n < US {
        format!("{nanos}ns")
    } else if n < MS {
        format!("{:.1}us", n / US)
    } else if n < S {
        format!("{:.1}ms", n / MS)
    } else {
        format!("{:.1}s", n / S)
    }
}

/// Formats a per-second rate with an SI throughput suffix (`k/s`, `M/s`).
pub(crate) fn format_throughput(per_sec: f64) -> String {
    if per_sec >= 1_000_000.0 {
        format!("{:.1}M/s", per_sec / 1_000_000.0)
    } else if per_sec >= 1_000.0 {
        format!("{:.1}k/s", per_sec / 1_000.0)
    } else {
        format!("{per_sec:.1}/s")
    }
}

/// Renders the structured key-value data payload for `data` at `status`,
/// used for the parallel machine-parseable log stream.
pub(crate) fn render_data(
    data: &MeterData,
    status: Status,
    slow: bool,
    now: u64,
) -> Vec<(String, String)> {
    let mut fields = vec![
        ("status".to_string(), status.label().to_string()),
        ("slow".to_string(), slow.to_string()),
        ("id".to_string(), data.full_id()),
        ("category".to_string(), data.category.clone()),
    ];

    if let Some(op) = &data.operation {
        fields.push(("operation".to_string(), op.clone()));
    }
    if let Some(parent) = &data.parent {
        fields.push(("parent".to_string(), parent.clone()));
    }
    if let Some(desc) = &data.description {
        fields.push(("description".to_string(), desc.clone()));
    }

    fields.push(("createTime".to_string(), data.create_time.to_string()));
    fields.push(("startTime".to_string(), data.start_time.to_string()));
    fields.push(("stopTime".to_string(), data.stop_time.to_string()));
    fields.push(("currentIteration".to_string(), data.current_iteration.to_string()));

    if let Some(expected) = data.expected_iterations {
        fields.push(("expectedIterations".to_string(), expected.to_string()));
    }
    if let Some(limit) = data.time_limit_ms {
        fields.push(("timeLimitMs".to_string(), limit.to_string()));
    }

    if let Some(p) = &data.ok_path {
        fields.push(("okPath".to_string(), p.clone()));
    }
    if let Some(p) = &data.reject_path {
        fields.push(("rejectPath".to_string(), p.clone()));
    }
    if let Some(p) = &data.fail_path {
        fields.push(("failPath".to_string(), p.clone()));
    }
    if let Some(m) = &data.fail_message {
        fields.push(("failMessage".to_string(), m.clone()));
    }

    for (k, v) in &data.context {
        fields.push((format!("ctx.{k}"), v.clone()));
    }

    fields.push(("elapsedNanos".to_string(), data.elapsed_since_create(now).to_string()));

    fields
}

/// Whether `data` should be classified `Slow` given `cfg` is irrelevant
/// here; the threshold is purely `time_limit_ms` vs. elapsed.
pub(crate) fn is_slow(data: &MeterData, now: u64) -> bool {
    match data.time_limit_ms {
        Some(limit_ms) => data.elapsed_since_start(now) > limit_ms.saturating_mul(1_000_000),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::MeterData;

    fn sample(current_iteration: u64, expected: Option<u64>) -> MeterData {
        let mut d = MeterData::new("cat".into(), Some("op".into()), None, 1, 10);
        d.start_time = 20;
        d.current_iteration = current_iteration;
        d.expected_iterations = expected;
        d
    }

    #[test]
    fn iteration_fragment_omitted_when_zero_and_no_expected() {
        let d = sample(0, None);
        assert_eq!(iteration_fragment(&d), None);
    }

    #[test]
    fn iteration_fragment_is_bare_count_when_no_expected() {
        let d = sample(2, None);
        assert_eq!(iteration_fragment(&d), Some("2".to_string()));
    }

    #[test]
    fn iteration_fragment_is_fraction_when_expected_set() {
        let d = sample(2, Some(10));
        assert_eq!(iteration_fragment(&d), Some("2/10".to_string()));
    }

    #[test]
    fn format_duration_picks_smallest_unit() {
        assert_eq!(format_duration(500), "500ns");
        assert_eq!(format_duration(1_500), "1.5us");
        assert_eq!(format_duration(1_500_000), "1.5ms");
        assert_eq!(format_duration(1_500_000_000), "1.5s");
    }

    #[test]
    fn is_slow_compares_elapsed_since_start_to_limit() {
        let mut d = sample(0, None);
        d.time_limit_ms = Some(500);
        d.stop_time = 20 + 600 * 1_000_000;
        assert!(is_slow(&d, 0));

        d.stop_time = 20 + 400 * 1_000_000;
        assert!(!is_slow(&d, 0));
    }

    #[test]
    fn render_message_includes_path_in_brackets() {
        let mut d = sample(0, None);
        d.stop_time = 600;
        d.ok_path = Some("abc".to_string());
        let msg = render_message(&d, Status::Ok, false, &Config::default(), 0);
        assert!(msg.contains("op[abc]"));
    }
}
