//! `opmeter` instruments a bounded unit of work (a "meter") and emits
//! correlated log records describing its lifecycle, progress, outcome, and
//! performance relative to a declared time budget.
//!
//! A [`Meter`] moves through a small state machine:
//!
//! ```text
//! Created -> Started -> { Ok | Rejected | Failed }
//! ```
//!
//! with two self-correcting shortcut edges straight from `Created` to a
//! terminal state, used when a meter is terminated without ever being
//! started. Every public method on [`Meter`] validates its preconditions
//! before mutating state; refused calls are observed only through the log
//! stream, never through a returned `Err` or a panic.
//!
//! # Quick start
//!
//! ```
//! use opmeter::Meter;
//!
//! let mut m = Meter::new("my_app::importer", Some("import_batch"), None);
//! m.description("importing a batch of records")
//!     .iterations(100)
//!     .limit_ms(5_000)
//!     .start();
//!
//! for _ in 0..100 {
//!     m.inc();
//! }
//!
//! m.ok();
//! ```
//!
//! # Testing
//!
//! Enable the `testing` feature to capture emitted records in-process for
//! assertions, instead of routing them through a real `slog` drain:
//!
//! ```
//! # #[cfg(feature = "testing")]
//! # {
//! use opmeter::testing::with_test_records;
//! use opmeter::Meter;
//!
//! let records = with_test_records(|| {
//!     let mut m = Meter::new("my_app::importer", None, None);
//!     m.start();
//!     m.ok();
//! });
//!
//! assert!(records.iter().any(|r| r.marker == "MsgOk"));
//! # }
//! ```

mod backend;
mod config;
mod data;
mod executor;
mod identity;
mod marker;
mod meter;
mod path;
mod renderer;
mod scope;
mod time_source;
mod validator;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use config::Config;
#[cfg(any(test, feature = "testing"))]
pub use config::ConfigOverrideGuard;
pub use data::{MeterData, State};
pub use executor::{
    call, call_or_reject, call_or_reject_checked, run, run_or_reject, safe_call, Failure, RejectMatch,
};
pub use marker::Marker;
pub use meter::Meter;
pub use path::{IntoPathArg, Path};
pub use renderer::Status;
pub use scope::CurrentMeterInfo;
#[cfg(any(test, feature = "testing"))]
pub use time_source::FixedTimeSource;
pub use time_source::TimeSource;

/// Operational error without backtraces, used by the small number of
/// fallible setup operations this crate exposes (`init`, `Config::from_env`).
///
/// Caller misuse of a [`Meter`]'s lifecycle is never reported through this
/// type: invalid operations are observed only via the log stream.
pub type Error = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Initializes the process-wide logging backend from the given [`Config`].
///
/// Does nothing if called more than once; the first call wins.
pub fn init(config: Config) -> Result<()> {
    backend::init(config)
}
