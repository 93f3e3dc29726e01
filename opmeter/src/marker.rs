//! The enumerated tag attached to every log record.

use std::fmt;

/// Tag attached to every record emitted by a [`crate::Meter`], consumed by
/// structured log parsers and by the [`crate::meter`] validator to flag
/// inconsistencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Marker {
    /// A meter started (human-readable stream).
    MsgStart,
    /// A meter terminated successfully (human-readable stream).
    MsgOk,
    /// A meter was rejected (human-readable stream).
    MsgReject,
    /// A meter failed (human-readable stream).
    MsgFail,
    /// A progress checkpoint (human-readable stream).
    MsgProgress,
    /// A meter started (structured data stream).
    DataStart,
    /// A meter terminated successfully (structured data stream).
    DataOk,
    /// A meter was rejected (structured data stream).
    DataReject,
    /// A meter failed (structured data stream).
    DataFail,
    /// A progress checkpoint (structured data stream).
    DataProgress,
    /// A caller supplied an invalid argument to an otherwise-permitted
    /// operation; the operation was refused and state left unchanged.
    Illegal,
    /// `start()` was called while already started or terminated; refused.
    InconsistentStart,
    /// A self-correcting `ok()` termination from `Created` (never started).
    InconsistentOk,
    /// A self-correcting `reject()` termination from `Created`.
    InconsistentReject,
    /// A self-correcting `fail()` termination from `Created`.
    InconsistentFail,
    /// An increment operation (`inc`/`inc_by`/`inc_to`) was attempted while
    /// not started; refused.
    InconsistentIncrement,
    /// `progress()` was called while not started; refused.
    InconsistentProgress,
    /// A meter was dropped after being started but before being terminated.
    InconsistentFinalized,
    /// A `safe_call` wrapper could not instantiate the requested wrapping
    /// exception type and fell back to a generic one.
    InconsistentException,
    /// An unexpected internal error occurred within the library itself.
    Bug,
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Marker::MsgStart => "MsgStart",
            Marker::MsgOk => "MsgOk",
            Marker::MsgReject => "MsgReject",
            Marker::MsgFail => "MsgFail",
            Marker::MsgProgress => "MsgProgress",
            Marker::DataStart => "DataStart",
            Marker::DataOk => "DataOk",
            Marker::DataReject => "DataReject",
            Marker::DataFail => "DataFail",
            Marker::DataProgress => "DataProgress",
            Marker::Illegal => "Illegal",
            Marker::InconsistentStart => "InconsistentStart",
            Marker::InconsistentOk => "InconsistentOk",
            Marker::InconsistentReject => "InconsistentReject",
            Marker::InconsistentFail => "InconsistentFail",
            Marker::InconsistentIncrement => "InconsistentIncrement",
            Marker::InconsistentProgress => "InconsistentProgress",
            Marker::InconsistentFinalized => "InconsistentFinalized",
            Marker::InconsistentException => "InconsistentException",
            Marker::Bug => "Bug",
        };
        f.write_str(s)
    }
}
