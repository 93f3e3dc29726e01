//! Canonical coercion of caller-supplied outcome labels.
//!
//! A termination outcome can be labeled with a plain string, a named
//! constant, or derived from an error value. This crate models the three
//! as a closed sum type with a single coercion function, rather than
//! dispatching dynamically over an arbitrary object.

use std::fmt;

/// A caller-supplied outcome label, attached to a meter's termination.
///
/// Built via [`Path::text`], [`Path::named`], [`Path::exception`], or the
/// `From<&str>`/`From<String>` conversions for the common plain-string case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Path {
    /// A plain caller-supplied string.
    Text(String),
    /// The declared name of an enumerated constant.
    Named(String),
    /// The simple and full type name plus message of a `fail()` argument
    /// that behaves like a thrown exception.
    Exception {
        /// Full type name (used as `fail_path` for `fail()` terminations).
        type_name: String,
        /// The exception's message, if any.
        message: Option<String>,
    },
    /// The canonical string representation (`Display`) of any other value.
    Other(String),
}

impl Path {
    /// A plain string path.
    pub fn text(value: impl Into<String>) -> Self {
        Path::Text(value.into())
    }

    /// The declared name of an enumerated constant.
    pub fn named(name: impl Into<String>) -> Self {
        Path::Named(name.into())
    }

    /// An exception-like path: a type name plus an optional message, used
    /// by [`crate::Meter::fail_err`] and [`crate::executor`] wrappers.
    pub fn exception(type_name: impl Into<String>, message: Option<String>) -> Self {
        Path::Exception {
            type_name: type_name.into(),
            message,
        }
    }

    /// The canonical string representation of any `Display`-able value.
    pub fn display(value: &impl fmt::Display) -> Self {
        Path::Other(value.to_string())
    }

    /// Coerces this path to the single string stored on `MeterData`'s
    /// `ok_path` / `reject_path` fields. For `fail()`, use
    /// [`Path::fail_coercion`] instead, since exceptions contribute both a
    /// path and a separate message.
    pub fn to_path_string(&self) -> String {
        match self {
            Path::Text(s) => s.clone(),
            Path::Named(s) => s.clone(),
            Path::Exception { type_name, .. } => type_name.clone(),
            Path::Other(s) => s.clone(),
        }
    }

    /// Coerces this path for a `fail()` termination: returns
    /// `(fail_path, fail_message)`. Only the `Exception` variant populates a
    /// message; every other variant leaves `fail_message` null, per
    /// path.
    pub fn fail_coercion(&self) -> (String, Option<String>) {
        match self {
            Path::Exception {
                type_name,
                message,
            } => (type_name.clone(), message.clone()),
            other => (other.to_path_string(), None),
        }
    }
}

impl From<&str> for Path {
    fn from(s: &str) -> Self {
        Path::Text(s.to_string())
    }
}

impl From<String> for Path {
    fn from(s: String) -> Self {
        Path::Text(s)
    }
}

impl From<&String> for Path {
    fn from(s: &String) -> Self {
        Path::Text(s.clone())
    }
}

/// The three ways a caller can invoke a path-accepting termination method:
/// omit the argument entirely, explicitly pass a null/absent value, or
/// supply a real value.
///
/// Distinguishing `None` (no argument given) from `Null` (an explicit null)
/// matters because only the latter triggers the `Illegal` marker described
/// in the `Illegal` marker emitted for an explicit null path argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathArg {
    /// No argument was supplied at all (e.g. a bare `ok()` call).
    None,
    /// An explicit null/`None` value was supplied.
    Null,
    /// A real path value.
    Value(Path),
}

/// Conversion into a [`PathArg`], implemented for `Option<impl Into<Path>>`
/// so that `meter.ok_with(None::<&str>)` and `meter.ok_with(Some("done"))`
/// both type-check.
pub trait IntoPathArg {
    /// Converts `self` into a [`PathArg`].
    fn into_path_arg(self) -> PathArg;
}

impl<T: Into<Path>> IntoPathArg for Option<T> {
    fn into_path_arg(self) -> PathArg {
        match self {
            Some(v) => PathArg::Value(v.into()),
            None => PathArg::Null,
        }
    }
}

impl IntoPathArg for Path {
    fn into_path_arg(self) -> PathArg {
        PathArg::Value(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_and_named_coerce_to_their_string() {
        assert_eq!(Path::text("abc").to_path_string(), "abc");
        assert_eq!(Path::named("TECHNICAL_ERROR").to_path_string(), "TECHNICAL_ERROR");
    }

    #[test]
    fn exception_fail_coercion_splits_path_and_message() {
        let p = Path::exception("std::io::Error", Some("disk full".to_string()));
        let (path, msg) = p.fail_coercion();
        assert_eq!(path, "std::io::Error");
        assert_eq!(msg.as_deref(), Some("disk full"));
    }

    #[test]
    fn non_exception_fail_coercion_has_no_message() {
        let p = Path::text("abc");
        let (path, msg) = p.fail_coercion();
        assert_eq!(path, "abc");
        assert_eq!(msg, None);
    }

    #[test]
    fn option_none_becomes_null_path_arg() {
        let arg = None::<&str>.into_path_arg();
        assert_eq!(arg, PathArg::Null);
    }

    #[test]
    fn option_some_becomes_value_path_arg() {
        let arg = Some("abc").into_path_arg();
        assert_eq!(arg, PathArg::Value(Path::Text("abc".to_string())));
    }
}
