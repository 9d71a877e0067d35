use serde::{Deserialize, Serialize};
use std::backtrace::{Backtrace, BacktraceStatus};
use std::error::Error;
use std::fmt;

pub type Result<T, E = FeatherError> = std::result::Result<T, E>;

/// Create an error indicating some functionality isn't implemented yet.
#[macro_export]
macro_rules! not_implemented {
    ($($arg:tt)*) => {
        $crate::FeatherError::new(format!("Not yet implemented: {}", format!($($arg)*)))
    };
}

/// Kinds of faults raised by the encoding/decoding core.
///
/// Every kind is fatal for the current file operation. None of them are
/// retried internally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Alignment or physical type requested for a type without a layout.
    UnsupportedLayout,
    /// Host type incompatible with a logical column type.
    UnmappableColumn,
    /// Neither name nor ordinal matching relates category levels to an enum.
    UnresolvableCategoryMapping,
    /// Input element not accepted by the requested widening target.
    UnwidenableValue,
    /// Decoded cell cannot be converted to the requested type.
    IncompatibleCast,
    /// A logical child stream tried to write behind its own cursor.
    BackwardSeek,
    /// A logical child stream was removed twice.
    DoubleDisposal,
    /// The physical sink or source failed.
    Io,
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::UnsupportedLayout => "unsupported layout",
            Self::UnmappableColumn => "unmappable column",
            Self::UnresolvableCategoryMapping => "unresolvable category mapping",
            Self::UnwidenableValue => "unwidenable value",
            Self::IncompatibleCast => "incompatible cast",
            Self::BackwardSeek => "backward seek",
            Self::DoubleDisposal => "double disposal",
            Self::Io => "io",
            Self::Internal => "internal",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug)]
pub struct FeatherError {
    kind: ErrorKind,
    msg: String,
    source: Option<Box<dyn Error + Send + Sync>>,
    backtrace: Backtrace,
}

impl FeatherError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::Internal, msg)
    }

    pub fn with_kind(kind: ErrorKind, msg: impl Into<String>) -> Self {
        FeatherError {
            kind,
            msg: msg.into(),
            source: None,
            backtrace: Backtrace::capture(),
        }
    }

    pub fn with_source(msg: impl Into<String>, source: Box<dyn Error + Send + Sync>) -> Self {
        FeatherError {
            kind: ErrorKind::Internal,
            msg: msg.into(),
            source: Some(source),
            backtrace: Backtrace::capture(),
        }
    }

    pub fn unsupported_layout(msg: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::UnsupportedLayout, msg)
    }

    pub fn unmappable_column(msg: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::UnmappableColumn, msg)
    }

    pub fn unresolvable_category_mapping(msg: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::UnresolvableCategoryMapping, msg)
    }

    pub fn unwidenable_value(msg: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::UnwidenableValue, msg)
    }

    pub fn incompatible_cast(msg: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::IncompatibleCast, msg)
    }

    pub fn backward_seek(msg: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::BackwardSeek, msg)
    }

    pub fn double_disposal(msg: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::DoubleDisposal, msg)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn get_msg(&self) -> &str {
        self.msg.as_str()
    }

    pub fn get_backtrace(&self) -> Option<&Backtrace> {
        if self.backtrace.status() == BacktraceStatus::Captured {
            Some(&self.backtrace)
        } else {
            None
        }
    }

    /// Keep the kind, prefix the message with additional context.
    fn wrap(self, context: impl Into<String>) -> Self {
        FeatherError {
            kind: self.kind,
            msg: format!("{}: {}", context.into(), self.msg),
            source: self.source,
            backtrace: self.backtrace,
        }
    }
}

impl From<std::io::Error> for FeatherError {
    fn from(value: std::io::Error) -> Self {
        FeatherError {
            kind: ErrorKind::Io,
            msg: "IO error".to_string(),
            source: Some(Box::new(value)),
            backtrace: Backtrace::capture(),
        }
    }
}

impl From<fmt::Error> for FeatherError {
    fn from(value: fmt::Error) -> Self {
        FeatherError::with_source("Format error", Box::new(value))
    }
}

impl From<std::num::TryFromIntError> for FeatherError {
    fn from(value: std::num::TryFromIntError) -> Self {
        FeatherError::with_source("Integer conversion error", Box::new(value))
    }
}

impl From<std::string::FromUtf8Error> for FeatherError {
    fn from(value: std::string::FromUtf8Error) -> Self {
        FeatherError::with_source("Invalid utf8", Box::new(value))
    }
}

impl From<std::str::Utf8Error> for FeatherError {
    fn from(value: std::str::Utf8Error) -> Self {
        FeatherError::with_source("Invalid utf8", Box::new(value))
    }
}

impl fmt::Display for FeatherError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.msg, self.kind)?;
        if let Some(source) = &self.source {
            write!(f, "\nError source: {source}")?;
        }
        Ok(())
    }
}

impl Error for FeatherError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as _)
    }
}

/// Extension trait for adding context to foreign errors.
pub trait ResultExt<T, E> {
    /// Wrap an error with a static context string.
    fn context(self, msg: &'static str) -> Result<T>;

    /// Wrap an error with a context string generated from a function.
    fn context_fn<F: Fn() -> String>(self, f: F) -> Result<T>;
}

impl<T, E: Error + Send + Sync + 'static> ResultExt<T, E> for std::result::Result<T, E> {
    fn context(self, msg: &'static str) -> Result<T> {
        match self {
            Ok(v) => Ok(v),
            Err(e) => Err(FeatherError::with_source(msg, Box::new(e))),
        }
    }

    fn context_fn<F: Fn() -> String>(self, f: F) -> Result<T> {
        match self {
            Ok(v) => Ok(v),
            Err(e) => Err(FeatherError::with_source(f(), Box::new(e))),
        }
    }
}

/// Add context to an error already in the taxonomy without losing its kind.
pub trait FeatherResultExt<T> {
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T> FeatherResultExt<T> for Result<T> {
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| e.wrap(f()))
    }
}

pub trait OptionExt<T> {
    /// Return an error if the option is None.
    fn required(self, msg: &'static str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn required(self, msg: &'static str) -> Result<T> {
        match self {
            Some(v) => Ok(v),
            None => Err(FeatherError::new(msg)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_are_io_kind() {
        let err: FeatherError = std::io::Error::other("disk gone").into();
        assert_eq!(ErrorKind::Io, err.kind());
        assert!(err.to_string().contains("disk gone"));
    }

    #[test]
    fn context_keeps_kind() {
        let res: Result<()> = Err(FeatherError::backward_seek("position 3 is behind 8"));
        let err = res.with_context(|| "child 2".to_string()).unwrap_err();
        assert_eq!(ErrorKind::BackwardSeek, err.kind());
        assert_eq!("child 2: position 3 is behind 8", err.get_msg());
    }

    #[test]
    fn required_on_none() {
        let err = None::<i32>.required("missing levels").unwrap_err();
        assert_eq!(ErrorKind::Internal, err.kind());
        assert_eq!("missing levels", err.get_msg());
    }

    #[test]
    fn not_implemented_message() {
        let err = not_implemented!("binary layout for {}", "col_a");
        assert_eq!("Not yet implemented: binary layout for col_a", err.get_msg());
    }
}
