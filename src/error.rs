use std::borrow::Cow;

/// Any error that may happen while encoding or decoding a datum
///
/// Errors are classified in a closed set of [`ErrorKind`]s so that callers
/// can distinguish e.g. malformed wire bytes from a schema-resolution
/// failure without parsing the message.
#[derive(thiserror::Error)]
#[error("{}", inner.message)]
pub struct Error {
	inner: Box<ErrorInner>,
}

struct ErrorInner {
	kind: ErrorKind,
	message: Cow<'static, str>,
	io_error: Option<std::io::Error>,
	cause: Option<Error>,
}

/// What category of failure an [`Error`] represents
///
/// This set is closed: every error raised by this crate falls into exactly
/// one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
	/// Truncated or invalid wire bytes (including overlong varints)
	Malformed,
	/// The parser expected one symbol but observed another
	TypeMismatch,
	/// A reader field is absent from the writer and carries no default
	MissingField,
	/// Strict JSON mode saw a field the reader schema does not declare
	UnknownField,
	/// A named-type reference could not be linked, or the schema text is
	/// invalid
	UnresolvedSchema,
	/// A logical-type conversion rejected a value
	LogicalType,
	/// A value matched no union branch on write, or the branch tag was
	/// missing on JSON read
	UnionBranch,
	/// A declared array/map count (or capture depth) exceeds the configured
	/// safety limit
	Capacity,
}

impl Error {
	/// If you need a dynamic string use `Error::custom(kind,
	/// format_args!(...))`
	pub(crate) fn new(kind: ErrorKind, message: &'static str) -> Self {
		Self {
			inner: Box::new(ErrorInner {
				kind,
				message: Cow::Borrowed(message),
				io_error: None,
				cause: None,
			}),
		}
	}

	pub(crate) fn custom(kind: ErrorKind, message: impl std::fmt::Display) -> Self {
		Self {
			inner: Box::new(ErrorInner {
				kind,
				message: Cow::Owned(message.to_string()),
				io_error: None,
				cause: None,
			}),
		}
	}

	pub(crate) fn unexpected_eof() -> Self {
		Self::new(ErrorKind::Malformed, "Unexpected end of input while decoding")
	}

	pub(crate) fn io(io_error: std::io::Error) -> Self {
		Self {
			inner: Box::new(ErrorInner {
				kind: ErrorKind::Malformed,
				message: Cow::Borrowed("Encountered IO error when attempting to read or write"),
				io_error: Some(io_error),
				cause: None,
			}),
		}
	}

	/// Wrap an underlying failure as a logical-type conversion error,
	/// preserving the original as [`cause`](Self::cause)
	pub(crate) fn logical(message: impl std::fmt::Display, cause: Error) -> Self {
		Self {
			inner: Box::new(ErrorInner {
				kind: ErrorKind::LogicalType,
				message: Cow::Owned(message.to_string()),
				io_error: None,
				cause: Some(cause),
			}),
		}
	}

	/// The category of this error
	pub fn kind(&self) -> ErrorKind {
		self.inner.kind
	}

	/// If this error was caused by an IO error, return it
	pub fn io_error(&self) -> Option<&std::io::Error> {
		self.inner.io_error.as_ref()
	}

	/// If this error wraps another (e.g. a `LogicalType` error wrapping the
	/// `Malformed` error that triggered it), return the original
	pub fn cause(&self) -> Option<&Error> {
		self.inner.cause.as_ref()
	}
}

impl std::fmt::Debug for Error {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{:?}: {}", self.inner.kind, self.inner.message)?;
		if let Some(io_error) = &self.inner.io_error {
			write!(f, ": {}", io_error)?;
		}
		if let Some(cause) = &self.inner.cause {
			write!(f, " (caused by {:?})", cause)?;
		}
		Ok(())
	}
}
