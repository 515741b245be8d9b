//! Unified error type.

use std::fmt;

/// A boxed error produced by a fallible context constructor.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The error type returned by pipes' fallible operations.
///
/// Steps never return errors: they answer through the exchange. This type
/// surfaces the two things that can fail around them: building the initial
/// context, and the HTTP adapter's socket I/O.
#[derive(Debug)]
pub struct Error(Repr);

#[derive(Debug)]
enum Repr {
    Context(BoxError),
    Io(std::io::Error),
}

/// Broad category of an [`Error`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    /// The context constructor failed; no step ran.
    Context,
    /// Binding or accepting on the listener failed.
    Io,
}

impl Error {
    pub(crate) fn context(e: impl Into<BoxError>) -> Self {
        Self(Repr::Context(e.into()))
    }

    pub fn kind(&self) -> ErrorKind {
        match self.0 {
            Repr::Context(_) => ErrorKind::Context,
            Repr::Io(_) => ErrorKind::Io,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Repr::Context(e) => write!(f, "context: {e}"),
            Repr::Io(e) => write!(f, "io: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.0 {
            Repr::Context(e) => Some(e.as_ref()),
            Repr::Io(e) => Some(e),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self(Repr::Io(e))
    }
}
