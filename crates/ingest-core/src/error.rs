use std::fmt;

pub type Result<T> = std::result::Result<T, Error>;

/// Cross-cutting error type shared by the broker, pipeline, and config layers.
///
/// Crate-local failure modes (parse shape, DDL recovery) get their own
/// `thiserror` enums in `ingest-parser`/`ingest-db`; this type exists for the
/// handful of errors that legitimately cross crate boundaries.
#[derive(Debug)]
pub struct Error {
    inner: anyhow::Error,
}

impl Error {
    pub fn msg(message: impl Into<String>) -> Self {
        Self {
            inner: anyhow::anyhow!(message.into()),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.inner.fmt(f)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.inner.source()
    }
}

impl From<anyhow::Error> for Error {
    fn from(value: anyhow::Error) -> Self {
        Self { inner: value }
    }
}
