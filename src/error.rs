use thiserror::Error;

/// Store-layer error type.
pub type StoreError = Box<dyn std::error::Error + Send + Sync>;

/// Crate result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by this crate.
///
/// Per-request authorization outcomes are booleans and resolution outcomes
/// are [`Resolution`](crate::Resolution) variants; neither travels through
/// this enum. The only failure that crosses the `has_perm` family is
/// [`Error::Store`], kept distinct so callers can fail closed instead of
/// treating a backend outage as a denial.
#[derive(Debug, Error)]
pub enum Error {
    /// Store read failed (timeout, connection error).
    #[error("store error: {0}")]
    Store(#[source] StoreError),
    /// Invalid identifier input.
    #[error("invalid id: {0}")]
    InvalidId(String),
    /// Invalid permission codename input.
    #[error("invalid codename: {0}")]
    InvalidCodename(String),
    /// Invalid or incomplete resolver configuration, fatal at initialization.
    #[error("configuration error: {0}")]
    Config(String),
    /// Attempted to attach a role or permission across tenant boundaries.
    #[error("tenant mismatch: {0}")]
    TenantMismatch(String),
}

impl From<StoreError> for Error {
    fn from(error: StoreError) -> Self {
        Self::Store(error)
    }
}
