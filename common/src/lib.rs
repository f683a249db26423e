//! Shared plumbing for the work-platform services.

pub mod tracing;

/// Boxed error type for binary-level glue code.
///
/// Library crates define their own `thiserror` enums; this alias is for the
/// places where errors are only ever reported, never matched on.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Result alias over [`BoxError`].
pub type BoxResult<T> = Result<T, BoxError>;
