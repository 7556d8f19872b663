//! Error taxonomy for the client core.
//!
//! All of these surface as a status-bar message; none crash the app and
//! none trigger an automatic retry.

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum EaselError {
    /// Import document is not a `{name, shapes}` painting file.
    #[error("invalid painting file: {0}")]
    Validation(String),

    /// Bad credentials or a rejected login.
    #[error("login failed: {0}")]
    Auth(String),

    /// Network or transport failure on any remote call.
    #[error("connection error: {0}")]
    Connection(String),

    /// Load or delete of a painting id no longer present.
    #[error("not found: {0}")]
    NotFound(String),

    /// A save/load/delete is already outstanding (single-flight guard).
    #[error("another sync operation is in progress")]
    Busy,
}
