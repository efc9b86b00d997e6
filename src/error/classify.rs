//! Default classification of raw integration failures.
//!
//! Adapters call [`classify`] from their `Integration::classify` unless the
//! upstream gives a status a different meaning (qBittorrent answers 403 for an
//! expired SID, for example).

use super::integration::IntegrationError;
use super::kind::ErrorKind;
use crate::traits::HttpError;

/// Map an HTTP status into the shared taxonomy.
pub fn classify_status(status: u16) -> ErrorKind {
    match status {
        401 => ErrorKind::AuthExpired,
        403 | 429 => ErrorKind::RateLimited,
        400 | 404 | 405 | 409 | 413 | 415 | 422 => ErrorKind::ValidationError,
        408 | 502 | 503 | 504 => ErrorKind::ConnectionError,
        _ => ErrorKind::UnknownError,
    }
}

/// Map a transport failure into the shared taxonomy.
pub fn classify_transport(err: &HttpError) -> ErrorKind {
    match err {
        HttpError::ConnectionFailed(_) | HttpError::Timeout(_) | HttpError::Io(_) => {
            ErrorKind::ConnectionError
        }
        HttpError::ServerError { status, .. } => classify_status(*status),
        HttpError::InvalidUrl(_) => ErrorKind::ValidationError,
        HttpError::Cancelled | HttpError::Other(_) => ErrorKind::UnknownError,
    }
}

/// Default mapping from a raw integration failure to an [`ErrorKind`].
pub fn classify(err: &IntegrationError) -> ErrorKind {
    match err {
        IntegrationError::Transport(http) => classify_transport(http),
        IntegrationError::Status { status, .. } => classify_status(*status),
        IntegrationError::LoginRejected { .. } => ErrorKind::AuthInvalid,
        IntegrationError::SessionExpired { .. } => ErrorKind::AuthExpired,
        IntegrationError::Decryption { .. } => ErrorKind::DecryptionError,
        IntegrationError::Validation { .. } | IntegrationError::UnsupportedCommand { .. } => {
            ErrorKind::ValidationError
        }
        IntegrationError::InvalidResponse { .. } => ErrorKind::UnknownError,
        IntegrationError::Unreachable { .. } => ErrorKind::ConnectionError,
    }
}
