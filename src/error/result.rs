//! Result type alias for deckhand operations.

use super::context::ErrorContext;
use super::deck_error::DeckError;

/// Type alias for Results using DeckError.
pub type DeckResult<T> = Result<T, DeckError>;

/// Extension trait for Result types to add context to errors.
pub trait ResultExt<T> {
    /// Add context to an error if the result is Err.
    ///
    /// # Example
    ///
    /// ```ignore
    /// use deckhand::error::{ErrorContext, ResultExt};
    ///
    /// let snapshot = sessions
    ///     .poll("w-1")
    ///     .await
    ///     .context(ErrorContext::new("poll").with_widget_id("w-1"))?;
    /// ```
    fn context(self, ctx: ErrorContext) -> DeckResult<T>;

    /// Add context using a closure (only called on error).
    fn with_context<F>(self, f: F) -> DeckResult<T>
    where
        F: FnOnce() -> ErrorContext;
}

impl<T, E: Into<DeckError>> ResultExt<T> for Result<T, E> {
    fn context(self, ctx: ErrorContext) -> DeckResult<T> {
        self.map_err(|e| Into::<DeckError>::into(e).with_context(ctx))
    }

    fn with_context<F>(self, f: F) -> DeckResult<T>
    where
        F: FnOnce() -> ErrorContext,
    {
        self.map_err(|e| Into::<DeckError>::into(e).with_context(f()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_context_only_on_error() {
        let ok: DeckResult<u8> = Ok(1);
        assert_eq!(ok.context(ErrorContext::new("poll")).unwrap(), 1);

        let err: DeckResult<u8> = Err(DeckError::new(ErrorKind::RateLimited, "429"));
        let err = err.with_context(|| ErrorContext::new("poll")).unwrap_err();
        assert_eq!(err.context().unwrap().operation, "poll");
    }

    #[test]
    fn test_context_converts_store_errors() {
        let err: Result<(), crate::store::StoreError> =
            Err(crate::store::StoreError::NotFound("w-9".to_string()));
        let err = err
            .context(ErrorContext::new("set_secret").with_widget_id("w-9"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationError);
        assert_eq!(err.context().unwrap().widget_id.as_deref(), Some("w-9"));
    }
}
