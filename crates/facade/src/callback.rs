//! Callback completion for any facade operation.
//!
//! Every [`SocialService`](crate::SocialService) operation returns
//! `Result<T, ErrorModel>`; awaiting it directly propagates failures.
//! [`with_callback`] turns the same operation into the callback form:
//!
//! ```no_run
//! # async fn demo(service: facade::SocialService) {
//! use facade::with_callback;
//!
//! let post = with_callback(service.fetch_post("p1"), |error, post| match (error, post) {
//!     (None, Some(post)) => println!("{:?}", post.text()),
//!     (Some(error), _) => eprintln!("failed: {error}"),
//!     _ => {}
//! })
//! .await;
//! # }
//! ```

use std::future::Future;

use objects::ErrorModel;

/// Awaits `operation` and reports its outcome to `callback`.
///
/// On success the callback receives `(None, Some(value))` and the value is
/// also returned. On failure the callback receives `(Some(error), None)` and
/// `None` is returned; the error is not propagated further.
pub async fn with_callback<T, F, C>(operation: F, callback: C) -> Option<T>
where
    T: Clone,
    F: Future<Output = Result<T, ErrorModel>>,
    C: FnOnce(Option<ErrorModel>, Option<T>),
{
    match operation.await {
        Ok(value) => {
            callback(None, Some(value.clone()));
            Some(value)
        }
        Err(error) => {
            tracing::debug!(code = %error.code(), "operation failed; reporting to callback");
            callback(Some(error), None);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use objects::codes;

    #[tokio::test]
    async fn success_reaches_callback_and_caller() {
        let mut seen = None;
        let value = with_callback(async { Ok::<_, ErrorModel>(5) }, |error, value| {
            assert!(error.is_none());
            seen = value;
        })
        .await;
        assert_eq!(value, Some(5));
        assert_eq!(seen, Some(5));
    }

    #[tokio::test]
    async fn failure_reaches_callback_only() {
        let mut seen = None;
        let value = with_callback(
            async { Err::<u8, _>(ErrorModel::from_code(codes::NOT_FOUND)) },
            |error, value| {
                assert!(value.is_none());
                seen = error;
            },
        )
        .await;
        assert_eq!(value, None);
        assert!(seen.unwrap().is(codes::NOT_FOUND));
    }
}
