//! The downstream work the scheduler protects.

use std::future::Future;

use axum::{extract::Request, response::Response};
use futures_util::future::BoxFuture;
use thiserror::Error;

/// Failure raised while handling an admitted request.
///
/// The dispatcher turns every variant into `500 Internal Server Error`.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Internal(String),
}

pub type HandlerFuture<'a> = BoxFuture<'a, Result<Response, HandlerError>>;

/// Produces the terminal response for an admitted request.
///
/// Returning `Ok` is the terminal write. The dispatcher runs one call at a time.
pub trait Handler: Send + Sync + 'static {
    fn handle(&self, request: Request) -> HandlerFuture<'_>;
}

impl<F, Fut> Handler for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Response, HandlerError>> + Send + 'static,
{
    fn handle(&self, request: Request) -> HandlerFuture<'_> {
        Box::pin(self(request))
    }
}
