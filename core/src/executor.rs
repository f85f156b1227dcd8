//! The seam between the client and whatever performs HTTP.
//!
//! An executor already carries authentication and TLS. It owns pooling,
//! timeouts and socket-level retries; the client never retries on its own.

use async_trait::async_trait;

use crate::http::{HttpRequest, HttpResponse};

/// Failure to obtain any response at all.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("transport failure: {0}")]
    Other(String),
}

/// Sends one request and resumes with the status and body.
#[async_trait]
pub trait HttpExecutor: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

#[async_trait]
impl<T: HttpExecutor + ?Sized> HttpExecutor for std::sync::Arc<T> {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        (**self).send(request).await
    }
}
