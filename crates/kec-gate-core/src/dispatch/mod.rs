//! Outbound request dispatch.
//!
//! Instead of patching a process-wide request function, the application
//! obtains its dispatcher from a single owned `DispatchHandle`. While a
//! session is active the handle hands out a `RequestAugmenter` wrapped around
//! the base `HttpDispatcher`; otherwise it hands out the base itself.

pub mod augmenter;
pub mod handle;

use futures::future::BoxFuture;
use reqwest::{Client, Request, Response};
use thiserror::Error;

pub use augmenter::{apply_session_headers, RequestAugmenter, ALLOWED_SERVERS_HEADER, ROLE_HEADER};
pub use handle::DispatchHandle;

pub type DispatchFuture<'a> = BoxFuture<'a, reqwest::Result<Response>>;

/// Something that can send a fully built request.
pub trait Dispatch: Send + Sync {
    fn dispatch(&self, request: Request) -> DispatchFuture<'_>;
}

/// Activation contract violations.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AugmenterError {
    #[error("request augmenter is already installed")]
    AlreadyActive,

    #[error("request augmenter is not installed")]
    NotActive,
}

/// The unaugmented dispatcher: sends requests as-is.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Debug, Clone)]
pub struct HttpDispatcher {
    client: Client,
}

impl HttpDispatcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl Dispatch for HttpDispatcher {
    fn dispatch(&self, request: Request) -> DispatchFuture<'_> {
        Box::pin(self.client.execute(request))
    }
}
