//! The request executor contract and its `reqwest` implementation.

use std::sync::Arc;

use async_trait::async_trait;
use futures::TryStreamExt;

use super::body::Body;
use super::message::{Request, Response};
use crate::context::InvocationContext;
use crate::error_handling::{BoxError, TransportError};

/// Executes one HTTP request.
///
/// Implementations consume the request (including its body) and hand back
/// either a response, whose body the caller then owns, or an error. The
/// retrying transport implements this trait too, so decorators stack.
#[async_trait]
pub trait RequestExecutor: Send + Sync {
    /// Sends `request` and waits for the response head, honoring `ctx`.
    async fn execute(
        &self,
        request: Request,
        ctx: &InvocationContext,
    ) -> Result<Response, TransportError>;
}

#[async_trait]
impl<E> RequestExecutor for Arc<E>
where
    E: RequestExecutor + ?Sized,
{
    async fn execute(
        &self,
        request: Request,
        ctx: &InvocationContext,
    ) -> Result<Response, TransportError> {
        (**self).execute(request, ctx).await
    }
}

/// Executes requests over the network with a shared `reqwest::Client`.
///
/// The invocation context bounds the whole exchange up to the response head;
/// the body is streamed to the caller afterwards.
#[derive(Debug, Clone)]
pub struct ReqwestExecutor {
    client: Arc<reqwest::Client>,
}

impl ReqwestExecutor {
    /// Wraps a shared client.
    pub fn new(client: Arc<reqwest::Client>) -> Self {
        Self { client }
    }

    /// The wrapped client.
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    fn build(&self, request: Request) -> Result<reqwest::Request, TransportError> {
        let (method, url, headers, body) = request.into_parts();
        let mut builder = self.client.request(method, url).headers(headers);
        if let Some(body) = body {
            builder = match body.into_full() {
                Ok(bytes) => builder.body(bytes),
                Err(streamed) => builder.body(reqwest::Body::wrap_stream(streamed.into_stream())),
            };
        }
        Ok(builder.build()?)
    }
}

#[async_trait]
impl RequestExecutor for ReqwestExecutor {
    async fn execute(
        &self,
        request: Request,
        ctx: &InvocationContext,
    ) -> Result<Response, TransportError> {
        let request = self.build(request)?;
        log::trace!("{} {}", request.method(), request.url());

        let response = ctx.run(self.client.execute(request)).await??;
        let status = response.status();
        let headers = response.headers().clone();
        let stream = response.bytes_stream().map_err(|e| -> BoxError { Box::new(e) });
        Ok(Response::new(status, headers, Body::wrap_stream(stream)))
    }
}
