//! Request and response types passed through the transport.

use std::sync::Arc;

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use url::Url;

use super::body::Body;
use crate::error_handling::BoxError;

/// Produces a fresh copy of a request body for a retry attempt.
pub type BodyFactory = Arc<dyn Fn() -> Result<Body, BoxError> + Send + Sync>;

/// An outbound HTTP request.
///
/// The body is consumed by the executor. If a replay factory is attached, the
/// transport can rebuild the body for a retry; without one, retries are sent
/// with no body.
pub struct Request {
    method: Method,
    url: Url,
    headers: HeaderMap,
    body: Option<Body>,
    replay: Option<BodyFactory>,
}

impl Request {
    /// A request with no headers and no body.
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
            replay: None,
        }
    }

    /// A `GET` request for `url`.
    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    /// Request method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Target URL.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Request headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Mutable request headers.
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// The body of the next attempt, if any.
    pub fn body(&self) -> Option<&Body> {
        self.body.as_ref()
    }

    /// Removes and returns the body.
    pub fn take_body(&mut self) -> Option<Body> {
        self.body.take()
    }

    /// Whether retries can regenerate the body.
    pub fn has_replay(&self) -> bool {
        self.replay.is_some()
    }

    /// Adds a header, replacing any previous value with the same name.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Sets a one-shot body. Retries of this request are sent without a body.
    pub fn with_body(mut self, body: impl Into<Body>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Sets a buffered body that is replayed byte-for-byte on every retry.
    pub fn with_replayable_body(self, bytes: impl Into<Bytes>) -> Self {
        let bytes = bytes.into();
        let factory_bytes = bytes.clone();
        self.with_body(bytes)
            .with_body_factory(Arc::new(move || Ok(Body::from(factory_bytes.clone()))))
    }

    /// Attaches a factory that regenerates the body for retries.
    ///
    /// The first attempt still uses the body set with `with_body`; when no
    /// body was set, the factory also provides the first one.
    pub fn with_body_factory(mut self, factory: BodyFactory) -> Self {
        self.replay = Some(factory);
        self
    }

    /// Materializes the first-attempt body from the factory when none was set.
    pub(crate) fn prime_body(&mut self) -> Result<(), BoxError> {
        if self.body.is_none() {
            if let Some(factory) = &self.replay {
                self.body = Some(factory()?);
            }
        }
        Ok(())
    }

    /// Splits off everything needed to derive retry attempts.
    pub(crate) fn template(&self) -> RequestTemplate {
        RequestTemplate {
            method: self.method.clone(),
            url: self.url.clone(),
            headers: self.headers.clone(),
            replay: self.replay.clone(),
            had_body: self.body.is_some(),
        }
    }

    pub(crate) fn into_parts(self) -> (Method, Url, HeaderMap, Option<Body>) {
        (self.method, self.url, self.headers, self.body)
    }
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Request")
            .field("method", &self.method)
            .field("url", &self.url.as_str())
            .field("headers", &self.headers)
            .field("body", &self.body)
            .field("replayable", &self.replay.is_some())
            .finish()
    }
}

/// Method, target and headers of a request, plus its body replay capability.
#[derive(Clone)]
pub(crate) struct RequestTemplate {
    method: Method,
    url: Url,
    headers: HeaderMap,
    replay: Option<BodyFactory>,
    had_body: bool,
}

impl RequestTemplate {
    /// A request that carried a body it cannot replay.
    pub(crate) fn loses_body(&self) -> bool {
        self.had_body && self.replay.is_none()
    }

    /// Derives the next attempt: same method, target and headers, fresh body.
    pub(crate) fn derive(&self) -> Result<Request, BoxError> {
        let body = match &self.replay {
            Some(factory) => Some(factory()?),
            None => None,
        };
        Ok(Request {
            method: self.method.clone(),
            url: self.url.clone(),
            headers: self.headers.clone(),
            body,
            replay: self.replay.clone(),
        })
    }
}

/// A response returned by an executor.
///
/// Whoever ends up holding a response owns its body and must read or release it.
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Body,
}

impl Response {
    /// Builds a response from its parts.
    pub fn new(status: StatusCode, headers: HeaderMap, body: Body) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// A response with the given status and no headers or body.
    pub fn with_status(status: StatusCode) -> Self {
        Self::new(status, HeaderMap::new(), Body::empty())
    }

    /// Response status.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Response headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Response body.
    pub fn body(&self) -> &Body {
        &self.body
    }

    /// Takes ownership of the body.
    pub fn into_body(self) -> Body {
        self.body
    }

    /// Reads the whole body.
    pub async fn bytes(self) -> Result<Bytes, BoxError> {
        self.body.collect().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::CONTENT_TYPE;

    fn url() -> Url {
        Url::parse("https://registry-1.docker.io/v2/library/busybox/blobs/uploads/")
            .expect("valid url")
    }

    #[test]
    fn test_template_derives_identical_head() {
        let request = Request::new(Method::PUT, url())
            .with_header(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let template = request.template();
        let derived = template.derive().expect("no factory, no failure");

        assert_eq!(derived.method(), &Method::PUT);
        assert_eq!(derived.url(), request.url());
        assert_eq!(derived.headers(), request.headers());
        assert!(derived.body().is_none());
        assert!(!template.loses_body());
    }

    #[tokio::test]
    async fn test_replayable_body_is_byte_identical() {
        let request = Request::new(Method::POST, url()).with_replayable_body("{\"a\":1}");
        assert!(request.has_replay());
        let template = request.template();
        assert!(!template.loses_body());

        for _ in 0..3 {
            let mut derived = template.derive().expect("factory succeeds");
            let body = derived.take_body().expect("body replayed");
            assert_eq!(body.collect().await.unwrap(), "{\"a\":1}");
        }
    }

    #[test]
    fn test_one_shot_body_is_lost_on_retry() {
        let request = Request::new(Method::POST, url()).with_body("payload");
        let template = request.template();
        assert!(template.loses_body());
        assert!(template.derive().unwrap().body().is_none());
    }

    #[test]
    fn test_factory_failure_surfaces() {
        let request = Request::new(Method::POST, url())
            .with_body("payload")
            .with_body_factory(Arc::new(|| Err("source file vanished".into())));
        let err = request.template().derive().expect_err("factory fails");
        assert_eq!(err.to_string(), "source file vanished");
    }

    #[tokio::test]
    async fn test_prime_body_from_factory() {
        let mut request = Request::new(Method::POST, url())
            .with_body_factory(Arc::new(|| Ok(Body::from("generated"))));
        assert!(request.body().is_none());
        request.prime_body().unwrap();
        let body = request.take_body().expect("primed");
        assert_eq!(body.collect().await.unwrap(), "generated");
    }

    #[test]
    fn test_response_accessors() {
        let response = Response::with_status(StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(response.headers().is_empty());
        assert!(response.body().is_empty());
    }
}
