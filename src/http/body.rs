//! Request and response bodies.

use bytes::{Bytes, BytesMut};
use futures::stream::BoxStream;
use futures::{Stream, StreamExt};

use crate::error_handling::BoxError;

/// Hook run when a body is released (closed) without being read to the end.
pub type ReleaseHook = Box<dyn FnOnce() -> Result<(), BoxError> + Send + Sync>;

enum Kind {
    Empty,
    Full(Bytes),
    Stream(BoxStream<'static, Result<Bytes, BoxError>>),
}

/// An HTTP message body: empty, fully buffered, or streamed.
///
/// A body can carry a release hook that runs when the body is closed. The
/// transport releases every response body it discards in favor of a retry and
/// aborts the call if the hook fails.
pub struct Body {
    kind: Kind,
    on_release: Option<ReleaseHook>,
}

impl Body {
    /// A body with no content.
    pub fn empty() -> Self {
        Self {
            kind: Kind::Empty,
            on_release: None,
        }
    }

    /// Wraps a stream of byte chunks.
    pub fn wrap_stream<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<Bytes, BoxError>> + Send + 'static,
    {
        Self {
            kind: Kind::Stream(stream.boxed()),
            on_release: None,
        }
    }

    /// Attaches a hook run by `release()`.
    pub fn with_release_hook<F>(mut self, hook: F) -> Self
    where
        F: FnOnce() -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.on_release = Some(Box::new(hook));
        self
    }

    /// Whether the body is known to carry no bytes (streams never are).
    pub fn is_empty(&self) -> bool {
        match &self.kind {
            Kind::Empty => true,
            Kind::Full(bytes) => bytes.is_empty(),
            Kind::Stream(_) => false,
        }
    }

    /// The buffered content, if this body is not streamed.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match &self.kind {
            Kind::Empty => Some(&[]),
            Kind::Full(bytes) => Some(bytes),
            Kind::Stream(_) => None,
        }
    }

    /// Reads the whole body into memory, then releases it.
    pub async fn collect(self) -> Result<Bytes, BoxError> {
        let Body { kind, on_release } = self;
        let bytes = match kind {
            Kind::Empty => Bytes::new(),
            Kind::Full(bytes) => bytes,
            Kind::Stream(mut stream) => {
                let mut buf = BytesMut::new();
                while let Some(chunk) = stream.next().await {
                    buf.extend_from_slice(&chunk?);
                }
                buf.freeze()
            }
        };
        if let Some(hook) = on_release {
            hook()?;
        }
        Ok(bytes)
    }

    /// Closes the body without reading it.
    pub fn release(self) -> Result<(), BoxError> {
        let Body { kind, on_release } = self;
        drop(kind);
        match on_release {
            Some(hook) => hook(),
            None => Ok(()),
        }
    }

    pub(crate) fn into_stream(self) -> BoxStream<'static, Result<Bytes, BoxError>> {
        match self.kind {
            Kind::Empty => futures::stream::empty().boxed(),
            Kind::Full(bytes) => futures::stream::once(async move { Ok(bytes) }).boxed(),
            Kind::Stream(stream) => stream,
        }
    }

    pub(crate) fn into_full(self) -> Result<Bytes, Self> {
        if let Kind::Stream(_) = &self.kind {
            return Err(self);
        }
        match self.kind {
            Kind::Full(bytes) => Ok(bytes),
            _ => Ok(Bytes::new()),
        }
    }
}

impl Default for Body {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<Bytes> for Body {
    fn from(bytes: Bytes) -> Self {
        Self {
            kind: Kind::Full(bytes),
            on_release: None,
        }
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Self::from(Bytes::from(bytes))
    }
}

impl From<String> for Body {
    fn from(s: String) -> Self {
        Self::from(Bytes::from(s))
    }
}

impl From<&'static str> for Body {
    fn from(s: &'static str) -> Self {
        Self::from(Bytes::from_static(s.as_bytes()))
    }
}

impl std::fmt::Debug for Body {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match &self.kind {
            Kind::Empty => "empty".to_string(),
            Kind::Full(bytes) => format!("{} bytes", bytes.len()),
            Kind::Stream(_) => "stream".to_string(),
        };
        f.debug_struct("Body")
            .field("kind", &kind)
            .field("release_hook", &self.on_release.is_some())
            .finish()
    }
}
