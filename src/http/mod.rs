//! HTTP message model and the request executor seam.
//!
//! The transport never talks to the network itself. It hands `Request`s to a
//! `RequestExecutor` and inspects the `Response` or `TransportError` it gets
//! back. `ReqwestExecutor` is the network-backed executor.

mod body;
mod executor;
mod message;

pub use body::{Body, ReleaseHook};
pub use executor::{ReqwestExecutor, RequestExecutor};
pub use message::{BodyFactory, Request, Response};
pub(crate) use message::RequestTemplate;
