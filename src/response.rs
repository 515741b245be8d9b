//! The response side of an exchange.
//!
//! Steps do not return responses. They write into the [`Response`] carried by
//! the [`Exchange`](crate::Exchange), and the server sends whatever is there
//! once the chain has finished:
//!
//! ```rust
//! use http::{HeaderValue, StatusCode, header};
//! use pipes::Response;
//!
//! let mut res = Response::new();
//! res.write_status(StatusCode::CREATED);
//! res.set_header(header::LOCATION, HeaderValue::from_static("/users/42"));
//! res.write(r#"{"id":42}"#);
//!
//! assert_eq!(res.status(), StatusCode::CREATED);
//! assert_eq!(res.body(), br#"{"id":42}"#);
//! ```

use bytes::{Bytes, BytesMut};
use http::header::{HeaderMap, HeaderValue, IntoHeaderName};
use http::StatusCode;
use http_body_util::Full;
use tracing::warn;

/// An outgoing HTTP response, filled in by the steps of a pipeline.
///
/// The status is written at most once. The first explicit
/// [`write_status`](Response::write_status) wins; writing body bytes before
/// any status commits `200 OK`. A response nobody wrote to is `200 OK` with
/// an empty body.
#[derive(Debug, Default)]
pub struct Response {
    status: Option<StatusCode>,
    headers: HeaderMap,
    body: BytesMut,
}

impl Response {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commits the status code. Later calls are ignored.
    pub fn write_status(&mut self, status: StatusCode) {
        match self.status {
            None => self.status = Some(status),
            Some(committed) => {
                warn!(%committed, ignored = %status, "superfluous write_status call");
            }
        }
    }

    /// Appends `bytes` to the body, committing `200 OK` if no status was
    /// written yet.
    pub fn write(&mut self, bytes: impl AsRef<[u8]>) {
        self.status.get_or_insert(StatusCode::OK);
        self.body.extend_from_slice(bytes.as_ref());
    }

    /// Replaces any existing values of `name`.
    pub fn set_header<K: IntoHeaderName>(&mut self, name: K, value: HeaderValue) {
        self.headers.insert(name, value);
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap { &mut self.headers }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn body(&self) -> &[u8] { &self.body }

    pub fn status(&self) -> StatusCode {
        self.status.unwrap_or(StatusCode::OK)
    }

    /// Whether a status has been committed, explicitly or by a body write.
    pub fn is_written(&self) -> bool {
        self.status.is_some()
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// A bodiless response with `status` already committed.
    pub(crate) fn with_status(status: StatusCode) -> Self {
        Self { status: Some(status), ..Self::default() }
    }

    pub(crate) fn into_http(self) -> http::Response<Full<Bytes>> {
        let status = self.status();
        let mut res = http::Response::new(Full::new(self.body.freeze()));
        *res.status_mut() = status;
        *res.headers_mut() = self.headers;
        res
    }
}
