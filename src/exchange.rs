//! The request/response pair an HTTP pipeline runs against.

use crate::request::Request;
use crate::response::Response;

/// One HTTP request and the response being built for it.
///
/// Fields are public so a step can read the request while writing the
/// response.
#[derive(Debug)]
pub struct Exchange {
    pub request: Request,
    pub response: Response,
}

impl Exchange {
    pub fn new(request: Request) -> Self {
        Self { request, response: Response::new() }
    }
}
