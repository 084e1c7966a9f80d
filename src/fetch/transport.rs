//! HTTP capability used by the fetch controller

use std::io::Read;

use crate::error::NetworkError;

pub const HTTP_OK: u16 = 200;

/// Content type of the optional POST payload, the render server parses it as a page
pub const PAYLOAD_CONTENT_TYPE: &str = "text/html";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

/// One request as handed to the transport
#[derive(Debug, Clone, Copy)]
pub struct FetchRequest<'a> {
    pub method: HttpMethod,
    pub url: &'a str,
    pub payload: Option<&'a [u8]>,
}

/// Response head plus a streaming body.
///
/// Body reads follow `std::io::Read` with one addition: `WouldBlock` or `TimedOut`
/// means nothing arrived yet and the caller may poll again, `Ok(0)` means the peer
/// closed the connection.
pub trait HttpResponse: Read {
    fn status(&self) -> u16;
    fn content_length(&self) -> Option<u64>;
}

pub trait HttpTransport {
    type Response<'a>: HttpResponse
    where
        Self: 'a;

    fn send<'a>(&'a mut self, request: &FetchRequest<'_>)
        -> Result<Self::Response<'a>, NetworkError>;
}
