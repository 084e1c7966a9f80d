//! [`HttpTransport`] over the ESP-IDF HTTP client

use std::io;
use std::time::Duration;

use embedded_svc::http::Method;
use embedded_svc::io::Write as _;
use esp_idf_svc::http::client::{Configuration as HttpConfiguration, EspHttpConnection};
use esp_idf_svc::sys::{EspError, ESP_ERR_HTTP_EAGAIN};
use log::{debug, warn};

use crate::error::NetworkError;
use crate::fetch::transport::{
    FetchRequest, HttpMethod, HttpResponse, HttpTransport, PAYLOAD_CONTENT_TYPE,
};

pub struct EspTransport {
    timeout: Duration,
    connection: Option<EspHttpConnection>,
}

impl EspTransport {
    pub fn new(timeout_ms: u32) -> Self {
        Self {
            timeout: Duration::from_millis(timeout_ms as u64),
            connection: None,
        }
    }
}

/// Response head plus body of the connection it was read from
pub struct EspResponse<'a> {
    connection: &'a mut EspHttpConnection,
    status: u16,
    content_length: Option<u64>,
}

impl HttpResponse for EspResponse<'_> {
    fn status(&self) -> u16 {
        self.status
    }

    fn content_length(&self) -> Option<u64> {
        self.content_length
    }
}

impl io::Read for EspResponse<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.connection.read(buf).map_err(body_error)
    }
}

fn body_error(e: EspError) -> io::Error {
    if e.code() == ESP_ERR_HTTP_EAGAIN as i32 {
        io::ErrorKind::WouldBlock.into()
    } else {
        io::Error::other(format!("{e:?}"))
    }
}

fn connect_error(stage: &str, e: impl core::fmt::Debug) -> NetworkError {
    warn!("HTTP {} failed: {:?}", stage, e);
    NetworkError::Connect(format!("{stage}: {e:?}"))
}

impl HttpTransport for EspTransport {
    type Response<'a> = EspResponse<'a>;

    fn send<'a>(
        &'a mut self,
        request: &FetchRequest<'_>,
    ) -> Result<EspResponse<'a>, NetworkError> {
        // Fresh connection per attempt, a failed one may be left mid request
        self.connection = None;
        let config = HttpConfiguration {
            timeout: Some(self.timeout),
            ..Default::default()
        };
        let connection = self
            .connection
            .insert(EspHttpConnection::new(&config).map_err(|e| connect_error("setup", e))?);

        let content_length = request.payload.map(|p| p.len().to_string());
        let mut headers = vec![("Connection", "close")];
        let method = match request.method {
            HttpMethod::Get => Method::Get,
            HttpMethod::Post => {
                headers.push(("Content-Type", PAYLOAD_CONTENT_TYPE));
                if let Some(len) = content_length.as_deref() {
                    headers.push(("Content-Length", len));
                }
                Method::Post
            }
        };

        debug!("{:?} {}", method, request.url);
        connection
            .initiate_request(method, request.url, &headers)
            .map_err(|e| connect_error("request", e))?;
        if let (HttpMethod::Post, Some(payload)) = (request.method, request.payload) {
            connection
                .write_all(payload)
                .map_err(|e| connect_error("payload", e))?;
        }
        connection
            .initiate_response()
            .map_err(|e| connect_error("response", e))?;

        let status = connection.status();
        let content_length = connection
            .header("Content-Length")
            .or_else(|| connection.header("content-length"))
            .and_then(|value| value.trim().parse::<u64>().ok());
        debug!("HTTP {} with content length {:?}", status, content_length);

        Ok(EspResponse {
            connection,
            status,
            content_length,
        })
    }
}
