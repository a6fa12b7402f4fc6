use std::time::SystemTime;

/// Value of the `Server` header on every response.
pub const SERVER_NAME: &str = "broker-probe";

/// HTTP status codes the control plane can answer with.
///
/// - `Ok` (200): Immediate query or publish succeeded
/// - `NoContent` (204): Awaited condition observed, or queue purged
/// - `Forbidden` (403): Awaited condition resolved false
/// - `NotFound` (404): No such route, queue or exchange
/// - `InternalServerError` (500): Malformed input or unexpected failure
/// - `GatewayTimeout` (504): Awaited condition did not settle in time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    /// 200 OK
    Ok,
    /// 204 No Content
    NoContent,
    /// 403 Forbidden
    Forbidden,
    /// 404 Not Found
    NotFound,
    /// 500 Internal Server Error
    InternalServerError,
    /// 504 Gateway Timeout
    GatewayTimeout,
}

impl StatusCode {
    /// Returns the numeric HTTP status code.
    ///
    /// # Example
    ///
    /// ```
    /// # use broker_probe::http::response::StatusCode;
    /// assert_eq!(StatusCode::Ok.as_u16(), 200);
    /// assert_eq!(StatusCode::GatewayTimeout.as_u16(), 504);
    /// ```
    pub fn as_u16(&self) -> u16 {
        match self {
            StatusCode::Ok => 200,
            StatusCode::NoContent => 204,
            StatusCode::Forbidden => 403,
            StatusCode::NotFound => 404,
            StatusCode::InternalServerError => 500,
            StatusCode::GatewayTimeout => 504,
        }
    }

    /// Returns the standard HTTP reason phrase for this status code.
    pub fn reason_phrase(&self) -> &'static str {
        match self {
            StatusCode::Ok => "OK",
            StatusCode::NoContent => "No Content",
            StatusCode::Forbidden => "Forbidden",
            StatusCode::NotFound => "Not Found",
            StatusCode::InternalServerError => "Internal Server Error",
            StatusCode::GatewayTimeout => "Gateway Timeout",
        }
    }

    /// Fixed body sent with this status by the canned constructors.
    pub fn canned_body(&self) -> &'static [u8] {
        match self {
            StatusCode::Ok => b"ok\n",
            StatusCode::NoContent => b"",
            StatusCode::Forbidden => b"forbidden\n",
            StatusCode::NotFound => b"not found\n",
            StatusCode::InternalServerError => b"internal server error\n",
            StatusCode::GatewayTimeout => b"timeout\n",
        }
    }
}

/// A complete HTTP response ready to be sent to a client.
///
/// Headers keep their insertion order; the writer emits them as-is.
#[derive(Debug, Clone)]
pub struct Response {
    /// The HTTP status code
    pub status: StatusCode,
    /// HTTP headers in wire order
    pub headers: Vec<(String, String)>,
    /// Response body as bytes
    pub body: Vec<u8>,
}

/// Builder for HTTP responses.
///
/// Every built response carries, in this order, `Date`, `Server`,
/// `Content-Length` and `Connection: close`.
///
/// # Example
///
/// ```ignore
/// let response = ResponseBuilder::new(StatusCode::Ok)
///     .body(b"[]\n".to_vec())
///     .build();
/// ```
pub struct ResponseBuilder {
    status: StatusCode,
    date: Option<SystemTime>,
    body: Vec<u8>,
}

impl ResponseBuilder {
    /// Creates a new response builder with the specified status code.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            date: None,
            body: Vec::new(),
        }
    }

    /// Pins the `Date` header instead of using the current time.
    pub fn date(mut self, date: SystemTime) -> Self {
        self.date = Some(date);
        self
    }

    /// Sets the response body.
    pub fn body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    /// Builds the final Response.
    ///
    /// `Content-Length` always matches the body; it cannot be overridden.
    pub fn build(self) -> Response {
        let date = self.date.unwrap_or_else(SystemTime::now);
        let headers = vec![
            ("Date".to_string(), httpdate::fmt_http_date(date)),
            ("Server".to_string(), SERVER_NAME.to_string()),
            ("Content-Length".to_string(), self.body.len().to_string()),
            ("Connection".to_string(), "close".to_string()),
        ];

        Response {
            status: self.status,
            headers,
            body: self.body,
        }
    }
}

impl Response {
    /// A response carrying the fixed body for `status`.
    pub fn canned(status: StatusCode) -> Self {
        ResponseBuilder::new(status)
            .body(status.canned_body().to_vec())
            .build()
    }

    /// Creates a 200 OK response; a trailing newline is appended to `body`.
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        let mut body = body.into();
        body.push(b'\n');
        ResponseBuilder::new(StatusCode::Ok).body(body).build()
    }

    /// Creates a 204 No Content response with an empty body.
    pub fn no_content() -> Self {
        Self::canned(StatusCode::NoContent)
    }

    pub fn forbidden() -> Self {
        Self::canned(StatusCode::Forbidden)
    }

    pub fn not_found() -> Self {
        Self::canned(StatusCode::NotFound)
    }

    pub fn internal_error() -> Self {
        Self::canned(StatusCode::InternalServerError)
    }

    pub fn gateway_timeout() -> Self {
        Self::canned(StatusCode::GatewayTimeout)
    }

    /// Retrieves a header value by name, ignoring ASCII case.
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }
}
