/// HTTP request methods understood by the control plane.
///
/// Anything else is rejected by the parser before it reaches the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// GET - Query broker state, possibly waiting on it
    GET,
    /// POST - Publish a message
    POST,
    /// PUT - Accepted on the wire, never routed
    PUT,
    /// DELETE - Purge queued messages
    DELETE,
}

impl Method {
    /// Parses an HTTP method from a string.
    ///
    /// # Arguments
    ///
    /// * `s` - String representation of the method (case-sensitive, uppercase)
    ///
    /// # Returns
    ///
    /// `Some(Method)` if the string matches a supported method, `None` otherwise.
    ///
    /// # Example
    ///
    /// ```
    /// # use broker_probe::http::request::Method;
    /// assert_eq!(Method::from_str("GET"), Some(Method::GET));
    /// assert_eq!(Method::from_str("get"), None);
    /// ```
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "GET" => Some(Method::GET),
            "POST" => Some(Method::POST),
            "PUT" => Some(Method::PUT),
            "DELETE" => Some(Method::DELETE),
            _ => None,
        }
    }

    /// Whether the request is dispatched as soon as its head is complete.
    ///
    /// GET and DELETE ignore any body; POST and PUT are dispatched once the
    /// whole body has been assembled.
    pub fn dispatches_on_head(&self) -> bool {
        matches!(self, Method::GET | Method::DELETE)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::GET => "GET",
            Method::POST => "POST",
            Method::PUT => "PUT",
            Method::DELETE => "DELETE",
        }
    }
}

/// Request line and headers, as produced by the parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHead {
    pub method: Method,
    /// The raw request target (e.g. "/messages-in-queue/orders")
    pub target: String,
    /// HTTP version (typically "HTTP/1.1")
    pub version: String,
    /// Headers in wire order
    pub headers: Vec<(String, String)>,
}

/// A request being assembled on a connection.
///
/// Built from a [`RequestHead`] and filled with body chunks until the
/// end-of-message boundary.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub target: String,
    pub version: String,
    /// Accumulated body bytes
    pub body: Vec<u8>,
}

impl RequestHead {
    /// Retrieves a header value by name, ignoring ASCII case.
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }
}

impl Request {
    pub fn from_head(head: RequestHead) -> Self {
        Self {
            method: head.method,
            target: head.target,
            version: head.version,
            body: Vec::new(),
        }
    }

    pub fn append_body(&mut self, chunk: &[u8]) {
        self.body.extend_from_slice(chunk);
    }
}
