//! Incremental HTTP/1.1 request parser.
//!
//! Bytes are pushed in with [`RequestParser::receive_data`] as they arrive
//! and framing events are pulled out with [`RequestParser::next_event`]
//! until it reports [`Event::NeedData`]. Nothing assumes a request arrives
//! in one read.

use bytes::{Buf, Bytes, BytesMut};
use thiserror::Error;

use crate::http::request::{Method, RequestHead};

/// Largest request head we are willing to buffer.
const MAX_HEADER_SIZE: usize = 64 * 1024;

const MAX_HEADERS: usize = 64;

/// Chunk size lines are hex digits plus optional extensions.
const MAX_CHUNK_LINE: usize = 1024;

/// Most unparsed bytes a connection may hold, e.g. requests pipelined
/// behind a pending wait.
pub const MAX_BUFFERED: usize = 4 * MAX_HEADER_SIZE;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("malformed request head: {0}")]
    InvalidRequest(#[from] httparse::Error),
    #[error("unsupported method {0:?}")]
    UnsupportedMethod(String),
    #[error("header value is not valid UTF-8")]
    InvalidHeader,
    #[error("invalid Content-Length")]
    InvalidContentLength,
    #[error("invalid chunk size line")]
    InvalidChunkSize,
    #[error("missing CRLF after chunk data")]
    InvalidChunkTerminator,
    #[error("request head exceeds {} bytes", MAX_HEADER_SIZE)]
    HeadersTooLarge,
    #[error("trailer line exceeds {} bytes", MAX_HEADER_SIZE)]
    TrailerTooLarge,
    #[error("more than {} unparsed bytes buffered", MAX_BUFFERED)]
    BufferFull,
}

/// Framing events, in the order they occur within one request.
#[derive(Debug, PartialEq, Eq)]
pub enum Event {
    /// Request line and headers are complete.
    Request(RequestHead),
    /// A piece of the request body.
    Data(Bytes),
    /// The request is complete; the parser is idle again.
    EndOfMessage,
    /// No further event can be derived from the buffered bytes.
    NeedData,
}

#[derive(Debug)]
enum ParserState {
    Idle,
    Body(BodyState),
}

#[derive(Debug)]
enum BodyState {
    Length { remaining: usize },
    ChunkSize,
    ChunkData { remaining: usize },
    ChunkEnd,
    Trailers,
}

#[derive(Debug)]
pub struct RequestParser {
    buffer: BytesMut,
    state: ParserState,
}

impl Default for RequestParser {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestParser {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(4096),
            state: ParserState::Idle,
        }
    }

    pub fn receive_data(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Whether the parser sits between requests.
    pub fn is_idle(&self) -> bool {
        matches!(self.state, ParserState::Idle)
    }

    /// Number of bytes received but not yet turned into events.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Fails once more than [`MAX_BUFFERED`] bytes are waiting to be parsed.
    pub fn check_buffered(&self) -> Result<(), ParseError> {
        if self.buffer.len() > MAX_BUFFERED {
            return Err(ParseError::BufferFull);
        }
        Ok(())
    }

    pub fn next_event(&mut self) -> Result<Event, ParseError> {
        match self.state {
            ParserState::Idle => self.parse_head(),
            ParserState::Body(_) => self.parse_body(),
        }
    }

    fn parse_head(&mut self) -> Result<Event, ParseError> {
        // Stray CRLFs between requests are tolerated
        while self.buffer.starts_with(b"\r\n") {
            self.buffer.advance(2);
        }
        if self.buffer.is_empty() {
            return Ok(Event::NeedData);
        }

        let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
        let mut req = httparse::Request::new(&mut headers);

        let consumed = match req.parse(&self.buffer)? {
            httparse::Status::Complete(n) => n,
            httparse::Status::Partial => {
                if self.buffer.len() > MAX_HEADER_SIZE {
                    return Err(ParseError::HeadersTooLarge);
                }
                return Ok(Event::NeedData);
            }
        };

        let method_str = req.method.unwrap_or_default();
        let method = Method::from_str(method_str)
            .ok_or_else(|| ParseError::UnsupportedMethod(method_str.to_string()))?;

        let headers = req
            .headers
            .iter()
            .map(|h| {
                let value = std::str::from_utf8(h.value).map_err(|_| ParseError::InvalidHeader)?;
                Ok((h.name.to_string(), value.trim().to_string()))
            })
            .collect::<Result<Vec<_>, ParseError>>()?;

        let head = RequestHead {
            method,
            target: req.path.unwrap_or("/").to_string(),
            version: format!("HTTP/1.{}", req.version.unwrap_or(1)),
            headers,
        };

        let body = body_framing(&head)?;
        self.buffer.advance(consumed);
        self.state = ParserState::Body(body);

        Ok(Event::Request(head))
    }

    fn parse_body(&mut self) -> Result<Event, ParseError> {
        loop {
            let ParserState::Body(body) = &mut self.state else {
                return Ok(Event::NeedData);
            };

            match body {
                BodyState::Length { remaining: 0 } => {
                    self.state = ParserState::Idle;
                    return Ok(Event::EndOfMessage);
                }
                BodyState::Length { remaining } => {
                    if self.buffer.is_empty() {
                        return Ok(Event::NeedData);
                    }
                    let n = (*remaining).min(self.buffer.len());
                    *remaining -= n;
                    return Ok(Event::Data(self.buffer.split_to(n).freeze()));
                }
                BodyState::ChunkSize => {
                    let Some(line_end) = find_crlf(&self.buffer) else {
                        if self.buffer.len() > MAX_CHUNK_LINE {
                            return Err(ParseError::InvalidChunkSize);
                        }
                        return Ok(Event::NeedData);
                    };
                    let line = self.buffer.split_to(line_end + 2);
                    let size = parse_chunk_size(&line[..line_end])?;
                    *body = if size == 0 {
                        BodyState::Trailers
                    } else {
                        BodyState::ChunkData { remaining: size }
                    };
                }
                BodyState::ChunkData { remaining } => {
                    if self.buffer.is_empty() {
                        return Ok(Event::NeedData);
                    }
                    let n = (*remaining).min(self.buffer.len());
                    *remaining -= n;
                    if *remaining == 0 {
                        *body = BodyState::ChunkEnd;
                    }
                    return Ok(Event::Data(self.buffer.split_to(n).freeze()));
                }
                BodyState::ChunkEnd => {
                    if self.buffer.len() < 2 {
                        return Ok(Event::NeedData);
                    }
                    if !self.buffer.starts_with(b"\r\n") {
                        return Err(ParseError::InvalidChunkTerminator);
                    }
                    self.buffer.advance(2);
                    *body = BodyState::ChunkSize;
                }
                BodyState::Trailers => {
                    let Some(line_end) = find_crlf(&self.buffer) else {
                        if self.buffer.len() > MAX_HEADER_SIZE {
                            return Err(ParseError::TrailerTooLarge);
                        }
                        return Ok(Event::NeedData);
                    };
                    self.buffer.advance(line_end + 2);
                    if line_end == 0 {
                        self.state = ParserState::Idle;
                        return Ok(Event::EndOfMessage);
                    }
                }
            }
        }
    }
}

fn body_framing(head: &RequestHead) -> Result<BodyState, ParseError> {
    let chunked = head
        .header("Transfer-Encoding")
        .map(|te| te.split(',').any(|c| c.trim().eq_ignore_ascii_case("chunked")))
        .unwrap_or(false);
    if chunked {
        return Ok(BodyState::ChunkSize);
    }

    let remaining = head
        .header("Content-Length")
        .map(|v| v.parse::<usize>().map_err(|_| ParseError::InvalidContentLength))
        .transpose()?
        .unwrap_or(0);

    Ok(BodyState::Length { remaining })
}

fn parse_chunk_size(line: &[u8]) -> Result<usize, ParseError> {
    let line = std::str::from_utf8(line).map_err(|_| ParseError::InvalidChunkSize)?;
    // Extensions after ';' are ignored
    let digits = line.split(';').next().unwrap_or_default().trim();
    usize::from_str_radix(digits, 16).map_err(|_| ParseError::InvalidChunkSize)
}

fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}
