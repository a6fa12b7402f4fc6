use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, error, info};

use crate::broker::Broker;
use crate::control::{ControlPlane, Dispatch, PendingWait};
use crate::http::parser::{Event, RequestParser};
use crate::http::request::Request;
use crate::http::response::Response;
use crate::http::writer::ResponseWriter;

const READ_CHUNK: usize = 4096;

/// Where the connection stands within the current request.
#[derive(Debug)]
pub enum Phase {
    /// Between requests, or a GET/DELETE was answered and its
    /// end-of-message has not been seen yet.
    AwaitingHeaders,
    /// A POST/PUT head was seen; its body is being assembled.
    AwaitingBody(Request),
}

/// Whether the connection can keep reading after handling some bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    /// The peer went away while a wait was pending.
    PeerClosed,
}

/// One accepted transport and the request currently in flight on it.
///
/// Only one request is handled at a time. Bytes that arrive while a wait is
/// pending are buffered in the parser and processed once the pending
/// response has been written.
pub struct Connection<S, B> {
    stream: S,
    parser: RequestParser,
    phase: Phase,
    control: ControlPlane<B>,
}

impl<S, B> Connection<S, B>
where
    S: AsyncRead + AsyncWrite + Unpin,
    B: Broker,
{
    pub fn new(stream: S, broker: Arc<B>) -> Self {
        Self {
            stream,
            parser: RequestParser::new(),
            phase: Phase::AwaitingHeaders,
            control: ControlPlane::new(broker),
        }
    }

    /// Serve requests until the peer closes the transport.
    ///
    /// # Errors
    ///
    /// Any failure while handling a request is fatal for the connection: a
    /// 500 is attempted, the transport is shut down and the error returned.
    pub async fn run(&mut self) -> anyhow::Result<()> {
        let mut chunk = [0u8; READ_CHUNK];

        loop {
            let n = self.stream.read(&mut chunk).await?;

            if n == 0 {
                if !self.parser.is_idle() || matches!(self.phase, Phase::AwaitingBody(_)) {
                    debug!("Peer closed connection mid-request");
                }
                return Ok(());
            }

            match self.data_received(&chunk[..n]).await {
                Ok(Flow::Continue) => {}
                Ok(Flow::PeerClosed) => return Ok(()),
                Err(e) => {
                    error!(error = %e, "Failed to handle request, closing connection");
                    if let Err(write_err) = self.send(Response::internal_error()).await {
                        debug!(error = %write_err, "Could not deliver 500 response");
                    }
                    if let Err(shutdown_err) = self.stream.shutdown().await {
                        debug!(error = %shutdown_err, "Shutdown failed");
                    }
                    return Err(e);
                }
            }
        }
    }

    /// Feed `data` to the parser and drain every event it yields.
    async fn data_received(&mut self, data: &[u8]) -> anyhow::Result<Flow> {
        self.parser.receive_data(data);

        loop {
            match self.parser.next_event()? {
                Event::NeedData => return Ok(Flow::Continue),

                Event::Request(head) => {
                    let request = Request::from_head(head);
                    if request.method.dispatches_on_head() {
                        if self.dispatch(request).await? == Flow::PeerClosed {
                            return Ok(Flow::PeerClosed);
                        }
                    } else {
                        self.phase = Phase::AwaitingBody(request);
                    }
                }

                Event::Data(chunk) => {
                    // GET and DELETE bodies are dropped
                    if let Phase::AwaitingBody(request) = &mut self.phase {
                        request.append_body(&chunk);
                    }
                }

                Event::EndOfMessage => {
                    let phase = std::mem::replace(&mut self.phase, Phase::AwaitingHeaders);
                    if let Phase::AwaitingBody(request) = phase {
                        if self.dispatch(request).await? == Flow::PeerClosed {
                            return Ok(Flow::PeerClosed);
                        }
                    }
                }
            }
        }
    }

    async fn dispatch(&mut self, request: Request) -> anyhow::Result<Flow> {
        let response = match self.control.dispatch(&request)? {
            Dispatch::Respond(response) => response,
            Dispatch::Wait(wait) => match self.await_settlement(wait).await? {
                Some(response) => response,
                None => return Ok(Flow::PeerClosed),
            },
        };

        info!(
            method = request.method.as_str(),
            target = %request.target,
            status = response.status.as_u16(),
            "Request handled"
        );
        self.send(response).await?;
        Ok(Flow::Continue)
    }

    /// Settle `wait` while watching the transport.
    ///
    /// Returns `None` if the peer closed first; dropping the settle future
    /// cancels the wait. Buffering more than
    /// [`MAX_BUFFERED`](crate::http::parser::MAX_BUFFERED) bytes meanwhile is
    /// an error.
    async fn await_settlement(&mut self, wait: PendingWait) -> anyhow::Result<Option<Response>> {
        let settle = self.control.settle(wait);
        tokio::pin!(settle);
        let mut chunk = [0u8; READ_CHUNK];

        loop {
            tokio::select! {
                response = &mut settle => return response.map(Some),
                read = self.stream.read(&mut chunk) => {
                    let n = read?;
                    if n == 0 {
                        debug!("Peer closed connection while a wait was pending");
                        return Ok(None);
                    }
                    // Not processed until the pending response is written
                    self.parser.receive_data(&chunk[..n]);
                    self.parser.check_buffered()?;
                }
            }
        }
    }

    async fn send(&mut self, response: Response) -> anyhow::Result<()> {
        let mut writer = ResponseWriter::new(&response);
        writer.write_to_stream(&mut self.stream).await
    }
}
