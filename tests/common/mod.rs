//! Helpers shared by the connection and server tests.
#![allow(dead_code)]

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use broker_probe::broker::{Broker, BrokerError, Headers, Message, WaitOutcome};
use broker_probe::http::connection::Connection;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, DuplexStream};
use tokio::task::JoinHandle;

/// A response as seen on the wire.
#[derive(Debug)]
pub struct RawResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    pub fn body_str(&self) -> &str {
        std::str::from_utf8(&self.body).unwrap()
    }
}

/// Client side of a connection, reading responses one at a time.
pub struct Client<S> {
    stream: S,
    buf: Vec<u8>,
}

impl<S: AsyncRead + AsyncWrite + Unpin> Client<S> {
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            buf: Vec::new(),
        }
    }

    pub async fn send(&mut self, bytes: &[u8]) {
        self.stream.write_all(bytes).await.unwrap();
        self.stream.flush().await.unwrap();
    }

    /// Like [`Client::send`], but reports a server that stopped reading.
    pub async fn try_send(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        self.stream.write_all(bytes).await?;
        self.stream.flush().await
    }

    /// Read exactly one response, keeping any bytes that follow it.
    pub async fn response(&mut self) -> RawResponse {
        loop {
            if let Some(resp) = self.take_response() {
                return resp;
            }
            let mut chunk = [0u8; 1024];
            let n = self.stream.read(&mut chunk).await.unwrap();
            assert!(n > 0, "connection closed before a full response arrived");
            self.buf.extend_from_slice(&chunk[..n]);
        }
    }

    /// True once the server has closed its side and nothing is left unread.
    pub async fn is_closed(&mut self) -> bool {
        if !self.buf.is_empty() {
            return false;
        }
        let mut chunk = [0u8; 64];
        matches!(self.stream.read(&mut chunk).await, Ok(0) | Err(_))
    }

    pub fn into_inner(self) -> S {
        self.stream
    }

    fn take_response(&mut self) -> Option<RawResponse> {
        let head_end = self.buf.windows(4).position(|w| w == b"\r\n\r\n")?;
        let head = std::str::from_utf8(&self.buf[..head_end]).unwrap().to_string();
        let mut lines = head.split("\r\n");

        let status_line = lines.next().unwrap();
        let status = status_line.split(' ').nth(1).unwrap().parse().unwrap();

        let headers: Vec<(String, String)> = lines
            .map(|line| {
                let (k, v) = line.split_once(':').unwrap();
                (k.trim().to_string(), v.trim().to_string())
            })
            .collect();

        let length: usize = headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case("Content-Length"))
            .map(|(_, v)| v.parse().unwrap())
            .unwrap();

        let total = head_end + 4 + length;
        if self.buf.len() < total {
            return None;
        }
        let body = self.buf[head_end + 4..total].to_vec();
        self.buf.drain(..total);

        Some(RawResponse {
            status,
            headers,
            body,
        })
    }
}

/// Run a connection over an in-memory pipe.
pub fn connect<B: Broker>(broker: Arc<B>) -> (Client<DuplexStream>, JoinHandle<anyhow::Result<()>>) {
    let (client, server) = tokio::io::duplex(16 * 1024);
    let handle = tokio::spawn(async move {
        let mut conn = Connection::new(server, broker);
        conn.run().await
    });
    (Client::new(client), handle)
}

pub fn get(target: &str) -> Vec<u8> {
    format!("GET {target} HTTP/1.1\r\nHost: localhost\r\n\r\n").into_bytes()
}

pub fn delete(target: &str) -> Vec<u8> {
    format!("DELETE {target} HTTP/1.1\r\nHost: localhost\r\n\r\n").into_bytes()
}

pub fn with_body(method: &str, target: &str, body: &str) -> Vec<u8> {
    format!(
        "{method} {target} HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{body}",
        body.len()
    )
    .into_bytes()
}

#[derive(Debug, Clone, Copy)]
pub enum Script {
    Settle(WaitOutcome),
    Fail,
    /// Never settles
    Hang,
}

/// Broker whose waits all follow one script. Immediate operations see an
/// empty broker.
#[derive(Debug)]
pub struct ScriptedBroker {
    script: Script,
    pub waits_started: AtomicUsize,
    /// Incremented whenever a wait future is dropped, settled or not
    pub waits_dropped: Arc<AtomicUsize>,
}

impl ScriptedBroker {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            waits_started: AtomicUsize::new(0),
            waits_dropped: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn scripted(&self) -> impl Future<Output = Result<WaitOutcome, BrokerError>> + Send + use<> {
        self.waits_started.fetch_add(1, Ordering::SeqCst);
        let guard = DropCounter(Arc::clone(&self.waits_dropped));
        let script = self.script;
        async move {
            let _guard = guard;
            match script {
                Script::Settle(outcome) => Ok(outcome),
                Script::Fail => Err(BrokerError::Unavailable("scripted failure".to_string())),
                Script::Hang => std::future::pending().await,
            }
        }
    }
}

struct DropCounter(Arc<AtomicUsize>);

impl Drop for DropCounter {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

impl Broker for ScriptedBroker {
    fn wait_authentication_performed(
        &self,
        _username: &str,
    ) -> impl Future<Output = Result<WaitOutcome, BrokerError>> + Send {
        self.scripted()
    }

    fn wait_message_acknowledged(
        &self,
        _delivery_tag: u64,
    ) -> impl Future<Output = Result<WaitOutcome, BrokerError>> + Send {
        self.scripted()
    }

    fn wait_queue_bound_to_exchange(
        &self,
        _queue: &str,
        _exchange: &str,
    ) -> impl Future<Output = Result<WaitOutcome, BrokerError>> + Send {
        self.scripted()
    }

    fn messages_in_queue(&self, _queue: &str) -> Option<Vec<Message>> {
        None
    }

    fn messages_in_exchange(&self, _exchange: &str) -> Option<Vec<Message>> {
        None
    }

    fn publish_message(&self, _exchange: &str, _headers: Headers, _body: Vec<u8>) -> Option<u64> {
        None
    }

    fn delete_messages_in_queue(&self, _queue: &str) {}
}
