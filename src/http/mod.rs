//! HTTP protocol implementation.
//!
//! A small HTTP/1.1 server that handles one request at a time per
//! connection and marks every response `Connection: close`.
//!
//! # Architecture
//!
//! - **`connection`**: The per-connection state machine driving parser events
//! - **`parser`**: Incremental parser turning bytes into framing events
//! - **`request`**: Supported methods and the request being assembled
//! - **`response`**: Fixed status set and response builder
//! - **`writer`**: Serializes and writes responses to the client
//!
//! # Connection State Machine
//!
//! ```text
//!        ┌───────────────────┐
//!   ┌──▶ │  AwaitingHeaders  │ ← GET/DELETE dispatched on head
//!   │    └─────────┬─────────┘
//!   │              │ POST/PUT head
//!   │              ▼
//!   │    ┌───────────────────┐
//!   │    │   AwaitingBody    │ ← body chunks accumulated
//!   │    └─────────┬─────────┘
//!   │              │ end of message: dispatch
//!   └──────────────┘
//! ```
//!
//! End-of-message always returns the connection to `AwaitingHeaders`.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use broker_probe::broker::MemoryBroker;
//! use broker_probe::http::connection::Connection;
//! use tokio::net::TcpListener;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let broker = Arc::new(MemoryBroker::new(std::time::Duration::from_secs(5)));
//!     let listener = TcpListener::bind("127.0.0.1:8080").await?;
//!
//!     loop {
//!         let (socket, _addr) = listener.accept().await?;
//!         let broker = broker.clone();
//!         tokio::spawn(async move {
//!             let mut conn = Connection::new(socket, broker);
//!             if let Err(e) = conn.run().await {
//!                 eprintln!("Connection error: {}", e);
//!             }
//!         });
//!     }
//! }
//! ```

pub mod connection;
pub mod parser;
pub mod request;
pub mod response;
pub mod writer;
