//! Broker-side state the control plane observes and drives.
//!
//! The control plane only talks to the broker through the [`Broker`] trait.
//! [`MemoryBroker`] is the in-process fixture used by the binary and tests.

use std::collections::BTreeMap;
use std::future::Future;

use serde::{Serialize, Serializer};
use thiserror::Error;

pub mod memory;

pub use memory::MemoryBroker;

/// Message headers, kept sorted so listings serialize deterministically.
pub type Headers = BTreeMap<String, String>;

/// How a predicate wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The condition settled before the deadline.
    Resolved(bool),
    /// The deadline passed first.
    TimedOut,
}

/// Failures other than a timeout while waiting on the broker.
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("broker unavailable: {0}")]
    Unavailable(String),
}

/// A message as recorded by the broker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub delivery_tag: u64,
    pub exchange: String,
    pub headers: Headers,
    #[serde(serialize_with = "serialize_body")]
    pub body: Vec<u8>,
}

fn serialize_body<S: Serializer>(body: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&String::from_utf8_lossy(body))
}

/// Operations the control plane issues against the broker.
///
/// Waits suspend until their condition settles or the broker's deadline
/// passes. Every other operation completes immediately from current state.
pub trait Broker: Send + Sync + 'static {
    /// Settles once `username` has attempted to authenticate; `true` if the
    /// attempt succeeded.
    fn wait_authentication_performed(
        &self,
        username: &str,
    ) -> impl Future<Output = Result<WaitOutcome, BrokerError>> + Send;

    /// Settles once the message is acknowledged (`true`) or rejected (`false`).
    fn wait_message_acknowledged(
        &self,
        delivery_tag: u64,
    ) -> impl Future<Output = Result<WaitOutcome, BrokerError>> + Send;

    /// Settles once `queue` is bound to `exchange`.
    fn wait_queue_bound_to_exchange(
        &self,
        queue: &str,
        exchange: &str,
    ) -> impl Future<Output = Result<WaitOutcome, BrokerError>> + Send;

    /// `None` if the queue is unknown.
    fn messages_in_queue(&self, queue: &str) -> Option<Vec<Message>>;

    /// `None` if the exchange is unknown.
    fn messages_in_exchange(&self, exchange: &str) -> Option<Vec<Message>>;

    /// Publishes a message and returns its delivery tag, or `None` if the
    /// exchange is unknown.
    fn publish_message(&self, exchange: &str, headers: Headers, body: Vec<u8>) -> Option<u64>;

    /// Drops every message in the queue. Unknown queues are ignored.
    fn delete_messages_in_queue(&self, queue: &str);
}
