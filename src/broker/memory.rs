//! In-memory broker fixture.
//!
//! Exchanges fan out: a published message is kept in the exchange history
//! and copied into every queue bound to it.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use tokio::sync::Notify;

use crate::broker::{Broker, BrokerError, Headers, Message, WaitOutcome};
use crate::config::TopologyConfig;

#[derive(Debug, Default)]
struct BrokerState {
    /// Exchange name -> every message published to it
    exchanges: HashMap<String, Vec<Message>>,
    /// Queue name -> messages currently queued
    queues: HashMap<String, Vec<Message>>,
    /// (queue, exchange)
    bindings: HashSet<(String, String)>,
    /// Username -> outcome of the latest authentication attempt
    authentications: HashMap<String, bool>,
    /// Delivery tag -> acknowledged (`true`) or rejected (`false`)
    settlements: HashMap<u64, bool>,
    last_delivery_tag: u64,
}

#[derive(Debug)]
pub struct MemoryBroker {
    state: RwLock<BrokerState>,
    /// Woken on every change a wait could be watching
    changed: Notify,
    wait_timeout: Duration,
}

impl MemoryBroker {
    /// Create an empty broker whose waits give up after `wait_timeout`.
    pub fn new(wait_timeout: Duration) -> Self {
        Self {
            state: RwLock::new(BrokerState::default()),
            changed: Notify::new(),
            wait_timeout,
        }
    }

    /// Declare the exchanges, queues and bindings listed in `topology`.
    pub fn seed(&self, topology: &TopologyConfig) {
        for exchange in &topology.exchanges {
            self.declare_exchange(exchange);
        }
        for queue in &topology.queues {
            self.declare_queue(queue);
        }
        for binding in &topology.bindings {
            if !self.bind_queue(&binding.queue, &binding.exchange) {
                tracing::warn!(
                    queue = %binding.queue,
                    exchange = %binding.exchange,
                    "Skipping binding with undeclared queue or exchange"
                );
            }
        }
    }

    /// Declaring an existing exchange keeps its history.
    pub fn declare_exchange(&self, name: &str) {
        self.write().exchanges.entry(name.to_string()).or_default();
    }

    /// Declaring an existing queue keeps its messages.
    pub fn declare_queue(&self, name: &str) {
        self.write().queues.entry(name.to_string()).or_default();
    }

    /// Bind `queue` to `exchange`. Returns `false` if either is undeclared.
    pub fn bind_queue(&self, queue: &str, exchange: &str) -> bool {
        {
            let mut state = self.write();
            if !state.queues.contains_key(queue) || !state.exchanges.contains_key(exchange) {
                return false;
            }
            state
                .bindings
                .insert((queue.to_string(), exchange.to_string()));
        }
        tracing::debug!(queue, exchange, "Queue bound");
        self.changed.notify_waiters();
        true
    }

    /// Record an authentication attempt. Later attempts replace earlier ones.
    pub fn record_authentication(&self, username: &str, success: bool) {
        self.write()
            .authentications
            .insert(username.to_string(), success);
        tracing::debug!(username, success, "Authentication recorded");
        self.changed.notify_waiters();
    }

    /// Mark a delivered message as acknowledged. Returns `false` for a tag
    /// that was never handed out.
    pub fn acknowledge(&self, delivery_tag: u64) -> bool {
        self.settle(delivery_tag, true)
    }

    /// Mark a delivered message as rejected. Returns `false` for a tag that
    /// was never handed out.
    pub fn reject(&self, delivery_tag: u64) -> bool {
        self.settle(delivery_tag, false)
    }

    fn settle(&self, delivery_tag: u64, acknowledged: bool) -> bool {
        {
            let mut state = self.write();
            if delivery_tag == 0 || delivery_tag > state.last_delivery_tag {
                return false;
            }
            state.settlements.insert(delivery_tag, acknowledged);
        }
        tracing::debug!(delivery_tag, acknowledged, "Delivery settled");
        self.changed.notify_waiters();
        true
    }

    /// Poll `predicate` on every state change until it yields a value or the
    /// deadline passes.
    async fn wait_for<F>(&self, predicate: F) -> Result<WaitOutcome, BrokerError>
    where
        F: Fn(&BrokerState) -> Option<bool> + Send,
    {
        let settle = async move {
            loop {
                // Register before checking so a change in between is not missed
                let notified = self.changed.notified();
                tokio::pin!(notified);
                notified.as_mut().enable();

                let settled = predicate(&self.read());
                if let Some(value) = settled {
                    return value;
                }
                notified.await;
            }
        };

        match tokio::time::timeout(self.wait_timeout, settle).await {
            Ok(value) => Ok(WaitOutcome::Resolved(value)),
            Err(_) => Ok(WaitOutcome::TimedOut),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, BrokerState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, BrokerState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Broker for MemoryBroker {
    fn wait_authentication_performed(
        &self,
        username: &str,
    ) -> impl Future<Output = Result<WaitOutcome, BrokerError>> + Send {
        self.wait_for(move |state| state.authentications.get(username).copied())
    }

    fn wait_message_acknowledged(
        &self,
        delivery_tag: u64,
    ) -> impl Future<Output = Result<WaitOutcome, BrokerError>> + Send {
        self.wait_for(move |state| state.settlements.get(&delivery_tag).copied())
    }

    fn wait_queue_bound_to_exchange(
        &self,
        queue: &str,
        exchange: &str,
    ) -> impl Future<Output = Result<WaitOutcome, BrokerError>> + Send {
        self.wait_for(move |state| {
            state
                .bindings
                .contains(&(queue.to_string(), exchange.to_string()))
                .then_some(true)
        })
    }

    fn messages_in_queue(&self, queue: &str) -> Option<Vec<Message>> {
        self.read().queues.get(queue).cloned()
    }

    fn messages_in_exchange(&self, exchange: &str) -> Option<Vec<Message>> {
        self.read().exchanges.get(exchange).cloned()
    }

    fn publish_message(&self, exchange: &str, headers: Headers, body: Vec<u8>) -> Option<u64> {
        let mut guard = self.write();
        let state = &mut *guard;

        let history = state.exchanges.get_mut(exchange)?;
        state.last_delivery_tag += 1;
        let message = Message {
            delivery_tag: state.last_delivery_tag,
            exchange: exchange.to_string(),
            headers,
            body,
        };

        for (queue, bound_exchange) in &state.bindings {
            if bound_exchange != exchange {
                continue;
            }
            if let Some(messages) = state.queues.get_mut(queue) {
                messages.push(message.clone());
            }
        }

        let delivery_tag = message.delivery_tag;
        history.push(message);
        Some(delivery_tag)
    }

    fn delete_messages_in_queue(&self, queue: &str) {
        if let Some(messages) = self.write().queues.get_mut(queue) {
            messages.clear();
        }
    }
}
