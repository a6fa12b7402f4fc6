//! Control-plane handlers.
//!
//! Each routed request is either answered immediately from current broker
//! state or turned into a [`PendingWait`] that the connection settles
//! asynchronously.

use std::sync::Arc;

use anyhow::Context;
use serde::Deserialize;
use tracing::{debug, info};

use crate::broker::{Broker, Headers, Message};
use crate::http::request::Request;
use crate::http::response::Response;

pub mod bridge;
pub mod router;

pub use bridge::PendingWait;
pub use router::{Route, RouteError};

/// What a connection should do with a dispatched request.
#[derive(Debug)]
pub enum Dispatch {
    /// Write this response now.
    Respond(Response),
    /// Settle the wait, then write the bridged response.
    Wait(PendingWait),
}

/// Body of `POST /add-message-on/{exchange}`.
#[derive(Debug, Deserialize)]
struct PublishPayload {
    headers: Headers,
    body: String,
}

#[derive(Debug)]
pub struct ControlPlane<B> {
    broker: Arc<B>,
}

impl<B: Broker> ControlPlane<B> {
    pub fn new(broker: Arc<B>) -> Self {
        Self { broker }
    }

    /// Route a fully assembled request and run it if it is immediate.
    ///
    /// # Errors
    ///
    /// Malformed targets or bodies are errors; the caller answers 500 and
    /// drops the connection.
    pub fn dispatch(&self, request: &Request) -> anyhow::Result<Dispatch> {
        let route = router::route(request.method, &request.target)?;
        debug!(
            method = request.method.as_str(),
            target = %request.target,
            version = %request.version,
            ?route,
            deferred = route.is_deferred(),
            "Routed request"
        );

        let response = match route {
            Route::AuthenticationDone { username } => {
                return Ok(Dispatch::Wait(PendingWait::Authentication {
                    username: username.to_string(),
                }));
            }
            Route::MessageAcknowledged { delivery_tag } => {
                return Ok(Dispatch::Wait(PendingWait::Acknowledgement { delivery_tag }));
            }
            Route::QueueBoundToExchange { queue, exchange } => {
                return Ok(Dispatch::Wait(PendingWait::Binding {
                    queue: queue.to_string(),
                    exchange: exchange.to_string(),
                }));
            }
            Route::MessagesInQueue { queue } => {
                list_response(self.broker.messages_in_queue(queue))?
            }
            Route::MessagesInExchange { exchange } => {
                list_response(self.broker.messages_in_exchange(exchange))?
            }
            Route::AddMessage { exchange } => self.add_message(exchange, &request.body)?,
            Route::DeleteMessagesInQueue { queue } => {
                self.broker.delete_messages_in_queue(queue);
                info!(queue, "Purged queue");
                Response::no_content()
            }
            Route::NotFound => Response::not_found(),
        };

        Ok(Dispatch::Respond(response))
    }

    /// Wait on the broker and translate the outcome into a response.
    pub async fn settle(&self, wait: PendingWait) -> anyhow::Result<Response> {
        debug!(?wait, "Waiting on broker");
        let outcome = wait.settle(Arc::clone(&self.broker)).await?;
        debug!(?outcome, "Wait settled");
        Ok(bridge::outcome_response(outcome))
    }

    fn add_message(&self, exchange: &str, body: &[u8]) -> anyhow::Result<Response> {
        let payload: PublishPayload =
            serde_json::from_slice(body).context("decoding publish payload")?;

        match self
            .broker
            .publish_message(exchange, payload.headers, payload.body.into_bytes())
        {
            Some(delivery_tag) => {
                info!(exchange, delivery_tag, "Published message");
                Ok(Response::ok(delivery_tag.to_string()))
            }
            None => Ok(Response::not_found()),
        }
    }
}

fn list_response(messages: Option<Vec<Message>>) -> anyhow::Result<Response> {
    match messages {
        Some(messages) => Ok(Response::ok(serde_json::to_vec(&messages)?)),
        None => Ok(Response::not_found()),
    }
}
