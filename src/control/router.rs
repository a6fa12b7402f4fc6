//! Maps a request method and target onto a control-plane route.
//!
//! Routing is pure: nothing here touches the broker.

use thiserror::Error;

use crate::http::request::Method;

const AUTHENTICATION_DONE: &str = "/authentification-done-with-success-on/";
const MESSAGES_ACKNOWLEDGED: &str = "/messages-acknowledged/";
const MESSAGES_IN_QUEUE: &str = "/messages-in-queue/";
const MESSAGES_IN_EXCHANGE: &str = "/messages-in-exchange/";
const QUEUE_BOUND_TO_EXCHANGE: &str = "/queue-bound-to-exchange/";
const ADD_MESSAGE_ON: &str = "/add-message-on/";

/// A routed request. Parameters borrow from the request target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route<'a> {
    /// `GET /authentification-done-with-success-on/{username}`
    AuthenticationDone { username: &'a str },
    /// `GET /messages-acknowledged/{delivery_tag}`
    MessageAcknowledged { delivery_tag: u64 },
    /// `GET /messages-in-queue/{queue}`
    MessagesInQueue { queue: &'a str },
    /// `GET /messages-in-exchange/{exchange}`
    MessagesInExchange { exchange: &'a str },
    /// `GET /queue-bound-to-exchange/{queue}/{exchange}`
    QueueBoundToExchange { queue: &'a str, exchange: &'a str },
    /// `POST /add-message-on/{exchange}`
    AddMessage { exchange: &'a str },
    /// `DELETE /messages-in-queue/{queue}`
    DeleteMessagesInQueue { queue: &'a str },
    NotFound,
}

#[derive(Debug, Error)]
pub enum RouteError {
    #[error("delivery tag {0:?} is not an integer")]
    InvalidDeliveryTag(String),
}

impl Route<'_> {
    /// Whether answering requires waiting on the broker.
    pub fn is_deferred(&self) -> bool {
        matches!(
            self,
            Route::AuthenticationDone { .. }
                | Route::MessageAcknowledged { .. }
                | Route::QueueBoundToExchange { .. }
        )
    }
}

/// Resolve `target` for `method`.
///
/// Parameters are everything after the route prefix, so they may contain
/// `/`. The binding route instead needs exactly two segments.
///
/// # Errors
///
/// Returns [`RouteError::InvalidDeliveryTag`] when the acknowledgement route
/// carries a tag that is not an unsigned integer.
pub fn route(method: Method, target: &str) -> Result<Route<'_>, RouteError> {
    let route = match method {
        Method::GET => route_get(target)?,
        Method::POST => target
            .strip_prefix(ADD_MESSAGE_ON)
            .map(|exchange| Route::AddMessage { exchange })
            .unwrap_or(Route::NotFound),
        Method::DELETE => target
            .strip_prefix(MESSAGES_IN_QUEUE)
            .map(|queue| Route::DeleteMessagesInQueue { queue })
            .unwrap_or(Route::NotFound),
        Method::PUT => Route::NotFound,
    };
    Ok(route)
}

fn route_get(target: &str) -> Result<Route<'_>, RouteError> {
    if let Some(username) = target.strip_prefix(AUTHENTICATION_DONE) {
        return Ok(Route::AuthenticationDone { username });
    }

    if let Some(tag) = target.strip_prefix(MESSAGES_ACKNOWLEDGED) {
        // Tags are handed out from 1, so a negative tag is malformed rather
        // than a wait that can only time out.
        let delivery_tag = tag
            .parse()
            .map_err(|_| RouteError::InvalidDeliveryTag(tag.to_string()))?;
        return Ok(Route::MessageAcknowledged { delivery_tag });
    }

    if let Some(queue) = target.strip_prefix(MESSAGES_IN_QUEUE) {
        return Ok(Route::MessagesInQueue { queue });
    }

    if let Some(exchange) = target.strip_prefix(MESSAGES_IN_EXCHANGE) {
        return Ok(Route::MessagesInExchange { exchange });
    }

    if let Some(rest) = target.strip_prefix(QUEUE_BOUND_TO_EXCHANGE) {
        let segments: Vec<&str> = rest.split('/').collect();
        return Ok(match segments[..] {
            [queue, exchange] => Route::QueueBoundToExchange { queue, exchange },
            _ => Route::NotFound,
        });
    }

    Ok(Route::NotFound)
}
