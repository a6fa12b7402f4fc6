//! Bridges a broker predicate wait to exactly one HTTP response.
//!
//! | Outcome            | Status |
//! |--------------------|--------|
//! | `Resolved(true)`   | 204    |
//! | `Resolved(false)`  | 403    |
//! | `TimedOut`         | 504    |
//!
//! Any [`BrokerError`] is passed through to the caller untouched.

use std::sync::Arc;

use crate::broker::{Broker, BrokerError, WaitOutcome};
use crate::http::response::Response;

/// A deferred query that has been routed but not yet settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingWait {
    Authentication { username: String },
    Acknowledgement { delivery_tag: u64 },
    Binding { queue: String, exchange: String },
}

impl PendingWait {
    /// Waits on the broker. Consumes the handle so it cannot settle twice.
    pub async fn settle<B: Broker>(self, broker: Arc<B>) -> Result<WaitOutcome, BrokerError> {
        match self {
            PendingWait::Authentication { username } => {
                broker.wait_authentication_performed(&username).await
            }
            PendingWait::Acknowledgement { delivery_tag } => {
                broker.wait_message_acknowledged(delivery_tag).await
            }
            PendingWait::Binding { queue, exchange } => {
                broker.wait_queue_bound_to_exchange(&queue, &exchange).await
            }
        }
    }
}

pub fn outcome_response(outcome: WaitOutcome) -> Response {
    match outcome {
        WaitOutcome::Resolved(true) => Response::no_content(),
        WaitOutcome::Resolved(false) => Response::forbidden(),
        WaitOutcome::TimedOut => Response::gateway_timeout(),
    }
}
