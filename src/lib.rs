//! Broker Probe - HTTP control plane for a message broker test fixture
//!
//! Lets a test harness wait on broker-side facts (authentication,
//! acknowledgement, bindings) and publish or purge messages over plain
//! HTTP/1.1.

pub mod broker;
pub mod config;
pub mod control;
pub mod http;
pub mod server;
