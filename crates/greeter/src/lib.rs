//! The Greeter service, served over the binary protocol and the JSON gateway
//! from one process.

/// Greeter messages, service trait, server, client and gateway routes.
pub mod contract;
/// Process configuration.
pub mod config;
/// The Greeter handler set.
pub mod handlers;
/// Binding and serving both listeners.
pub mod server;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;
