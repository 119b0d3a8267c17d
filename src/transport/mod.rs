//! Outbound HTTP plumbing for status polls.

pub mod http;

pub use http::{HttpTransport, TransportConfig, TransportError};
