// Adapters layer: concrete implementations for external systems (inbound HTTP, downstream HTTP).

pub mod forwarder;
pub mod http;
