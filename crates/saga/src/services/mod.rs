//! Service client adapter: outbound calls to the dependency services.

pub mod client;
pub mod http;
pub mod in_memory;

pub use client::{
    CallBody, Method, NormalizedResponse, Service, ServiceCall, ServiceClient, ServiceSession,
    SessionError, TransportFailure,
};
pub use http::{HttpServiceClient, HttpSession};
pub use in_memory::{InMemoryServiceClient, InMemorySession};
