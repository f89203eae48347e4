//! Onboarding orchestration over independently owned services.
//!
//! This crate coordinates calls to AUTH, USERS, DOCUMENTS and the external
//! national registry:
//! - Registration saga: validate identity → create profile → log in →
//!   upload the identity document, returning an access token
//! - Document signing flow: signed URL → mark signed → report to registry
//! - Operator discovery: transfer-capable operators from the registry
//!
//! A failing step ends its flow with a classified [`SagaError`]. Nothing is
//! compensated; completed steps stay completed.

pub mod config;
pub mod coordinator;
pub mod error;
pub mod operators;
pub mod outcome;
pub mod registration;
pub mod services;
pub mod signing;
pub mod state;

pub use config::ServiceConfig;
pub use coordinator::Orchestrator;
pub use error::{DiscoveryError, SagaError};
pub use operators::OperatorDiscovery;
pub use outcome::{AuthOutcome, AuthResult, StatusTable, StepOutcome};
pub use registration::RegistrationSaga;
pub use services::{
    HttpServiceClient, InMemoryServiceClient, Method, NormalizedResponse, Service, ServiceCall,
    ServiceClient, ServiceSession, TransportFailure,
};
pub use signing::DocumentSigningFlow;
pub use state::{RegistrationState, SigningState};
