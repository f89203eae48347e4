//! Shared types for the onboarding orchestrator.
//!
//! Holds the request and response models that cross the boundary between
//! the HTTP layer and the orchestration core.

pub mod models;
pub mod types;

pub use models::{
    AccessToken, OperatorRecord, RegistrationRequest, SignRequest, UploadedDocument,
    BEARER_TOKEN_TYPE,
};
pub use types::SagaId;
