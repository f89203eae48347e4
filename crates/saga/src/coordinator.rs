//! Orchestrator: the entry point the HTTP layer calls into.

use common::{AccessToken, OperatorRecord, RegistrationRequest, SignRequest, UploadedDocument};

use crate::config::ServiceConfig;
use crate::error::{DiscoveryError, SagaError};
use crate::operators::OperatorDiscovery;
use crate::registration::RegistrationSaga;
use crate::services::ServiceClient;
use crate::signing::DocumentSigningFlow;

/// Owns the three flows over a shared service client.
///
/// Flows share nothing but the client (and through it, the configured
/// service URLs); every invocation opens its own session.
pub struct Orchestrator<C: ServiceClient + Clone> {
    registration: RegistrationSaga<C>,
    signing: DocumentSigningFlow<C>,
    operators: OperatorDiscovery<C>,
}

impl<C: ServiceClient + Clone> Orchestrator<C> {
    /// Creates a new orchestrator.
    pub fn new(client: C, config: &ServiceConfig) -> Self {
        Self {
            registration: RegistrationSaga::new(client.clone(), config),
            signing: DocumentSigningFlow::new(client.clone(), config),
            operators: OperatorDiscovery::new(client, config),
        }
    }

    /// Runs the registration saga.
    pub async fn process_registration(
        &self,
        request: RegistrationRequest,
        document: UploadedDocument,
    ) -> Result<AccessToken, SagaError> {
        self.registration.execute(request, document).await
    }

    /// Runs the document signing flow.
    pub async fn sign_document(
        &self,
        document_id: i64,
        document_name: impl Into<String>,
        document_path: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Result<String, SagaError> {
        self.signing
            .execute(SignRequest {
                document_id,
                document_name: document_name.into(),
                document_path: document_path.into(),
                user_id: user_id.into(),
            })
            .await
    }

    /// Lists operators exposing a transfer endpoint.
    pub async fn get_operators(&self) -> Result<Vec<OperatorRecord>, DiscoveryError> {
        self.operators.fetch().await
    }
}
