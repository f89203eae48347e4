//! Document signing flow.
//!
//! Three calls, no retries: fetch a signed URL from DOCUMENTS, mark the
//! document's metadata as signed, then report it to the external registry.

use std::time::{Duration, Instant};

use common::{SagaId, SignRequest};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::config::ServiceConfig;
use crate::error::{Result, SagaError};
use crate::outcome::{self, StepOutcome};
use crate::services::{Service, ServiceCall, ServiceClient, ServiceSession};
use crate::state::SigningState;

/// The flow type identifier for document signing.
pub const FLOW_TYPE: &str = "DocumentSigning";

/// Step name: Request a signed URL for the stored document.
pub const STEP_SIGN_URL: &str = "sign_url";

/// Step name: Mark the document metadata as signed.
pub const STEP_MARK_SIGNED: &str = "mark_signed";

/// Step name: Report the signed document to the registry.
pub const STEP_REPORT_TO_REGISTRY: &str = "report_to_registry";

pub const SIGNED_URLS_PATH: &str = "/docs/signed-urls";
pub const AUTHENTICATE_DOCUMENT_PATH: &str = "/authenticateDocument";

/// Message returned once the registry has accepted the signed document.
pub const DOCUMENT_SIGNED_MESSAGE: &str = "document signed and authenticated successfully";

pub const MISSING_SIGNED_URL_DETAIL: &str = "the documents service returned no signed url";

/// Returns the DOCUMENTS path that marks a document as signed.
pub fn mark_signed_path(document_id: i64) -> String {
    format!("/metadata/{document_id}/sign")
}

#[derive(Deserialize)]
struct SignedUrls {
    #[serde(default)]
    signed_urls: Vec<String>,
}

/// Runs document signing flows.
pub struct DocumentSigningFlow<C: ServiceClient> {
    client: C,
    request_timeout: Duration,
}

impl<C: ServiceClient> DocumentSigningFlow<C> {
    /// Creates a new signing flow runner.
    pub fn new(client: C, config: &ServiceConfig) -> Self {
        Self {
            client,
            request_timeout: config.request_timeout,
        }
    }

    /// Signs one document and reports it to the registry.
    #[tracing::instrument(
        skip(self, request),
        fields(
            flow_type = FLOW_TYPE,
            saga_id = %SagaId::new(),
            document_id = request.document_id,
            user_id = %request.user_id
        )
    )]
    pub async fn execute(&self, request: SignRequest) -> Result<String> {
        metrics::counter!("signing_flows_total").increment(1);
        let started = Instant::now();

        let mut state = SigningState::Start;
        let result = self.drive(&mut state, &request).await;

        metrics::histogram!("signing_flow_duration_seconds")
            .record(started.elapsed().as_secs_f64());

        match &result {
            Ok(_) => tracing::info!(%state, "document signed"),
            Err(e) => {
                metrics::counter!("signing_flows_failed", "kind" => e.kind()).increment(1);
                tracing::warn!(
                    %state,
                    step = state.failed_step().unwrap_or("unknown"),
                    status = e.status_code(),
                    error = %e,
                    "document signing failed"
                );
            }
        }

        result
    }

    async fn drive(&self, state: &mut SigningState, request: &SignRequest) -> Result<String> {
        let result = match self.client.open_session() {
            Ok(session) => self.run(&session, state, request).await,
            Err(e) => Err(SagaError::from(e)),
        };
        if result.is_err() {
            state.fail();
        }
        debug_assert!(state.is_terminal());
        result
    }

    async fn run<S: ServiceSession>(
        &self,
        session: &S,
        state: &mut SigningState,
        request: &SignRequest,
    ) -> Result<String> {
        tracing::info!(step = STEP_SIGN_URL, "flow step started");
        let response = session
            .call(
                ServiceCall::post(Service::Documents, SIGNED_URLS_PATH)
                    .json(json!({ "document_paths": [request.document_path] }))
                    .timeout(self.request_timeout),
            )
            .await?;
        tracing::info!(status = response.status, "documents signed-urls responded");

        let signed_url = response
            .json::<SignedUrls>()
            .ok()
            .and_then(|urls| urls.signed_urls.into_iter().next())
            .ok_or_else(|| SagaError::UpstreamServiceError {
                status: 500,
                detail: MISSING_SIGNED_URL_DETAIL.to_string(),
            })?;
        state.advance();

        tracing::info!(step = STEP_MARK_SIGNED, "flow step started");
        let response = session
            .call(
                ServiceCall::patch(Service::Documents, mark_signed_path(request.document_id))
                    .timeout(self.request_timeout),
            )
            .await?;
        tracing::info!(status = response.status, "documents metadata responded");
        state.advance();

        tracing::info!(step = STEP_REPORT_TO_REGISTRY, "flow step started");
        let response = session
            .call(
                ServiceCall::post(Service::Registry, AUTHENTICATE_DOCUMENT_PATH)
                    .json(json!({
                        "id_citizen": citizen_id(&request.user_id),
                        "urlDocument": signed_url,
                        "document_title": request.document_name,
                    }))
                    .timeout(self.request_timeout),
            )
            .await?;
        tracing::info!(status = response.status, "registry authenticateDocument responded");

        match outcome::REPORT_SIGNED_DOCUMENT.classify(response.status) {
            StepOutcome::Proceed => {
                state.advance();
                Ok(DOCUMENT_SIGNED_MESSAGE.to_string())
            }
            StepOutcome::Rejected => Err(SagaError::UpstreamServiceError {
                status: 500,
                detail: format!(
                    "the registry rejected the signed document (status {})",
                    response.status
                ),
            }),
        }
    }
}

/// The registry keys citizens by number; non-numeric ids are sent as given.
fn citizen_id(user_id: &str) -> Value {
    user_id
        .parse::<u64>()
        .map(Value::from)
        .unwrap_or_else(|_| Value::from(user_id))
}
