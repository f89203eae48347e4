//! Registration saga.
//!
//! Drives the four onboarding steps strictly in order:
//! 1. Validate identity with AUTH
//! 2. Create the profile in USERS
//! 3. Log in with AUTH to obtain an access token
//! 4. Upload the identity document to DOCUMENTS
//!
//! The first failing step ends the saga. Earlier steps are not rolled back;
//! the dependencies tolerate a repeated validate/create/login.

use std::time::{Duration, Instant};

use common::{AccessToken, RegistrationRequest, SagaId, UploadedDocument};
use serde::Deserialize;
use serde_json::json;

use crate::config::ServiceConfig;
use crate::error::{Result, SagaError};
use crate::outcome::{self, AuthOutcome, AuthResult, StepOutcome};
use crate::services::{Service, ServiceCall, ServiceClient, ServiceSession};
use crate::state::RegistrationState;

/// The saga type identifier for registration.
pub const SAGA_TYPE: &str = "Registration";

/// Step name: Validate the identity with AUTH.
pub const STEP_VALIDATE_IDENTITY: &str = "validate_identity";

/// Step name: Create the user profile in USERS.
pub const STEP_CREATE_PROFILE: &str = "create_profile";

/// Step name: Log in with AUTH.
pub const STEP_LOGIN: &str = "login";

/// Step name: Upload the identity document to DOCUMENTS.
pub const STEP_UPLOAD_DOCUMENT: &str = "upload_document";

pub const VALIDATE_PATH: &str = "/validate";
pub const CREATE_PROFILE_PATH: &str = "/create";
pub const LOGIN_PATH: &str = "/login";

/// File label under which the identity document is stored.
pub const DOCUMENT_LABEL: &str = "cedula_de_ciudadania";

/// Multipart field carrying the uploaded document.
pub const UPLOAD_FIELD: &str = "file";

pub const INVALID_ID_DETAIL: &str = "invalid id, it must have at least 10 digits";
pub const ALREADY_REGISTERED_DETAIL: &str = "the user is already registered";
pub const WEAK_PASSWORD_FALLBACK_DETAIL: &str = "validation error from auth service";
pub const IDENTITY_SERVICE_ERROR_DETAIL: &str = "error verifying identity with the auth service";
pub const PROFILE_CREATION_DETAIL: &str = "error creating the user in the users service";

/// Returns the DOCUMENTS path the identity document is stored under.
pub fn document_path(user_id: u64, document: &UploadedDocument) -> String {
    format!("/doc/{user_id}/{DOCUMENT_LABEL}.{}", document.extension())
}

/// Turns the identity validation result into go / no-go.
pub fn check_identity(result: AuthResult) -> Result<()> {
    match result.outcome {
        AuthOutcome::Validated => Ok(()),
        AuthOutcome::WeakPassword => Err(SagaError::ValidationRejected {
            detail: result
                .detail
                .unwrap_or_else(|| WEAK_PASSWORD_FALLBACK_DETAIL.to_string()),
        }),
        AuthOutcome::InvalidId => Err(SagaError::ValidationRejected {
            detail: INVALID_ID_DETAIL.to_string(),
        }),
        AuthOutcome::AlreadyRegistered => Err(SagaError::Conflict {
            detail: ALREADY_REGISTERED_DETAIL.to_string(),
        }),
        AuthOutcome::ServiceError => Err(SagaError::UpstreamServiceError {
            status: 502,
            detail: IDENTITY_SERVICE_ERROR_DETAIL.to_string(),
        }),
        AuthOutcome::Unreachable => Err(SagaError::UpstreamUnreachable {
            service: Service::Auth,
            detail: result
                .detail
                .unwrap_or_else(|| "auth service unreachable".to_string()),
        }),
    }
}

#[derive(Deserialize)]
struct LoginResponse {
    access_token: String,
}

/// Runs registration sagas against the dependency services.
pub struct RegistrationSaga<C: ServiceClient> {
    client: C,
    request_timeout: Duration,
    strict_document_upload: bool,
}

impl<C: ServiceClient> RegistrationSaga<C> {
    /// Creates a new registration saga runner.
    pub fn new(client: C, config: &ServiceConfig) -> Self {
        Self {
            client,
            request_timeout: config.request_timeout,
            strict_document_upload: config.strict_document_upload,
        }
    }

    /// Executes one registration and returns the caller's access token.
    ///
    /// One service session is held for the whole saga and released on
    /// every exit path.
    #[tracing::instrument(
        skip(self, request, document),
        fields(saga_type = SAGA_TYPE, saga_id = %SagaId::new(), user_id = request.user_id)
    )]
    pub async fn execute(
        &self,
        request: RegistrationRequest,
        document: UploadedDocument,
    ) -> Result<AccessToken> {
        metrics::counter!("registration_sagas_total").increment(1);
        let saga_start = Instant::now();
        tracing::info!("registration started");

        let mut state = RegistrationState::Start;
        let result = self.drive(&mut state, &request, document).await;

        metrics::histogram!("registration_saga_duration_seconds")
            .record(saga_start.elapsed().as_secs_f64());

        match &result {
            Ok(_) => {
                metrics::counter!("registration_sagas_completed").increment(1);
                tracing::info!(%state, "registration completed");
            }
            Err(e) => {
                let step = state.failed_step().unwrap_or("unknown");
                metrics::counter!(
                    "registration_sagas_failed",
                    "step" => step,
                    "kind" => e.kind()
                )
                .increment(1);
                tracing::warn!(
                    %state,
                    step,
                    status = e.status_code(),
                    error = %e,
                    "registration failed"
                );
            }
        }

        result
    }

    /// Runs the saga to a terminal state: `Done` or `Failed` at the step
    /// that broke.
    async fn drive(
        &self,
        state: &mut RegistrationState,
        request: &RegistrationRequest,
        document: UploadedDocument,
    ) -> Result<AccessToken> {
        let result = match self.client.open_session() {
            Ok(session) => self.run(&session, state, request, document).await,
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
        state: &mut RegistrationState,
        request: &RegistrationRequest,
        document: UploadedDocument,
    ) -> Result<AccessToken> {
        self.validate_identity(session, request).await?;
        state.advance();

        self.create_profile(session, request).await?;
        state.advance();

        let token = self.login(session, request).await?;
        state.advance();

        self.upload_document(session, request.user_id, document, &token).await?;
        state.advance();

        // DocumentUploaded has no step of its own.
        state.advance();
        Ok(token)
    }

    async fn validate_identity<S: ServiceSession>(
        &self,
        session: &S,
        request: &RegistrationRequest,
    ) -> Result<()> {
        tracing::info!(step = STEP_VALIDATE_IDENTITY, "saga step started");

        let call = ServiceCall::post(Service::Auth, VALIDATE_PATH)
            .json(json!({
                "id": request.user_id,
                "email": request.email,
                "password": request.password,
            }))
            .timeout(self.request_timeout);

        let result = match session.call(call).await {
            Ok(response) => {
                tracing::info!(status = response.status, "auth validate responded");
                AuthResult::from_response(&response)
            }
            Err(failure) => AuthResult::unreachable(&failure),
        };

        if result.outcome == AuthOutcome::WeakPassword {
            tracing::warn!(detail = ?result.detail, "auth rejected the password");
        }

        check_identity(result)
    }

    async fn create_profile<S: ServiceSession>(
        &self,
        session: &S,
        request: &RegistrationRequest,
    ) -> Result<()> {
        tracing::info!(step = STEP_CREATE_PROFILE, "saga step started");

        // The password stays with AUTH.
        let call = ServiceCall::post(Service::Users, CREATE_PROFILE_PATH)
            .json(json!({
                "id": request.user_id,
                "name": request.name,
                "email": request.email,
                "address": request.address,
            }))
            .timeout(self.request_timeout);

        let response = session.call(call).await?;
        tracing::info!(status = response.status, "users create responded");

        match outcome::CREATE_PROFILE.classify(response.status) {
            StepOutcome::Proceed => Ok(()),
            StepOutcome::Rejected => Err(SagaError::UpstreamServiceError {
                status: 500,
                detail: PROFILE_CREATION_DETAIL.to_string(),
            }),
        }
    }

    async fn login<S: ServiceSession>(
        &self,
        session: &S,
        request: &RegistrationRequest,
    ) -> Result<AccessToken> {
        tracing::info!(step = STEP_LOGIN, "saga step started");

        let call = ServiceCall::post(Service::Auth, LOGIN_PATH)
            .json(json!({
                "email": request.email,
                "password": request.password,
            }))
            .timeout(self.request_timeout);

        let response = session.call(call).await?;
        tracing::info!(status = response.status, "auth login responded");

        if outcome::LOGIN.classify(response.status) == StepOutcome::Rejected {
            return Err(SagaError::LoginFailed {
                detail: format!(
                    "login after registration failed: auth service returned status {}",
                    response.status
                ),
            });
        }

        let login: LoginResponse = response.json().map_err(|e| SagaError::LoginFailed {
            detail: format!("login after registration failed: invalid token response ({e})"),
        })?;

        Ok(AccessToken::bearer(login.access_token))
    }

    async fn upload_document<S: ServiceSession>(
        &self,
        session: &S,
        user_id: u64,
        document: UploadedDocument,
        token: &AccessToken,
    ) -> Result<()> {
        tracing::info!(
            step = STEP_UPLOAD_DOCUMENT,
            filename = %document.filename,
            size = document.len(),
            "saga step started"
        );

        let path = document_path(user_id, &document);
        let call = ServiceCall::put(Service::Documents, path)
            .file(UPLOAD_FIELD, document)
            .bearer(&token.access_token)
            .timeout(self.request_timeout);

        let response = session.call(call).await?;
        tracing::info!(status = response.status, "documents upload responded");

        if outcome::UPLOAD_DOCUMENT.classify(response.status) == StepOutcome::Rejected {
            if self.strict_document_upload {
                return Err(SagaError::UpstreamServiceError {
                    status: 502,
                    detail: format!(
                        "document upload rejected by the documents service (status {})",
                        response.status
                    ),
                });
            }
            tracing::warn!(
                status = response.status,
                "document upload not accepted, continuing"
            );
        }

        Ok(())
    }
}
