//! Registration, document signing and operator discovery endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Multipart, State};
use common::{AccessToken, OperatorRecord, RegistrationRequest, UploadedDocument};
use saga::{Orchestrator, ServiceClient};
use serde::{Deserialize, Serialize};

use crate::auth::{AuthenticatedUser, TokenVerifier};
use crate::error::ApiError;

/// Multipart field holding the JSON-encoded registration data.
pub const DATA_FIELD: &str = "data";

/// Multipart field holding the identity document.
pub const DOCUMENT_FIELD: &str = "document";

/// Shared application state accessible from all handlers.
pub struct AppState<C: ServiceClient + Clone> {
    pub orchestrator: Orchestrator<C>,
    pub tokens: TokenVerifier,
}

// -- Request types --

#[derive(Debug, Deserialize)]
pub struct AuthenticateDocRequest {
    pub document_id: i64,
    pub document_name: String,
    pub document_path: String,
}

// -- Response types --

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

// -- Handlers --

/// POST /orchestrator/register — run the registration saga.
///
/// Expects a multipart form with a `data` field (JSON registration data)
/// and a `document` file field.
#[tracing::instrument(skip(state, multipart))]
pub async fn register<C: ServiceClient + Clone + 'static>(
    State(state): State<Arc<AppState<C>>>,
    mut multipart: Multipart,
) -> Result<Json<AccessToken>, ApiError> {
    let mut data: Option<String> = None;
    let mut document: Option<UploadedDocument> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Invalid multipart body: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            DATA_FIELD => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Invalid data field: {e}")))?;
                data = Some(text);
            }
            DOCUMENT_FIELD => {
                let filename = field.file_name().unwrap_or("document").to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Invalid document field: {e}")))?;
                document = Some(UploadedDocument::new(filename, bytes.to_vec(), content_type));
            }
            other => tracing::debug!(field = other, "ignoring unknown form field"),
        }
    }

    let data = data.ok_or_else(|| ApiError::BadRequest("Missing form field: data".to_string()))?;
    let request: RegistrationRequest = serde_json::from_str(&data)
        .map_err(|e| ApiError::BadRequest(format!("Invalid registration data: {e}")))?;
    let document = document
        .ok_or_else(|| ApiError::BadRequest("Missing form field: document".to_string()))?;

    let token = state
        .orchestrator
        .process_registration(request, document)
        .await?;

    Ok(Json(token))
}

/// POST /orchestrator/authenticate_doc — sign a stored document and report it.
#[tracing::instrument(skip(state, user, req))]
pub async fn authenticate_doc<C: ServiceClient + Clone + 'static>(
    State(state): State<Arc<AppState<C>>>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(req): Json<AuthenticateDocRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let message = state
        .orchestrator
        .sign_document(
            req.document_id,
            req.document_name,
            req.document_path,
            user.sub,
        )
        .await?;

    Ok(Json(MessageResponse { message }))
}

/// GET /orchestrator/operators — operators exposing a transfer endpoint.
#[tracing::instrument(skip(state))]
pub async fn operators<C: ServiceClient + Clone + 'static>(
    State(state): State<Arc<AppState<C>>>,
) -> Result<Json<Vec<OperatorRecord>>, ApiError> {
    let operators = state.orchestrator.get_operators().await?;
    Ok(Json(operators))
}
