//! Request and response models exchanged with callers and dependency services.

use serde::{Deserialize, Serialize};

/// Token type reported for every access token handed back to callers.
pub const BEARER_TOKEN_TYPE: &str = "bearer";

/// Extension used in the upload path when the original filename has none.
const FALLBACK_EXTENSION: &str = "bin";

/// Fields submitted by a citizen to open an account.
///
/// Built per incoming request and dropped once the registration saga
/// returns. The password is only ever sent to the AUTH service.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationRequest {
    /// National identity number.
    #[serde(rename = "id")]
    pub user_id: u64,
    pub name: String,
    pub email: String,
    pub address: String,
    pub password: String,
}

impl std::fmt::Debug for RegistrationRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistrationRequest")
            .field("user_id", &self.user_id)
            .field("name", &self.name)
            .field("email", &self.email)
            .field("address", &self.address)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Identity document uploaded alongside a registration request.
#[derive(Clone, PartialEq, Eq)]
pub struct UploadedDocument {
    pub filename: String,
    pub content: Vec<u8>,
    pub content_type: String,
}

impl UploadedDocument {
    /// Creates a new uploaded document.
    pub fn new(
        filename: impl Into<String>,
        content: impl Into<Vec<u8>>,
        content_type: impl Into<String>,
    ) -> Self {
        Self {
            filename: filename.into(),
            content: content.into(),
            content_type: content_type.into(),
        }
    }

    /// Returns the lower-cased extension of the original filename.
    ///
    /// Falls back to `bin` when the filename has no usable extension.
    pub fn extension(&self) -> String {
        match self.filename.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => ext.to_ascii_lowercase(),
            _ => FALLBACK_EXTENSION.to_string(),
        }
    }

    /// Returns the document size in bytes.
    pub fn len(&self) -> usize {
        self.content.len()
    }

    /// Returns true if the document has no content.
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

impl std::fmt::Debug for UploadedDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadedDocument")
            .field("filename", &self.filename)
            .field("content_len", &self.content.len())
            .field("content_type", &self.content_type)
            .finish()
    }
}

/// Access token returned once every registration step has succeeded.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken {
    pub access_token: String,
    pub token_type: String,
}

impl AccessToken {
    /// Creates a bearer access token.
    pub fn bearer(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            token_type: BEARER_TOKEN_TYPE.to_string(),
        }
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("access_token", &"<redacted>")
            .field("token_type", &self.token_type)
            .finish()
    }
}

/// Input to the document signing flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignRequest {
    pub document_id: i64,
    pub document_name: String,
    pub document_path: String,
    /// Citizen id of the document owner, taken from the caller's token.
    pub user_id: String,
}

/// An operator listed by the external registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatorRecord {
    #[serde(rename = "operatorName", alias = "name", default)]
    pub operator_name: String,

    #[serde(
        rename = "transferAPIURL",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub transfer_api_url: Option<String>,

    /// Any other fields the registry sends, kept verbatim.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl OperatorRecord {
    /// Returns true if the operator exposes a transfer endpoint.
    pub fn has_transfer_endpoint(&self) -> bool {
        self.transfer_api_url.is_some()
    }
}
