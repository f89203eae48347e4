//! Service client traits and the normalized call/response model.

use std::time::Duration;

use async_trait::async_trait;
use common::UploadedDocument;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

/// The dependency services the orchestrator talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Service {
    /// Identity and authentication service.
    Auth,
    /// User profile service.
    Users,
    /// Document storage service.
    Documents,
    /// External national registry.
    Registry,
}

impl Service {
    /// Returns the service name as used in logs and metric labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            Service::Auth => "auth",
            Service::Users => "users",
            Service::Documents => "documents",
            Service::Registry => "registry",
        }
    }
}

impl std::fmt::Display for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// HTTP method of an outbound call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Body of an outbound call.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum CallBody {
    #[default]
    Empty,
    Json(Value),
    /// A single file sent as a multipart form field.
    File {
        field: String,
        document: UploadedDocument,
    },
}

/// A single outbound call to a dependency service.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceCall {
    pub service: Service,
    pub method: Method,
    /// Path relative to the service base URL, starting with `/`.
    pub path: String,
    pub body: CallBody,
    pub headers: Vec<(String, String)>,
    /// Per-call timeout; the session default applies when unset.
    pub timeout: Option<Duration>,
}

impl ServiceCall {
    /// Creates a call with no body, headers or timeout override.
    pub fn new(service: Service, method: Method, path: impl Into<String>) -> Self {
        Self {
            service,
            method,
            path: path.into(),
            body: CallBody::Empty,
            headers: Vec::new(),
            timeout: None,
        }
    }

    pub fn get(service: Service, path: impl Into<String>) -> Self {
        Self::new(service, Method::Get, path)
    }

    pub fn post(service: Service, path: impl Into<String>) -> Self {
        Self::new(service, Method::Post, path)
    }

    pub fn put(service: Service, path: impl Into<String>) -> Self {
        Self::new(service, Method::Put, path)
    }

    pub fn patch(service: Service, path: impl Into<String>) -> Self {
        Self::new(service, Method::Patch, path)
    }

    /// Sets a JSON body.
    pub fn json(mut self, body: Value) -> Self {
        self.body = CallBody::Json(body);
        self
    }

    /// Sets a multipart body carrying one file.
    pub fn file(mut self, field: impl Into<String>, document: UploadedDocument) -> Self {
        self.body = CallBody::File {
            field: field.into(),
            document,
        };
        self
    }

    /// Adds a header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Adds an `Authorization: Bearer` header.
    pub fn bearer(self, token: &str) -> Self {
        self.header("Authorization", format!("Bearer {token}"))
    }

    /// Overrides the session's default timeout for this call.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Returns the value of the named header, if present (case-insensitive).
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Any response received from a dependency, whatever its status class.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedResponse {
    pub status: u16,
    /// Parsed JSON body; `Null` when empty, a JSON string when not JSON.
    pub body: Value,
}

impl NormalizedResponse {
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    /// Builds a response from raw body bytes.
    pub fn from_bytes(status: u16, bytes: &[u8]) -> Self {
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()))
        };
        Self { status, body }
    }

    /// Returns true for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Returns the `detail` of the body, if the service sent one.
    ///
    /// Structured details (FastAPI validation errors are arrays) are
    /// rendered as JSON text.
    pub fn detail(&self) -> Option<String> {
        match self.body.get("detail")? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Deserializes the body into `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.body)
    }
}

/// A network-level failure: timeout, refused connection, DNS, broken body.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{service} service unreachable: {cause}")]
pub struct TransportFailure {
    pub service: Service,
    pub cause: String,
}

impl TransportFailure {
    pub fn new(service: Service, cause: impl Into<String>) -> Self {
        Self {
            service,
            cause: cause.into(),
        }
    }
}

/// The session resource itself could not be set up.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to open service session: {0}")]
pub struct SessionError(pub String);

/// A session scoped to one saga invocation.
///
/// Released when dropped, so every exit path of the owning saga gives it back.
#[async_trait]
pub trait ServiceSession: Send + Sync {
    /// Performs one call. Never fails for non-2xx statuses; those come back
    /// as a [`NormalizedResponse`] for the caller to interpret.
    async fn call(&self, call: ServiceCall) -> Result<NormalizedResponse, TransportFailure>;
}

/// Factory for per-invocation sessions. Stateless and shareable across flows.
pub trait ServiceClient: Send + Sync {
    type Session: ServiceSession;

    /// Opens a new session.
    fn open_session(&self) -> Result<Self::Session, SessionError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[test]
    fn test_call_builder() {
        let call = ServiceCall::post(Service::Auth, "/login")
            .json(serde_json::json!({ "email": "a@b.c" }))
            .bearer("tok")
            .timeout(Duration::from_secs(5));

        assert_eq!(call.method, Method::Post);
        assert_eq!(call.path, "/login");
        assert_eq!(call.header_value("authorization"), Some("Bearer tok"));
        assert_eq!(call.timeout, Some(Duration::from_secs(5)));
        assert!(matches!(call.body, CallBody::Json(_)));
    }

    #[test]
    fn test_response_from_bytes() {
        let empty = NormalizedResponse::from_bytes(204, b"");
        assert_eq!(empty.body, Value::Null);
        assert!(empty.is_success());

        let json = NormalizedResponse::from_bytes(422, br#"{"detail":"weak password"}"#);
        assert_eq!(json.detail().as_deref(), Some("weak password"));
        assert!(!json.is_success());

        let text = NormalizedResponse::from_bytes(502, b"Bad Gateway");
        assert_eq!(text.body, Value::String("Bad Gateway".to_string()));
        assert_eq!(text.detail(), None);

        let structured = NormalizedResponse::from_bytes(
            422,
            br#"{"detail":[{"loc":["body","password"],"msg":"password too weak"}]}"#,
        );
        let detail = structured.detail().unwrap();
        assert!(detail.contains("password too weak"), "{detail}");
    }

    #[test]
    fn test_response_json() {
        #[derive(Deserialize)]
        struct Token {
            access_token: String,
        }

        let resp = NormalizedResponse::new(200, serde_json::json!({ "access_token": "abc" }));
        let token: Token = resp.json().unwrap();
        assert_eq!(token.access_token, "abc");

        let bad = NormalizedResponse::new(200, Value::Null);
        assert!(bad.json::<Token>().is_err());
    }

    #[test]
    fn test_transport_failure_display() {
        let failure = TransportFailure::new(Service::Users, "connection refused");
        assert_eq!(failure.to_string(), "users service unreachable: connection refused");
    }
}
