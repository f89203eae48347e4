//! Scripted in-memory service client.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde_json::Value;

use crate::services::client::{
    Method, NormalizedResponse, Service, ServiceCall, ServiceClient, ServiceSession, SessionError,
    TransportFailure,
};

#[derive(Debug, Clone)]
enum Reply {
    Respond(NormalizedResponse),
    Fail(String),
}

#[derive(Debug, Default)]
struct InMemoryState {
    replies: HashMap<(Service, Method, String), Reply>,
    calls: Vec<ServiceCall>,
    open_sessions: usize,
    sessions_opened: usize,
    fail_on_open: bool,
}

/// In-memory service client for testing.
///
/// Replies are scripted per `(service, method, path)`. Unscripted calls get
/// a 404 with a `detail` body, like a real service would send for an
/// unknown route. Every call is recorded.
#[derive(Debug, Clone, Default)]
pub struct InMemoryServiceClient {
    state: Arc<RwLock<InMemoryState>>,
}

impl InMemoryServiceClient {
    /// Creates a new in-memory service client with nothing scripted.
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts a response.
    pub fn respond(
        &self,
        service: Service,
        method: Method,
        path: impl Into<String>,
        status: u16,
        body: Value,
    ) -> &Self {
        self.state.write().unwrap().replies.insert(
            (service, method, path.into()),
            Reply::Respond(NormalizedResponse::new(status, body)),
        );
        self
    }

    /// Scripts a transport failure.
    pub fn fail(
        &self,
        service: Service,
        method: Method,
        path: impl Into<String>,
        cause: impl Into<String>,
    ) -> &Self {
        self.state
            .write()
            .unwrap()
            .replies
            .insert((service, method, path.into()), Reply::Fail(cause.into()));
        self
    }

    /// Configures the client to fail when a session is opened.
    pub fn set_fail_on_open(&self, fail: bool) {
        self.state.write().unwrap().fail_on_open = fail;
    }

    /// Returns every call made so far, in order.
    pub fn calls(&self) -> Vec<ServiceCall> {
        self.state.read().unwrap().calls.clone()
    }

    /// Forgets recorded calls, keeping the scripted replies.
    pub fn clear_calls(&self) {
        self.state.write().unwrap().calls.clear();
    }

    /// Returns the number of calls made to a service.
    pub fn call_count(&self, service: Service) -> usize {
        self.state
            .read()
            .unwrap()
            .calls
            .iter()
            .filter(|c| c.service == service)
            .count()
    }

    /// Returns the first recorded call to `(service, path)`.
    pub fn find_call(&self, service: Service, path: &str) -> Option<ServiceCall> {
        self.state
            .read()
            .unwrap()
            .calls
            .iter()
            .find(|c| c.service == service && c.path == path)
            .cloned()
    }

    /// Returns the number of sessions currently open.
    pub fn open_session_count(&self) -> usize {
        self.state.read().unwrap().open_sessions
    }

    /// Returns the number of sessions opened since creation.
    pub fn sessions_opened(&self) -> usize {
        self.state.read().unwrap().sessions_opened
    }
}

impl ServiceClient for InMemoryServiceClient {
    type Session = InMemorySession;

    fn open_session(&self) -> Result<InMemorySession, SessionError> {
        let mut state = self.state.write().unwrap();

        if state.fail_on_open {
            return Err(SessionError("session pool exhausted".to_string()));
        }

        state.open_sessions += 1;
        state.sessions_opened += 1;
        Ok(InMemorySession {
            state: self.state.clone(),
        })
    }
}

/// Session handed out by [`InMemoryServiceClient`].
#[derive(Debug)]
pub struct InMemorySession {
    state: Arc<RwLock<InMemoryState>>,
}

#[async_trait]
impl ServiceSession for InMemorySession {
    async fn call(&self, call: ServiceCall) -> Result<NormalizedResponse, TransportFailure> {
        let mut state = self.state.write().unwrap();
        let key = (call.service, call.method, call.path.clone());
        let reply = state.replies.get(&key).cloned();
        let service = call.service;
        state.calls.push(call);

        match reply {
            Some(Reply::Respond(response)) => Ok(response),
            Some(Reply::Fail(cause)) => Err(TransportFailure::new(service, cause)),
            None => Ok(NormalizedResponse::new(
                404,
                serde_json::json!({ "detail": "Not Found" }),
            )),
        }
    }
}

impl Drop for InMemorySession {
    fn drop(&mut self) {
        if let Ok(mut state) = self.state.write() {
            state.open_sessions = state.open_sessions.saturating_sub(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_response_and_recording() {
        let client = InMemoryServiceClient::new();
        client.respond(Service::Auth, Method::Post, "/validate", 204, Value::Null);

        let session = client.open_session().unwrap();
        let resp = session
            .call(ServiceCall::post(Service::Auth, "/validate"))
            .await
            .unwrap();

        assert_eq!(resp.status, 204);
        assert_eq!(client.call_count(Service::Auth), 1);
        assert!(client.find_call(Service::Auth, "/validate").is_some());
    }

    #[tokio::test]
    async fn test_unscripted_call_is_not_found() {
        let client = InMemoryServiceClient::new();
        let session = client.open_session().unwrap();

        let resp = session
            .call(ServiceCall::get(Service::Registry, "/getOperators"))
            .await
            .unwrap();
        assert_eq!(resp.status, 404);
    }

    #[tokio::test]
    async fn test_scripted_failure() {
        let client = InMemoryServiceClient::new();
        client.fail(Service::Users, Method::Post, "/create", "connection refused");

        let session = client.open_session().unwrap();
        let err = session
            .call(ServiceCall::post(Service::Users, "/create"))
            .await
            .unwrap_err();

        assert_eq!(err.service, Service::Users);
        assert_eq!(err.cause, "connection refused");
    }

    #[tokio::test]
    async fn test_session_release_on_drop() {
        let client = InMemoryServiceClient::new();
        {
            let _a = client.open_session().unwrap();
            let _b = client.open_session().unwrap();
            assert_eq!(client.open_session_count(), 2);
        }
        assert_eq!(client.open_session_count(), 0);
        assert_eq!(client.sessions_opened(), 2);
    }

    #[test]
    fn test_fail_on_open() {
        let client = InMemoryServiceClient::new();
        client.set_fail_on_open(true);
        assert!(client.open_session().is_err());
        assert_eq!(client.sessions_opened(), 0);
    }
}
