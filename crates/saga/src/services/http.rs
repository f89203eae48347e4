//! reqwest-backed service client.

use std::error::Error as _;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::UploadedDocument;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::multipart::{Form, Part};

use crate::config::ServiceConfig;
use crate::services::client::{
    CallBody, Method, NormalizedResponse, Service, ServiceCall, ServiceClient, ServiceSession,
    SessionError, TransportFailure,
};

/// Service client that talks HTTP to the configured dependency services.
#[derive(Debug, Clone)]
pub struct HttpServiceClient {
    config: Arc<ServiceConfig>,
}

impl HttpServiceClient {
    /// Creates a new HTTP service client.
    pub fn new(config: Arc<ServiceConfig>) -> Self {
        Self { config }
    }
}

impl ServiceClient for HttpServiceClient {
    type Session = HttpSession;

    fn open_session(&self) -> Result<HttpSession, SessionError> {
        let client = reqwest::Client::builder()
            .timeout(self.config.request_timeout)
            .build()
            .map_err(|e| SessionError(e.to_string()))?;

        Ok(HttpSession {
            client,
            config: self.config.clone(),
        })
    }
}

/// One connection pool, owned by a single saga invocation.
#[derive(Debug)]
pub struct HttpSession {
    client: reqwest::Client,
    config: Arc<ServiceConfig>,
}

#[async_trait]
impl ServiceSession for HttpSession {
    #[tracing::instrument(
        skip(self, call),
        fields(service = %call.service, method = %call.method, path = %call.path)
    )]
    async fn call(&self, call: ServiceCall) -> Result<NormalizedResponse, TransportFailure> {
        let service = call.service;
        metrics::counter!("upstream_calls_total", "service" => service.as_str()).increment(1);

        let url = self.config.url_for(service, &call.path);
        let mut request = match call.method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
            Method::Put => self.client.put(&url),
            Method::Patch => self.client.patch(&url),
        };

        for (name, value) in &call.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        let timeout = call.timeout.unwrap_or(self.config.request_timeout);
        request = request.timeout(timeout);

        request = match call.body {
            CallBody::Empty => request,
            CallBody::Json(value) => request.json(&value),
            CallBody::File { field, document } => {
                request.multipart(Form::new().part(field, file_part(document)))
            }
        };

        let response = request
            .send()
            .await
            .map_err(|e| transport_failure(service, &e, timeout))?;

        let status = response.status().as_u16();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| transport_failure(service, &e, timeout))?;

        tracing::debug!(status, "upstream responded");
        Ok(NormalizedResponse::from_bytes(status, &bytes))
    }
}

fn file_part(document: UploadedDocument) -> Part {
    let UploadedDocument {
        filename,
        content,
        content_type,
    } = document;

    let part = Part::bytes(content).file_name(filename);
    match HeaderValue::from_str(&content_type) {
        Ok(value) => {
            let mut headers = HeaderMap::new();
            headers.insert(CONTENT_TYPE, value);
            part.headers(headers)
        }
        Err(e) => {
            tracing::warn!(error = %e, %content_type, "invalid content type, sending without one");
            part
        }
    }
}

fn transport_failure(
    service: Service,
    err: &reqwest::Error,
    timeout: Duration,
) -> TransportFailure {
    metrics::counter!("upstream_transport_failures_total", "service" => service.as_str())
        .increment(1);

    let mut cause = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        cause.push_str(": ");
        cause.push_str(&inner.to_string());
        source = inner.source();
    }

    if err.is_timeout() {
        cause = format!("timed out after {timeout:?} ({cause})");
    }

    tracing::error!(%service, %cause, "upstream call failed");
    TransportFailure::new(service, cause)
}
