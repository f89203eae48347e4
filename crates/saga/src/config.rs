//! Dependency service configuration.

use std::time::Duration;

use crate::services::Service;

/// Default timeout applied to every outbound call.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Where the dependency services live and how long to wait for them.
///
/// Built once at process start and handed to the service client and flows.
///
/// Reads from environment variables:
/// - `AUTH_SERVICE_URL` (default: `"http://localhost:8001"`)
/// - `USERS_SERVICE_URL` (default: `"http://localhost:8002"`)
/// - `DOCUMENTS_SERVICE_URL` (default: `"http://localhost:8003"`)
/// - `REGISTRADURIA_URL` (default: `"http://localhost:8004"`)
/// - `REQUEST_TIMEOUT_SECS` (default: `30`)
/// - `STRICT_DOCUMENT_UPLOAD` (default: `false`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub auth_url: String,
    pub users_url: String,
    pub documents_url: String,
    pub registry_url: String,
    pub request_timeout: Duration,
    /// Fail registration when DOCUMENTS rejects the upload.
    pub strict_document_upload: bool,
}

impl ServiceConfig {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            auth_url: std::env::var("AUTH_SERVICE_URL").unwrap_or(defaults.auth_url),
            users_url: std::env::var("USERS_SERVICE_URL").unwrap_or(defaults.users_url),
            documents_url: std::env::var("DOCUMENTS_SERVICE_URL")
                .unwrap_or(defaults.documents_url),
            registry_url: std::env::var("REGISTRADURIA_URL").unwrap_or(defaults.registry_url),
            request_timeout: std::env::var("REQUEST_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
            strict_document_upload: std::env::var("STRICT_DOCUMENT_UPLOAD")
                .ok()
                .map(|s| parse_flag(&s))
                .unwrap_or(defaults.strict_document_upload),
        }
    }

    /// Returns the base URL of a service.
    pub fn base_url(&self, service: Service) -> &str {
        match service {
            Service::Auth => &self.auth_url,
            Service::Users => &self.users_url,
            Service::Documents => &self.documents_url,
            Service::Registry => &self.registry_url,
        }
    }

    /// Joins a service base URL and a path.
    pub fn url_for(&self, service: Service, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url(service).trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            auth_url: "http://localhost:8001".to_string(),
            users_url: "http://localhost:8002".to_string(),
            documents_url: "http://localhost:8003".to_string(),
            registry_url: "http://localhost:8004".to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            strict_document_upload: false,
        }
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = ServiceConfig::default();
        assert_eq!(config.auth_url, "http://localhost:8001");
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert!(!config.strict_document_upload);
    }

    #[test]
    fn test_url_joining() {
        let config = ServiceConfig {
            documents_url: "http://docs:9000/api/".to_string(),
            ..ServiceConfig::default()
        };
        assert_eq!(
            config.url_for(Service::Documents, "/docs/signed-urls"),
            "http://docs:9000/api/docs/signed-urls"
        );
        assert_eq!(
            config.url_for(Service::Auth, "validate"),
            "http://localhost:8001/validate"
        );
    }

    #[test]
    fn test_base_url_per_service() {
        let config = ServiceConfig::default();
        assert_eq!(config.base_url(Service::Users), "http://localhost:8002");
        assert_eq!(config.base_url(Service::Documents), "http://localhost:8003");
        assert_eq!(config.base_url(Service::Registry), "http://localhost:8004");
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("true"));
        assert!(parse_flag(" 1 "));
        assert!(parse_flag("YES"));
        assert!(!parse_flag("false"));
        assert!(!parse_flag(""));
    }
}
