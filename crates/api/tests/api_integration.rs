//! Integration tests for the API server.

use std::sync::Arc;
use std::sync::OnceLock;

use api::auth::Claims;
use api::config::Config;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use metrics_exporter_prometheus::PrometheusHandle;
use saga::operators::GET_OPERATORS_PATH;
use saga::registration::{CREATE_PROFILE_PATH, LOGIN_PATH, VALIDATE_PATH};
use saga::signing::{AUTHENTICATE_DOCUMENT_PATH, DOCUMENT_SIGNED_MESSAGE, SIGNED_URLS_PATH};
use saga::{InMemoryServiceClient, Method, Service};
use serde_json::{Value, json};
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

const JWT_SECRET: &str = "integration-secret";
const BOUNDARY: &str = "X-ORCHESTRATOR-BOUNDARY";
const USER_ID: u64 = 1234567890;

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

fn config() -> Config {
    Config {
        jwt_secret: JWT_SECRET.to_string(),
        ..Config::default()
    }
}

fn setup(client: &InMemoryServiceClient) -> axum::Router {
    let config = config();
    let state = api::create_state(client.clone(), &config);
    api::create_app(state, get_metrics_handle(), config.max_upload_bytes)
}

fn upload_path() -> String {
    format!("/doc/{USER_ID}/cedula_de_ciudadania.pdf")
}

fn happy_client() -> InMemoryServiceClient {
    let client = InMemoryServiceClient::new();
    client
        .respond(Service::Auth, Method::Post, VALIDATE_PATH, 204, Value::Null)
        .respond(
            Service::Users,
            Method::Post,
            CREATE_PROFILE_PATH,
            200,
            json!({ "id": USER_ID }),
        )
        .respond(
            Service::Auth,
            Method::Post,
            LOGIN_PATH,
            200,
            json!({ "access_token": "jwt-abc", "token_type": "Bearer" }),
        )
        .respond(
            Service::Documents,
            Method::Put,
            upload_path(),
            201,
            json!({ "ok": true }),
        );
    client
}

fn registration_data() -> Value {
    json!({
        "id": USER_ID,
        "name": "Ana Gomez",
        "email": "ana@example.com",
        "address": "Calle 1 # 2-3",
        "password": "Str0ng!Pass"
    })
}

/// Builds a multipart body from `(name, filename, content)` parts.
fn multipart_body(parts: &[(&str, Option<&str>, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, filename, content) in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match filename {
            Some(filename) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\n\
                         Content-Type: application/pdf\r\n\r\n"
                    )
                    .as_bytes(),
                );
            }
            None => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                );
            }
        }
        body.extend_from_slice(content);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn register_request(parts: &[(&str, Option<&str>, &[u8])]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/orchestrator/register")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body(parts)))
        .unwrap()
}

fn full_registration() -> Request<Body> {
    let data = registration_data().to_string();
    register_request(&[
        ("data", None, data.as_bytes()),
        ("document", Some("cedula.PDF"), b"%PDF-1.7"),
    ])
}

fn issue_token(sub: &str) -> String {
    encode(
        &Header::new(Algorithm::HS256),
        &Claims {
            sub: sub.to_string(),
            exp: 4_102_444_800,
        },
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let app = setup(&InMemoryServiceClient::new());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_register_returns_bearer_token() {
    let client = happy_client();
    let app = setup(&client);

    let response = app.oneshot(full_registration()).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["access_token"], "jwt-abc");
    assert_eq!(json["token_type"], "bearer");

    let upload = client
        .find_call(Service::Documents, &upload_path())
        .expect("document uploaded under a lower-cased extension");
    assert_eq!(upload.method, Method::Put);
    assert_eq!(
        upload.header_value("authorization"),
        Some("Bearer jwt-abc")
    );

    let profile = client
        .find_call(Service::Users, CREATE_PROFILE_PATH)
        .unwrap();
    match profile.body {
        saga::services::client::CallBody::Json(body) => {
            assert!(body.get("password").is_none());
            assert_eq!(body["id"], USER_ID);
        }
        other => panic!("expected JSON body, got {other:?}"),
    }
    assert_eq!(client.open_session_count(), 0);
}

#[tokio::test]
async fn test_register_weak_password_passes_auth_detail() {
    let client = happy_client();
    client.respond(
        Service::Auth,
        Method::Post,
        VALIDATE_PATH,
        422,
        json!({ "detail": "password too short" }),
    );
    let app = setup(&client);

    let response = app.oneshot(full_registration()).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let json = body_json(response).await;
    assert_eq!(json["detail"], "password too short");
    assert_eq!(client.call_count(Service::Users), 0);
}

#[tokio::test]
async fn test_register_already_registered_is_conflict() {
    let client = happy_client();
    client.respond(Service::Auth, Method::Post, VALIDATE_PATH, 200, json!({}));
    let app = setup(&client);

    let response = app.oneshot(full_registration()).await.unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let json = body_json(response).await;
    assert_eq!(json["detail"], "the user is already registered");
}

#[tokio::test]
async fn test_register_unreachable_users_service() {
    let client = happy_client();
    client.fail(
        Service::Users,
        Method::Post,
        CREATE_PROFILE_PATH,
        "connection refused",
    );
    let app = setup(&client);

    let response = app.oneshot(full_registration()).await.unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let json = body_json(response).await;
    assert!(
        json["detail"]
            .as_str()
            .unwrap()
            .contains("connection refused")
    );
    assert_eq!(client.call_count(Service::Documents), 0);
}

#[tokio::test]
async fn test_register_missing_document_is_bad_request() {
    let client = happy_client();
    let app = setup(&client);
    let data = registration_data().to_string();

    let response = app
        .oneshot(register_request(&[("data", None, data.as_bytes())]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(client.calls().is_empty());
}

#[tokio::test]
async fn test_register_invalid_data_is_bad_request() {
    let client = happy_client();
    let app = setup(&client);

    let response = app
        .oneshot(register_request(&[
            ("data", None, b"{\"id\": \"not-a-number\"}"),
            ("document", Some("cedula.pdf"), b"%PDF-1.7"),
        ]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(client.calls().is_empty());
}

#[tokio::test]
async fn test_authenticate_doc_requires_token() {
    let client = InMemoryServiceClient::new();
    let app = setup(&client);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/orchestrator/authenticate_doc")
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({
                        "document_id": 7,
                        "document_name": "diploma.pdf",
                        "document_path": "/doc/1/diploma.pdf"
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(client.calls().is_empty());
}

#[tokio::test]
async fn test_authenticate_doc_signs_and_reports() {
    let client = InMemoryServiceClient::new();
    client
        .respond(
            Service::Documents,
            Method::Post,
            SIGNED_URLS_PATH,
            200,
            json!({ "signed_urls": ["https://files.example/doc?sig=1"] }),
        )
        .respond(
            Service::Documents,
            Method::Patch,
            "/metadata/7/sign",
            200,
            json!({}),
        )
        .respond(
            Service::Registry,
            Method::Post,
            AUTHENTICATE_DOCUMENT_PATH,
            200,
            json!({}),
        );
    let app = setup(&client);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/orchestrator/authenticate_doc")
                .header("content-type", "application/json")
                .header("authorization", format!("Bearer {}", issue_token("1234567890")))
                .body(Body::from(
                    json!({
                        "document_id": 7,
                        "document_name": "diploma.pdf",
                        "document_path": "/doc/1234567890/diploma.pdf"
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["message"], DOCUMENT_SIGNED_MESSAGE);

    let report = client
        .find_call(Service::Registry, AUTHENTICATE_DOCUMENT_PATH)
        .unwrap();
    match report.body {
        saga::services::client::CallBody::Json(body) => {
            assert_eq!(body["id_citizen"], 1234567890u64);
            assert_eq!(body["urlDocument"], "https://files.example/doc?sig=1");
            assert_eq!(body["document_title"], "diploma.pdf");
        }
        other => panic!("expected JSON body, got {other:?}"),
    }
}

#[tokio::test]
async fn test_operators_are_filtered() {
    let client = InMemoryServiceClient::new();
    client.respond(
        Service::Registry,
        Method::Get,
        GET_OPERATORS_PATH,
        200,
        json!([
            { "operatorName": "A", "transferAPIURL": "https://a.example/transfer" },
            { "operatorName": "B" },
            { "name": "C", "transferAPIURL": "https://c.example/transfer" }
        ]),
    );
    let app = setup(&client);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/orchestrator/operators")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let names: Vec<_> = json
        .as_array()
        .unwrap()
        .iter()
        .map(|o| o["operatorName"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(names, ["A", "C"]);
}

#[tokio::test]
async fn test_operators_discovery_failure_is_internal_error() {
    let client = InMemoryServiceClient::new();
    client.fail(
        Service::Registry,
        Method::Get,
        GET_OPERATORS_PATH,
        "connection refused",
    );
    let app = setup(&client);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/orchestrator/operators")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let client = happy_client();
    let app = setup(&client);

    // Generate some activity first.
    let _ = app.clone().oneshot(full_registration()).await.unwrap();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["content-type"],
        api::routes::metrics::PROMETHEUS_CONTENT_TYPE
    );
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("registration_sagas_total"));
}

#[tokio::test]
async fn test_state_is_shared_across_requests() {
    let client = happy_client();
    let config = config();
    let state = api::create_state(client.clone(), &config);
    let app = api::create_app(Arc::clone(&state), get_metrics_handle(), config.max_upload_bytes);

    for _ in 0..3 {
        let response = app.clone().oneshot(full_registration()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
    assert_eq!(client.sessions_opened(), 3);
    assert_eq!(client.open_session_count(), 0);
}
