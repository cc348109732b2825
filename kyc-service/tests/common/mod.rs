//! Shared harness for kyc-service integration tests.
//!
//! Builds the full router over the in-memory record store, a temporary blob root
//! and a recording notifier. Requests go through `tower::ServiceExt::oneshot`.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use kyc_service::{
    build_router,
    config::{
        DatabaseConfig, Environment, JwtConfig, KycConfig, NotifierConfig, PasswordConfig,
        SecurityConfig, StorageConfig, StoreBackend, StoreConfig,
    },
    models::Role,
    services::{InMemoryStore, LocalStorage, MockNotifier},
    AppState,
};
use secrecy::SecretString;
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;
use uuid::Uuid;

pub const TEST_JWT_SECRET: &str = "integration-test-signing-secret-0123456789";
pub const TEST_PASSWORD: &str = "correct-horse-battery";
pub const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: Arc<InMemoryStore>,
    pub notifier: Arc<MockNotifier>,
    pub upload_root: TempDir,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap_or(Value::Null)
    }
}

pub fn test_config(upload_root: &str) -> KycConfig {
    KycConfig {
        common: service_core::config::Config::default(),
        environment: Environment::Dev,
        service_name: "kyc-service-test".to_string(),
        service_version: "test".to_string(),
        log_level: "warn".to_string(),
        otlp_endpoint: None,
        store: StoreConfig {
            backend: StoreBackend::Memory,
            database: DatabaseConfig {
                url: String::new(),
                max_connections: 1,
                min_connections: 1,
            },
        },
        jwt: JwtConfig {
            secret: SecretString::new(TEST_JWT_SECRET.to_string()),
            expiry_hours: 24,
        },
        storage: StorageConfig {
            upload_root: upload_root.to_string(),
            max_upload_bytes: MAX_UPLOAD_BYTES,
        },
        // Cheap hashing keeps the suite fast.
        password: PasswordConfig {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        },
        notifier: NotifierConfig {
            push_endpoint: None,
            timeout_seconds: 1,
        },
        security: SecurityConfig {
            allowed_origins: vec!["http://localhost:3000".to_string()],
        },
    }
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with_notifier(MockNotifier::new()).await
    }

    pub async fn spawn_with_notifier(notifier: MockNotifier) -> Self {
        let upload_root = tempfile::tempdir().expect("Failed to create temp dir");
        let config = test_config(upload_root.path().to_str().expect("utf-8 temp path"));

        let store = Arc::new(InMemoryStore::new());
        let blobs = Arc::new(
            LocalStorage::new(upload_root.path())
                .await
                .expect("Failed to create blob storage"),
        );
        let notifier = Arc::new(notifier);

        let state = AppState::new(config, store.clone(), blobs, notifier.clone())
            .expect("Failed to build app state");
        let router = build_router(state.clone());

        Self {
            router,
            state,
            store,
            notifier,
            upload_root,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");
        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .into_body()
            .collect()
            .await
            .expect("Failed to read body")
            .to_bytes()
            .to_vec();
        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.send(builder(Method::GET, uri, token).body(Body::empty()).unwrap())
            .await
    }

    pub async fn send_json(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Value,
    ) -> TestResponse {
        self.send(
            builder(method, uri, token)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    /// Registers a user with a unique email and document number. Returns `(email, body)`.
    pub async fn register(&self) -> (String, Value) {
        let unique = Uuid::new_v4().simple().to_string();
        let email = format!("user-{}@example.com", &unique[..12]);
        let response = self
            .send_json(
                Method::POST,
                "/api/v1/users/register",
                None,
                registration_body(&email, &unique[..15]),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{:?}", response.json());
        (email, response.json())
    }

    pub async fn login(&self, email: &str, password: &str) -> TestResponse {
        self.send_json(
            Method::POST,
            "/api/v1/users/login",
            None,
            json!({ "email": email, "password": password }),
        )
        .await
    }

    /// Registers and logs in a user. Returns `(identity id, token)`.
    pub async fn user_session(&self) -> (Uuid, String) {
        let (email, body) = self.register().await;
        let id = Uuid::parse_str(body["id"].as_str().expect("id")).expect("uuid");
        (id, self.token_for(&email).await)
    }

    /// Registers a user, promotes it to admin and logs in.
    pub async fn admin_session(&self) -> (Uuid, String) {
        let (email, body) = self.register().await;
        let id = Uuid::parse_str(body["id"].as_str().expect("id")).expect("uuid");
        self.store
            .set_role(id, Role::Admin)
            .expect("Failed to promote admin");
        (id, self.token_for(&email).await)
    }

    async fn token_for(&self, email: &str) -> String {
        let response = self.login(email, TEST_PASSWORD).await;
        assert_eq!(response.status, StatusCode::OK);
        response.json()["token"]
            .as_str()
            .expect("token")
            .to_string()
    }

    pub async fn upload(
        &self,
        token: &str,
        category: &str,
        mime_type: &str,
        data: Vec<u8>,
    ) -> TestResponse {
        let (content_type, body) = multipart_body(category, "document.png", mime_type, &data);
        self.send(
            builder(Method::POST, "/api/v1/kyc/upload", Some(token))
                .header(header::CONTENT_TYPE, content_type)
                .body(Body::from(body))
                .unwrap(),
        )
        .await
    }

    /// Uploads one document per category and returns their ids.
    pub async fn upload_full_set(&self, token: &str) -> Vec<Uuid> {
        let mut ids = Vec::new();
        for category in ["front_face", "back_face", "portrait"] {
            let response = self.upload(token, category, "image/png", vec![1u8; 256]).await;
            assert_eq!(response.status, StatusCode::CREATED);
            ids.push(Uuid::parse_str(response.json()["id"].as_str().unwrap()).unwrap());
        }
        ids
    }

    pub async fn approve(&self, admin_token: &str, document_id: Uuid) -> TestResponse {
        self.send(
            builder(
                Method::PUT,
                &format!("/api/v1/admin/kyc/{}/approve", document_id),
                Some(admin_token),
            )
            .body(Body::empty())
            .unwrap(),
        )
        .await
    }

    pub async fn reject(&self, admin_token: &str, document_id: Uuid, reason: &str) -> TestResponse {
        self.send_json(
            Method::PUT,
            &format!("/api/v1/admin/kyc/{}/reject", document_id),
            Some(admin_token),
            json!({ "reason": reason }),
        )
        .await
    }

    pub async fn kyc_status_of(&self, token: &str) -> String {
        self.get("/api/v1/users/profile", Some(token)).await.json()["kyc_status"]
            .as_str()
            .expect("kyc_status")
            .to_string()
    }

    pub fn stored_file_count(&self) -> usize {
        walk(self.upload_root.path())
    }
}

fn walk(dir: &std::path::Path) -> usize {
    std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .flatten()
                .map(|entry| {
                    let path = entry.path();
                    if path.is_dir() {
                        walk(&path)
                    } else {
                        1
                    }
                })
                .sum()
        })
        .unwrap_or(0)
}

pub fn builder(method: Method, uri: &str, token: Option<&str>) -> axum::http::request::Builder {
    let builder = Request::builder().method(method).uri(uri);
    match token {
        Some(token) => builder.header(header::AUTHORIZATION, format!("Bearer {}", token)),
        None => builder,
    }
}

pub fn registration_body(email: &str, document_number: &str) -> Value {
    json!({
        "first_name": "Camila",
        "last_name": "Torres",
        "document_type": "cedula",
        "document_number": document_number,
        "email": email,
        "phone_number": "3001234567",
        "address": "Calle 100 # 15-20, Bogota",
        "password": TEST_PASSWORD
    })
}

/// Hand-built `multipart/form-data` body with a category field and one file part.
pub fn multipart_body(
    category: &str,
    file_name: &str,
    mime_type: &str,
    data: &[u8],
) -> (String, Vec<u8>) {
    let boundary = format!("kyc-test-{}", Uuid::new_v4().simple());
    let mut body = Vec::with_capacity(data.len() + 512);
    body.extend_from_slice(
        format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"document_type\"\r\n\r\n{category}\r\n",
            b = boundary
        )
        .as_bytes(),
    );
    body.extend_from_slice(
        format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: {mime_type}\r\n\r\n",
            b = boundary
        )
        .as_bytes(),
    );
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());
    (format!("multipart/form-data; boundary={}", boundary), body)
}
