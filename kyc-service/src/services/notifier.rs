use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use uuid::Uuid;

use crate::config::NotifierConfig;
use crate::models::{DocumentCategory, KycStatus, VerificationDocument};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    DocumentApproved,
    DocumentRejected,
    KycStatusChanged,
}

/// A user-facing message about their verification progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub identity_id: Uuid,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub data: HashMap<String, String>,
}

impl Notification {
    pub fn document_decided(document: &VerificationDocument) -> Self {
        let category = category_label(document.category);
        let (kind, title, message) = match document.rejection_reason.as_deref() {
            Some(reason) => (
                NotificationKind::DocumentRejected,
                "Document rejected".to_string(),
                format!("Your {} was rejected: {}", category, reason),
            ),
            None => (
                NotificationKind::DocumentApproved,
                "Document approved".to_string(),
                format!("Your {} was approved", category),
            ),
        };

        let mut data = HashMap::new();
        data.insert("document_id".to_string(), document.id.to_string());
        data.insert("category".to_string(), document.category.as_str().to_string());
        data.insert("status".to_string(), document.status.as_str().to_string());

        Self {
            identity_id: document.identity_id,
            kind,
            title,
            message,
            data,
        }
    }

    pub fn kyc_status_changed(identity_id: Uuid, status: KycStatus) -> Self {
        let message = match status {
            KycStatus::Approved => "Your identity has been verified",
            KycStatus::Rejected => "Your identity verification was rejected",
            KycStatus::Pending => "Your identity verification is under review",
        };

        let mut data = HashMap::new();
        data.insert("kyc_status".to_string(), status.as_str().to_string());

        Self {
            identity_id,
            kind: NotificationKind::KycStatusChanged,
            title: "Verification status updated".to_string(),
            message: message.to_string(),
            data,
        }
    }
}

fn category_label(category: DocumentCategory) -> &'static str {
    match category {
        DocumentCategory::FrontFace => "ID front side",
        DocumentCategory::BackFace => "ID back side",
        DocumentCategory::Portrait => "portrait photo",
    }
}

/// Best-effort outbound channel. Callers log failures and carry on.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &Notification) -> Result<(), anyhow::Error>;
}

/// Posts notifications as JSON to a push gateway.
pub struct HttpPushNotifier {
    client: Client,
    endpoint: String,
}

impl HttpPushNotifier {
    pub fn new(endpoint: String, timeout: Duration) -> Result<Self, anyhow::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build push client: {}", e))?;
        Ok(Self { client, endpoint })
    }
}

#[async_trait]
impl Notifier for HttpPushNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), anyhow::Error> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(notification)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to reach push gateway: {}", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!(
                "Push gateway returned error status {}: {}",
                status,
                body
            ));
        }

        tracing::info!(
            identity_id = %notification.identity_id,
            kind = ?notification.kind,
            "Push notification sent"
        );
        Ok(())
    }
}

/// Logs and drops notifications; used when no push endpoint is configured.
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), anyhow::Error> {
        tracing::debug!(
            identity_id = %notification.identity_id,
            kind = ?notification.kind,
            "Push endpoint not configured, notification dropped"
        );
        Ok(())
    }
}

/// Records every notification; optionally fails each call.
#[derive(Default)]
pub struct MockNotifier {
    pub sent: Mutex<Vec<Notification>>,
    pub fail: bool,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), anyhow::Error> {
        self.sent
            .lock()
            .map_err(|e| anyhow::anyhow!("Mock notifier mutex poisoned: {}", e))?
            .push(notification.clone());
        if self.fail {
            return Err(anyhow::anyhow!("Mock notifier configured to fail"));
        }
        Ok(())
    }
}

/// Picks the HTTP notifier when an endpoint is configured, otherwise the no-op one.
pub fn from_config(config: &NotifierConfig) -> Result<Box<dyn Notifier>, anyhow::Error> {
    match &config.push_endpoint {
        Some(endpoint) => {
            tracing::info!(endpoint = %endpoint, "Push notifications enabled");
            Ok(Box::new(HttpPushNotifier::new(
                endpoint.clone(),
                Duration::from_secs(config.timeout_seconds),
            )?))
        }
        None => Ok(Box::new(NoopNotifier)),
    }
}
