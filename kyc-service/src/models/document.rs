use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// The three identity artifacts a user must submit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DocumentCategory {
    FrontFace,
    BackFace,
    Portrait,
}

impl DocumentCategory {
    pub const ALL: [DocumentCategory; 3] = [
        DocumentCategory::FrontFace,
        DocumentCategory::BackFace,
        DocumentCategory::Portrait,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentCategory::FrontFace => "front_face",
            DocumentCategory::BackFace => "back_face",
            DocumentCategory::Portrait => "portrait",
        }
    }
}

impl std::str::FromStr for DocumentCategory {
    type Err = String;

    /// Accepts the canonical names plus the hyphenated and legacy id-card spellings.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "front_face" | "front-face" | "cedula_front" => Ok(DocumentCategory::FrontFace),
            "back_face" | "back-face" | "cedula_back" => Ok(DocumentCategory::BackFace),
            "portrait" | "face_photo" => Ok(DocumentCategory::Portrait),
            _ => Err(format!("Invalid document category: {}", s)),
        }
    }
}

/// Per-document review state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Pending,
    Approved,
    Rejected,
}

impl DocumentStatus {
    pub const ALL: [DocumentStatus; 3] = [
        DocumentStatus::Pending,
        DocumentStatus::Approved,
        DocumentStatus::Rejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Pending => "pending",
            DocumentStatus::Approved => "approved",
            DocumentStatus::Rejected => "rejected",
        }
    }
}

impl std::str::FromStr for DocumentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(DocumentStatus::Pending),
            "approved" => Ok(DocumentStatus::Approved),
            "rejected" => Ok(DocumentStatus::Rejected),
            _ => Err(format!("Invalid document status: {}", s)),
        }
    }
}

/// An operator's verdict on one document.
///
/// A rejection always carries its reason, so status and reason cannot disagree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewDecision {
    Approve,
    Reject { reason: String },
}

impl ReviewDecision {
    pub fn status(&self) -> DocumentStatus {
        match self {
            ReviewDecision::Approve => DocumentStatus::Approved,
            ReviewDecision::Reject { .. } => DocumentStatus::Rejected,
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            ReviewDecision::Approve => None,
            ReviewDecision::Reject { reason } => Some(reason),
        }
    }
}

/// One uploaded identity artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct VerificationDocument {
    pub id: Uuid,
    pub identity_id: Uuid,
    pub category: DocumentCategory,
    #[serde(skip_serializing)]
    pub blob_key: String,
    pub original_name: String,
    pub size_bytes: i64,
    pub mime_type: String,
    pub status: DocumentStatus,
    /// Present iff `status` is rejected.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviewed_by: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl VerificationDocument {
    pub fn new_pending(
        identity_id: Uuid,
        category: DocumentCategory,
        blob_key: String,
        original_name: String,
        size_bytes: i64,
        mime_type: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            identity_id,
            category,
            blob_key,
            original_name,
            size_bytes,
            mime_type,
            status: DocumentStatus::Pending,
            rejection_reason: None,
            reviewed_by: None,
            reviewed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Overwrites status and reason. Re-deciding an already decided document is allowed.
    pub fn apply_decision(&mut self, decision: &ReviewDecision, reviewer: Uuid, at: DateTime<Utc>) {
        self.status = decision.status();
        self.rejection_reason = decision.reason().map(str::to_string);
        self.reviewed_by = Some(reviewer);
        self.reviewed_at = Some(at);
        self.updated_at = at;
    }
}
