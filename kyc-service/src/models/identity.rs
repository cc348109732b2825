//! Identity model - registered accounts and their aggregate KYC status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Account role carried in session tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}

/// Identity-level verification outcome. Only the aggregator writes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum KycStatus {
    Pending,
    Approved,
    Rejected,
}

impl KycStatus {
    pub const ALL: [KycStatus; 3] = [KycStatus::Pending, KycStatus::Approved, KycStatus::Rejected];

    pub fn as_str(&self) -> &'static str {
        match self {
            KycStatus::Pending => "pending",
            KycStatus::Approved => "approved",
            KycStatus::Rejected => "rejected",
        }
    }
}

impl std::str::FromStr for KycStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(KycStatus::Pending),
            "approved" => Ok(KycStatus::Approved),
            "rejected" => Ok(KycStatus::Rejected),
            _ => Err(format!("Invalid KYC status: {}", s)),
        }
    }
}

/// Kind of government id the identity registered with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum IdDocumentType {
    Cedula,
    Pasaporte,
}

impl IdDocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            IdDocumentType::Cedula => "cedula",
            IdDocumentType::Pasaporte => "pasaporte",
        }
    }
}

impl std::str::FromStr for IdDocumentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cedula" => Ok(IdDocumentType::Cedula),
            "pasaporte" => Ok(IdDocumentType::Pasaporte),
            _ => Err(format!("Invalid id document type: {}", s)),
        }
    }
}

/// Profile data supplied at registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub first_name: String,
    pub last_name: String,
    pub document_type: IdDocumentType,
    pub document_number: String,
    pub email: String,
    pub phone_number: String,
    pub address: String,
    pub facebook_profile: Option<String>,
    pub instagram_profile: Option<String>,
    pub twitter_profile: Option<String>,
    pub linkedin_profile: Option<String>,
}

/// Stored identity row, including the password hash.
///
/// Never leaves the account directory and the record store; callers get [`Identity`].
#[derive(Debug, Clone)]
pub struct IdentityRecord {
    pub id: Uuid,
    pub profile: Profile,
    pub password_hash: String,
    pub role: Role,
    pub kyc_status: KycStatus,
    pub email_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl IdentityRecord {
    /// A fresh self-registered account: role user, KYC pending, email unverified.
    pub fn new(profile: Profile, password_hash: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            profile,
            password_hash,
            role: Role::User,
            kyc_status: KycStatus::Pending,
            email_verified: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn sanitized(&self) -> Identity {
        Identity::from(self.clone())
    }
}

/// Identity as returned to callers (no credential material).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Identity {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub document_type: IdDocumentType,
    pub document_number: String,
    pub email: String,
    pub phone_number: String,
    pub address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub facebook_profile: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instagram_profile: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub twitter_profile: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub linkedin_profile: Option<String>,
    pub role: Role,
    pub kyc_status: KycStatus,
    pub email_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<IdentityRecord> for Identity {
    fn from(r: IdentityRecord) -> Self {
        let p = r.profile;
        Self {
            id: r.id,
            first_name: p.first_name,
            last_name: p.last_name,
            document_type: p.document_type,
            document_number: p.document_number,
            email: p.email,
            phone_number: p.phone_number,
            address: p.address,
            facebook_profile: p.facebook_profile,
            instagram_profile: p.instagram_profile,
            twitter_profile: p.twitter_profile,
            linkedin_profile: p.linkedin_profile,
            role: r.role,
            kyc_status: r.kyc_status,
            email_verified: r.email_verified,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

/// Caller identity established once per request by the authorization gate.
///
/// Immutable after construction and passed explicitly into every operation that
/// needs to know who is acting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedIdentity {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
}

impl AuthenticatedIdentity {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitized_identity_omits_password_hash() {
        let record = IdentityRecord::new(
            Profile {
                first_name: "Ana".to_string(),
                last_name: "Gomez".to_string(),
                document_type: IdDocumentType::Cedula,
                document_number: "1234567".to_string(),
                email: "ana@example.com".to_string(),
                phone_number: "3001234567".to_string(),
                address: "Calle 10 # 20-30".to_string(),
                facebook_profile: None,
                instagram_profile: None,
                twitter_profile: None,
                linkedin_profile: None,
            },
            "$argon2id$v=19$secret".to_string(),
        );

        let json = serde_json::to_value(record.sanitized()).unwrap();
        assert!(json.get("password_hash").is_none());
        assert!(!json.to_string().contains("argon2"));
        assert_eq!(json["role"], "user");
        assert_eq!(json["kyc_status"], "pending");
        assert_eq!(json["email_verified"], false);
    }

    #[test]
    fn role_parses_only_known_values() {
        assert_eq!("admin".parse::<Role>(), Ok(Role::Admin));
        assert!("root".parse::<Role>().is_err());
    }
}
