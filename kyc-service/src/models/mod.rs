//! Domain models for the KYC service.

pub mod document;
pub mod identity;

pub use document::{DocumentCategory, DocumentStatus, ReviewDecision, VerificationDocument};
pub use identity::{
    AuthenticatedIdentity, IdDocumentType, Identity, IdentityRecord, KycStatus, Profile, Role,
};
