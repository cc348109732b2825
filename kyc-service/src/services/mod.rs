pub mod accounts;
pub mod aggregator;
pub mod database;
pub mod error;
pub mod intake;
pub mod jwt;
pub mod memory;
pub mod metrics;
pub mod notifier;
pub mod storage;
pub mod store;

pub use accounts::AccountDirectory;
pub use aggregator::{derive_kyc_status, VerificationAggregator};
pub use database::Database;
pub use error::{ServiceError, ServiceResult};
pub use intake::{DocumentIntake, UploadRequest};
pub use jwt::{IssuedToken, TokenService};
pub use memory::InMemoryStore;
pub use notifier::{
    HttpPushNotifier, MockNotifier, NoopNotifier, Notification, NotificationKind, Notifier,
};
pub use storage::{BlobStore, LocalStorage};
pub use store::{DecisionOutcome, KycStats, RecordStore, StatusCounts};
