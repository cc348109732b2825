pub mod password;
pub mod validation;

pub use password::{Password, PasswordHashString, PasswordHasherConfig};
pub use validation::ValidatedJson;
