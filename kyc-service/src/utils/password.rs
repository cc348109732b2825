use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};

use crate::config::PasswordConfig;

/// Plaintext password. `Debug` is redacted so it never reaches a log line.
#[derive(Clone)]
pub struct Password(String);

impl Password {
    pub fn new(password: String) -> Self {
        Self(password)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Password {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Password(***)")
    }
}

/// PHC-encoded Argon2id hash, salt and cost parameters included.
#[derive(Debug, Clone)]
pub struct PasswordHashString(String);

impl PasswordHashString {
    pub fn new(hash: String) -> Self {
        Self(hash)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// Argon2id hasher with configurable cost.
///
/// Verification reads the parameters embedded in the stored hash, so raising the
/// cost only affects new hashes.
#[derive(Debug, Clone, Copy)]
pub struct PasswordHasherConfig {
    params: PasswordConfig,
}

impl PasswordHasherConfig {
    pub fn new(params: PasswordConfig) -> Result<Self, anyhow::Error> {
        // Surface bad cost factors at startup rather than on the first registration.
        build_params(&params)?;
        Ok(Self { params })
    }

    pub fn hash(&self, password: &Password) -> Result<PasswordHashString, anyhow::Error> {
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, build_params(&self.params)?);
        let salt = SaltString::generate(&mut OsRng);

        let password_hash = argon2
            .hash_password(password.as_str().as_bytes(), &salt)
            .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?
            .to_string();

        Ok(PasswordHashString::new(password_hash))
    }

    /// Constant-time comparison against a stored hash.
    pub fn verify(
        &self,
        password: &Password,
        password_hash: &PasswordHashString,
    ) -> Result<(), anyhow::Error> {
        let parsed_hash = PasswordHash::new(password_hash.as_str())
            .map_err(|e| anyhow::anyhow!("Invalid password hash format: {}", e))?;

        Argon2::default()
            .verify_password(password.as_str().as_bytes(), &parsed_hash)
            .map_err(|_| anyhow::anyhow!("Password verification failed"))
    }
}

fn build_params(config: &PasswordConfig) -> Result<Params, anyhow::Error> {
    Params::new(config.memory_kib, config.iterations, config.parallelism, None)
        .map_err(|e| anyhow::anyhow!("Invalid Argon2 parameters: {}", e))
}
