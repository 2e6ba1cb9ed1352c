//! Secret resolution.
//!
//! [`KeyStore`] is the async trait for resolving a reference into its plaintext value.
//! [`SsmKeyStore`] implements it with AWS SSM Parameter Store and
//! [`StaticKeyStore`] serves values already held in memory.

mod ssm;
mod memory;

pub use memory::StaticKeyStore;
pub use ssm::SsmKeyStore;

use crate::config::SecretSource;
use crate::error::Result;

/// Resolves a vault reference (e.g. an SSM parameter path) into a plaintext secret.
#[async_trait::async_trait]
pub trait KeyStore: Send + Sync {
    async fn get(&self, reference: &str) -> Result<String>;
}

/// Resolves `source`; `store` is consulted only for vault references.
pub async fn resolve_secret(source: &SecretSource, store: &dyn KeyStore) -> Result<String> {
    match source {
        SecretSource::Literal(value) => Ok(value.clone()),
        SecretSource::Ssm(path) => store.get(path).await,
    }
}
