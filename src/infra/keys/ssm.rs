use crate::error::{PipelineError, Result};

use super::KeyStore;

/// Resolves secrets from AWS SSM Parameter Store.
///
/// Parameters are fetched with decryption enabled, so `SecureString` values
/// work as long as the process has `ssm:GetParameter` and the matching KMS
/// permissions.
pub struct SsmKeyStore {
    client: aws_sdk_ssm::Client,
}

impl SsmKeyStore {
    pub fn new(config: &aws_config::SdkConfig) -> Self {
        Self {
            client: aws_sdk_ssm::Client::new(config),
        }
    }
}

#[async_trait::async_trait]
impl KeyStore for SsmKeyStore {
    /// Fetches the parameter at `reference`, e.g. `/aus/dashboard/password`.
    async fn get(&self, reference: &str) -> Result<String> {
        let resp = self
            .client
            .get_parameter()
            .name(reference)
            .with_decryption(true)
            .send()
            .await
            .map_err(|e| {
                PipelineError::Config(format!("SSM GetParameter failed for '{reference}': {e}"))
            })?;

        resp.parameter.and_then(|p| p.value).ok_or_else(|| {
            PipelineError::Config(format!("SSM parameter '{reference}' exists but has no value"))
        })
    }
}
