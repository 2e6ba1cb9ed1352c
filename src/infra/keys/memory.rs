use std::collections::HashMap;

use super::KeyStore;
use crate::error::{PipelineError, Result};

/// In-memory secrets keyed by reference.
#[derive(Debug, Default, Clone)]
pub struct StaticKeyStore {
    entries: HashMap<String, String>,
}

impl StaticKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, reference: &str, value: &str) -> Self {
        self.entries.insert(reference.to_string(), value.to_string());
        self
    }
}

#[async_trait::async_trait]
impl KeyStore for StaticKeyStore {
    async fn get(&self, reference: &str) -> Result<String> {
        self.entries
            .get(reference)
            .cloned()
            .ok_or_else(|| PipelineError::Config(format!("no secret stored for '{reference}'")))
    }
}
