//! Posting today's outlook.

mod twitter;

pub use twitter::TwitterPublisher;

use crate::error::Result;
use async_trait::async_trait;
use std::path::Path;

/// Posts a short message with an attached image.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, text: &str, image: &Path) -> Result<()>;
}
