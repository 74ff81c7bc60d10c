//! Login prompt effect

use crate::Result;
use async_trait::async_trait;

/// Questions put to the user during login
#[async_trait]
pub trait LoginPrompter: Send + Sync {
    /// Ask for a name for this device
    async fn prompt_device_name(&self) -> Result<String>;
}
