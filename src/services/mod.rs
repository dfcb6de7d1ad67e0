pub mod export;
pub mod gemini;
pub mod images;
pub mod prompt;
pub mod story;
pub mod storyteller;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::StoryError;
use crate::models::InlineImage;

/// A text model that answers with JSON constrained by a response schema.
#[async_trait]
pub trait TextModel: Send + Sync {
    /// Returns the raw JSON text produced by the model.
    async fn generate_json(&self, prompt: &str, schema: &Value) -> Result<String, StoryError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRequest {
    pub prompt: String,
    pub number_of_images: u32,
    pub mime_type: &'static str,
    pub aspect_ratio: &'static str,
}

/// An image model returning its images inline.
#[async_trait]
pub trait ImageModel: Send + Sync {
    /// May return fewer images than requested, including none.
    async fn generate_images(&self, request: &ImageRequest)
    -> Result<Vec<InlineImage>, StoryError>;
}
