use std::sync::Arc;

use crate::error::StoryError;
use crate::services::prompt;
use crate::services::{ImageModel, ImageRequest};

pub const IMAGE_MIME_TYPE: &str = "image/jpeg";
pub const IMAGE_ASPECT_RATIO: &str = "1:1";

/// Turns one visual prompt into one inline image.
#[derive(Clone)]
pub struct ImageGenerator {
    model: Arc<dyn ImageModel>,
}

impl ImageGenerator {
    pub fn new(model: Arc<dyn ImageModel>) -> Self {
        Self { model }
    }

    /// Returns the image as a `data:` URI.
    pub async fn generate(&self, visual_prompt: &str) -> Result<String, StoryError> {
        let request = ImageRequest {
            prompt: prompt::image_prompt(visual_prompt),
            number_of_images: 1,
            mime_type: IMAGE_MIME_TYPE,
            aspect_ratio: IMAGE_ASPECT_RATIO,
        };

        let images = self.model.generate_images(&request).await?;
        let image = images
            .into_iter()
            .next()
            .ok_or(StoryError::NoImageProduced)?;

        Ok(image.to_data_uri())
    }
}
