use std::sync::Arc;

use futures::future::try_join_all;

use crate::error::StoryError;
use crate::models::{Page, Story, StoryOutline, StoryRequest};
use crate::services::images::ImageGenerator;
use crate::services::story::StoryGenerator;
use crate::services::{ImageModel, TextModel};

/// Runs the whole pipeline: outline first, then every illustration at once.
#[derive(Clone)]
pub struct Storyteller {
    stories: StoryGenerator,
    images: ImageGenerator,
}

impl Storyteller {
    pub fn new(text_model: Arc<dyn TextModel>, image_model: Arc<dyn ImageModel>) -> Self {
        Self {
            stories: StoryGenerator::new(text_model),
            images: ImageGenerator::new(image_model),
        }
    }

    /// Produces a finished story or nothing. A failing image discards the
    /// images that already succeeded, and the image requests still in flight
    /// are dropped at that point, which cancels them instead of letting them
    /// run to completion.
    #[tracing::instrument(skip(self, request), fields(tone = request.tone.as_str(), num_pages = request.num_pages))]
    pub async fn create_story(&self, request: &StoryRequest) -> Result<Story, StoryError> {
        request.validate()?;

        let outline = self
            .stories
            .generate(&request.idea, request.tone, request.num_pages)
            .await
            .inspect_err(|e| tracing::error!("Error generating story: {}", e))?;

        let image_urls = {
            let prompts = outline.image_prompts();
            tracing::info!(
                "Generating {} images for {:?}",
                prompts.len(),
                outline.title
            );

            try_join_all(prompts.iter().map(|prompt| self.images.generate(prompt)))
                .await
                .inspect_err(|e| tracing::error!("Error generating image: {}", e))?
        };

        assemble(outline, image_urls)
    }
}

/// Binds images to slots by position: the first is the cover, the rest follow page order.
pub fn assemble(outline: StoryOutline, image_urls: Vec<String>) -> Result<Story, StoryError> {
    if image_urls.len() != outline.pages.len() + 1 {
        return Err(StoryError::InvalidResponseShape(format!(
            "expected {} images for {} pages, got {}",
            outline.pages.len() + 1,
            outline.pages.len(),
            image_urls.len()
        )));
    }

    let mut image_urls = image_urls.into_iter();
    let cover_image_url = image_urls
        .next()
        .ok_or(StoryError::NoImageProduced)?;

    let pages = outline
        .pages
        .into_iter()
        .zip(image_urls)
        .map(|(page, image_url)| Page {
            text: page.text,
            image_prompt: page.image_prompt,
            image_url,
        })
        .collect();

    Ok(Story {
        title: outline.title,
        cover_image_url,
        pages,
    })
}
