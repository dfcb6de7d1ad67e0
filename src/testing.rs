//! Scripted model backends for tests.
//!
//! - `ScriptedTextModel` replies with a fixed payload or a fixed error
//! - `ScriptedImageModel` echoes prompts back as images, with optional
//!   failures, delays and a rendezvous barrier
//!
//! Both record every call so tests can check what reached the backend.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::{Value, json};
use tokio::sync::Barrier;

use crate::error::StoryError;
use crate::models::InlineImage;
use crate::services::{ImageModel, ImageRequest, TextModel};

/// Builds a text-model payload in the shape the story schema asks for.
pub fn outline_json(title: &str, cover_prompt: &str, pages: &[(&str, &str)]) -> String {
    let pages: Vec<Value> = pages
        .iter()
        .map(|(text, image_prompt)| json!({ "text": text, "imagePrompt": image_prompt }))
        .collect();
    json!({
        "title": title,
        "coverImagePrompt": cover_prompt,
        "pages": pages,
    })
    .to_string()
}

/// Decodes a `data:` URI produced by `ScriptedImageModel::echo` back into the prompt text.
pub fn echoed_prompt(data_uri: &str) -> Option<String> {
    let image = InlineImage::from_data_uri(data_uri)?;
    let bytes = STANDARD.decode(image.base64).ok()?;
    String::from_utf8(bytes).ok()
}

pub struct ScriptedTextModel {
    reply: Result<String, StoryError>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedTextModel {
    pub fn replying(payload: impl Into<String>) -> Self {
        Self {
            reply: Ok(payload.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(error: StoryError) -> Self {
        Self {
            reply: Err(error),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl TextModel for ScriptedTextModel {
    async fn generate_json(&self, prompt: &str, _schema: &Value) -> Result<String, StoryError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.reply.clone()
    }
}

enum ImageBehavior {
    Echo,
    Empty,
}

pub struct ScriptedImageModel {
    behavior: ImageBehavior,
    fail_on: Option<String>,
    delays: Vec<(String, Duration)>,
    barrier: Option<Arc<Barrier>>,
    requests: Mutex<Vec<ImageRequest>>,
    completed: Mutex<usize>,
}

impl ScriptedImageModel {
    /// Every request yields one JPEG whose bytes are the request prompt.
    pub fn echo() -> Self {
        Self::with_behavior(ImageBehavior::Echo)
    }

    /// Every request yields zero images.
    pub fn empty() -> Self {
        Self::with_behavior(ImageBehavior::Empty)
    }

    fn with_behavior(behavior: ImageBehavior) -> Self {
        Self {
            behavior,
            fail_on: None,
            delays: Vec::new(),
            barrier: None,
            requests: Mutex::new(Vec::new()),
            completed: Mutex::new(0),
        }
    }

    /// Requests whose prompt contains `needle` fail with a quota error.
    pub fn fail_on(mut self, needle: impl Into<String>) -> Self {
        self.fail_on = Some(needle.into());
        self
    }

    /// Requests whose prompt contains `needle` wait for `delay` before answering.
    pub fn delay_on(mut self, needle: impl Into<String>, delay: Duration) -> Self {
        self.delays.push((needle.into(), delay));
        self
    }

    /// Every request waits on `barrier` before answering.
    pub fn rendezvous(mut self, barrier: Arc<Barrier>) -> Self {
        self.barrier = Some(barrier);
        self
    }

    pub fn requests(&self) -> Vec<ImageRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Number of requests that ran to a successful answer.
    pub fn completed(&self) -> usize {
        *self.completed.lock().unwrap()
    }
}

#[async_trait]
impl ImageModel for ScriptedImageModel {
    async fn generate_images(
        &self,
        request: &ImageRequest,
    ) -> Result<Vec<InlineImage>, StoryError> {
        self.requests.lock().unwrap().push(request.clone());

        if let Some(barrier) = &self.barrier {
            barrier.wait().await;
        }

        let delay = self
            .delays
            .iter()
            .find(|(needle, _)| request.prompt.contains(needle.as_str()))
            .map(|(_, delay)| *delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(needle) = &self.fail_on {
            if request.prompt.contains(needle.as_str()) {
                return Err(StoryError::Upstream(
                    "429 RESOURCE_EXHAUSTED: quota exceeded".to_string(),
                ));
            }
        }

        let images = match self.behavior {
            ImageBehavior::Echo => vec![InlineImage::new(
                request.mime_type,
                STANDARD.encode(request.prompt.as_bytes()),
            )],
            ImageBehavior::Empty => Vec::new(),
        };

        *self.completed.lock().unwrap() += 1;
        Ok(images)
    }
}
