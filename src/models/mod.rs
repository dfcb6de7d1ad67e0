use serde::{Deserialize, Serialize};

use crate::error::StoryError;

pub const MIN_PAGES: usize = 1;
pub const MAX_PAGES: usize = 15;

/// Narrative style of a story. Only affects prompt phrasing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Tone {
    #[default]
    EpicMedieval,
    SweetFamily,
    Sad,
    Happy,
    Dark,
}

impl Tone {
    pub const ALL: [Tone; 5] = [
        Tone::EpicMedieval,
        Tone::SweetFamily,
        Tone::Sad,
        Tone::Happy,
        Tone::Dark,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Tone::EpicMedieval => "epic-medieval",
            Tone::SweetFamily => "sweet-family",
            Tone::Sad => "sad",
            Tone::Happy => "happy",
            Tone::Dark => "dark",
        }
    }

    /// Label shown in the tone picker.
    pub fn label(self) -> &'static str {
        match self {
            Tone::EpicMedieval => "Épico Medieval",
            Tone::SweetFamily => "Tierno / Familiar",
            Tone::Sad => "Triste",
            Tone::Happy => "Alegre",
            Tone::Dark => "Oscuro",
        }
    }

    /// Phrase interpolated into the story prompt.
    pub fn descriptor(self) -> &'static str {
        match self {
            Tone::EpicMedieval => "una fantasía épica medieval con caballeros y dragones",
            Tone::SweetFamily => "una historia familiar tierna y conmovedora",
            Tone::Sad => "una historia triste, melancólica y conmovedora",
            Tone::Happy => "una historia alegre y optimista",
            Tone::Dark => "una historia oscura, misteriosa y de suspense",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ToneOption {
    pub value: Tone,
    pub label: &'static str,
}

pub fn tone_options() -> Vec<ToneOption> {
    Tone::ALL
        .iter()
        .map(|&tone| ToneOption {
            value: tone,
            label: tone.label(),
        })
        .collect()
}

/// What the user asks for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoryRequest {
    pub idea: String,
    #[serde(default)]
    pub tone: Tone,
    pub num_pages: usize,
}

impl StoryRequest {
    pub fn new(idea: impl Into<String>, tone: Tone, num_pages: usize) -> Self {
        Self {
            idea: idea.into(),
            tone,
            num_pages,
        }
    }

    pub fn validate(&self) -> Result<(), StoryError> {
        if self.idea.trim().is_empty() {
            return Err(StoryError::InvalidRequest(
                "the story idea must not be empty".to_string(),
            ));
        }
        if !(MIN_PAGES..=MAX_PAGES).contains(&self.num_pages) {
            return Err(StoryError::InvalidRequest(format!(
                "num_pages must be between {} and {}, got {}",
                MIN_PAGES, MAX_PAGES, self.num_pages
            )));
        }
        Ok(())
    }
}

/// One page as described by the text model, before its image exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageOutline {
    pub text: String,
    pub image_prompt: String,
}

/// Parsed structured output of the text model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryOutline {
    pub title: String,
    pub cover_image_prompt: String,
    pub pages: Vec<PageOutline>,
}

impl StoryOutline {
    /// Cover prompt first, then one prompt per page in narrative order.
    pub fn image_prompts(&self) -> Vec<&str> {
        std::iter::once(self.cover_image_prompt.as_str())
            .chain(self.pages.iter().map(|page| page.image_prompt.as_str()))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub text: String,
    pub image_prompt: String,
    pub image_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Story {
    pub title: String,
    pub cover_image_url: String,
    pub pages: Vec<Page>,
}

/// An image returned inline by the image backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineImage {
    pub mime_type: String,
    pub base64: String,
}

impl InlineImage {
    pub fn new(mime_type: impl Into<String>, base64: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
            base64: base64.into(),
        }
    }

    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.base64)
    }

    /// Parses a `data:<mime>;base64,<payload>` URI. Returns `None` for anything else.
    pub fn from_data_uri(uri: &str) -> Option<Self> {
        let rest = uri.strip_prefix("data:")?;
        let (mime_type, payload) = rest.split_once(";base64,")?;
        if mime_type.is_empty() {
            return None;
        }
        Some(Self::new(mime_type, payload))
    }

    /// File extension matching the mime type, used when embedding into documents.
    pub fn extension(&self) -> &'static str {
        match self.mime_type.as_str() {
            "image/png" => "png",
            "image/webp" => "webp",
            "image/gif" => "gif",
            _ => "jpg",
        }
    }
}
