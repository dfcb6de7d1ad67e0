use std::sync::Arc;

use crate::error::StoryError;
use crate::models::{StoryOutline, Tone};
use crate::services::TextModel;
use crate::services::prompt;

/// Asks the text model for a story outline and checks its shape.
#[derive(Clone)]
pub struct StoryGenerator {
    model: Arc<dyn TextModel>,
}

impl StoryGenerator {
    pub fn new(model: Arc<dyn TextModel>) -> Self {
        Self { model }
    }

    pub async fn generate(
        &self,
        idea: &str,
        tone: Tone,
        num_pages: usize,
    ) -> Result<StoryOutline, StoryError> {
        let prompt = prompt::story_prompt(idea, tone, num_pages);
        let schema = prompt::story_schema();

        let raw = self.model.generate_json(&prompt, &schema).await?;
        let outline = parse_outline(&raw, num_pages)?;

        tracing::debug!(
            "Story outline received: {:?} with {} pages",
            outline.title,
            outline.pages.len()
        );
        Ok(outline)
    }
}

/// Parses the model's JSON payload. Any structural problem is fatal.
pub fn parse_outline(raw: &str, num_pages: usize) -> Result<StoryOutline, StoryError> {
    let outline: StoryOutline = serde_json::from_str(raw.trim())
        .map_err(|e| StoryError::InvalidResponseShape(e.to_string()))?;

    if outline.title.trim().is_empty() {
        return Err(StoryError::InvalidResponseShape(
            "story has no title".to_string(),
        ));
    }
    if outline.pages.is_empty() {
        return Err(StoryError::InvalidResponseShape(
            "story has no pages".to_string(),
        ));
    }
    if outline.pages.len() != num_pages {
        return Err(StoryError::InvalidResponseShape(format!(
            "expected {} pages, got {}",
            num_pages,
            outline.pages.len()
        )));
    }

    Ok(outline)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedTextModel;

    const TWO_PAGES: &str = r#"{
        "title": "El robot y el bosque",
        "coverImagePrompt": "a robot at the edge of a forest",
        "pages": [
            {"text": "Había una vez...", "imagePrompt": "robot alone"},
            {"text": "Y encontró el bosque.", "imagePrompt": "robot among trees"}
        ]
    }"#;

    #[test]
    fn parses_a_well_formed_outline() {
        let outline = parse_outline(TWO_PAGES, 2).unwrap();
        assert_eq!(outline.title, "El robot y el bosque");
        assert_eq!(outline.pages[1].image_prompt, "robot among trees");
    }

    #[test]
    fn rejects_malformed_json() {
        let err = parse_outline("{not json", 2).unwrap_err();
        assert!(matches!(err, StoryError::InvalidResponseShape(_)));
    }

    #[test]
    fn rejects_missing_fields() {
        let err = parse_outline(r#"{"coverImagePrompt":"c","pages":[]}"#, 1).unwrap_err();
        assert!(matches!(err, StoryError::InvalidResponseShape(_)));
    }

    #[test]
    fn rejects_blank_title() {
        let raw = r#"{"title":"  ","coverImagePrompt":"c","pages":[{"text":"t","imagePrompt":"p"}]}"#;
        let err = parse_outline(raw, 1).unwrap_err();
        assert_eq!(
            err,
            StoryError::InvalidResponseShape("story has no title".into())
        );
    }

    #[test]
    fn rejects_empty_pages() {
        let raw = r#"{"title":"T","coverImagePrompt":"c","pages":[]}"#;
        let err = parse_outline(raw, 1).unwrap_err();
        assert_eq!(
            err,
            StoryError::InvalidResponseShape("story has no pages".into())
        );
    }

    #[test]
    fn rejects_page_count_mismatch() {
        let err = parse_outline(TWO_PAGES, 3).unwrap_err();
        assert_eq!(
            err,
            StoryError::InvalidResponseShape("expected 3 pages, got 2".into())
        );
    }

    #[tokio::test]
    async fn sends_prompt_and_schema_once() {
        let model = Arc::new(ScriptedTextModel::replying(TWO_PAGES));
        let generator = StoryGenerator::new(model.clone());

        let outline = generator.generate("un robot", Tone::Happy, 2).await.unwrap();
        assert_eq!(outline.pages.len(), 2);

        let prompts = model.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("exactamente 2 páginas"));
    }

    #[tokio::test]
    async fn upstream_errors_pass_through() {
        let model = Arc::new(ScriptedTextModel::failing(StoryError::Upstream(
            "503 UNAVAILABLE: overloaded".into(),
        )));
        let generator = StoryGenerator::new(model);

        let err = generator.generate("idea", Tone::Dark, 1).await.unwrap_err();
        assert_eq!(err, StoryError::Upstream("503 UNAVAILABLE: overloaded".into()));
    }
}
