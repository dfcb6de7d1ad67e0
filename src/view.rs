use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::error::StoryError;
use crate::models::Story;

/// What the visitor is looking at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum View {
    Form { error: Option<String> },
    Loading,
    Cover { story: Arc<Story> },
    Book { story: Arc<Story>, page: usize },
}

impl View {
    pub fn name(&self) -> &'static str {
        match self {
            View::Form { .. } => "form",
            View::Loading => "loading",
            View::Cover { .. } => "cover",
            View::Book { .. } => "book",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("cannot {action} while in the {state} view")]
    Invalid {
        action: &'static str,
        state: &'static str,
    },

    #[error("page {page} is out of range for a story of {len} pages")]
    PageOutOfRange { page: usize, len: usize },
}

/// Form → loading → cover → book → form. Nothing else is allowed.
#[derive(Debug, Clone)]
pub struct ViewController {
    view: View,
}

impl Default for ViewController {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewController {
    pub fn new() -> Self {
        Self {
            view: View::Form { error: None },
        }
    }

    pub fn view(&self) -> &View {
        &self.view
    }

    /// The story currently on screen, if any.
    pub fn story(&self) -> Option<&Arc<Story>> {
        match &self.view {
            View::Cover { story } | View::Book { story, .. } => Some(story),
            View::Form { .. } | View::Loading => None,
        }
    }

    fn reject(&self, action: &'static str) -> TransitionError {
        TransitionError::Invalid {
            action,
            state: self.view.name(),
        }
    }

    pub fn submit(&mut self) -> Result<(), TransitionError> {
        match self.view {
            View::Form { .. } => {
                self.view = View::Loading;
                Ok(())
            }
            _ => Err(self.reject("submit a story")),
        }
    }

    pub fn succeed(&mut self, story: Story) -> Result<(), TransitionError> {
        match self.view {
            View::Loading => {
                self.view = View::Cover {
                    story: Arc::new(story),
                };
                Ok(())
            }
            _ => Err(self.reject("show a new story")),
        }
    }

    /// Back to the form with the classified, user-facing message.
    pub fn fail(&mut self, error: &StoryError) -> Result<(), TransitionError> {
        match self.view {
            View::Loading => {
                self.view = View::Form {
                    error: Some(error.user_message().to_string()),
                };
                Ok(())
            }
            _ => Err(self.reject("report a failure")),
        }
    }

    pub fn open(&mut self) -> Result<(), TransitionError> {
        match &self.view {
            View::Cover { story } => {
                self.view = View::Book {
                    story: story.clone(),
                    page: 0,
                };
                Ok(())
            }
            _ => Err(self.reject("open the book")),
        }
    }

    pub fn go_to_page(&mut self, index: usize) -> Result<(), TransitionError> {
        if let View::Book { story, page } = &mut self.view {
            let len = story.pages.len();
            if index >= len {
                return Err(TransitionError::PageOutOfRange { page: index, len });
            }
            *page = index;
            return Ok(());
        }
        Err(self.reject("turn the page"))
    }

    /// Drops the held story.
    pub fn new_story(&mut self) -> Result<(), TransitionError> {
        match self.view {
            View::Book { .. } => {
                self.view = View::Form { error: None };
                Ok(())
            }
            _ => Err(self.reject("start a new story")),
        }
    }
}
