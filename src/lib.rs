pub mod app;
pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod session;
pub mod testing;
pub mod view;

pub use config::Config;
pub use error::{ErrorCategory, StoryError, classify};
pub use models::{Page, Story, StoryRequest, Tone};
pub use services::storyteller::Storyteller;
pub use view::{TransitionError, View, ViewController};
