//! Resume analysis: CV text extraction and role suggestion.

pub mod cv;
pub mod prompts;
pub mod titles;

pub use cv::extract_text;
pub use titles::{suggest_or_default, LlmTitleSuggester, TitleSuggester, DEFAULT_TITLES};
