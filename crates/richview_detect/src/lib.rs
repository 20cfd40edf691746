//! Classifies untrusted text into a content family with a confidence score.

mod detector;
mod html;
mod language;
mod score;

pub use detector::ContentTypeDetector;
pub use html::{sanitize_html, text_content};
pub use language::guess_language;
