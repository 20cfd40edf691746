use derive_setters::Setters;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use crate::Error;

/// The content family a block of text was classified into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ContentType {
    Text,
    Markdown,
    Html,
    Json,
    Xml,
    Code,
}

impl ContentType {
    /// Tie-break rank between families that scored the same. Higher wins.
    pub fn specificity(&self) -> u8 {
        match self {
            ContentType::Code => 5,
            ContentType::Json => 4,
            ContentType::Xml => 3,
            ContentType::Html => 2,
            ContentType::Markdown => 1,
            ContentType::Text => 0,
        }
    }
}

/// Caller override for the renderer family. Anything other than `Auto`
/// bypasses classification.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Auto,
    Text,
    Markdown,
    Html,
    Json,
    Code,
}

impl OutputFormat {
    /// The content type the caller pinned, if any.
    pub fn pinned(&self) -> Option<ContentType> {
        match self {
            OutputFormat::Auto => None,
            OutputFormat::Text => Some(ContentType::Text),
            OutputFormat::Markdown => Some(ContentType::Markdown),
            OutputFormat::Html => Some(ContentType::Html),
            OutputFormat::Json => Some(ContentType::Json),
            OutputFormat::Code => Some(ContentType::Code),
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" | "" => Ok(OutputFormat::Auto),
            "text" | "plain" => Ok(OutputFormat::Text),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            "html" => Ok(OutputFormat::Html),
            "json" => Ok(OutputFormat::Json),
            "code" => Ok(OutputFormat::Code),
            _ => Err(Error::UnknownOutputFormat(s.to_string())),
        }
    }
}

/// Outcome of classifying one input text. Recomputed whenever the input
/// changes; the same input always yields an equal result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Setters)]
#[serde(rename_all = "camelCase")]
#[setters(into, strip_option)]
pub struct DetectionResult {
    pub content_type: ContentType,
    /// Clamped to `[0, 1]`.
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    pub sanitized_content: String,
    pub text_content: String,
}

impl DetectionResult {
    pub fn new(
        content_type: ContentType,
        confidence: f64,
        sanitized_content: impl Into<String>,
        text_content: impl Into<String>,
    ) -> Self {
        Self {
            content_type,
            confidence: confidence.clamp(0.0, 1.0),
            sub_type: None,
            language: None,
            sanitized_content: sanitized_content.into(),
            text_content: text_content.into(),
        }
    }

    /// Result for empty input: nothing to render.
    pub fn empty() -> Self {
        Self::new(ContentType::Text, 1.0, "", "")
    }

    pub fn is_empty(&self) -> bool {
        self.sanitized_content.trim().is_empty()
    }
}
