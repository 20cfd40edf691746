use derive_setters::Setters;
use serde::{Deserialize, Serialize};
use strum_macros::Display;

use crate::ConfigError;

/// Minimum confidence each content family needs before the router trusts the
/// classification. Markdown is the most lenient: rendering prose as markdown
/// by mistake is less jarring than showing raw markdown markers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Setters)]
#[serde(rename_all = "camelCase", default)]
pub struct Thresholds {
    pub code: f64,
    pub json: f64,
    pub xml: f64,
    pub html: f64,
    pub markdown: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self { code: 0.6, json: 0.7, xml: 0.7, html: 0.5, markdown: 0.4 }
    }
}

impl Thresholds {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let entries = [
            ("code", self.code),
            ("json", self.json),
            ("xml", self.xml),
            ("html", self.html),
            ("markdown", self.markdown),
        ];
        for (family, value) in entries {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::InvalidThreshold { family, value });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Setters)]
#[serde(rename_all = "camelCase", default)]
pub struct ChartSettings {
    pub enabled: bool,
    /// Delay between checks for the engine and the target canvas.
    pub poll_interval_ms: u64,
}

impl Default for ChartSettings {
    fn default() -> Self {
        Self { enabled: true, poll_interval_ms: 50 }
    }
}

/// How the HTML renderer presents sanitized markup.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum HtmlPreviewMode {
    #[default]
    Inline,
    SandboxedFrame,
    OffscreenCanvas,
}

impl std::str::FromStr for HtmlPreviewMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace(['-', '_'], "").as_str() {
            "inline" => Ok(HtmlPreviewMode::Inline),
            "sandboxedframe" | "frame" | "iframe" => Ok(HtmlPreviewMode::SandboxedFrame),
            "offscreencanvas" | "offscreen" | "canvas" => Ok(HtmlPreviewMode::OffscreenCanvas),
            _ => Err(format!(
                "Invalid HTML preview mode: {s}. Valid options are: inline, sandboxed-frame, offscreen-canvas"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Setters)]
#[serde(rename_all = "camelCase", default)]
pub struct RichviewConfig {
    pub thresholds: Thresholds,
    pub chart: ChartSettings,
    pub html_preview: HtmlPreviewMode,
    pub extract_tables: bool,
    pub extract_charts: bool,
    pub max_consecutive_newlines: usize,
}

impl Default for RichviewConfig {
    fn default() -> Self {
        Self {
            thresholds: Thresholds::default(),
            chart: ChartSettings::default(),
            html_preview: HtmlPreviewMode::default(),
            extract_tables: true,
            extract_charts: true,
            max_consecutive_newlines: 2,
        }
    }
}

impl RichviewConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.thresholds.validate()?;
        if self.chart.poll_interval_ms == 0 {
            return Err(ConfigError::ZeroPollInterval);
        }
        Ok(())
    }
}
