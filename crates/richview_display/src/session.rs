use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use richview_chart::{ChartHandle, ChartJob, ChartRenderer, ChartState, EngineLoader, RenderTree, ScriptSandbox};
use richview_config::ChartSettings;
use richview_domain::{ChartSource, escape_html, escape_text};
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::router::RenderOutput;

pub const CANVAS_WIDTH: u32 = 640;
pub const CANVAS_HEIGHT: u32 = 400;

/// How script-derived charts are materialised.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ChartMode {
    /// Build every chart from its extracted configuration.
    #[default]
    Declarative,
    /// Re-execute script fragments in the sandbox against their own canvas
    /// ids. Table-derived charts stay declarative.
    Replay,
}

/// A file offered to the user, addressed by an object URL that lives until
/// the session is unmounted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Download {
    pub file_name: String,
    pub mime_type: &'static str,
    pub url: String,
    pub content: String,
}

/// One rendered response on screen: owns its mounted charts and the object
/// URLs created for copy and download.
pub struct RenderSession {
    output: RenderOutput,
    settings: ChartSettings,
    charts: ChartRenderer,
    handles: Vec<ChartHandle>,
    object_urls: DashMap<String, String>,
}

impl RenderSession {
    pub fn new(output: RenderOutput, loader: Arc<EngineLoader>, settings: ChartSettings) -> Self {
        let charts = ChartRenderer::new(loader, RenderTree::new())
            .poll_interval(Duration::from_millis(settings.poll_interval_ms));
        Self { output, settings, charts, handles: Vec::new(), object_urls: DashMap::new() }
    }

    pub fn output(&self) -> &RenderOutput {
        &self.output
    }

    pub fn tree(&self) -> &RenderTree {
        self.charts.tree()
    }

    pub fn handles(&self) -> &[ChartHandle] {
        &self.handles
    }

    /// Creates a canvas per chart candidate and mounts it. Does nothing when
    /// charts are disabled. Must be called inside a tokio runtime.
    pub fn mount_charts(&mut self, mode: ChartMode) -> &[ChartHandle] {
        if !self.settings.enabled {
            debug!("Charts disabled, nothing mounted");
            return &self.handles;
        }
        self.charts.unmount_all();
        self.handles.clear();

        let tree = self.charts.tree().clone();
        let mut replayed: Vec<&str> = Vec::new();
        for (index, candidate) in self.output.charts.iter().enumerate() {
            let replay = match (&candidate.source, mode) {
                (ChartSource::Script { fragment }, ChartMode::Replay) => {
                    let targets = ScriptSandbox::target_ids(fragment);
                    (!targets.is_empty()).then_some((fragment.as_str(), targets))
                }
                _ => None,
            };
            let handle = match replay {
                // One replay draws every chart of its fragment.
                Some((fragment, _)) if replayed.contains(&fragment) => continue,
                Some((fragment, targets)) => {
                    for target in &targets {
                        tree.create_canvas(target.clone(), CANVAS_WIDTH, CANVAS_HEIGHT);
                    }
                    replayed.push(fragment);
                    self.charts.mount(targets[0].clone(), ChartJob::Script(fragment.to_string()))
                }
                None => {
                    let canvas_id = format!("chart-{index}");
                    tree.create_canvas(canvas_id.clone(), CANVAS_WIDTH, CANVAS_HEIGHT);
                    self.charts.mount(canvas_id, ChartJob::Config(candidate.config.clone()))
                }
            };
            self.handles.push(handle);
        }
        debug!(charts = self.handles.len(), mode = ?mode, "Charts mounted");
        &self.handles
    }

    /// Waits until every mounted chart is ready, failed or destroyed.
    pub async fn settle(&mut self) -> Vec<ChartState> {
        let mut states = Vec::with_capacity(self.handles.len());
        for handle in self.handles.iter_mut() {
            states.push(handle.settled().await);
        }
        states
    }

    /// Chart panels in mount order: the drawn chart, an inline error or a
    /// loading placeholder. A failed chart never affects its siblings.
    pub fn chart_panels(&self) -> Vec<String> {
        self.handles
            .iter()
            .map(|handle| {
                let id = escape_html(handle.canvas_id());
                match handle.state() {
                    ChartState::Ready => {
                        let figures: String = handle
                            .targets()
                            .iter()
                            .filter_map(|target| self.tree().chart(target).map(|chart| (target, chart)))
                            .map(|(target, chart)| {
                                format!(
                                    "<figure class=\"chart chart-{}\" data-canvas=\"{}\">{}</figure>",
                                    chart.kind,
                                    escape_html(target),
                                    chart.surface
                                )
                            })
                            .collect();
                        if figures.is_empty() {
                            format!("<div class=\"chart-loading\" data-canvas=\"{id}\"></div>")
                        } else {
                            figures
                        }
                    }
                    ChartState::Error(message) => format!(
                        "<div class=\"chart-error\" data-canvas=\"{id}\">Chart unavailable: {}</div>",
                        escape_text(&message)
                    ),
                    _ => format!("<div class=\"chart-loading\" data-canvas=\"{id}\"></div>"),
                }
            })
            .collect()
    }

    /// Plain text for the clipboard.
    pub fn copy_text(&self) -> String {
        self.output.detection.text_content.clone()
    }

    /// The response source as `document-<timestamp>.md`.
    pub fn download_markdown(&self) -> Download {
        let file_name = format!("document-{}.md", Utc::now().timestamp_millis());
        self.register(file_name, "text/markdown", self.output.detection.sanitized_content.clone())
    }

    /// A standalone page with the rendered body and chart panels as
    /// `ai-response-<timestamp>.html`.
    pub fn download_html(&self) -> Download {
        let file_name = format!("ai-response-{}.html", Utc::now().timestamp_millis());
        let mut body = self.output.body.clone();
        for panel in self.chart_panels() {
            body.push('\n');
            body.push_str(&panel);
        }
        let content = format!(
            "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>AI Response</title>\n</head>\n<body>\n{body}\n</body>\n</html>\n"
        );
        self.register(file_name, "text/html", content)
    }

    fn register(&self, file_name: String, mime_type: &'static str, content: String) -> Download {
        let url = format!("blob:{}", Uuid::new_v4());
        self.object_urls.insert(url.clone(), file_name.clone());
        debug!(url = %url, file = %file_name, "Object URL created");
        Download { file_name, mime_type, url, content }
    }

    pub fn revoke(&self, url: &str) -> bool {
        self.object_urls.remove(url).is_some()
    }

    pub fn object_urls(&self) -> usize {
        self.object_urls.len()
    }

    /// Cancels pending polls, destroys live charts and revokes every object
    /// URL. Safe to call more than once.
    pub fn unmount(&mut self) {
        self.charts.unmount_all();
        self.handles.clear();
        let revoked = self.object_urls.len();
        self.object_urls.clear();
        if revoked > 0 {
            debug!(revoked, "Object URLs revoked");
        }
    }
}

impl Drop for RenderSession {
    fn drop(&mut self) {
        self.unmount();
    }
}
