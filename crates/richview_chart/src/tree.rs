use std::sync::Arc;

use dashmap::DashMap;
use richview_domain::ChartKind;
use uuid::Uuid;

/// A chart drawn into a canvas.
#[derive(Clone, Debug, PartialEq)]
pub struct ChartInstance {
    pub id: Uuid,
    pub kind: ChartKind,
    pub surface: String,
}

impl ChartInstance {
    pub fn new(kind: ChartKind, surface: String) -> Self {
        Self { id: Uuid::new_v4(), kind, surface }
    }
}

#[derive(Clone, Debug)]
struct Canvas {
    width: u32,
    height: u32,
    chart: Option<ChartInstance>,
}

/// Canvas elements that charts can be drawn into, keyed by element id.
/// Clones share the same tree.
#[derive(Clone, Debug, Default)]
pub struct RenderTree {
    canvases: Arc<DashMap<String, Canvas>>,
}

impl RenderTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a canvas, replacing (and destroying the chart of) any canvas
    /// with the same id.
    pub fn create_canvas(&self, id: impl Into<String>, width: u32, height: u32) {
        let id = id.into();
        if let Some(previous) = self.canvases.insert(id.clone(), Canvas { width, height, chart: None })
            && let Some(chart) = previous.chart
        {
            tracing::debug!(canvas = %id, chart = %chart.id, "Destroying chart of replaced canvas");
        }
    }

    pub fn remove_canvas(&self, id: &str) {
        if let Some((_, canvas)) = self.canvases.remove(id)
            && let Some(chart) = canvas.chart
        {
            tracing::debug!(canvas = %id, chart = %chart.id, "Destroying chart of removed canvas");
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.canvases.contains_key(id)
    }

    pub fn size(&self, id: &str) -> Option<(u32, u32)> {
        self.canvases.get(id).map(|canvas| (canvas.width, canvas.height))
    }

    /// Places `chart` on the canvas. A chart already on the canvas is
    /// destroyed first, so a canvas never holds more than one instance.
    /// Returns false when the canvas does not exist.
    pub fn attach(&self, id: &str, chart: ChartInstance) -> bool {
        let Some(mut canvas) = self.canvases.get_mut(id) else {
            return false;
        };
        if let Some(previous) = canvas.chart.take() {
            tracing::debug!(canvas = %id, chart = %previous.id, "Destroying previous chart instance");
        }
        canvas.chart = Some(chart);
        true
    }

    pub fn destroy_chart(&self, id: &str) -> Option<ChartInstance> {
        let chart = self.canvases.get_mut(id)?.chart.take();
        if let Some(chart) = &chart {
            tracing::debug!(canvas = %id, chart = %chart.id, "Chart destroyed");
        }
        chart
    }

    pub fn chart(&self, id: &str) -> Option<ChartInstance> {
        self.canvases.get(id)?.chart.clone()
    }

    /// Number of canvases currently holding a chart.
    pub fn live_charts(&self) -> usize {
        self.canvases.iter().filter(|canvas| canvas.chart.is_some()).count()
    }
}
