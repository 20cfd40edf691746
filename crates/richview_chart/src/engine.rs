use std::f64::consts::PI;
use std::fmt::Write;

use derive_setters::Setters;
use richview_domain::{ChartConfig, ChartKind, escape_html};

/// Draws chart configurations into canvas surfaces.
pub trait ChartEngine: Send + Sync {
    fn name(&self) -> &str;

    /// Returns the canvas surface for `config` at the given size.
    fn draw(&self, config: &ChartConfig, width: u32, height: u32) -> anyhow::Result<String>;
}

/// Built-in engine producing SVG markup.
#[derive(Clone, Debug, Setters)]
#[setters(into)]
pub struct SvgChartEngine {
    palette: Vec<String>,
    background: String,
}

impl Default for SvgChartEngine {
    fn default() -> Self {
        let palette = ["#36a2eb", "#ff6384", "#ff9f40", "#ffcd56", "#4bc0c0", "#9966ff", "#c9cbcf"];
        Self {
            palette: palette.iter().map(|c| c.to_string()).collect(),
            background: "#ffffff".to_string(),
        }
    }
}

const MARGIN_LEFT: f64 = 40.0;
const MARGIN_RIGHT: f64 = 10.0;
const MARGIN_TOP: f64 = 20.0;
const MARGIN_BOTTOM: f64 = 30.0;

fn num(v: f64) -> String {
    format!("{v:.1}")
}

struct Plot {
    left: f64,
    top: f64,
    width: f64,
    height: f64,
    min: f64,
    max: f64,
}

impl Plot {
    fn new(config: &ChartConfig, width: f64, height: f64) -> Self {
        let values = config.datasets().iter().flat_map(|d| d.values.iter().copied());
        let (min, max) = values.fold((0.0_f64, 0.0_f64), |(lo, hi), v| (lo.min(v), hi.max(v)));
        let max = if max == min { min + 1.0 } else { max };
        Self {
            left: MARGIN_LEFT,
            top: MARGIN_TOP,
            width: (width - MARGIN_LEFT - MARGIN_RIGHT).max(1.0),
            height: (height - MARGIN_TOP - MARGIN_BOTTOM).max(1.0),
            min,
            max,
        }
    }

    fn y(&self, value: f64) -> f64 {
        self.top + (self.max - value) / (self.max - self.min) * self.height
    }

    fn bottom(&self) -> f64 {
        self.top + self.height
    }
}

impl SvgChartEngine {
    fn color(&self, index: usize) -> &str {
        self.palette.get(index % self.palette.len().max(1)).map(String::as_str).unwrap_or("#888888")
    }

    fn slice_color<'a>(&'a self, colors: Option<&'a Vec<String>>, index: usize) -> &'a str {
        match colors {
            Some(colors) if !colors.is_empty() => &colors[index % colors.len()],
            _ => self.color(index),
        }
    }

    fn draw_radial(&self, out: &mut String, config: &ChartConfig, width: f64, height: f64) {
        let size = width.min(height);
        let (cx, cy) = (size / 2.0, height / 2.0);
        let radius = (size / 2.0 - 10.0).max(1.0);
        let dataset = &config.datasets()[0];
        let total = config.total();

        if total <= 0.0 {
            let _ = write!(
                out,
                r##"<circle cx="{}" cy="{}" r="{}" fill="none" stroke="#cccccc"/>"##,
                num(cx),
                num(cy),
                num(radius)
            );
        } else {
            let mut angle = -PI / 2.0;
            for (i, value) in dataset.values.iter().enumerate().filter(|(_, v)| **v > 0.0) {
                let sweep = value / total * 2.0 * PI;
                let color = self.slice_color(dataset.colors.as_ref(), i);
                if sweep >= 2.0 * PI - 1e-9 {
                    let _ = write!(
                        out,
                        r#"<circle class="slice" cx="{}" cy="{}" r="{}" fill="{}"/>"#,
                        num(cx),
                        num(cy),
                        num(radius),
                        escape_html(color)
                    );
                } else {
                    let (x1, y1) = (cx + radius * angle.cos(), cy + radius * angle.sin());
                    let end = angle + sweep;
                    let (x2, y2) = (cx + radius * end.cos(), cy + radius * end.sin());
                    let large = if sweep > PI { 1 } else { 0 };
                    let _ = write!(
                        out,
                        r#"<path class="slice" d="M{} {} L{} {} A{} {} 0 {large} 1 {} {} Z" fill="{}"/>"#,
                        num(cx),
                        num(cy),
                        num(x1),
                        num(y1),
                        num(radius),
                        num(radius),
                        num(x2),
                        num(y2),
                        escape_html(color)
                    );
                }
                angle += sweep;
            }
        }

        if *config.kind() == ChartKind::Doughnut {
            let _ = write!(
                out,
                r#"<circle class="hole" cx="{}" cy="{}" r="{}" fill="{}"/>"#,
                num(cx),
                num(cy),
                num(radius * 0.55),
                escape_html(&self.background)
            );
        }

        let legend_x = size + 10.0;
        for (i, label) in config.labels().iter().enumerate() {
            let y = MARGIN_TOP + i as f64 * 18.0;
            let color = self.slice_color(dataset.colors.as_ref(), i);
            let _ = write!(
                out,
                r#"<rect x="{}" y="{}" width="12" height="12" fill="{}"/><text x="{}" y="{}" font-size="12">{}</text>"#,
                num(legend_x),
                num(y),
                escape_html(color),
                num(legend_x + 18.0),
                num(y + 11.0),
                escape_html(label)
            );
        }
    }

    fn draw_axes(&self, out: &mut String, config: &ChartConfig, plot: &Plot, centered: bool) {
        let base = plot.y(0.0);
        let _ = write!(
            out,
            r##"<line class="axis" x1="{}" y1="{}" x2="{}" y2="{}" stroke="#666666"/>"##,
            num(plot.left),
            num(base),
            num(plot.left + plot.width),
            num(base)
        );
        let _ = write!(
            out,
            r##"<line class="axis" x1="{}" y1="{}" x2="{}" y2="{}" stroke="#666666"/>"##,
            num(plot.left),
            num(plot.top),
            num(plot.left),
            num(plot.bottom())
        );
        let n = config.labels().len();
        for (i, label) in config.labels().iter().enumerate() {
            let x = if centered {
                plot.left + (i as f64 + 0.5) * plot.width / n as f64
            } else {
                point_x(plot, i, n)
            };
            let _ = write!(
                out,
                r#"<text x="{}" y="{}" font-size="11" text-anchor="middle">{}</text>"#,
                num(x),
                num(plot.bottom() + 18.0),
                escape_html(label)
            );
        }
    }

    fn draw_bars(&self, out: &mut String, config: &ChartConfig, width: f64, height: f64) {
        let plot = Plot::new(config, width, height);
        let groups = config.labels().len() as f64;
        let group_width = plot.width / groups;
        let bar_width = group_width * 0.8 / config.datasets().len() as f64;
        let base = plot.y(0.0);

        for (d, dataset) in config.datasets().iter().enumerate() {
            for (i, value) in dataset.values.iter().enumerate() {
                let top = plot.y(*value);
                let color = match &dataset.colors {
                    Some(colors) if !colors.is_empty() => colors[i % colors.len()].as_str(),
                    _ => self.color(d),
                };
                let _ = write!(
                    out,
                    r#"<rect class="bar" x="{}" y="{}" width="{}" height="{}" fill="{}"/>"#,
                    num(plot.left + i as f64 * group_width + group_width * 0.1 + d as f64 * bar_width),
                    num(top.min(base)),
                    num(bar_width),
                    num((top - base).abs()),
                    escape_html(color)
                );
            }
        }
        self.draw_axes(out, config, &plot, true);
    }

    fn draw_lines(&self, out: &mut String, config: &ChartConfig, width: f64, height: f64) {
        let plot = Plot::new(config, width, height);
        let n = config.labels().len();

        for (d, dataset) in config.datasets().iter().enumerate() {
            let color = self.slice_color(dataset.colors.as_ref(), d);
            let points: Vec<(f64, f64)> = dataset
                .values
                .iter()
                .enumerate()
                .map(|(i, v)| (point_x(&plot, i, n), plot.y(*v)))
                .collect();
            let path = points
                .iter()
                .map(|(x, y)| format!("{},{}", num(*x), num(*y)))
                .collect::<Vec<_>>()
                .join(" ");
            let _ = write!(
                out,
                r#"<polyline class="series" points="{path}" fill="none" stroke="{}" stroke-width="2"/>"#,
                escape_html(color)
            );
            for (x, y) in points {
                let _ = write!(
                    out,
                    r#"<circle class="point" cx="{}" cy="{}" r="3" fill="{}"/>"#,
                    num(x),
                    num(y),
                    escape_html(color)
                );
            }
        }
        self.draw_axes(out, config, &plot, false);
    }

    fn draw_series_legend(&self, out: &mut String, config: &ChartConfig, width: f64) {
        let labelled = config.datasets().iter().enumerate().filter_map(|(d, ds)| ds.label.as_ref().map(|l| (d, l)));
        for (row, (d, label)) in labelled.enumerate() {
            let x = width - 140.0;
            let y = 4.0 + row as f64 * 14.0;
            let _ = write!(
                out,
                r#"<rect x="{}" y="{}" width="10" height="10" fill="{}"/><text x="{}" y="{}" font-size="11">{}</text>"#,
                num(x),
                num(y),
                escape_html(self.color(d)),
                num(x + 14.0),
                num(y + 9.0),
                escape_html(label)
            );
        }
    }
}

fn point_x(plot: &Plot, i: usize, n: usize) -> f64 {
    if n > 1 {
        plot.left + i as f64 * plot.width / (n - 1) as f64
    } else {
        plot.left + plot.width / 2.0
    }
}

impl ChartEngine for SvgChartEngine {
    fn name(&self) -> &str {
        "svg"
    }

    fn draw(&self, config: &ChartConfig, width: u32, height: u32) -> anyhow::Result<String> {
        if width == 0 || height == 0 {
            anyhow::bail!("Canvas has no drawable area ({width}x{height})");
        }
        let (w, h) = (width as f64, height as f64);
        let mut out = format!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" class="chart chart-{}" width="{width}" height="{height}" viewBox="0 0 {width} {height}" role="img">"#,
            config.kind()
        );
        let _ = write!(out, r#"<rect width="100%" height="100%" fill="{}"/>"#, escape_html(&self.background));
        match config.kind() {
            ChartKind::Pie | ChartKind::Doughnut => self.draw_radial(&mut out, config, w, h),
            ChartKind::Bar => self.draw_bars(&mut out, config, w, h),
            ChartKind::Line => self.draw_lines(&mut out, config, w, h),
        }
        if !config.kind().is_radial() {
            self.draw_series_legend(&mut out, config, w);
        }
        out.push_str("</svg>");
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use richview_domain::Dataset;

    use super::*;

    fn labels(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn draw(config: &ChartConfig) -> String {
        SvgChartEngine::default().draw(config, 400, 300).unwrap()
    }

    #[test]
    fn test_single_slice_is_full_circle() {
        let fixture = ChartConfig::new(ChartKind::Pie, labels(&["x"]), vec![Dataset::new(vec![2.0])]).unwrap();
        let actual = draw(&fixture);
        assert_eq!(actual.matches(r#"<circle class="slice""#).count(), 1);
        assert!(actual.starts_with("<svg"));
        assert!(actual.ends_with("</svg>"));
    }

    #[test]
    fn test_pie_slices_use_dataset_colors() {
        let dataset = Dataset::new(vec![1.0, 3.0]).colors(labels(&["#111111", "#222222"]));
        let fixture = ChartConfig::new(ChartKind::Pie, labels(&["a", "b"]), vec![dataset]).unwrap();
        let actual = draw(&fixture);
        assert_eq!(actual.matches(r#"<path class="slice""#).count(), 2);
        assert!(actual.contains(r##"fill="#222222""##));
    }

    #[test]
    fn test_doughnut_has_hole() {
        let fixture =
            ChartConfig::new(ChartKind::Doughnut, labels(&["a", "b"]), vec![Dataset::new(vec![1.0, 1.0])]).unwrap();
        assert!(draw(&fixture).contains(r#"class="hole""#));
    }

    #[test]
    fn test_grouped_bars() {
        let fixture = ChartConfig::new(
            ChartKind::Bar,
            labels(&["q1", "q2"]),
            vec![Dataset::new(vec![1.0, 2.0]).label("a"), Dataset::new(vec![3.0, -1.0]).label("b")],
        )
        .unwrap();
        let actual = draw(&fixture);
        assert_eq!(actual.matches(r#"class="bar""#).count(), 4);
        assert!(actual.contains(">a</text>"));
    }

    #[test]
    fn test_line_series() {
        let fixture =
            ChartConfig::new(ChartKind::Line, labels(&["a", "b", "c"]), vec![Dataset::new(vec![1.0, 5.0, 2.0])])
                .unwrap();
        let actual = draw(&fixture);
        assert_eq!(actual.matches("<polyline").count(), 1);
        assert_eq!(actual.matches(r#"class="point""#).count(), 3);
    }

    #[test]
    fn test_labels_are_escaped() {
        let fixture = ChartConfig::new(ChartKind::Pie, labels(&["<b>"]), vec![Dataset::new(vec![1.0])]).unwrap();
        let actual = draw(&fixture);
        assert!(actual.contains("&lt;b&gt;"));
        assert!(!actual.contains("<b>"));
    }

    #[test]
    fn test_zero_area_fails() {
        let fixture = ChartConfig::new(ChartKind::Bar, labels(&["a"]), vec![Dataset::new(vec![1.0])]).unwrap();
        assert!(SvgChartEngine::default().draw(&fixture, 0, 10).is_err());
    }
}
