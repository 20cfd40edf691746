use std::path::PathBuf;
use std::str::FromStr;

use clap::{Args, Parser, Subcommand};
use richview_config::HtmlPreviewMode;
use richview_domain::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "richview", version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Log at debug level unless `RICHVIEW_LOG` says otherwise.
    #[arg(long, global = true, default_value_t = false)]
    pub verbose: bool,

    /// Directory for the daily rolling JSON log.
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Classify the input and print the detection result as JSON.
    Detect(InputArgs),

    /// Render the input with the renderer its content type calls for.
    Render(RenderArgs),

    /// Draw every chart found in the input into SVG files.
    #[command(alias = "charts")]
    Chart(ChartArgs),
}

#[derive(Args, Debug, Clone)]
pub struct InputArgs {
    /// File to read. Reads stdin when omitted.
    pub input: Option<PathBuf>,

    /// Renderer family to force instead of classifying the input.
    #[arg(long, short, default_value = "auto", value_parser = OutputFormat::from_str)]
    pub format: OutputFormat,
}

#[derive(Args, Debug, Clone)]
pub struct RenderArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// How HTML content is previewed: inline, sandboxed-frame or
    /// offscreen-canvas.
    #[arg(long, value_parser = HtmlPreviewMode::from_str)]
    pub html_mode: Option<HtmlPreviewMode>,

    /// Print the full render output as JSON instead of the HTML body.
    #[arg(long, default_value_t = false)]
    pub json: bool,

    /// Write the markdown and HTML download files into this directory.
    #[arg(long)]
    pub download: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct ChartArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Directory receiving `chart-<n>.svg`.
    #[arg(long)]
    pub out_dir: PathBuf,

    /// Re-execute chart scripts in the sandbox instead of drawing their
    /// extracted configuration.
    #[arg(long, default_value_t = false)]
    pub replay: bool,
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_render_defaults() {
        let fixture = Cli::parse_from(["richview", "render", "answer.md"]);
        let Command::Render(actual) = fixture.command else { panic!("Expected Render command") };
        assert_eq!(actual.input.input, Some(PathBuf::from("answer.md")));
        assert_eq!(actual.input.format, OutputFormat::Auto);
        assert_eq!(actual.html_mode, None);
        assert!(!actual.json);
    }

    #[test]
    fn test_render_with_overrides() {
        let fixture = Cli::parse_from([
            "richview",
            "render",
            "--format",
            "md",
            "--html-mode",
            "sandboxed-frame",
            "--json",
        ]);
        let Command::Render(actual) = fixture.command else { panic!("Expected Render command") };
        assert_eq!(actual.input.input, None);
        assert_eq!(actual.input.format, OutputFormat::Markdown);
        assert_eq!(actual.html_mode, Some(HtmlPreviewMode::SandboxedFrame));
        assert!(actual.json);
    }

    #[test]
    fn test_unknown_format_is_rejected() {
        let actual = Cli::try_parse_from(["richview", "detect", "--format", "pdf"]);
        assert!(actual.is_err());
    }

    #[test]
    fn test_chart_requires_out_dir() {
        assert!(Cli::try_parse_from(["richview", "chart"]).is_err());
        let fixture = Cli::parse_from(["richview", "--verbose", "chart", "--out-dir", "out", "--replay"]);
        let Command::Chart(actual) = fixture.command else { panic!("Expected Chart command") };
        assert_eq!(actual.out_dir, PathBuf::from("out"));
        assert!(actual.replay);
        assert!(fixture.verbose);
    }
}
