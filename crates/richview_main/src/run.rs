use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use richview_chart::{ChartState, EngineLoader};
use richview_config::{RichviewConfig, load_config};
use richview_display::{ChartMode, RenderSession, RendererRouter};
use tokio::io::AsyncReadExt;
use tracing::{info, warn};

use crate::cli::{ChartArgs, Cli, Command, InputArgs, RenderArgs};

/// Executes one CLI invocation.
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let cwd = std::env::current_dir().context("Failed to resolve the working directory")?;
    let config = load_config(&cwd)?;

    match cli.command {
        Command::Detect(args) => {
            let content = read_input(args.input.as_deref()).await?;
            let detection = RendererRouter::new(config).detect(&content, args.format);
            println!("{}", serde_json::to_string_pretty(&detection)?);
        }
        Command::Render(args) => render(config, args).await?,
        Command::Chart(args) => chart(config, args).await?,
    }
    Ok(())
}

async fn render(config: RichviewConfig, args: RenderArgs) -> anyhow::Result<()> {
    let RenderArgs { input: InputArgs { input, format }, html_mode, json, download } = args;
    let content = read_input(input.as_deref()).await?;

    let mut router = RendererRouter::new(config.clone());
    if let Some(mode) = html_mode {
        router = router.with_html_preview(mode);
    }
    let output = router.render(&content, format);

    if json {
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("{}", output.body);
    }

    if let Some(directory) = download {
        let mut session = RenderSession::new(output, Arc::new(EngineLoader::default()), config.chart);
        session.mount_charts(ChartMode::Declarative);
        session.settle().await;
        for path in write_downloads(&session, &directory).await? {
            info!(path = %path.display(), "Download written");
        }
    }
    Ok(())
}

async fn chart(config: RichviewConfig, args: ChartArgs) -> anyhow::Result<()> {
    let content = read_input(args.input.input.as_deref()).await?;
    let output = RendererRouter::new(config.clone()).render(&content, args.input.format);
    if output.charts.is_empty() {
        info!("No charts found");
        return Ok(());
    }

    let mode = if args.replay { ChartMode::Replay } else { ChartMode::Declarative };
    let mut session = RenderSession::new(output, Arc::new(EngineLoader::default()), config.chart);
    session.mount_charts(mode);
    session.settle().await;

    for path in write_charts(&session, &args.out_dir).await? {
        println!("{}", path.display());
    }
    session.unmount();
    Ok(())
}

/// Reads the whole input file, or stdin when no path is given.
pub async fn read_input(path: Option<&Path>) -> anyhow::Result<String> {
    match path {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read input: {}", path.display())),
        None => {
            let mut content = String::new();
            tokio::io::stdin()
                .read_to_string(&mut content)
                .await
                .context("Failed to read stdin")?;
            Ok(content)
        }
    }
}

/// Writes `chart-<n>.svg` for every chart that finished drawing, and
/// `chart-<n>-<k>.svg` for further canvases drawn by the same script. Failed
/// charts are logged and skipped.
pub async fn write_charts(session: &RenderSession, directory: &Path) -> anyhow::Result<Vec<PathBuf>> {
    tokio::fs::create_dir_all(directory)
        .await
        .with_context(|| format!("Failed to create directory: {}", directory.display()))?;

    let mut written = Vec::new();
    for (index, handle) in session.handles().iter().enumerate() {
        match handle.state() {
            ChartState::Ready => {
                for (position, target) in handle.targets().iter().enumerate() {
                    let Some(chart) = session.tree().chart(target) else {
                        continue;
                    };
                    let name = match position {
                        0 => format!("chart-{index}.svg"),
                        n => format!("chart-{index}-{n}.svg"),
                    };
                    let path = directory.join(name);
                    tokio::fs::write(&path, chart.surface)
                        .await
                        .with_context(|| format!("Failed to write chart: {}", path.display()))?;
                    written.push(path);
                }
            }
            ChartState::Error(error) => {
                warn!(canvas = handle.canvas_id(), error = %error, "Chart skipped");
            }
            state => warn!(canvas = handle.canvas_id(), state = ?state, "Chart not settled"),
        }
    }
    Ok(written)
}

/// Writes the markdown and HTML download files of the session.
pub async fn write_downloads(session: &RenderSession, directory: &Path) -> anyhow::Result<Vec<PathBuf>> {
    tokio::fs::create_dir_all(directory)
        .await
        .with_context(|| format!("Failed to create directory: {}", directory.display()))?;

    let mut written = Vec::new();
    for download in [session.download_markdown(), session.download_html()] {
        let path = directory.join(&download.file_name);
        tokio::fs::write(&path, &download.content)
            .await
            .with_context(|| format!("Failed to write download: {}", path.display()))?;
        session.revoke(&download.url);
        written.push(path);
    }
    Ok(written)
}
