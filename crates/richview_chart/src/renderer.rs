use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use richview_domain::ChartConfig;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::engine::ChartEngine;
use crate::error::{ChartError, Result, SandboxError};
use crate::loader::EngineLoader;
use crate::sandbox::ScriptSandbox;
use crate::tree::{ChartInstance, RenderTree};

/// Lifecycle of one mounted chart.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChartState {
    Idle,
    Loading,
    Ready,
    Destroyed,
    Error(String),
}

impl ChartState {
    pub fn is_settled(&self) -> bool {
        matches!(self, ChartState::Ready | ChartState::Destroyed | ChartState::Error(_))
    }
}

/// What to draw into a canvas.
#[derive(Clone, Debug, PartialEq)]
pub enum ChartJob {
    /// Build the chart from a configuration.
    Config(ChartConfig),
    /// Re-execute a script fragment inside the sandbox.
    Script(String),
}

/// Observes a mounted chart.
#[derive(Clone, Debug)]
pub struct ChartHandle {
    canvas_id: String,
    targets: Vec<String>,
    state: watch::Receiver<ChartState>,
}

impl ChartHandle {
    pub fn canvas_id(&self) -> &str {
        &self.canvas_id
    }

    /// Every canvas the job may draw into, starting with [`Self::canvas_id`].
    pub fn targets(&self) -> &[String] {
        &self.targets
    }

    pub fn state(&self) -> ChartState {
        self.state.borrow().clone()
    }

    /// Waits until the chart is ready, failed or destroyed.
    pub async fn settled(&mut self) -> ChartState {
        if let Ok(state) = self.state.wait_for(ChartState::is_settled).await {
            return state.clone();
        }
        self.state()
    }
}

struct Mount {
    task: JoinHandle<()>,
    state: watch::Sender<ChartState>,
    targets: Vec<String>,
}

/// Mounts charts into canvases of a [`RenderTree`]. Each mount waits for the
/// engine and for its canvas, then draws once. Unmounting or dropping the
/// renderer cancels pending mounts and destroys their charts.
pub struct ChartRenderer {
    loader: Arc<EngineLoader>,
    tree: RenderTree,
    poll_interval: Duration,
    mounts: Arc<DashMap<String, Mount>>,
}

impl ChartRenderer {
    pub fn new(loader: Arc<EngineLoader>, tree: RenderTree) -> Self {
        Self { loader, tree, poll_interval: Duration::from_millis(50), mounts: Arc::new(DashMap::new()) }
    }

    pub fn poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn tree(&self) -> &RenderTree {
        &self.tree
    }

    /// Starts drawing `job` into `canvas_id`. Any chart already mounted on
    /// that canvas is unmounted first. A script job may also draw into the
    /// other canvases it looks up; those charts belong to this mount.
    pub fn mount(&self, canvas_id: impl Into<String>, job: ChartJob) -> ChartHandle {
        let canvas_id = canvas_id.into();
        self.unmount(&canvas_id);

        let mut targets = vec![canvas_id.clone()];
        if let ChartJob::Script(fragment) = &job {
            for id in ScriptSandbox::target_ids(fragment) {
                if !targets.contains(&id) {
                    targets.push(id);
                }
            }
        }

        let (sender, receiver) = watch::channel(ChartState::Idle);
        let task = tokio::spawn(run_mount(
            self.loader.clone(),
            self.tree.clone(),
            canvas_id.clone(),
            job,
            self.poll_interval,
            sender.clone(),
        ));
        self.mounts.insert(canvas_id.clone(), Mount { task, state: sender, targets: targets.clone() });
        ChartHandle { canvas_id, targets, state: receiver }
    }

    pub fn unmount(&self, canvas_id: &str) {
        if let Some((_, mount)) = self.mounts.remove(canvas_id) {
            mount.task.abort();
            mount.state.send_replace(ChartState::Destroyed);
            for target in &mount.targets {
                self.tree.destroy_chart(target);
            }
        }
        self.tree.destroy_chart(canvas_id);
    }

    pub fn unmount_all(&self) {
        let ids: Vec<String> = self.mounts.iter().map(|entry| entry.key().clone()).collect();
        for id in ids {
            self.unmount(&id);
        }
    }

    pub fn state(&self, canvas_id: &str) -> Option<ChartState> {
        self.mounts.get(canvas_id).map(|mount| mount.state.borrow().clone())
    }
}

impl Drop for ChartRenderer {
    fn drop(&mut self) {
        self.unmount_all();
    }
}

async fn run_mount(
    loader: Arc<EngineLoader>,
    tree: RenderTree,
    canvas_id: String,
    job: ChartJob,
    poll_interval: Duration,
    state: watch::Sender<ChartState>,
) {
    state.send_replace(ChartState::Loading);
    let engine = match loader.engine().await {
        Ok(engine) => engine,
        Err(error) => {
            tracing::error!(canvas = %canvas_id, error = %error, "Chart not rendered");
            state.send_replace(ChartState::Error(error.to_string()));
            return;
        }
    };

    if !tree.contains(&canvas_id) {
        tracing::debug!(canvas = %canvas_id, "Waiting for canvas");
        while !tree.contains(&canvas_id) {
            tokio::time::sleep(poll_interval).await;
        }
    }

    let result = match &job {
        ChartJob::Config(config) => draw_config(engine.as_ref(), &tree, &canvas_id, config),
        ChartJob::Script(fragment) => ScriptSandbox::new(&tree, engine.as_ref())
            .run(fragment)
            .map(|_| ())
            .map_err(ChartError::from),
    };
    match result {
        Ok(()) => {
            tracing::debug!(canvas = %canvas_id, "Chart ready");
            state.send_replace(ChartState::Ready);
        }
        Err(error) => {
            tracing::warn!(canvas = %canvas_id, error = %error, "Chart not rendered");
            state.send_replace(ChartState::Error(error.to_string()));
        }
    }
}

fn draw_config(
    engine: &dyn ChartEngine,
    tree: &RenderTree,
    canvas_id: &str,
    config: &ChartConfig,
) -> Result<()> {
    let (width, height) = tree
        .size(canvas_id)
        .ok_or_else(|| SandboxError::MissingTarget(canvas_id.to_string()))?;
    let surface = engine
        .draw(config, width, height)
        .map_err(|e| ChartError::Draw(format!("{e:#}")))?;
    tree.attach(canvas_id, ChartInstance::new(*config.kind(), surface));
    Ok(())
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use richview_domain::{ChartKind, Dataset};

    use super::*;
    use crate::loader::EngineSource;

    fn config() -> ChartConfig {
        ChartConfig::new(ChartKind::Pie, vec!["x".to_string()], vec![Dataset::new(vec![2.0])]).unwrap()
    }

    fn renderer() -> ChartRenderer {
        ChartRenderer::new(Arc::new(EngineLoader::default()), RenderTree::new())
            .poll_interval(Duration::from_millis(10))
    }

    struct BrokenSource;

    #[async_trait]
    impl EngineSource for BrokenSource {
        async fn load(&self) -> anyhow::Result<Arc<dyn ChartEngine>> {
            anyhow::bail!("offline")
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_mount_draws_into_existing_canvas() {
        let renderer = renderer();
        renderer.tree().create_canvas("c", 300, 200);
        let mut handle = renderer.mount("c", ChartJob::Config(config()));
        let actual = handle.settled().await;
        assert_eq!(actual, ChartState::Ready);
        assert!(renderer.tree().chart("c").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_mount_waits_for_canvas() {
        let renderer = renderer();
        let mut handle = renderer.mount("late", ChartJob::Config(config()));
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(handle.state(), ChartState::Loading);

        renderer.tree().create_canvas("late", 300, 200);
        assert_eq!(handle.settled().await, ChartState::Ready);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unmount_cancels_pending_poll() {
        let renderer = renderer();
        let mut handle = renderer.mount("c", ChartJob::Config(config()));
        tokio::time::sleep(Duration::from_millis(30)).await;
        renderer.unmount("c");
        assert_eq!(handle.settled().await, ChartState::Destroyed);

        renderer.tree().create_canvas("c", 300, 200);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(renderer.tree().live_charts(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_remount_keeps_one_instance() {
        let renderer = renderer();
        renderer.tree().create_canvas("c", 300, 200);
        let mut first = renderer.mount("c", ChartJob::Config(config()));
        first.settled().await;
        let bar = ChartConfig::new(ChartKind::Bar, vec!["x".to_string()], vec![Dataset::new(vec![1.0])]).unwrap();
        let mut second = renderer.mount("c", ChartJob::Config(bar));

        assert_eq!(first.state(), ChartState::Destroyed);
        assert_eq!(second.settled().await, ChartState::Ready);
        assert_eq!(renderer.tree().live_charts(), 1);
        assert_eq!(renderer.tree().chart("c").unwrap().kind, ChartKind::Bar);
    }

    #[tokio::test(start_paused = true)]
    async fn test_engine_failure_is_contained() {
        let renderer = ChartRenderer::new(Arc::new(EngineLoader::new(Arc::new(BrokenSource))), RenderTree::new());
        renderer.tree().create_canvas("c", 300, 200);
        let mut handle = renderer.mount("c", ChartJob::Config(config()));
        let ChartState::Error(message) = handle.settled().await else { panic!("expected error state") };
        assert!(message.contains("offline"));
        assert_eq!(renderer.tree().live_charts(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_script_with_missing_target_reports_error() {
        let renderer = renderer();
        renderer.tree().create_canvas("c", 300, 200);
        let fragment = "new Chart(document.getElementById('other'), {type:'pie', labels:['a'], data:[1]})";
        let mut handle = renderer.mount("c", ChartJob::Script(fragment.to_string()));
        let actual = handle.settled().await;
        assert_eq!(actual, ChartState::Error("Canvas element 'other' does not exist".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_script_failing_on_second_canvas_leaves_no_chart() {
        let renderer = renderer();
        renderer.tree().create_canvas("north", 300, 200);
        let fixture = "new Chart(document.getElementById('north'), {type:'pie', labels:['a'], data:[1]});\nnew Chart(document.getElementById('south'), {type:'bar', labels:['a'], data:[1]});";
        let mut handle = renderer.mount("north", ChartJob::Script(fixture.to_string()));

        let actual = handle.settled().await;

        assert_eq!(actual, ChartState::Error("Canvas element 'south' does not exist".to_string()));
        assert_eq!(renderer.tree().live_charts(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_script_drawing_two_canvases_unmounts_both() {
        let renderer = renderer();
        renderer.tree().create_canvas("north", 300, 200);
        renderer.tree().create_canvas("south", 300, 200);
        let fixture = "new Chart('north', {type:'pie', labels:['a'], data:[1]});\nnew Chart('south', {type:'bar', labels:['a'], data:[1]});";
        let mut handle = renderer.mount("north", ChartJob::Script(fixture.to_string()));

        assert_eq!(handle.settled().await, ChartState::Ready);
        assert_eq!(handle.targets(), &["north".to_string(), "south".to_string()]);
        assert_eq!(renderer.tree().live_charts(), 2);

        renderer.unmount("north");
        assert_eq!(renderer.tree().live_charts(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_script_job_draws() {
        let renderer = renderer();
        renderer.tree().create_canvas("c", 300, 200);
        let fragment = "new Chart('c', {type:'bar', labels:['a','b'], data:[1,2]})";
        let mut handle = renderer.mount("c", ChartJob::Script(fragment.to_string()));
        assert_eq!(handle.settled().await, ChartState::Ready);
        assert_eq!(renderer.tree().chart("c").unwrap().kind, ChartKind::Bar);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels_mounts() {
        let tree = RenderTree::new();
        let renderer = ChartRenderer::new(Arc::new(EngineLoader::default()), tree.clone());
        let handle = renderer.mount("c", ChartJob::Config(config()));
        drop(renderer);
        tree.create_canvas("c", 300, 200);
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(handle.state(), ChartState::Destroyed);
        assert_eq!(tree.live_charts(), 0);
    }
}
