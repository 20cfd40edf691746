use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use anyhow::Context;
use async_trait::async_trait;
use tokio::sync::OnceCell;

use crate::engine::{ChartEngine, SvgChartEngine};
use crate::error::{ChartError, Result};

/// Supplies the chart engine on first use.
#[async_trait]
pub trait EngineSource: Send + Sync {
    async fn load(&self) -> anyhow::Result<Arc<dyn ChartEngine>>;
}

/// Source for the built-in [`SvgChartEngine`].
#[derive(Clone, Debug, Default)]
pub struct BuiltinEngineSource {
    engine: SvgChartEngine,
}

impl BuiltinEngineSource {
    pub fn new(engine: SvgChartEngine) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl EngineSource for BuiltinEngineSource {
    async fn load(&self) -> anyhow::Result<Arc<dyn ChartEngine>> {
        Ok(Arc::new(self.engine.clone()))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoaderState {
    Uninitialized,
    Loading,
    Ready,
    Failed(String),
}

/// Loads the chart engine at most once. Concurrent callers wait on the same
/// in-flight load, and a failed load stays failed for this loader.
pub struct EngineLoader {
    source: Arc<dyn EngineSource>,
    cache: OnceCell<std::result::Result<Arc<dyn ChartEngine>, String>>,
    loading: AtomicBool,
    attempts: AtomicUsize,
}

impl Default for EngineLoader {
    fn default() -> Self {
        Self::new(Arc::new(BuiltinEngineSource::default()))
    }
}

/// Holds the loading flag for the lifetime of one init attempt, including
/// one that is cancelled part way.
struct LoadingGuard<'a>(&'a AtomicBool);

impl<'a> LoadingGuard<'a> {
    fn set(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl EngineLoader {
    pub fn new(source: Arc<dyn EngineSource>) -> Self {
        Self {
            source,
            cache: OnceCell::new(),
            loading: AtomicBool::new(false),
            attempts: AtomicUsize::new(0),
        }
    }

    pub async fn engine(&self) -> Result<Arc<dyn ChartEngine>> {
        let loaded = self
            .cache
            .get_or_init(|| async {
                let _loading = LoadingGuard::set(&self.loading);
                self.attempts.fetch_add(1, Ordering::SeqCst);
                tracing::debug!("Loading chart engine");
                let result = self
                    .source
                    .load()
                    .await
                    .context("Failed to load chart engine")
                    .map_err(|e| format!("{e:#}"));
                match &result {
                    Ok(engine) => tracing::info!(engine = engine.name(), "Chart engine ready"),
                    Err(error) => tracing::error!(error = %error, "Chart engine unavailable"),
                }
                result
            })
            .await;
        loaded.clone().map_err(ChartError::EngineLoad)
    }

    pub fn state(&self) -> LoaderState {
        match self.cache.get() {
            Some(Ok(_)) => LoaderState::Ready,
            Some(Err(error)) => LoaderState::Failed(error.clone()),
            None if self.loading.load(Ordering::SeqCst) => LoaderState::Loading,
            None => LoaderState::Uninitialized,
        }
    }

    /// Number of times the source has been asked for an engine.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}
