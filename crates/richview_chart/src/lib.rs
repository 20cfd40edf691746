mod engine;
mod error;
mod loader;
mod renderer;
mod sandbox;
mod tree;

pub use engine::{ChartEngine, SvgChartEngine};
pub use error::{ChartError, Result, SandboxError};
pub use loader::{BuiltinEngineSource, EngineLoader, EngineSource, LoaderState};
pub use renderer::{ChartHandle, ChartJob, ChartRenderer, ChartState};
pub use sandbox::ScriptSandbox;
pub use tree::{ChartInstance, RenderTree};
