//! Renderer routing and the on-screen render session.

mod code;
mod html;
mod router;
mod session;

pub use code::CodeHighlighter;
pub use html::HtmlPreview;
pub use router::{RenderOutput, RendererKind, RendererRouter};
pub use session::{CANVAS_HEIGHT, CANVAS_WIDTH, ChartMode, Download, RenderSession};
