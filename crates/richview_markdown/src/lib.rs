mod block;
mod engine;
mod fence;
mod inline;
mod table;

pub use block::{Block, List, ListItem};
pub use engine::{MarkdownEngine, render_markdown};
pub use table::{Alignment, Table};
