mod chart;
mod content;
mod error;
mod markup;
mod table;

pub use chart::*;
pub use content::*;
pub use error::*;
pub use markup::*;
pub use table::*;
