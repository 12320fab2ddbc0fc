pub mod plot;
pub mod render;
pub mod stats;
pub mod table;

pub use plot::{plot, PlotOptions};
pub use render::{render, RenderIter};
pub use stats::{statistics, ColumnStatistics};
pub use table::ResultTable;
