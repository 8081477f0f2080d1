pub mod grid;
mod overview;

pub use grid::{CellState, CellView, GridView};
pub use overview::Overview;
