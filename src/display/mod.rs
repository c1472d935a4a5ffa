pub mod grid;
pub mod terminal;

pub use grid::DisplayGrid;
pub use terminal::TerminalHost;
