pub mod checkpoint;
pub mod input;
pub mod output;

pub use checkpoint::*;
pub use input::*;
pub use output::*;
