pub mod compliance;
pub mod context;
pub mod executor;
pub mod merge;
pub mod sequencer;

pub use compliance::*;
pub use context::*;
pub use executor::*;
pub use merge::*;
pub use sequencer::*;
