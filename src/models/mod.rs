pub mod consolidated;
pub mod document;
pub mod feedback;
pub mod pipeline;
pub mod stage;

pub use consolidated::*;
pub use document::*;
pub use feedback::*;
pub use pipeline::*;
pub use stage::*;
