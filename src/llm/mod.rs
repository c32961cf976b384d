pub mod client;
#[cfg(test)]
pub mod mock;
pub mod prompts;
pub mod response;
pub mod validation;

pub use client::*;
pub use prompts::*;
pub use response::*;
pub use validation::*;
