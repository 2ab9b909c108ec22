//! Process runner for the remote-execution helper.

mod error;
mod execute;

pub use error::*;
pub use execute::*;
