//! Helper process argument building, spawning and output decoding.

mod args;
mod process;
mod stream;

pub use args::*;
pub use process::*;
pub use stream::*;
