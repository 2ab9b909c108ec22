//! Client facade and its event channel.

mod events;
mod facade;

pub use events::*;
pub use facade::*;
