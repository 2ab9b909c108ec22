//! Impacket Runner - run a command on a remote Windows host through the
//! impacket `psexec` helper and stream its output back.

pub mod client;
pub mod config;
pub mod display;
pub mod helper;
pub mod identity;
pub mod runner;
