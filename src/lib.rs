//! RN Demon Library
//!
//! Entry points for the `rndemon` binary. The logic lives in the
//! `rndemon-*` workspace crates.

pub mod runner;

pub use runner::{run, RunOptions};
