//! Driver library for the `ozbootc` binary.

pub mod cli;
pub mod pipeline;

pub use cli::{Cli, Mode};
pub use pipeline::{run, DriverError};
