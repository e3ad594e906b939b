//! Crossforge - build orchestration for cross-compiler test matrices
//!
//! This crate provides the core toolkit for driving many independent
//! cross-compiler invocations: templated build parameters, logged command
//! execution, per-target build-directory lifecycle, and emission of a
//! diagnostic probe source that reveals a toolchain's characteristics.
//!
//! The outer driver that enumerates the (toolchain, architecture) matrix
//! is not part of this crate; it constructs one [`Runner`] and one
//! [`BuildSession`] per target and inspects the session summary on close.

pub mod config;
pub mod log;
pub mod probe;
pub mod runner;
pub mod session;

pub use config::{Config, Value};
pub use log::{BuildLog, Summary};
pub use runner::Runner;
pub use session::{build_dir, BuildSession};
