pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod git;
pub mod koji;
pub mod lookaside;
pub mod resolver;
pub mod ui;
pub mod warning;

pub use error::{NbpkgError, ResolutionError, Result};
