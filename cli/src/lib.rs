//! Freighter CLI library.
//!
//! Exposes the command tree so it can be driven from tests.

pub mod commands;
pub mod output;
