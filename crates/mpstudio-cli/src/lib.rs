//! # mps
//!
//! Command line front end for MicroPython Studio: board discovery, auto-sync
//! of a project's sync folder, and one-off device commands.

pub mod cli;
pub mod commands;
pub mod prompt;
