//! Command implementations for the `docidx` binary.

pub mod commands;
