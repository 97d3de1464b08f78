// Public API - probe codec, engine and result types
pub mod config;
pub mod error;
pub mod probe;
pub mod state;
pub mod trace;

// Argument parsing, shared with the binary
pub mod cli;
