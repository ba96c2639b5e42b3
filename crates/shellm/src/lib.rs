//! shellm translates natural-language requests into shell commands.
//!
//! The [`agent`] module drives a bounded tool-calling conversation with
//! an LLM provider; [`tools`] gives the model read-only filesystem
//! inspection inside a sandbox; [`output`] normalizes the model's reply
//! into a single executable command line.

pub mod agent;
pub mod config;
pub mod errors;
pub mod models;
pub mod output;
pub mod prompt;
pub mod providers;
pub mod tools;
pub mod trace;
