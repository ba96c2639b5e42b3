pub mod base;
pub mod configs;
pub mod groq;
pub mod registry;
pub mod utils;

#[cfg(test)]
pub mod mock;
