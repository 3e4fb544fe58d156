pub mod app;
pub mod cli;
pub mod config;
pub mod connection;
pub mod dictionary;
pub mod fuzzer;
pub mod output;
pub mod prober;
pub mod reporter;
pub mod target;
pub mod utils;

#[cfg(test)]
mod tests;
