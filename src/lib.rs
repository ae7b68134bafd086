pub mod commands;
pub mod env;
pub mod errors;
pub mod logging;
pub mod operations;
pub mod options;
pub mod outcome;
pub mod plan;
pub mod ports;
pub mod repository;
pub mod safeguards;
pub mod task;
pub mod workflow;

#[cfg(test)]
mod test_support;
