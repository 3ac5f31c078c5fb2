// Library entry point for scout-reporting

pub mod cli;
pub mod commands;
pub mod config;
pub mod event;
pub mod logging;
pub mod persistence;
pub mod report;
pub mod reporter;
pub mod utils;
