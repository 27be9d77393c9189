pub mod cli;
pub mod commands;
pub mod msi;
pub mod utils;
