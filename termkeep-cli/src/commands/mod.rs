pub mod attach;
pub mod config;
pub mod history;
