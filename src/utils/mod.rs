pub mod config;
pub mod time;

pub use config::Config;
