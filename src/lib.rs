pub mod api;
pub mod credentials;
pub mod data;
pub mod report;
pub mod runner;
pub mod suites;
pub mod utils;

// Re-export common items
pub use report::generate_reports;
pub use runner::{run_suites, RunOptions};
pub use utils::Config;
