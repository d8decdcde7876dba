pub mod client;
pub mod storage;
pub mod types;

pub use client::{ApiCall, ApiClient, ApiResponse, Auth};
pub use storage::SessionStorage;
