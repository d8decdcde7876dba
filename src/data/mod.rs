pub mod factory;

pub use factory::{product, unique_suffix, user};
