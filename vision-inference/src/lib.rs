pub mod engine;
pub mod inference;
pub mod utils;
