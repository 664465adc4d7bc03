// Utility functions

pub mod json;
pub mod logger;

pub use json::*;
pub use logger::*;
