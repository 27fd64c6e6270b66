// Utility functions
pub mod dates;
pub mod error;
pub mod format;

pub use error::*;
