//! Type definitions for order management.

pub mod basic_types;
pub mod draft;
pub mod items;
pub mod order;

// Re-export commonly used types
pub use basic_types::*;
pub use draft::*;
pub use items::*;
pub use order::*;
