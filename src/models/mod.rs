pub mod outcome;
pub mod source;

// Re-exports for convenience
pub use outcome::*;
pub use source::*;
