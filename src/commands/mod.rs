pub mod load;
pub mod serve;

// Re-export command functions for convenience
pub use load::load;
pub use serve::serve;
