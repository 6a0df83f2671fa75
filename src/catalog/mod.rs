//! Problem catalog collaborator and the explicit rating cache

pub mod cache;
pub mod provider;

// Re-export commonly used types
pub use cache::ProblemRatingCache;
pub use provider::{ProblemCatalog, StaticProblemCatalog};
