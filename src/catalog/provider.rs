//! Problem catalog interface and implementations
//!
//! The catalog is an external collaborator: it owns problem metadata and each
//! user's submission history. The rating core only reads from it.

use crate::error::{RatingError, Result};
use crate::types::{Problem, Solve};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

/// Trait for reading problem metadata and solve history
#[async_trait]
pub trait ProblemCatalog: Send + Sync {
    /// Get a specific problem by slug
    async fn get_problem(&self, slug: &str) -> Result<Option<Problem>>;

    /// Every problem the catalog knows about
    async fn list_problems(&self) -> Result<Vec<Problem>>;

    /// A user's full submission history
    async fn solve_history(&self, username: &str) -> Result<Vec<Solve>>;
}

/// In-memory catalog seeded up front (CLI input files, tests)
#[derive(Debug, Default)]
pub struct StaticProblemCatalog {
    problems: RwLock<Vec<Problem>>,
    histories: RwLock<HashMap<String, Vec<Solve>>>,
}

impl StaticProblemCatalog {
    /// Create a catalog over a fixed problem list
    pub fn new(problems: Vec<Problem>) -> Self {
        Self {
            problems: RwLock::new(problems),
            histories: RwLock::new(HashMap::new()),
        }
    }

    /// Replace a user's history
    pub fn set_history(&self, username: &str, solves: Vec<Solve>) -> Result<()> {
        let mut histories = self
            .histories
            .write()
            .map_err(|_| RatingError::InternalError {
                message: "Failed to acquire history write lock".to_string(),
            })?;
        histories.insert(username.to_string(), solves);
        Ok(())
    }

    /// Append one problem
    pub fn add_problem(&self, problem: Problem) -> Result<()> {
        let mut problems = self
            .problems
            .write()
            .map_err(|_| RatingError::InternalError {
                message: "Failed to acquire problems write lock".to_string(),
            })?;
        problems.push(problem);
        Ok(())
    }
}

#[async_trait]
impl ProblemCatalog for StaticProblemCatalog {
    async fn get_problem(&self, slug: &str) -> Result<Option<Problem>> {
        let problems = self
            .problems
            .read()
            .map_err(|_| RatingError::InternalError {
                message: "Failed to acquire problems read lock".to_string(),
            })?;
        Ok(problems.iter().find(|p| p.slug == slug).cloned())
    }

    async fn list_problems(&self) -> Result<Vec<Problem>> {
        let problems = self
            .problems
            .read()
            .map_err(|_| RatingError::InternalError {
                message: "Failed to acquire problems read lock".to_string(),
            })?;
        Ok(problems.clone())
    }

    async fn solve_history(&self, username: &str) -> Result<Vec<Solve>> {
        let histories = self
            .histories
            .read()
            .map_err(|_| RatingError::InternalError {
                message: "Failed to acquire history read lock".to_string(),
            })?;
        Ok(histories.get(username).cloned().unwrap_or_default())
    }
}
