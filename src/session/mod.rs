//! Timed solve sessions

pub mod manager;

pub use manager::{ActiveSession, SessionSummary, SolveSessionManager, UNSOLVED_STATUS};
