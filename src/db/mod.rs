//! SQLite persistence.
//!
//! This module provides:
//! - Database initialization and schema setup
//! - SQLite pragma configuration
//! - Repository layer with conditional (status-guarded) updates

pub mod migrations;
pub mod repo;

pub use migrations::init_db;
pub use repo::{ConsentUpdate, QueueEntry, QueueState, Repository};
