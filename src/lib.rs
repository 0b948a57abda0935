//! Beat Digest Library
//!
//! Listening-history sync, weekly aggregation and newsletter delivery.
//! Modules are public for integration testing.

pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod jobs;
pub mod models;
pub mod report;
pub mod services;
pub mod state;
pub mod tasks;
pub mod templates;
pub mod test_utils;
