//! Contrarian: recommendation engine for binary prediction markets
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod api;
pub mod config;
pub mod data;
pub mod reasoning;
pub mod strategy;
pub mod throttle;
pub mod types;
