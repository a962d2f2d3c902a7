//! Integration tests for the contrarian engine.

mod engine_flow;
mod mock_source;
