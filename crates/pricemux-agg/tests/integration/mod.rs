//! Integration tests for pricemux-agg.
//!
//! These tests verify the interaction between components:
//! - Connection lifecycle against a local WebSocket server
//! - Reconnection and abandonment behavior
//! - Fan-out isolation between healthy and failing exchanges

pub mod common;
