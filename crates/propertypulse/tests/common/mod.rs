//! Shared test utilities for propertypulse integration tests.
//!
//! This module provides:
//! - Scripted adapters that can fail, block or count calls
//! - `TestHarness` wiring them into an orchestrator

pub mod fakes;
pub mod harness;

pub use fakes::*;
pub use harness::*;
