//! Core module tests for signal conditioning
//!
//! Tests for:
//! - Filter design across behaviors, characteristics and transforms
//! - Engine state handling and zero-phase filtering
//! - Frequency and transient responses
//! - Display resampling
//! - Settings persistence

pub mod design_tests;
