//! Integration tests for end-to-end functionality
//!
//! Tests for:
//! - Decode, filter and resample pipelines
//! - Recordings loaded from disk through a memory map

pub mod file_loading_tests;
pub mod pipeline_tests;
