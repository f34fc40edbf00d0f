//! Integration tests for primecache

mod cli_tests;
mod common;
mod scenario_tests;
