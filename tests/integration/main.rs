//! Integration tests for Repo-Miner
//!
//! `github_tests` drives the HTTP transport against wiremock servers;
//! `extraction_tests` runs the engine end-to-end over the in-memory transport.

mod extraction_tests;
mod github_tests;
