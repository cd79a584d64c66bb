//! State module for tracking extraction progress
//!
//! # Components
//!
//! - `ExtractionState`: the states of the extraction engine (running, rate limited, network fault, fatal, completed)

mod run_state;

pub use run_state::ExtractionState;
