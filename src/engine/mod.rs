//! Engine module for resumable extraction
//!
//! This module contains:
//! - The extraction state machine (`Extractor`)
//! - Nested record construction for issues (`RecordBuilder`)
//! - Operator cancellation (`shutdown`)

mod extractor;
mod record;
pub mod shutdown;

pub use extractor::Extractor;
pub use record::{PullRequest, RecordBuilder};
pub use shutdown::{install_ctrl_c_handler, Shutdown, ShutdownTrigger};
