//! Extraction state definitions
//!
//! This module defines the states the extraction engine moves through while
//! walking a resolved range.
use crate::transport::FailureKind;
use std::fmt;

/// Represents the current state of an extraction run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtractionState {
    // ===== Active States =====
    /// Fetching and building records at the current index
    Running,

    /// Quota exhausted; waiting for the reset time before retrying the same index
    RateLimited,

    /// Connection failed; waiting a fixed interval before retrying the same index
    NetworkFault,

    // ===== Terminal States =====
    /// Unrecoverable failure or operator cancellation
    Fatal,

    /// Every index in the range was processed
    Completed,
}

impl ExtractionState {
    /// Returns true if the run ends in this state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Fatal | Self::Completed)
    }

    /// State entered after a failure of the given kind
    pub fn after_failure(kind: FailureKind) -> Self {
        match kind {
            FailureKind::Quota => Self::RateLimited,
            FailureKind::Transient => Self::NetworkFault,
            FailureKind::Fatal => Self::Fatal,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::RateLimited => "rate_limited",
            Self::NetworkFault => "network_fault",
            Self::Fatal => "fatal",
            Self::Completed => "completed",
        }
    }
}

impl fmt::Display for ExtractionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
