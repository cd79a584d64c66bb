//! Range module resolving item-number ranges to list indices
//!
//! This module handles:
//! - Clamping a requested range to the numbers a list actually holds
//! - Locating a number (or its nearest lower neighbour) in a paged list
//! - Composing page and in-page positions into global indices

mod resolver;

pub use resolver::{find_index, resolve, sanitize, Located, ResolvedRange, SanitizedRange};

use crate::transport::TransportError;
use thiserror::Error;

/// Errors that can occur while resolving a range
#[derive(Debug, Error)]
pub enum RangeError {
    #[error("List contains no items")]
    NoItems,

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// A user-requested pair of inclusive item numbers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestedRange {
    pub start: u64,
    pub end: u64,
}

impl RequestedRange {
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }
}
