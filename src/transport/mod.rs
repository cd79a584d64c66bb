//! Transport module for remote list access
//!
//! This module defines the seam between the extraction engine and the remote
//! API:
//! - `PagedList`: random access into a paginated, number-sorted collection
//! - `Transport`: the calls the engine makes, plus the quota oracle
//! - `TransportError` and `FailureKind`: typed failures the engine dispatches on
//!
//! `github` provides the real implementation; `memory` serves canned payloads.

pub mod memory;
mod traits;

pub use memory::{Call, ListName, MemoryList, MemoryTransport};
pub use traits::{FailureKind, Item, PagedList, RateLimit, Transport, TransportError};
