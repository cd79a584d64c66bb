//! Quota module tracking the remote call budget
//!
//! Holds the latest known budget and reset time, authenticates the
//! credential, and turns the reset time into a backoff duration.

mod session;

pub use session::QuotaSession;
