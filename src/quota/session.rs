use crate::transport::{RateLimit, Transport, TransportError};
use crate::{MinerError, Result};
use chrono::{DateTime, TimeZone, Utc};
use std::time::Duration;

/// Remote call budget of an authenticated session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaSession {
    /// Login the credential belongs to, unknown when the probe was rate limited
    login: Option<String>,
    limit: u32,
    remaining: u32,

    /// Unix epoch (seconds) at which the budget resets
    reset: i64,
}

impl QuotaSession {
    /// Probes the credential with one identity call
    ///
    /// # Returns
    ///
    /// * `Ok(QuotaSession)` - Usable session; exhausted if the probe itself was rate limited
    /// * `Err(MinerError::Auth)` - The credential was rejected
    pub async fn authenticate<T>(transport: &T) -> Result<Self>
    where
        T: Transport + ?Sized,
    {
        match transport.authenticated_user().await {
            Ok(login) => {
                tracing::info!("Authenticated as {}", login);
                let mut session = Self::unlimited(Some(login));
                session.sync(transport);
                Ok(session)
            }
            Err(TransportError::RateLimited { reset }) => {
                tracing::warn!("Quota already exhausted during authentication");
                Ok(Self::exhausted(reset))
            }
            Err(e) => Err(MinerError::from(e)),
        }
    }

    /// A session with no observed budget yet
    pub fn unlimited(login: Option<String>) -> Self {
        Self {
            login,
            limit: u32::MAX,
            remaining: u32::MAX,
            reset: 0,
        }
    }

    /// A session with no calls left until `reset`
    pub fn exhausted(reset: i64) -> Self {
        Self {
            login: None,
            limit: 0,
            remaining: 0,
            reset,
        }
    }

    pub fn login(&self) -> Option<&str> {
        self.login.as_deref()
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn remaining_calls(&self) -> u32 {
        self.remaining
    }

    pub fn reset_epoch(&self) -> i64 {
        self.reset
    }

    /// Reset time as a UTC timestamp, if the epoch is representable
    pub fn reset_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.reset, 0).single()
    }

    /// Records a budget snapshot
    pub fn observe(&mut self, rate_limit: RateLimit) {
        self.limit = rate_limit.limit;
        self.remaining = rate_limit.remaining;
        self.reset = rate_limit.reset;
    }

    /// Marks the budget exhausted until `reset`
    pub fn exhaust(&mut self, reset: i64) {
        self.remaining = 0;
        self.reset = reset;
    }

    /// Takes the snapshot the transport saw on its latest response
    pub fn sync<T>(&mut self, transport: &T)
    where
        T: Transport + ?Sized,
    {
        if let Some(rate_limit) = transport.last_rate_limit() {
            self.observe(rate_limit);
        }
    }

    /// Asks the remote for the authoritative budget
    ///
    /// A rate-limit failure on this call is itself informative and only
    /// updates the reset time.
    pub async fn refresh<T>(&mut self, transport: &T) -> std::result::Result<(), TransportError>
    where
        T: Transport + ?Sized,
    {
        match transport.rate_limit().await {
            Ok(rate_limit) => {
                self.observe(rate_limit);
                Ok(())
            }
            Err(TransportError::RateLimited { reset }) => {
                self.exhaust(reset);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Seconds from `now` until the budget resets; zero or negative means now
    pub fn seconds_until_reset(&self, now: DateTime<Utc>) -> i64 {
        self.reset - now.timestamp()
    }

    /// How long to wait before the next call, never negative
    pub fn backoff(&self, now: DateTime<Utc>) -> Duration {
        Duration::from_secs(self.seconds_until_reset(now).max(0) as u64)
    }
}
