use chrono::{DateTime, Utc};

/// Abstraction over "current time" so request nonces are deterministic in tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Increasing request nonce (microseconds since the epoch).
    fn nonce(&self) -> u64 {
        self.now().timestamp_micros().max(0) as u64
    }

    /// Milliseconds since the epoch, as Binance expects in `timestamp`.
    fn timestamp_millis(&self) -> u64 {
        self.now().timestamp_millis().max(0) as u64
    }
}

#[derive(Debug, Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone)]
pub struct FixedClock {
    now: DateTime<Utc>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.now
    }
}
