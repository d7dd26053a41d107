// Injectable sources of non-determinism for field extraction
use chrono::{DateTime, SecondsFormat, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::ops::Range;
use std::sync::Mutex;

/// Default range of synthesized latencies in milliseconds
pub const DEFAULT_LATENCY_RANGE: Range<i64> = 20..220;

/// Placeholder latency for records without receive/send timing fields
#[derive(Debug)]
pub enum LatencyFallback {
    /// Uniform pick from `range` (end exclusive)
    Random {
        rng: Mutex<StdRng>,
        range: Range<i64>,
    },
    /// Always the same value
    Fixed(i64),
}

impl LatencyFallback {
    /// Random fallback seeded from the operating system
    pub fn random(range: Range<i64>) -> Self {
        Self::Random {
            rng: Mutex::new(StdRng::from_os_rng()),
            range,
        }
    }

    /// Random fallback with a reproducible sequence
    pub fn seeded(seed: u64, range: Range<i64>) -> Self {
        Self::Random {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            range,
        }
    }

    /// Constant fallback
    pub fn fixed(latency_ms: i64) -> Self {
        Self::Fixed(latency_ms)
    }

    /// Produce one placeholder latency
    pub fn synthesize(&self) -> i64 {
        match self {
            Self::Fixed(ms) => *ms,
            Self::Random { rng, range } => {
                if range.is_empty() {
                    return range.start;
                }
                // A poisoned lock still holds a usable generator
                let mut rng = rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
                rng.random_range(range.clone())
            }
        }
    }
}

impl Default for LatencyFallback {
    fn default() -> Self {
        Self::random(DEFAULT_LATENCY_RANGE)
    }
}

/// Wall clock used when a record has no `_time`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Clock {
    #[default]
    System,
    Fixed(DateTime<Utc>),
}

impl Clock {
    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Self::System => Utc::now(),
            Self::Fixed(at) => *at,
        }
    }

    /// Current time as ISO-8601 with millisecond precision and `Z` suffix
    pub fn now_iso(&self) -> String {
        self.now().to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}
