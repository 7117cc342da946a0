//! Rolling response-time history.
//!
//! Feeds the client's progress-bar estimate only. Lost updates under
//! concurrent writers are acceptable and storage failures never surface.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, warn};

pub const DEFAULT_CAPACITY: usize = 10;
pub const DEFAULT_FALLBACK: Duration = Duration::from_secs(30);

#[async_trait]
pub trait ResponseTimeStore: Send + Sync {
    async fn record(&self, elapsed: Duration);

    /// Mean of the retained samples, or the fallback when there are none.
    async fn average(&self) -> Duration;
}

fn mean(samples: impl Iterator<Item = u64>, fallback: Duration) -> Duration {
    let (count, total) = samples.fold((0u64, 0u64), |(n, sum), ms| (n + 1, sum.saturating_add(ms)));
    if count == 0 {
        fallback
    } else {
        Duration::from_millis(total / count)
    }
}

fn as_millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

// ────────────────────────────────────────────────────────────────────────────
// In-memory ring buffer
// ────────────────────────────────────────────────────────────────────────────

pub struct InMemoryResponseTimes {
    samples: Mutex<VecDeque<u64>>,
    capacity: usize,
    fallback: Duration,
}

impl InMemoryResponseTimes {
    pub fn new(capacity: usize, fallback: Duration) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            fallback,
        }
    }
}

impl Default for InMemoryResponseTimes {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_FALLBACK)
    }
}

#[async_trait]
impl ResponseTimeStore for InMemoryResponseTimes {
    async fn record(&self, elapsed: Duration) {
        let mut samples = self.samples.lock().await;
        if samples.len() == self.capacity {
            samples.pop_front();
        }
        samples.push_back(as_millis(elapsed));
    }

    async fn average(&self) -> Duration {
        let samples = self.samples.lock().await;
        mean(samples.iter().copied(), self.fallback)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// JSON file
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TimingSample {
    duration_ms: u64,
    recorded_at: DateTime<Utc>,
}

/// History persisted as a JSON array so it survives restarts.
pub struct FileResponseTimes {
    path: PathBuf,
    capacity: usize,
    fallback: Duration,
}

impl FileResponseTimes {
    pub fn new(path: impl Into<PathBuf>, capacity: usize, fallback: Duration) -> Self {
        Self {
            path: path.into(),
            capacity: capacity.max(1),
            fallback,
        }
    }

    /// The newest `capacity` samples. A missing or corrupt file reads as an
    /// empty history.
    async fn load(&self) -> Vec<TimingSample> {
        let mut samples = self.load_all().await;
        self.trim(&mut samples);
        samples
    }

    fn trim(&self, samples: &mut Vec<TimingSample>) {
        let overflow = samples.len().saturating_sub(self.capacity);
        samples.drain(..overflow);
    }

    async fn load_all(&self) -> Vec<TimingSample> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return vec![],
            Err(e) => {
                warn!("Could not read {}: {e}", self.path.display());
                return vec![];
            }
        };
        serde_json::from_slice(&raw).unwrap_or_else(|e| {
            warn!("Ignoring corrupt timing history {}: {e}", self.path.display());
            vec![]
        })
    }
}

#[async_trait]
impl ResponseTimeStore for FileResponseTimes {
    async fn record(&self, elapsed: Duration) {
        let mut samples = self.load().await;
        samples.push(TimingSample {
            duration_ms: as_millis(elapsed),
            recorded_at: Utc::now(),
        });
        self.trim(&mut samples);

        let body = match serde_json::to_vec_pretty(&samples) {
            Ok(body) => body,
            Err(e) => {
                warn!("Could not encode timing history: {e}");
                return;
            }
        };
        match tokio::fs::write(&self.path, body).await {
            Ok(()) => debug!("Recorded response time {}ms", as_millis(elapsed)),
            Err(e) => warn!("Could not write {}: {e}", self.path.display()),
        }
    }

    async fn average(&self) -> Duration {
        let samples = self.load().await;
        mean(samples.iter().map(|s| s.duration_ms), self.fallback)
    }
}
