//! Mock duration probe for testing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::probe::DurationProbe;

/// Mock implementation of the DurationProbe trait.
///
/// Returns durations configured per file name, an optional default, or
/// nothing; silent failure is the probe contract.
pub struct MockDurationProbe {
    durations: RwLock<HashMap<String, f64>>,
    default_duration: RwLock<Option<f64>>,
    calls: AtomicUsize,
}

impl Default for MockDurationProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDurationProbe {
    /// Create a probe that knows no durations.
    pub fn new() -> Self {
        Self {
            durations: RwLock::new(HashMap::new()),
            default_duration: RwLock::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    /// Configure the duration reported for a file name.
    pub async fn set_duration(&self, file_name: &str, secs: f64) {
        self.durations
            .write()
            .await
            .insert(file_name.to_string(), secs);
    }

    /// Configure a duration reported for any unknown file.
    pub async fn set_default_duration(&self, secs: Option<f64>) {
        *self.default_duration.write().await = secs;
    }

    /// Number of probe calls made.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DurationProbe for MockDurationProbe {
    fn name(&self) -> &str {
        "mock"
    }

    async fn probe_duration(&self, file_name: &str, _data: &[u8]) -> Option<f64> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(duration) = self.durations.read().await.get(file_name) {
            return Some(*duration);
        }
        *self.default_duration.read().await
    }
}
