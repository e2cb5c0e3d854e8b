//! Trait definition for duration probing.

use async_trait::async_trait;

/// Asynchronously estimates the duration of raw media bytes.
#[async_trait]
pub trait DurationProbe: Send + Sync {
    /// Returns the name of this probe implementation.
    fn name(&self) -> &str;

    /// Probe the duration in seconds. Returns `None` on any failure; the
    /// caller treats an unknown duration as a normal condition.
    async fn probe_duration(&self, file_name: &str, data: &[u8]) -> Option<f64>;
}
