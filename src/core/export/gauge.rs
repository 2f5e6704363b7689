//! Accounting for fetched payloads held in memory
//!
//! Every successfully read object is wrapped in a [`Payload`] that holds a
//! lease on the job's [`PayloadGauge`]. The lease is released when the
//! payload is dropped, so the gauge always knows how many payloads (and
//! bytes) are resident and the highest value reached during the job.

use bytes::Bytes;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
struct GaugeInner {
    pending: AtomicUsize,
    pending_bytes: AtomicU64,
    peak: AtomicUsize,
    peak_bytes: AtomicU64,
}

/// Shared counter of resident payloads
#[derive(Debug, Clone, Default)]
pub struct PayloadGauge {
    inner: Arc<GaugeInner>,
}

impl PayloadGauge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap `data` and count it as resident until the payload is dropped
    pub fn track(&self, data: Bytes) -> Payload {
        let len = data.len() as u64;
        let pending = self.inner.pending.fetch_add(1, Ordering::SeqCst) + 1;
        let bytes = self.inner.pending_bytes.fetch_add(len, Ordering::SeqCst) + len;
        self.inner.peak.fetch_max(pending, Ordering::SeqCst);
        self.inner.peak_bytes.fetch_max(bytes, Ordering::SeqCst);

        Payload {
            data,
            gauge: self.clone(),
        }
    }

    /// Payloads currently resident
    pub fn pending(&self) -> usize {
        self.inner.pending.load(Ordering::SeqCst)
    }

    /// Bytes currently resident
    pub fn pending_bytes(&self) -> u64 {
        self.inner.pending_bytes.load(Ordering::SeqCst)
    }

    /// Highest number of payloads resident at once
    pub fn peak(&self) -> usize {
        self.inner.peak.load(Ordering::SeqCst)
    }

    /// Highest number of payload bytes resident at once
    pub fn peak_bytes(&self) -> u64 {
        self.inner.peak_bytes.load(Ordering::SeqCst)
    }
}

/// Bytes of one fetched object, counted by a [`PayloadGauge`]
#[derive(Debug)]
pub struct Payload {
    data: Bytes,
    gauge: PayloadGauge,
}

impl Payload {
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl Drop for Payload {
    fn drop(&mut self) {
        self.gauge.inner.pending.fetch_sub(1, Ordering::SeqCst);
        self.gauge
            .inner
            .pending_bytes
            .fetch_sub(self.data.len() as u64, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lease_released_on_drop() {
        let gauge = PayloadGauge::new();
        let a = gauge.track(Bytes::from_static(b"abc"));
        let b = gauge.track(Bytes::from_static(b"de"));
        assert_eq!(gauge.pending(), 2);
        assert_eq!(gauge.pending_bytes(), 5);

        drop(a);
        assert_eq!(gauge.pending(), 1);
        assert_eq!(gauge.pending_bytes(), 2);

        drop(b);
        assert_eq!(gauge.pending(), 0);
        assert_eq!(gauge.peak(), 2);
        assert_eq!(gauge.peak_bytes(), 5);
    }

    #[test]
    fn test_peak_survives_release() {
        let gauge = PayloadGauge::new();
        for _ in 0..3 {
            let payload = gauge.track(Bytes::from(vec![0u8; 10]));
            assert_eq!(payload.len(), 10);
        }
        assert_eq!(gauge.peak(), 1);
        assert_eq!(gauge.peak_bytes(), 10);
    }
}
