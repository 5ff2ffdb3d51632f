use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Which counter a profiler sample increments (§4.8).
#[derive(Debug, Clone, Copy)]
pub enum ProfileEvent {
    Request,
    Impression,
    Click,
    Conversion,
}

#[derive(Default)]
struct Counters {
    requests: AtomicU64,
    impressions: AtomicU64,
    clicks: AtomicU64,
    conversions: AtomicU64,
}

/// Periodically logs request/impression/click/conversion rates, mirroring
/// the original's `profiling.go` ticker loop. A no-op handle is returned
/// when `profiler_enable` is false, so call sites never need to branch
/// (§4.8).
#[derive(Clone)]
pub struct Profiler {
    counters: Option<Arc<Counters>>,
}

impl Profiler {
    pub fn disabled() -> Self {
        Profiler { counters: None }
    }

    pub fn enabled() -> Self {
        Profiler {
            counters: Some(Arc::new(Counters::default())),
        }
    }

    pub fn record(&self, event: ProfileEvent) {
        let Some(counters) = &self.counters else {
            return;
        };
        let counter = match event {
            ProfileEvent::Request => &counters.requests,
            ProfileEvent::Impression => &counters.impressions,
            ProfileEvent::Click => &counters.clicks,
            ProfileEvent::Conversion => &counters.conversions,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Spawns the periodic reset-and-log loop. No-op when the profiler was
    /// built with [`Profiler::disabled`] (§4.8).
    pub fn spawn_loop(&self, interval_secs: u64) {
        let Some(counters) = self.counters.clone() else {
            return;
        };
        let interval = Duration::from_secs(interval_secs.max(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let requests = counters.requests.swap(0, Ordering::Relaxed);
                let impressions = counters.impressions.swap(0, Ordering::Relaxed);
                let clicks = counters.clicks.swap(0, Ordering::Relaxed);
                let conversions = counters.conversions.swap(0, Ordering::Relaxed);
                let secs = interval.as_secs() as f64;
                tracing::info!(
                    "profiler: requests/s={:.2} impressions/s={:.2} clicks/s={:.2} conversions/s={:.2}",
                    requests as f64 / secs,
                    impressions as f64 / secs,
                    clicks as f64 / secs,
                    conversions as f64 / secs,
                );
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_profiler_record_is_a_no_op() {
        let profiler = Profiler::disabled();
        profiler.record(ProfileEvent::Request);
        assert!(profiler.counters.is_none());
    }

    #[test]
    fn enabled_profiler_accumulates_counts() {
        let profiler = Profiler::enabled();
        profiler.record(ProfileEvent::Request);
        profiler.record(ProfileEvent::Request);
        profiler.record(ProfileEvent::Click);
        let counters = profiler.counters.as_ref().unwrap();
        assert_eq!(counters.requests.load(Ordering::Relaxed), 2);
        assert_eq!(counters.clicks.load(Ordering::Relaxed), 1);
        assert_eq!(counters.impressions.load(Ordering::Relaxed), 0);
    }
}
