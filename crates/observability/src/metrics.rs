//! Relay metric recording
//!
//! Thin wrappers over the `metrics` facade. Without an installed recorder
//! every call is a no-op.

use metrics::{counter, histogram};

/// Record a message taken from the source queue
pub fn record_message_received(source: &str) {
    counter!(
        "queue_fanout_messages_received_total",
        "source" => source.to_string()
    )
    .increment(1);
}

/// Record a message delivered to every destination
pub fn record_message_forwarded(route: &str) {
    counter!(
        "queue_fanout_messages_forwarded_total",
        "route" => route.to_string()
    )
    .increment(1);
}

/// Record a message dropped after reporting
pub fn record_message_rejected(reason: &str) {
    counter!(
        "queue_fanout_messages_rejected_total",
        "reason" => reason.to_string()
    )
    .increment(1);
}

/// Record one copy publish attempt
pub fn record_copy_published(destination: &str, success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "queue_fanout_copies_published_total",
        "destination" => destination.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record a message whose fan-out failed for at least one destination
pub fn record_delivery_failure(route: &str) {
    counter!(
        "queue_fanout_delivery_failures_total",
        "route" => route.to_string()
    )
    .increment(1);
}

/// Record the wall time of one fan-out (all copies)
pub fn record_dispatch_latency_ms(latency_ms: f64) {
    histogram!("queue_fanout_dispatch_latency_ms").record(latency_ms);
}

/// Online statistics (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// Add a sample
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// Sample variance
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn summary(&self) -> StatsSummary {
        StatsSummary::from(self)
    }
}

/// Frozen view of a [`RunningStats`]
#[derive(Debug, Clone, Copy, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}
