//! Run statistics.

use std::time::Duration;

use relay::RelayStats;

/// Statistics from one relay run
#[derive(Debug, Clone)]
pub struct PipelineStats {
    /// Counters and latency of the relay
    pub relay: RelayStats,

    /// Total duration of the run
    pub duration: Duration,
}

impl PipelineStats {
    /// Messages received per second
    pub fn throughput(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.relay.counters.received as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        let counters = &self.relay.counters;

        println!("\n=== Relay Statistics ({}) ===\n", self.relay.route_id);
        println!("  Duration: {:.2}s", self.duration.as_secs_f64());
        println!("  Received: {}", counters.received);
        println!("  Forwarded: {}", counters.forwarded);
        println!("  Rejected (empty): {}", counters.rejected);
        println!("  Delivery failures: {}", counters.delivery_failures);
        println!("  Copies published: {}", counters.copies_published);
        if counters.consume_errors > 0 {
            println!("  Consume errors: {}", counters.consume_errors);
        }
        println!("  Throughput: {:.2} msg/s", self.throughput());
        println!("  Dispatch latency (ms): {}", self.relay.dispatch_latency);
        println!();
    }
}
