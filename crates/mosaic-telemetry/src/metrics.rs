//! Branch-level metrics

use std::sync::OnceLock;
use std::time::Duration;

use opentelemetry::KeyValue;
use opentelemetry::metrics::{Counter, Histogram};

pub const BRANCH_DURATION: &str = "mosaic.branch.duration";
pub const BRANCH_COUNT: &str = "mosaic.branch.count";
pub const FANOUT_COUNT: &str = "mosaic.fanout.count";

struct Instruments {
    branch_duration: Histogram<f64>,
    branch_count: Counter<u64>,
    fanout_count: Counter<u64>,
}

fn instruments() -> &'static Instruments {
    static INSTRUMENTS: OnceLock<Instruments> = OnceLock::new();
    INSTRUMENTS.get_or_init(|| {
        let meter = opentelemetry::global::meter("mosaic");
        Instruments {
            branch_duration: meter
                .f64_histogram(BRANCH_DURATION)
                .with_unit("s")
                .with_description("Time from branch dispatch to settlement")
                .build(),
            branch_count: meter
                .u64_counter(BRANCH_COUNT)
                .with_description("Settled branches by provider and outcome")
                .build(),
            fanout_count: meter
                .u64_counter(FANOUT_COUNT)
                .with_description("Dispatched fan-out requests")
                .build(),
        }
    })
}

/// Record one settled branch
pub fn record_branch(provider: &str, outcome: &'static str, elapsed: Duration) {
    let attributes = [
        KeyValue::new("provider", provider.to_owned()),
        KeyValue::new("outcome", outcome),
    ];
    let instruments = instruments();
    instruments.branch_duration.record(elapsed.as_secs_f64(), &attributes);
    instruments.branch_count.add(1, &attributes);
}

/// Record one dispatched fan-out and its width
pub fn record_fanout(width: usize) {
    instruments()
        .fanout_count
        .add(1, &[KeyValue::new("width", i64::try_from(width).unwrap_or(i64::MAX))]);
}
