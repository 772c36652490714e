/*
    Hammers `Counter::add` with 1000 distinct attribute sets from every
    thread. The aggregation path has to stay lock-free for existing series
    for the throughput to scale with the thread count.
*/

use lazy_static::lazy_static;
use rand::{rngs::SmallRng, Rng, SeedableRng};
use std::cell::RefCell;
use telemetry::{
    metrics::{Counter, MeterProvider as _},
    KeyValue,
};
use telemetry_sdk::metrics::{ManualReader, SdkMeterProvider};

mod throughput;

lazy_static! {
    static ref PROVIDER: SdkMeterProvider = SdkMeterProvider::builder()
        .with_reader(ManualReader::builder().build())
        .build();
    static ref ATTRIBUTE_VALUES: [&'static str; 10] = [
        "value1", "value2", "value3", "value4", "value5", "value6", "value7", "value8", "value9",
        "value10"
    ];
    static ref COUNTER: Counter<u64> = PROVIDER.meter("test").u64_counter("hello").build();
}

thread_local! {
    /// Store random number generator for each thread
    static CURRENT_RNG: RefCell<SmallRng> = RefCell::new(SmallRng::from_os_rng());
}

fn main() {
    throughput::test_throughput(test_counter);
}

fn test_counter() {
    let len = ATTRIBUTE_VALUES.len();
    let rands = CURRENT_RNG.with(|rng| {
        let mut rng = rng.borrow_mut();
        [
            rng.random_range(0..len),
            rng.random_range(0..len),
            rng.random_range(0..len),
        ]
    });

    // each attribute has 10 possible values, so there are 1000 possible combinations (time-series)
    COUNTER.add(
        1,
        &[
            KeyValue::new("attribute1", ATTRIBUTE_VALUES[rands[0]]),
            KeyValue::new("attribute2", ATTRIBUTE_VALUES[rands[1]]),
            KeyValue::new("attribute3", ATTRIBUTE_VALUES[rands[2]]),
        ],
    );
}
