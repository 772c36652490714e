/*
    Records unbounded unique attribute sets. Memory has to stay flat once the
    cardinality limit is reached, with everything past it folded into the
    overflow series.
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
    let rand = CURRENT_RNG.with(|rng| rng.borrow_mut().random_range(0..100_000_000_i64));
    COUNTER.add(1, &[KeyValue::new("A", rand)]);
}
