//! Id Generator
use rand::{rngs, Rng, SeedableRng};
use std::cell::RefCell;
use std::fmt;
use telemetry::trace::{SpanId, TraceId};

/// Interface for generating IDs
pub trait IdGenerator: Send + Sync + fmt::Debug {
    /// Generate a new `TraceId`
    fn new_trace_id(&self) -> TraceId;

    /// Generate a new `SpanId`
    fn new_span_id(&self) -> SpanId;
}

/// Default [`IdGenerator`] implementation.
///
/// Generates Trace and Span ids using a random number generator.
#[derive(Clone, Debug, Default)]
pub struct RandomIdGenerator {
    _private: (),
}

impl IdGenerator for RandomIdGenerator {
    fn new_trace_id(&self) -> TraceId {
        CURRENT_RNG.with(|rng| {
            let mut rng = rng.borrow_mut();
            loop {
                let id = rng.random::<u128>();
                if id != 0 {
                    return TraceId::from(id);
                }
            }
        })
    }

    fn new_span_id(&self) -> SpanId {
        CURRENT_RNG.with(|rng| {
            let mut rng = rng.borrow_mut();
            loop {
                let id = rng.random::<u64>();
                if id != 0 {
                    return SpanId::from(id);
                }
            }
        })
    }
}

thread_local! {
    /// Store random number generator for each thread
    static CURRENT_RNG: RefCell<rngs::SmallRng> = RefCell::new(rngs::SmallRng::from_os_rng());
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn ids_are_valid_and_distinct() {
        let generator = RandomIdGenerator::default();
        let trace_ids: HashSet<TraceId> = (0..100).map(|_| generator.new_trace_id()).collect();
        let span_ids: HashSet<SpanId> = (0..100).map(|_| generator.new_span_id()).collect();
        assert_eq!(trace_ids.len(), 100);
        assert_eq!(span_ids.len(), 100);
        assert!(!trace_ids.contains(&TraceId::INVALID));
        assert!(!span_ids.contains(&SpanId::INVALID));
    }
}
