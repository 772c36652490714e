use std::{
    borrow::Cow,
    collections::HashSet,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, RwLock,
    },
};

use telemetry::{
    metrics::{AsyncInstrument, SyncInstrument},
    InstrumentationScope, Key, KeyValue, Value,
};

use crate::metrics::{
    aggregation::Aggregation,
    diagnostics::MetricDiagnostics,
    error::{MetricError, MetricResult},
    internal::{Measure, Number},
    meter::{validate_instrument_name, validate_instrument_unit},
    Temporality,
};

/// The identifier of a group of instruments that all perform the same function.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub enum InstrumentKind {
    /// Identifies a group of instruments that record increasing values synchronously
    /// with the code path they are measuring.
    Counter,
    /// A group of instruments that record increasing and decreasing values
    /// synchronously with the code path they are measuring.
    UpDownCounter,
    /// A group of instruments that record a distribution of values synchronously with
    /// the code path they are measuring.
    Histogram,
    /// A group of instruments that record increasing values in an asynchronous
    /// callback.
    ObservableCounter,
    /// A group of instruments that record increasing and decreasing values in an
    /// asynchronous callback.
    ObservableUpDownCounter,
    /// a group of instruments that record current value synchronously with
    /// the code path they are measuring.
    Gauge,
    /// a group of instruments that record current values in an asynchronous callback.
    ObservableGauge,
}

impl InstrumentKind {
    /// Select the [Temporality] preference based on [InstrumentKind]
    pub(crate) fn temporality_preference(&self, temporality: Temporality) -> Temporality {
        match temporality {
            Temporality::Delta => match self {
                Self::UpDownCounter | Self::ObservableUpDownCounter => Temporality::Cumulative,
                Self::Counter
                | Self::Histogram
                | Self::ObservableCounter
                | Self::Gauge
                | Self::ObservableGauge => Temporality::Delta,
            },
            Temporality::LowMemory => match self {
                Self::Counter | Self::Histogram => Temporality::Delta,
                Self::ObservableCounter
                | Self::Gauge
                | Self::ObservableGauge
                | Self::UpDownCounter
                | Self::ObservableUpDownCounter => Temporality::Cumulative,
            },
            _ => Temporality::Cumulative,
        }
    }

    /// Instruments whose measurements may only grow the reported value.
    pub(crate) fn is_monotonic(&self) -> bool {
        matches!(self, Self::Counter | Self::Histogram)
    }
}

/// Describes an instrument at creation, and doubles as the selection criteria
/// of a view.
///
/// As criteria, empty fields match anything. The name and the scope name may
/// contain `*` (any run of characters) and `?` (exactly one character)
/// wildcards and are compared case-insensitively.
///
/// # Example
///
/// ```
/// use telemetry::InstrumentationScope;
/// use telemetry_sdk::metrics::{Instrument, InstrumentKind};
///
/// let criteria = Instrument::new()
///     .name("http.server.*")
///     .kind(InstrumentKind::Histogram)
///     .scope(InstrumentationScope::builder("my-lib*").build());
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
#[non_exhaustive]
pub struct Instrument {
    /// The human-readable identifier of the instrument.
    pub name: Cow<'static, str>,
    /// describes the purpose of the instrument.
    pub description: Cow<'static, str>,
    /// The functional group of the instrument.
    pub kind: Option<InstrumentKind>,
    /// Unit is the unit of measurement recorded by the instrument.
    pub unit: Cow<'static, str>,
    /// The instrumentation that created the instrument.
    pub scope: InstrumentationScope,
}

impl Instrument {
    /// Create a new instrument with default values
    pub fn new() -> Self {
        Instrument::default()
    }

    /// Set the instrument name.
    pub fn name(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the instrument description.
    pub fn description(mut self, description: impl Into<Cow<'static, str>>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the instrument unit.
    pub fn unit(mut self, unit: impl Into<Cow<'static, str>>) -> Self {
        self.unit = unit.into();
        self
    }

    /// Set the instrument kind.
    pub fn kind(mut self, kind: InstrumentKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Set the instrument scope. As view criteria only the scope name is
    /// compared.
    pub fn scope(mut self, scope: InstrumentationScope) -> Self {
        self.scope = scope;
        self
    }

    /// empty returns if all fields of i are their default-value.
    pub(crate) fn is_empty(&self) -> bool {
        self.name.is_empty()
            && self.description.is_empty()
            && self.kind.is_none()
            && self.unit.is_empty()
            && self.scope.name().is_empty()
    }

    pub(crate) fn matches_description(&self, other: &Instrument) -> bool {
        self.description.is_empty() || self.description == other.description
    }

    pub(crate) fn matches_kind(&self, other: &Instrument) -> bool {
        self.kind.is_none() || self.kind == other.kind
    }

    pub(crate) fn matches_unit(&self, other: &Instrument) -> bool {
        self.unit.is_empty() || self.unit == other.unit
    }
}

/// A builder for [Stream]s.
///
/// # Example
///
/// ```
/// use telemetry::Key;
/// use telemetry_sdk::metrics::{Aggregation, Stream};
///
/// let stream = Stream::builder()
///     .with_name("requests_by_region")
///     .with_aggregation(Aggregation::Sum)
///     .with_allowed_attribute_keys([Key::new("region")])
///     .with_cardinality_limit(100)
///     .build()
///     .unwrap();
/// # drop(stream);
/// ```
#[derive(Default, Debug)]
pub struct StreamBuilder {
    name: Option<Cow<'static, str>>,
    description: Option<Cow<'static, str>>,
    unit: Option<Cow<'static, str>>,
    aggregation: Option<Aggregation>,
    allowed_attribute_keys: Option<Arc<HashSet<Key>>>,
    denied_attribute_keys: Option<Arc<HashSet<Key>>>,
    cardinality_limit: Option<usize>,
}

impl StreamBuilder {
    /// Set the stream name. Without it the instrument name is used.
    pub fn with_name(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the stream description. Without it the instrument description is used.
    pub fn with_description(mut self, description: impl Into<Cow<'static, str>>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the stream unit. Without it the instrument unit is used.
    pub fn with_unit(mut self, unit: impl Into<Cow<'static, str>>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    /// Set the aggregation. Without it the default aggregation of the
    /// instrument kind is used.
    pub fn with_aggregation(mut self, aggregation: Aggregation) -> Self {
        self.aggregation = Some(aggregation);
        self
    }

    /// Keep only attributes whose key is in this set. An empty set drops every
    /// attribute.
    pub fn with_allowed_attribute_keys(mut self, keys: impl IntoIterator<Item = Key>) -> Self {
        self.allowed_attribute_keys = Some(Arc::new(keys.into_iter().collect()));
        self
    }

    /// Drop attributes whose key is in this set. Applied after the allow list.
    pub fn with_denied_attribute_keys(mut self, keys: impl IntoIterator<Item = Key>) -> Self {
        self.denied_attribute_keys = Some(Arc::new(keys.into_iter().collect()));
        self
    }

    /// Set the cardinality limit. Without it the limit is 2000.
    pub fn with_cardinality_limit(mut self, limit: usize) -> Self {
        self.cardinality_limit = Some(limit);
        self
    }

    /// Validates the configuration and builds the [Stream].
    pub fn build(self) -> MetricResult<Stream> {
        if let Some(name) = &self.name {
            validate_instrument_name(name)?;
        }
        validate_instrument_unit(&self.unit)?;

        if self.cardinality_limit == Some(0) {
            return Err(MetricError::Config(
                "Cardinality limit must be greater than 0".into(),
            ));
        }

        if let Some(aggregation) = &self.aggregation {
            aggregation.validate()?;
        }

        Ok(Stream {
            name: self.name,
            description: self.description,
            unit: self.unit,
            aggregation: self.aggregation,
            allowed_attribute_keys: self.allowed_attribute_keys,
            denied_attribute_keys: self.denied_attribute_keys,
            cardinality_limit: self.cardinality_limit,
        })
    }
}

/// Describes the stream of data an instrument produces.
///
/// Returned by [View](crate::metrics::View)s to customize the output of the
/// instruments they match. Unset fields are taken from the instrument.
#[derive(Clone, Default, Debug)]
pub struct Stream {
    pub(crate) name: Option<Cow<'static, str>>,
    pub(crate) description: Option<Cow<'static, str>>,
    pub(crate) unit: Option<Cow<'static, str>>,
    pub(crate) aggregation: Option<Aggregation>,
    pub(crate) allowed_attribute_keys: Option<Arc<HashSet<Key>>>,
    pub(crate) denied_attribute_keys: Option<Arc<HashSet<Key>>>,
    pub(crate) cardinality_limit: Option<usize>,
}

impl Stream {
    /// Create a new stream builder with default values.
    pub fn builder() -> StreamBuilder {
        StreamBuilder::default()
    }

    /// The stream name override, if any.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The aggregation override, if any.
    pub fn aggregation(&self) -> Option<&Aggregation> {
        self.aggregation.as_ref()
    }
}

/// The measures every measurement of one instrument is fanned out to.
///
/// Input is checked here once, before any aggregation sees it.
pub(crate) struct ResolvedMeasures<T> {
    monotonic: bool,
    measures: RwLock<Vec<Arc<dyn Measure<T>>>>,
    diagnostics: Arc<MetricDiagnostics>,
    is_shutdown: Arc<AtomicBool>,
}

impl<T: Number> ResolvedMeasures<T> {
    pub(crate) fn new(
        kind: InstrumentKind,
        diagnostics: Arc<MetricDiagnostics>,
        is_shutdown: Arc<AtomicBool>,
    ) -> Self {
        ResolvedMeasures {
            monotonic: kind.is_monotonic(),
            measures: RwLock::new(Vec::new()),
            diagnostics,
            is_shutdown,
        }
    }

    /// Adds the measure of a stream created for a reader.
    pub(crate) fn push(&self, measure: Arc<dyn Measure<T>>) {
        if let Ok(mut measures) = self.measures.write() {
            measures.push(measure);
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.measures.read().map(|m| m.len()).unwrap_or(0)
    }

    fn record(&self, value: T, attrs: &[KeyValue]) {
        if self.is_shutdown.load(Ordering::Relaxed) {
            return;
        }
        if !value.is_finite() || (self.monotonic && value.is_negative()) {
            self.diagnostics.add_dropped_measurement();
            return;
        }

        let Ok(measures) = self.measures.read() else {
            return;
        };
        if measures.is_empty() {
            return;
        }

        let attrs = sanitize(attrs, &self.diagnostics);
        for measure in measures.iter() {
            measure.call(value, &attrs)
        }
    }
}

impl<T: Number> SyncInstrument<T> for ResolvedMeasures<T> {
    fn measure(&self, measurement: T, attrs: &[KeyValue]) {
        self.record(measurement, attrs)
    }
}

impl<T: Number> AsyncInstrument<T> for ResolvedMeasures<T> {
    fn observe(&self, measurement: T, attrs: &[KeyValue]) {
        self.record(measurement, attrs)
    }
}

fn is_valid_attribute(kv: &KeyValue) -> bool {
    !kv.key.as_str().is_empty() && !matches!(kv.value, Value::F64(v) if v.is_nan())
}

/// Below this many attributes duplicate keys are found by direct comparison,
/// above it through a hash set.
const LINEAR_DEDUP_LIMIT: usize = 8;

fn has_duplicate_keys(attrs: &[KeyValue]) -> bool {
    if attrs.len() <= LINEAR_DEDUP_LIMIT {
        return attrs
            .iter()
            .enumerate()
            .any(|(i, kv)| attrs[i + 1..].iter().any(|later| later.key == kv.key));
    }
    let mut seen = HashSet::with_capacity(attrs.len());
    !attrs.iter().all(|kv| seen.insert(&kv.key))
}

/// Removes attributes with an empty key or a NaN value, and all but the last
/// valid occurrence of a repeated key. Borrows when nothing is removed.
fn sanitize<'a>(attrs: &'a [KeyValue], diagnostics: &MetricDiagnostics) -> Cow<'a, [KeyValue]> {
    let all_valid = attrs.iter().all(is_valid_attribute);
    if all_valid && !has_duplicate_keys(attrs) {
        return Cow::Borrowed(attrs);
    }

    let mut dropped = 0;
    let mut seen = HashSet::with_capacity(attrs.len());
    let mut kept = Vec::with_capacity(attrs.len());
    // walk backwards so the last occurrence of a key wins
    for kv in attrs.iter().rev() {
        if !is_valid_attribute(kv) {
            dropped += 1;
        } else if seen.insert(&kv.key) {
            kept.push(kv.clone());
        }
    }
    kept.reverse();

    let duplicates = attrs.len() - dropped - kept.len();
    if dropped > 0 {
        diagnostics.add_dropped_attributes(dropped as u64);
    }
    if duplicates > 0 {
        diagnostics.add_duplicate_attribute_keys(duplicates as u64);
    }
    Cow::Owned(kept)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::metrics::meter::{INSTRUMENT_NAME_FIRST_ALPHABETIC, INSTRUMENT_UNIT_LENGTH};

    #[derive(Default)]
    struct Recorded(Mutex<Vec<(f64, Vec<KeyValue>)>>);

    impl Measure<f64> for Recorded {
        fn call(&self, measurement: f64, attrs: &[KeyValue]) {
            self.0.lock().unwrap().push((measurement, attrs.to_vec()));
        }
    }

    fn resolved(kind: InstrumentKind) -> (ResolvedMeasures<f64>, Arc<Recorded>, Arc<MetricDiagnostics>) {
        let diagnostics = Arc::new(MetricDiagnostics::default());
        let measures = ResolvedMeasures::new(kind, diagnostics.clone(), Arc::new(AtomicBool::new(false)));
        let recorded = Arc::new(Recorded::default());
        measures.push(recorded.clone());
        (measures, recorded, diagnostics)
    }

    #[test]
    fn stream_validation() {
        let err = Stream::builder().with_name("_bad").build().unwrap_err();
        assert!(matches!(err, MetricError::InvalidInstrumentConfiguration(msg) if msg == INSTRUMENT_NAME_FIRST_ALPHABETIC));

        let err = Stream::builder().with_unit("u".repeat(64)).build().unwrap_err();
        assert!(matches!(err, MetricError::InvalidInstrumentConfiguration(msg) if msg == INSTRUMENT_UNIT_LENGTH));

        assert!(Stream::builder().with_cardinality_limit(0).build().is_err());
        assert!(Stream::builder()
            .with_aggregation(Aggregation::ExplicitBucketHistogram {
                boundaries: vec![1.0, 1.0],
                record_min_max: true,
            })
            .build()
            .is_err());

        let stream = Stream::builder()
            .with_name("renamed")
            .with_cardinality_limit(10)
            .build()
            .unwrap();
        assert_eq!(stream.name(), Some("renamed"));
        assert_eq!(stream.cardinality_limit, Some(10));
    }

    #[test]
    fn low_memory_is_delta_only_for_counters_and_histograms() {
        for kind in [InstrumentKind::Counter, InstrumentKind::Histogram] {
            assert_eq!(kind.temporality_preference(Temporality::LowMemory), Temporality::Delta);
        }
        for kind in [
            InstrumentKind::UpDownCounter,
            InstrumentKind::Gauge,
            InstrumentKind::ObservableCounter,
            InstrumentKind::ObservableUpDownCounter,
            InstrumentKind::ObservableGauge,
        ] {
            assert_eq!(
                kind.temporality_preference(Temporality::LowMemory),
                Temporality::Cumulative
            );
        }
        assert_eq!(
            InstrumentKind::UpDownCounter.temporality_preference(Temporality::Delta),
            Temporality::Cumulative
        );
    }

    #[test]
    fn invalid_values_are_dropped() {
        let (measures, recorded, diagnostics) = resolved(InstrumentKind::Counter);
        measures.measure(f64::NAN, &[]);
        measures.measure(f64::INFINITY, &[]);
        measures.measure(-1.0, &[]);
        measures.measure(1.0, &[]);
        assert_eq!(recorded.0.lock().unwrap().len(), 1);
        assert_eq!(diagnostics.dropped_measurements(), 3);

        let (measures, recorded, _) = resolved(InstrumentKind::UpDownCounter);
        measures.measure(-1.0, &[]);
        assert_eq!(recorded.0.lock().unwrap().len(), 1);
    }

    #[test]
    fn invalid_attributes_are_dropped_and_last_duplicate_wins() {
        let (measures, recorded, diagnostics) = resolved(InstrumentKind::Gauge);
        measures.measure(
            1.0,
            &[
                KeyValue::new("", "empty"),
                KeyValue::new("a", 1),
                KeyValue::new("nan", f64::NAN),
                KeyValue::new("a", 2),
                KeyValue::new("a", f64::NAN),
            ],
        );
        let recorded = recorded.0.lock().unwrap();
        assert_eq!(recorded[0].1, vec![KeyValue::new("a", 2)]);
        assert_eq!(diagnostics.dropped_attributes(), 3);
        assert_eq!(diagnostics.duplicate_attribute_keys(), 1);
    }

    #[test]
    fn wide_attribute_sets_keep_order_and_last_duplicate() {
        let (measures, recorded, diagnostics) = resolved(InstrumentKind::Gauge);
        let mut attrs: Vec<KeyValue> = (0..12_i64).map(|i| KeyValue::new(format!("k{i}"), i)).collect();
        attrs.push(KeyValue::new("k3", 100));
        measures.measure(1.0, &attrs);

        let mut expected: Vec<KeyValue> = (0..12_i64)
            .filter(|i| *i != 3)
            .map(|i| KeyValue::new(format!("k{i}"), i))
            .collect();
        expected.push(KeyValue::new("k3", 100));
        assert_eq!(recorded.0.lock().unwrap()[0].1, expected);
        assert_eq!(diagnostics.duplicate_attribute_keys(), 1);
        assert_eq!(diagnostics.dropped_attributes(), 0);

        measures.measure(2.0, &attrs[..12]);
        assert_eq!(recorded.0.lock().unwrap()[1].1, attrs[..12].to_vec());
        assert_eq!(diagnostics.duplicate_attribute_keys(), 1);
    }

    #[test]
    fn nothing_is_recorded_after_shutdown() {
        let diagnostics = Arc::new(MetricDiagnostics::default());
        let is_shutdown = Arc::new(AtomicBool::new(false));
        let measures = ResolvedMeasures::new(InstrumentKind::Counter, diagnostics, is_shutdown.clone());
        let recorded = Arc::new(Recorded::default());
        measures.push(recorded.clone());

        measures.observe(1.0, &[]);
        is_shutdown.store(true, Ordering::Relaxed);
        measures.observe(1.0, &[]);
        assert_eq!(recorded.0.lock().unwrap().len(), 1);
    }
}
