use core::fmt;
use std::{
    any::{type_name, Any},
    borrow::Cow,
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, RwLock,
    },
};

use telemetry::{diag_debug, diag_warn, InstrumentationScope, Key};

use crate::{
    error::{combine_results, SdkResult},
    metrics::{
        aggregation::Aggregation,
        data::{Metric, ResourceMetrics, ScopeMetrics},
        diagnostics::MetricDiagnostics,
        instrument::{Instrument, InstrumentKind, ResolvedMeasures, Stream},
        internal::{
            self, AggregateBuilder, AggregateFns, AttributeSetFilter, Number,
            DEFAULT_CARDINALITY_LIMIT,
        },
        reader::{MetricReader, SdkProducer},
        view::View,
        MetricError, MetricResult, DEFAULT_HISTOGRAM_BOUNDARIES,
    },
    Resource,
};

/// Connects all of the instruments created by a meter provider to a [MetricReader].
///
/// One pipeline exists per reader registered with a meter provider.
///
/// As instruments are created, each of their resolved streams gets an
/// aggregate function in every pipeline, and the pipeline reads them back on
/// collection.
#[doc(hidden)]
pub struct Pipeline {
    pub(crate) resource: Resource,
    reader: Box<dyn MetricReader>,
    inner: Mutex<PipelineInner>,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Pipeline")
    }
}

/// Single or multi-instrument callbacks
type GenericCallback = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct PipelineInner {
    /// In order of first registration of each scope.
    aggregations: Vec<(InstrumentationScope, Vec<InstrumentSync>)>,
    /// `Arc<dyn Measure<T>>` of every stream bound so far.
    measures: HashMap<(InstrumentationScope, StreamId), Arc<dyn Any + Send + Sync>>,
    callbacks: Vec<GenericCallback>,
}

impl fmt::Debug for PipelineInner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineInner")
            .field("aggregations", &self.aggregations)
            .field("callbacks", &self.callbacks.len())
            .finish()
    }
}

impl PipelineInner {
    fn add_sync(&mut self, scope: InstrumentationScope, i_sync: InstrumentSync) {
        diag_debug!(
            name: "Pipeline.InstrumentCreated",
            instrument_name = i_sync.name.to_string()
        );
        match self.aggregations.iter_mut().find(|(s, _)| *s == scope) {
            Some((_, instruments)) => instruments.push(i_sync),
            None => self.aggregations.push((scope, vec![i_sync])),
        }
    }
}

impl Pipeline {
    fn new(resource: Resource, reader: Box<dyn MetricReader>) -> Arc<Self> {
        let pipe = Arc::new(Pipeline {
            resource,
            reader,
            inner: Default::default(),
        });
        pipe.reader.register_pipeline(Arc::downgrade(&pipe));
        pipe
    }

    /// Returns the measure feeding `stream` of an instrument in `scope`,
    /// creating its aggregate function on first use.
    ///
    /// Streams with equal identity share one aggregate function.
    fn aggregate<T: Number>(
        &self,
        scope: &InstrumentationScope,
        kind: InstrumentKind,
        stream: &ResolvedStream,
        diagnostics: &Arc<MetricDiagnostics>,
    ) -> MetricResult<Arc<dyn internal::Measure<T>>> {
        let mut inner = self.inner.lock()?;

        let key = (scope.clone(), stream.id::<T>());
        if let Some(measure) = inner
            .measures
            .get(&key)
            .and_then(|m| m.downcast_ref::<Arc<dyn internal::Measure<T>>>())
        {
            diag_debug!(
                name: "Pipeline.StreamShared",
                stream_name = stream.name.to_string()
            );
            return Ok(Arc::clone(measure));
        }

        let filter = AttributeSetFilter::new(
            stream.allowed_attribute_keys.clone(),
            stream.denied_attribute_keys.clone(),
        );
        let builder = AggregateBuilder::<T>::new(
            self.reader.temporality(kind),
            filter,
            stream.cardinality_limit,
            Arc::clone(diagnostics),
        );
        let AggregateFns { measure, collect } = aggregate_fn(builder, &stream.aggregation, kind)
            .ok_or_else(|| {
                MetricError::Other(format!(
                    "no aggregate function for {} on {kind:?}",
                    stream.aggregation
                ))
            })?;

        inner.add_sync(
            scope.clone(),
            InstrumentSync {
                name: stream.name.clone(),
                description: stream.description.clone(),
                unit: stream.unit.clone(),
                comp_agg: collect,
            },
        );
        inner.measures.insert(key, Arc::new(Arc::clone(&measure)));

        Ok(measure)
    }

    /// Registers a single instrument callback to be run when `produce` is called.
    fn add_callback(&self, callback: GenericCallback) {
        let _ = self
            .inner
            .lock()
            .map(|mut inner| inner.callbacks.push(callback));
    }

    /// Send accumulated telemetry
    fn force_flush(&self) -> SdkResult {
        self.reader.force_flush()
    }

    /// Shut down pipeline
    fn shutdown(&self) -> SdkResult {
        self.reader.shutdown()
    }
}

impl SdkProducer for Pipeline {
    /// Returns aggregated metrics from a single collection.
    fn produce(&self, rm: &mut ResourceMetrics) -> MetricResult<()> {
        // Callbacks record into the aggregators without holding the pipeline
        // lock, so they may create instruments.
        let callbacks = self.inner.lock()?.callbacks.clone();
        diag_debug!(
            name: "Pipeline.InvokingObservableCallbacks",
            count = callbacks.len()
        );
        for cb in &callbacks {
            cb();
        }

        let inner = self.inner.lock()?;
        rm.resource = self.resource.clone();
        if inner.aggregations.len() > rm.scope_metrics.len() {
            rm.scope_metrics
                .reserve(inner.aggregations.len() - rm.scope_metrics.len());
        }

        let mut i = 0;
        for (scope, instruments) in inner.aggregations.iter() {
            if rm.scope_metrics.len() <= i {
                rm.scope_metrics.push(ScopeMetrics::default());
            }
            let sm = &mut rm.scope_metrics[i];
            if instruments.len() > sm.metrics.len() {
                sm.metrics.reserve(instruments.len() - sm.metrics.len());
            }

            let mut j = 0;
            for inst in instruments {
                let mut m = sm.metrics.get_mut(j);
                match (inst.comp_agg.call(m.as_mut().map(|m| &mut m.data)), m) {
                    // No metric to re-use, expect agg to create new metric data
                    ((len, Some(initial_agg)), None) if len > 0 => sm.metrics.push(Metric {
                        name: inst.name.clone(),
                        description: inst.description.clone(),
                        unit: inst.unit.clone(),
                        data: initial_agg,
                    }),
                    // Existing metric can be re-used, update its values
                    ((len, data), Some(prev_agg)) if len > 0 => {
                        if let Some(data) = data {
                            // previous aggregation was of a different type
                            prev_agg.data = data;
                        }
                        prev_agg.name.clone_from(&inst.name);
                        prev_agg.description.clone_from(&inst.description);
                        prev_agg.unit.clone_from(&inst.unit);
                    }
                    _ => continue,
                }

                j += 1;
            }

            sm.metrics.truncate(j);
            if !sm.metrics.is_empty() {
                sm.scope = scope.clone();
                i += 1;
            }
        }

        rm.scope_metrics.truncate(i);

        Ok(())
    }
}

/// A synchronization point between a [Pipeline] and an instrument's aggregate function.
struct InstrumentSync {
    name: Cow<'static, str>,
    description: Cow<'static, str>,
    unit: Cow<'static, str>,
    comp_agg: Arc<dyn internal::ComputeAggregation>,
}

impl fmt::Debug for InstrumentSync {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstrumentSync")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("unit", &self.unit)
            .finish()
    }
}

/// A [Stream] with every field decided.
#[derive(Clone, Debug)]
pub(crate) struct ResolvedStream {
    name: Cow<'static, str>,
    description: Cow<'static, str>,
    unit: Cow<'static, str>,
    aggregation: Aggregation,
    allowed_attribute_keys: Option<Arc<HashSet<Key>>>,
    denied_attribute_keys: Option<Arc<HashSet<Key>>>,
    cardinality_limit: usize,
}

/// The identity of an aggregation stream within one pipeline and scope.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
struct StreamId {
    name: String,
    description: Cow<'static, str>,
    unit: Cow<'static, str>,
    aggregation: String,
    number: &'static str,
    allowed_attribute_keys: Option<Vec<Key>>,
    denied_attribute_keys: Option<Vec<Key>>,
    cardinality_limit: usize,
}

fn sorted_keys(keys: &Option<Arc<HashSet<Key>>>) -> Option<Vec<Key>> {
    keys.as_ref().map(|keys| {
        let mut keys: Vec<Key> = keys.iter().cloned().collect();
        keys.sort();
        keys
    })
}

impl ResolvedStream {
    fn id<T>(&self) -> StreamId {
        StreamId {
            name: self.name.to_lowercase(),
            description: self.description.clone(),
            unit: self.unit.clone(),
            aggregation: format!("{:?}", self.aggregation),
            number: type_name::<T>(),
            allowed_attribute_keys: sorted_keys(&self.allowed_attribute_keys),
            denied_attribute_keys: sorted_keys(&self.denied_attribute_keys),
            cardinality_limit: self.cardinality_limit,
        }
    }

    fn same_output(&self, other: &ResolvedStream) -> bool {
        self.name.eq_ignore_ascii_case(&other.name)
            && self.description == other.description
            && self.unit == other.unit
            && self.aggregation == other.aggregation
    }

    fn same_filters(&self, other: &ResolvedStream) -> bool {
        sorted_keys(&self.allowed_attribute_keys) == sorted_keys(&other.allowed_attribute_keys)
            && sorted_keys(&self.denied_attribute_keys)
                == sorted_keys(&other.denied_attribute_keys)
            && self.cardinality_limit == other.cardinality_limit
    }
}

/// Maps an instrument to its streams using the registered views, in view
/// order.
///
/// When no view matches, the instrument gets the default stream of its kind,
/// using `boundaries` for histograms when given.
pub(crate) fn resolve_streams<T: Number>(
    inst: &Instrument,
    kind: InstrumentKind,
    views: &[Arc<dyn View>],
    boundaries: Option<&[f64]>,
) -> Vec<ResolvedStream> {
    let mut matched = false;
    let mut streams: Vec<ResolvedStream> = Vec::new();

    for view in views {
        let Some(stream) = view.match_inst(inst) else {
            continue;
        };
        matched = true;

        let Some(resolved) = resolve_stream(inst, kind, stream, boundaries) else {
            continue;
        };
        if let Some(existing) = streams.iter().find(|s| s.same_output(&resolved)) {
            if existing.same_filters(&resolved) {
                diag_warn!(
                    name: "Instrument.DuplicateStream",
                    message = "views produced the same stream twice, keeping one",
                    instrument_name = inst.name.to_string(),
                    stream_name = resolved.name.to_string()
                );
                continue;
            }
            diag_warn!(
                name: "MeterProvider.ConflictingViewFilters",
                message = "views produced streams that differ only in attribute filters, both are kept",
                instrument_name = inst.name.to_string(),
                stream_name = resolved.name.to_string(),
                number = type_name::<T>()
            );
        }
        streams.push(resolved);
    }

    if !matched {
        if let Some(resolved) = resolve_stream(inst, kind, Stream::default(), boundaries) {
            streams.push(resolved);
        }
    }

    streams
}

fn resolve_stream(
    inst: &Instrument,
    kind: InstrumentKind,
    stream: Stream,
    boundaries: Option<&[f64]>,
) -> Option<ResolvedStream> {
    let aggregation = match stream.aggregation {
        None | Some(Aggregation::Default) => default_aggregation_selector(kind, boundaries),
        Some(Aggregation::Drop) => return None,
        Some(aggregation) => aggregation,
    };

    if !is_aggregator_compatible(&kind, &aggregation) {
        diag_warn!(
            name: "Instrument.IncompatibleAggregation",
            message = "aggregation is not compatible with the instrument kind, the stream is skipped",
            instrument_name = inst.name.to_string(),
            kind = format!("{kind:?}"),
            aggregation = aggregation.to_string()
        );
        return None;
    }

    Some(ResolvedStream {
        name: stream.name.unwrap_or_else(|| inst.name.clone()),
        description: stream
            .description
            .unwrap_or_else(|| inst.description.clone()),
        unit: stream.unit.unwrap_or_else(|| inst.unit.clone()),
        aggregation,
        allowed_attribute_keys: stream.allowed_attribute_keys,
        denied_attribute_keys: stream.denied_attribute_keys,
        cardinality_limit: stream.cardinality_limit.unwrap_or(DEFAULT_CARDINALITY_LIMIT),
    })
}

/// The default aggregation and parameters for an instrument of [InstrumentKind].
///
/// * Counter ⇨ Sum
/// * Observable Counter ⇨ Sum
/// * UpDownCounter ⇨ Sum
/// * Observable UpDownCounter ⇨ Sum
/// * Gauge ⇨ LastValue
/// * Observable Gauge ⇨ LastValue
/// * Histogram ⇨ ExplicitBucketHistogram
fn default_aggregation_selector(kind: InstrumentKind, boundaries: Option<&[f64]>) -> Aggregation {
    match kind {
        InstrumentKind::Counter
        | InstrumentKind::UpDownCounter
        | InstrumentKind::ObservableCounter
        | InstrumentKind::ObservableUpDownCounter => Aggregation::Sum,
        InstrumentKind::Gauge => Aggregation::LastValue,
        InstrumentKind::ObservableGauge => Aggregation::LastValue,
        InstrumentKind::Histogram => Aggregation::ExplicitBucketHistogram {
            boundaries: boundaries
                .map(<[f64]>::to_vec)
                .unwrap_or_else(|| DEFAULT_HISTOGRAM_BOUNDARIES.to_vec()),
            record_min_max: true,
        },
    }
}

/// Returns new aggregate functions for the given params, or `None` for
/// [Aggregation::Drop].
fn aggregate_fn<T: Number>(
    b: AggregateBuilder<T>,
    agg: &Aggregation,
    kind: InstrumentKind,
) -> Option<AggregateFns<T>> {
    match agg {
        Aggregation::Default => aggregate_fn(b, &default_aggregation_selector(kind, None), kind),
        Aggregation::Drop => None,
        Aggregation::LastValue => match kind {
            // Observed gauges only report what the callbacks saw this collection.
            InstrumentKind::ObservableGauge => Some(b.last_value(true)),
            _ => Some(b.last_value(false)),
        },
        Aggregation::Sum => {
            let fns = match kind {
                InstrumentKind::ObservableCounter => b.precomputed_sum(true),
                InstrumentKind::ObservableUpDownCounter => b.precomputed_sum(false),
                InstrumentKind::Counter | InstrumentKind::Histogram => b.sum(true),
                _ => b.sum(false),
            };
            Some(fns)
        }
        Aggregation::ExplicitBucketHistogram {
            boundaries,
            record_min_max,
        } => {
            let record_sum = !matches!(
                kind,
                InstrumentKind::UpDownCounter
                    | InstrumentKind::ObservableUpDownCounter
                    | InstrumentKind::ObservableGauge
            );
            Some(b.explicit_bucket_histogram(boundaries.to_vec(), *record_min_max, record_sum))
        }
    }
}

/// Checks if the aggregation can be used by the instrument.
///
/// Current compatibility:
///
/// | Instrument Kind          | Drop | LastValue | Sum | Histogram |
/// |--------------------------|------|-----------|-----|-----------|
/// | Counter                  | ✓    |           | ✓   | ✓         |
/// | UpDownCounter            | ✓    |           | ✓   |           |
/// | Histogram                | ✓    |           | ✓   | ✓         |
/// | Observable Counter       | ✓    |           | ✓   | ✓         |
/// | Observable UpDownCounter | ✓    |           | ✓   |           |
/// | Gauge                    | ✓    | ✓         |     | ✓         |
/// | Observable Gauge         | ✓    | ✓         |     | ✓         |
fn is_aggregator_compatible(kind: &InstrumentKind, agg: &Aggregation) -> bool {
    match agg {
        Aggregation::Default | Aggregation::Drop => true,
        Aggregation::ExplicitBucketHistogram { .. } => !matches!(
            kind,
            InstrumentKind::UpDownCounter | InstrumentKind::ObservableUpDownCounter
        ),
        Aggregation::Sum => !matches!(
            kind,
            InstrumentKind::Gauge | InstrumentKind::ObservableGauge
        ),
        Aggregation::LastValue => matches!(
            kind,
            InstrumentKind::Gauge | InstrumentKind::ObservableGauge
        ),
    }
}

/// Connects the measures of one instrument to pipelines, including the ones
/// of readers added after the instrument was created.
trait StreamBinding: Send + Sync {
    fn attach(&self, pipe: &Pipeline, diagnostics: &Arc<MetricDiagnostics>);
}

struct InstrumentBinding<T> {
    scope: InstrumentationScope,
    kind: InstrumentKind,
    streams: Vec<ResolvedStream>,
    measures: Arc<ResolvedMeasures<T>>,
}

impl<T: Number> StreamBinding for InstrumentBinding<T> {
    fn attach(&self, pipe: &Pipeline, diagnostics: &Arc<MetricDiagnostics>) {
        for stream in &self.streams {
            match pipe.aggregate::<T>(&self.scope, self.kind, stream, diagnostics) {
                Ok(measure) => self.measures.push(measure),
                Err(err) => diag_warn!(
                    name: "Pipeline.AggregateFailed",
                    stream_name = stream.name.to_string(),
                    reason = err.to_string()
                ),
            }
        }
    }
}

#[derive(Default)]
struct PipelinesState {
    pipes: Vec<Arc<Pipeline>>,
    bindings: Vec<Arc<dyn StreamBinding>>,
    callbacks: Vec<GenericCallback>,
}

/// The group of pipelines connecting Readers with instrument measurement.
///
/// Readers, views and instruments can be added at any time. Lock order is
/// `state`, then a pipeline's own lock.
pub(crate) struct Pipelines {
    resource: Resource,
    state: RwLock<PipelinesState>,
    views: RwLock<Vec<Arc<dyn View>>>,
    diagnostics: Arc<MetricDiagnostics>,
    is_shutdown: Arc<AtomicBool>,
}

impl fmt::Debug for Pipelines {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pipes = self.state.read().map(|s| s.pipes.len()).unwrap_or(0);
        f.debug_struct("Pipelines")
            .field("resource", &self.resource)
            .field("pipes", &pipes)
            .finish()
    }
}

impl Pipelines {
    pub(crate) fn new(resource: Resource) -> Self {
        Pipelines {
            resource,
            state: RwLock::new(PipelinesState::default()),
            views: RwLock::new(Vec::new()),
            diagnostics: Arc::new(MetricDiagnostics::default()),
            is_shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    pub(crate) fn diagnostics(&self) -> Arc<MetricDiagnostics> {
        Arc::clone(&self.diagnostics)
    }

    /// Set once the owning provider shuts down; instruments stop recording.
    pub(crate) fn shutdown_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.is_shutdown)
    }

    /// Adds a pipeline for `reader` and attaches every existing instrument
    /// and callback to it.
    pub(crate) fn add_reader(&self, reader: Box<dyn MetricReader>) {
        let pipe = Pipeline::new(self.resource.clone(), reader);
        let Ok(mut state) = self.state.write() else {
            return;
        };
        for binding in &state.bindings {
            binding.attach(&pipe, &self.diagnostics);
        }
        for cb in &state.callbacks {
            pipe.add_callback(Arc::clone(cb));
        }
        state.pipes.push(pipe);
    }

    /// Views apply to instruments created after they are added.
    pub(crate) fn add_view(&self, view: Arc<dyn View>) {
        if let Ok(mut views) = self.views.write() {
            views.push(view);
        }
    }

    pub(crate) fn views(&self) -> Vec<Arc<dyn View>> {
        self.views.read().map(|v| v.clone()).unwrap_or_default()
    }

    /// Binds the streams of a new instrument to every pipeline, now and for
    /// readers added later.
    pub(crate) fn bind<T: Number>(
        &self,
        scope: InstrumentationScope,
        kind: InstrumentKind,
        streams: Vec<ResolvedStream>,
        measures: Arc<ResolvedMeasures<T>>,
    ) {
        let binding = Arc::new(InstrumentBinding {
            scope,
            kind,
            streams,
            measures,
        });
        let Ok(mut state) = self.state.write() else {
            return;
        };
        for pipe in &state.pipes {
            binding.attach(pipe, &self.diagnostics);
        }
        state.bindings.push(binding);
    }

    pub(crate) fn register_callback<F>(&self, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        let cb: GenericCallback = Arc::new(callback);
        let Ok(mut state) = self.state.write() else {
            return;
        };
        for pipe in &state.pipes {
            pipe.add_callback(Arc::clone(&cb));
        }
        state.callbacks.push(cb);
    }

    fn pipes(&self) -> Vec<Arc<Pipeline>> {
        self.state
            .read()
            .map(|s| s.pipes.clone())
            .unwrap_or_default()
    }

    /// Force flush all pipelines
    pub(crate) fn force_flush(&self) -> SdkResult {
        combine_results(self.pipes().iter().map(|p| p.force_flush()).collect())
    }

    /// Shut down all pipelines, in registration order. Instruments stop
    /// recording first.
    pub(crate) fn shutdown(&self) -> SdkResult {
        self.is_shutdown.store(true, Ordering::Release);
        combine_results(self.pipes().iter().map(|p| p.shutdown()).collect())
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::metrics::new_view;

    fn instrument(kind: InstrumentKind) -> Instrument {
        Instrument::new()
            .name("requests")
            .kind(kind)
            .scope(InstrumentationScope::builder("test").build())
    }

    fn view(aggregation: Aggregation) -> Arc<dyn View> {
        let mask = Stream {
            aggregation: Some(aggregation),
            ..Default::default()
        };
        Arc::from(new_view(Instrument::new().name("requests"), mask).unwrap())
    }

    fn histogram() -> Aggregation {
        Aggregation::ExplicitBucketHistogram {
            boundaries: vec![1.0],
            record_min_max: true,
        }
    }

    #[rstest]
    #[case(InstrumentKind::Counter, Aggregation::Sum, true)]
    #[case(InstrumentKind::Counter, Aggregation::LastValue, false)]
    #[case(InstrumentKind::UpDownCounter, histogram(), false)]
    #[case(InstrumentKind::ObservableUpDownCounter, histogram(), false)]
    #[case(InstrumentKind::Histogram, histogram(), true)]
    #[case(InstrumentKind::Gauge, Aggregation::Sum, false)]
    #[case(InstrumentKind::Gauge, Aggregation::LastValue, true)]
    #[case(InstrumentKind::ObservableGauge, histogram(), true)]
    #[case(InstrumentKind::ObservableCounter, Aggregation::Sum, true)]
    fn incompatible_aggregations_are_skipped(
        #[case] kind: InstrumentKind,
        #[case] aggregation: Aggregation,
        #[case] kept: bool,
    ) {
        let streams = resolve_streams::<f64>(&instrument(kind), kind, &[view(aggregation)], None);
        assert_eq!(streams.len(), usize::from(kept));
    }

    #[test]
    fn default_streams_per_kind() {
        let streams = resolve_streams::<u64>(
            &instrument(InstrumentKind::Histogram),
            InstrumentKind::Histogram,
            &[],
            Some(&[1.0, 2.0]),
        );
        assert_eq!(
            streams[0].aggregation,
            Aggregation::ExplicitBucketHistogram {
                boundaries: vec![1.0, 2.0],
                record_min_max: true
            }
        );

        let streams = resolve_streams::<u64>(
            &instrument(InstrumentKind::Histogram),
            InstrumentKind::Histogram,
            &[],
            None,
        );
        assert!(matches!(
            &streams[0].aggregation,
            Aggregation::ExplicitBucketHistogram { boundaries, .. } if boundaries[..] == DEFAULT_HISTOGRAM_BOUNDARIES[..]
        ));

        let streams = resolve_streams::<u64>(
            &instrument(InstrumentKind::ObservableGauge),
            InstrumentKind::ObservableGauge,
            &[],
            None,
        );
        assert_eq!(streams[0].aggregation, Aggregation::LastValue);
    }

    #[test]
    fn drop_and_duplicates() {
        let kind = InstrumentKind::Counter;
        let streams =
            resolve_streams::<u64>(&instrument(kind), kind, &[view(Aggregation::Drop)], None);
        assert!(streams.is_empty());

        let streams = resolve_streams::<u64>(
            &instrument(kind),
            kind,
            &[view(Aggregation::Sum), view(Aggregation::Default)],
            None,
        );
        assert_eq!(streams.len(), 1);
    }

    #[test]
    fn conflicting_filters_keep_both_streams() {
        let kind = InstrumentKind::Counter;
        let allow: Arc<dyn View> = Arc::new(|i: &Instrument| {
            (i.name == "requests").then(|| {
                Stream::builder()
                    .with_allowed_attribute_keys([Key::new("region")])
                    .build()
                    .unwrap()
            })
        });
        let streams = resolve_streams::<u64>(
            &instrument(kind),
            kind,
            &[view(Aggregation::Sum), allow],
            None,
        );
        assert_eq!(streams.len(), 2);
        assert_ne!(streams[0].id::<u64>(), streams[1].id::<u64>());
    }

    #[test]
    fn equal_streams_share_an_aggregator_within_a_pipeline() {
        let reader = crate::metrics::ManualReader::builder().build();
        let pipe = Pipeline::new(Resource::empty(), Box::new(reader));
        let scope = InstrumentationScope::builder("test").build();
        let kind = InstrumentKind::Counter;
        let streams = resolve_streams::<u64>(&instrument(kind), kind, &[], None);
        let diagnostics = Arc::new(MetricDiagnostics::default());

        let a = pipe
            .aggregate::<u64>(&scope, kind, &streams[0], &diagnostics)
            .unwrap();
        let b = pipe
            .aggregate::<u64>(&scope, kind, &streams[0], &diagnostics)
            .unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        // same stream for another number type is a different aggregator
        let c = pipe
            .aggregate::<f64>(&scope, kind, &streams[0], &diagnostics)
            .map(|_| ());
        assert!(c.is_ok());
        assert_eq!(pipe.inner.lock().unwrap().aggregations[0].1.len(), 2);
    }

    #[test]
    fn late_reader_sees_existing_instruments() {
        let pipes = Pipelines::new(Resource::empty());
        let kind = InstrumentKind::Counter;
        let measures = Arc::new(ResolvedMeasures::<u64>::new(
            kind,
            pipes.diagnostics(),
            pipes.shutdown_flag(),
        ));
        let streams = resolve_streams::<u64>(&instrument(kind), kind, &[], None);
        pipes.bind(
            InstrumentationScope::builder("test").build(),
            kind,
            streams,
            Arc::clone(&measures),
        );
        assert_eq!(measures.len(), 0);

        let reader = crate::metrics::ManualReader::builder().build();
        pipes.add_reader(Box::new(reader.clone()));
        assert_eq!(measures.len(), 1);

        let mut rm = ResourceMetrics::default();
        assert!(MetricReader::collect(&reader, &mut rm).is_ok());
    }
}
