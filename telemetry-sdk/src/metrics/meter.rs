use core::fmt;
use std::{
    any::{type_name, Any},
    borrow::Cow,
    collections::HashMap,
    sync::{Arc, Mutex},
};

use telemetry::{
    diag_debug, diag_warn,
    metrics::{
        noop::NoopSyncInstrument, AsyncInstrumentBuilder, Callback, Counter, Gauge, Histogram,
        HistogramBuilder, InstrumentBuilder, InstrumentProvider, ObservableCounter,
        ObservableGauge, ObservableUpDownCounter, SyncInstrument, UpDownCounter,
    },
    InstrumentationScope,
};

use crate::metrics::{
    aggregation::validate_bucket_boundaries,
    error::{MetricError, MetricResult},
    instrument::{Instrument, InstrumentKind, ResolvedMeasures},
    internal::Number,
    pipeline::{resolve_streams, Pipelines},
};

// maximum length of instrument name
const INSTRUMENT_NAME_MAX_LENGTH: usize = 255;
// maximum length of instrument unit name
const INSTRUMENT_UNIT_NAME_MAX_LENGTH: usize = 63;
const INSTRUMENT_NAME_ALLOWED_NON_ALPHANUMERIC_CHARS: [char; 4] = ['_', '.', '-', '/'];

// instrument validation error strings
pub(crate) const INSTRUMENT_NAME_EMPTY: &str = "instrument name must be non-empty";
pub(crate) const INSTRUMENT_NAME_LENGTH: &str = "instrument name must be less than 256 characters";
pub(crate) const INSTRUMENT_NAME_INVALID_CHAR: &str =
    "characters in instrument name must be ASCII and belong to the alphanumeric characters, '_', '.', '-' and '/'";
pub(crate) const INSTRUMENT_NAME_FIRST_ALPHABETIC: &str =
    "instrument name must start with an alphabetic character";
pub(crate) const INSTRUMENT_UNIT_LENGTH: &str = "instrument unit must be less than 64 characters";
pub(crate) const INSTRUMENT_UNIT_INVALID_CHAR: &str = "characters in instrument unit must be ASCII";

/// What makes two registrations of one name the same instrument. The
/// description takes no part in it.
#[derive(Clone, Debug, PartialEq)]
struct InstrumentId {
    kind: InstrumentKind,
    unit: Cow<'static, str>,
    number: &'static str,
}

struct RegisteredInstrument {
    id: InstrumentId,
    /// `Arc<ResolvedMeasures<T>>` for the number type in `id`.
    handle: Arc<dyn Any + Send + Sync>,
}

/// Handles the creation and coordination of all metric instruments.
///
/// A meter represents a single instrumentation scope; all metric telemetry
/// produced by an instrumentation scope will use metric instruments from a
/// single meter.
///
/// Instruments are registered by case-insensitive name. The first
/// registration of a name wins: later requests for it share its streams.
///
/// See the [Meter API] docs for usage.
///
/// [Meter API]: telemetry::metrics::Meter
pub(crate) struct SdkMeter {
    scope: InstrumentationScope,
    pipes: Arc<Pipelines>,
    instruments: Mutex<HashMap<String, RegisteredInstrument>>,
}

impl SdkMeter {
    pub(crate) fn new(scope: InstrumentationScope, pipes: Arc<Pipelines>) -> Self {
        SdkMeter {
            scope,
            pipes,
            instruments: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the measures of the instrument registered under `name`,
    /// registering it first if needed. `None` stands for a no-op instrument.
    fn instrument<T: Number>(
        &self,
        kind: InstrumentKind,
        name: Cow<'static, str>,
        description: Option<Cow<'static, str>>,
        unit: Option<Cow<'static, str>>,
        boundaries: Option<&[f64]>,
    ) -> Option<Arc<ResolvedMeasures<T>>> {
        if let Err(err) = validate_instrument_config(&name, &unit, boundaries) {
            diag_warn!(
                name: "Instrument.InvalidConfiguration",
                message = "measurements from this instrument will be ignored",
                instrument_name = name.to_string(),
                reason = err.to_string()
            );
            return None;
        }

        let unit = unit.unwrap_or_default();
        let id = InstrumentId {
            kind,
            unit: unit.clone(),
            number: type_name::<T>(),
        };

        let mut instruments = self.instruments.lock().ok()?;
        let key = name.to_lowercase();
        if let Some(existing) = instruments.get(&key) {
            if existing.id != id {
                diag_warn!(
                    name: "Instrument.ConflictingDefinition",
                    message = "instrument already registered with a different definition, keeping the first one",
                    instrument_name = name.to_string(),
                    existing = format!("{:?}", existing.id),
                    requested = format!("{:?}", id)
                );
            }
            return existing
                .handle
                .clone()
                .downcast::<ResolvedMeasures<T>>()
                .ok();
        }

        let inst = Instrument {
            name,
            description: description.unwrap_or_default(),
            kind: Some(kind),
            unit,
            scope: self.scope.clone(),
        };
        let streams = resolve_streams::<T>(&inst, kind, &self.pipes.views(), boundaries);
        if streams.is_empty() {
            diag_debug!(
                name: "Instrument.NoStreams",
                instrument_name = inst.name.to_string()
            );
        }

        let measures = Arc::new(ResolvedMeasures::new(
            kind,
            self.pipes.diagnostics(),
            self.pipes.shutdown_flag(),
        ));
        self.pipes
            .bind(self.scope.clone(), kind, streams, Arc::clone(&measures));

        instruments.insert(
            key,
            RegisteredInstrument {
                id,
                handle: measures.clone(),
            },
        );
        Some(measures)
    }

    fn sync_instrument<T: Number>(
        &self,
        kind: InstrumentKind,
        name: Cow<'static, str>,
        description: Option<Cow<'static, str>>,
        unit: Option<Cow<'static, str>>,
        boundaries: Option<&[f64]>,
    ) -> Arc<dyn SyncInstrument<T> + Send + Sync> {
        if let Some(measures) = self.instrument::<T>(kind, name, description, unit, boundaries) {
            return measures;
        }
        Arc::new(NoopSyncInstrument::new())
    }

    fn observable<T: Number>(
        &self,
        kind: InstrumentKind,
        name: Cow<'static, str>,
        description: Option<Cow<'static, str>>,
        unit: Option<Cow<'static, str>>,
        callbacks: Vec<Callback<T>>,
    ) {
        let Some(measures) = self.instrument::<T>(kind, name, description, unit, None) else {
            return;
        };
        for callback in callbacks {
            let inst = Arc::clone(&measures);
            self.pipes
                .register_callback(move || callback(inst.as_ref()));
        }
    }
}

#[doc(hidden)]
impl InstrumentProvider for SdkMeter {
    fn u64_counter(&self, builder: InstrumentBuilder<'_, Counter<u64>>) -> Counter<u64> {
        Counter::new(self.sync_instrument(
            InstrumentKind::Counter,
            builder.name,
            builder.description,
            builder.unit,
            None,
        ))
    }

    fn f64_counter(&self, builder: InstrumentBuilder<'_, Counter<f64>>) -> Counter<f64> {
        Counter::new(self.sync_instrument(
            InstrumentKind::Counter,
            builder.name,
            builder.description,
            builder.unit,
            None,
        ))
    }

    fn u64_observable_counter(
        &self,
        builder: AsyncInstrumentBuilder<'_, ObservableCounter<u64>, u64>,
    ) -> ObservableCounter<u64> {
        self.observable(
            InstrumentKind::ObservableCounter,
            builder.name,
            builder.description,
            builder.unit,
            builder.callbacks,
        );
        ObservableCounter::new()
    }

    fn f64_observable_counter(
        &self,
        builder: AsyncInstrumentBuilder<'_, ObservableCounter<f64>, f64>,
    ) -> ObservableCounter<f64> {
        self.observable(
            InstrumentKind::ObservableCounter,
            builder.name,
            builder.description,
            builder.unit,
            builder.callbacks,
        );
        ObservableCounter::new()
    }

    fn i64_up_down_counter(
        &self,
        builder: InstrumentBuilder<'_, UpDownCounter<i64>>,
    ) -> UpDownCounter<i64> {
        UpDownCounter::new(self.sync_instrument(
            InstrumentKind::UpDownCounter,
            builder.name,
            builder.description,
            builder.unit,
            None,
        ))
    }

    fn f64_up_down_counter(
        &self,
        builder: InstrumentBuilder<'_, UpDownCounter<f64>>,
    ) -> UpDownCounter<f64> {
        UpDownCounter::new(self.sync_instrument(
            InstrumentKind::UpDownCounter,
            builder.name,
            builder.description,
            builder.unit,
            None,
        ))
    }

    fn i64_observable_up_down_counter(
        &self,
        builder: AsyncInstrumentBuilder<'_, ObservableUpDownCounter<i64>, i64>,
    ) -> ObservableUpDownCounter<i64> {
        self.observable(
            InstrumentKind::ObservableUpDownCounter,
            builder.name,
            builder.description,
            builder.unit,
            builder.callbacks,
        );
        ObservableUpDownCounter::new()
    }

    fn f64_observable_up_down_counter(
        &self,
        builder: AsyncInstrumentBuilder<'_, ObservableUpDownCounter<f64>, f64>,
    ) -> ObservableUpDownCounter<f64> {
        self.observable(
            InstrumentKind::ObservableUpDownCounter,
            builder.name,
            builder.description,
            builder.unit,
            builder.callbacks,
        );
        ObservableUpDownCounter::new()
    }

    fn u64_gauge(&self, builder: InstrumentBuilder<'_, Gauge<u64>>) -> Gauge<u64> {
        Gauge::new(self.sync_instrument(
            InstrumentKind::Gauge,
            builder.name,
            builder.description,
            builder.unit,
            None,
        ))
    }

    fn f64_gauge(&self, builder: InstrumentBuilder<'_, Gauge<f64>>) -> Gauge<f64> {
        Gauge::new(self.sync_instrument(
            InstrumentKind::Gauge,
            builder.name,
            builder.description,
            builder.unit,
            None,
        ))
    }

    fn i64_gauge(&self, builder: InstrumentBuilder<'_, Gauge<i64>>) -> Gauge<i64> {
        Gauge::new(self.sync_instrument(
            InstrumentKind::Gauge,
            builder.name,
            builder.description,
            builder.unit,
            None,
        ))
    }

    fn u64_observable_gauge(
        &self,
        builder: AsyncInstrumentBuilder<'_, ObservableGauge<u64>, u64>,
    ) -> ObservableGauge<u64> {
        self.observable(
            InstrumentKind::ObservableGauge,
            builder.name,
            builder.description,
            builder.unit,
            builder.callbacks,
        );
        ObservableGauge::new()
    }

    fn i64_observable_gauge(
        &self,
        builder: AsyncInstrumentBuilder<'_, ObservableGauge<i64>, i64>,
    ) -> ObservableGauge<i64> {
        self.observable(
            InstrumentKind::ObservableGauge,
            builder.name,
            builder.description,
            builder.unit,
            builder.callbacks,
        );
        ObservableGauge::new()
    }

    fn f64_observable_gauge(
        &self,
        builder: AsyncInstrumentBuilder<'_, ObservableGauge<f64>, f64>,
    ) -> ObservableGauge<f64> {
        self.observable(
            InstrumentKind::ObservableGauge,
            builder.name,
            builder.description,
            builder.unit,
            builder.callbacks,
        );
        ObservableGauge::new()
    }

    fn f64_histogram(&self, builder: HistogramBuilder<'_, Histogram<f64>>) -> Histogram<f64> {
        Histogram::new(self.sync_instrument(
            InstrumentKind::Histogram,
            builder.name,
            builder.description,
            builder.unit,
            builder.boundaries.as_deref(),
        ))
    }

    fn u64_histogram(&self, builder: HistogramBuilder<'_, Histogram<u64>>) -> Histogram<u64> {
        Histogram::new(self.sync_instrument(
            InstrumentKind::Histogram,
            builder.name,
            builder.description,
            builder.unit,
            builder.boundaries.as_deref(),
        ))
    }
}

fn validate_instrument_config(
    name: &str,
    unit: &Option<Cow<'static, str>>,
    boundaries: Option<&[f64]>,
) -> MetricResult<()> {
    validate_instrument_name(name)?;
    validate_instrument_unit(unit)?;
    if let Some(boundaries) = boundaries {
        validate_bucket_boundaries(boundaries)?;
    }
    Ok(())
}

pub(crate) fn validate_instrument_name(name: &str) -> MetricResult<()> {
    if name.is_empty() {
        return Err(MetricError::InvalidInstrumentConfiguration(
            INSTRUMENT_NAME_EMPTY,
        ));
    }
    if name.len() > INSTRUMENT_NAME_MAX_LENGTH {
        return Err(MetricError::InvalidInstrumentConfiguration(
            INSTRUMENT_NAME_LENGTH,
        ));
    }
    if name.starts_with(|c: char| !c.is_ascii_alphabetic()) {
        return Err(MetricError::InvalidInstrumentConfiguration(
            INSTRUMENT_NAME_FIRST_ALPHABETIC,
        ));
    }
    if name.contains(|c: char| {
        !c.is_ascii_alphanumeric() && !INSTRUMENT_NAME_ALLOWED_NON_ALPHANUMERIC_CHARS.contains(&c)
    }) {
        return Err(MetricError::InvalidInstrumentConfiguration(
            INSTRUMENT_NAME_INVALID_CHAR,
        ));
    }
    Ok(())
}

pub(crate) fn validate_instrument_unit(unit: &Option<Cow<'static, str>>) -> MetricResult<()> {
    if let Some(unit) = unit {
        if unit.len() > INSTRUMENT_UNIT_NAME_MAX_LENGTH {
            return Err(MetricError::InvalidInstrumentConfiguration(
                INSTRUMENT_UNIT_LENGTH,
            ));
        }
        if unit.contains(|c: char| !c.is_ascii()) {
            return Err(MetricError::InvalidInstrumentConfiguration(
                INSTRUMENT_UNIT_INVALID_CHAR,
            ));
        }
    }
    Ok(())
}

impl fmt::Debug for SdkMeter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Meter").field("scope", &self.scope).finish()
    }
}
