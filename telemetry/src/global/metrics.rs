use crate::metrics::{self, Meter, MeterProvider};
use crate::{diag_error, diag_info, InstrumentationScope};
use std::sync::{Arc, OnceLock, RwLock};

type GlobalMeterProvider = Arc<dyn MeterProvider + Send + Sync>;

/// The global `MeterProvider` singleton.
static GLOBAL_METER_PROVIDER: OnceLock<RwLock<GlobalMeterProvider>> = OnceLock::new();

#[inline]
fn global_meter_provider() -> &'static RwLock<GlobalMeterProvider> {
    GLOBAL_METER_PROVIDER
        .get_or_init(|| RwLock::new(Arc::new(metrics::noop::NoopMeterProvider::new())))
}

/// Sets the given [`MeterProvider`] instance as the current global meter
/// provider.
///
/// Libraries should NOT call this function. It is intended for
/// applications/executables. The previous provider is not shut down.
///
/// **NOTE:** Call this before getting [`Meter`] instances via [`meter()`] or
/// [`meter_with_scope()`], otherwise those meters are no-ops.
pub fn set_meter_provider<P>(new_provider: P)
where
    P: MeterProvider + Send + Sync + 'static,
{
    match global_meter_provider().write() {
        Ok(mut provider) => {
            *provider = Arc::new(new_provider);
            diag_info!(name: "MeterProvider.GlobalSet");
        }
        Err(_) => {
            diag_error!(name: "MeterProvider.GlobalSetFailed");
        }
    }
}

/// Returns an instance of the currently configured global [`MeterProvider`].
pub fn meter_provider() -> GlobalMeterProvider {
    match global_meter_provider().read() {
        Ok(provider) => provider.clone(),
        Err(_) => {
            diag_error!(name: "MeterProvider.GlobalGetFailed");
            Arc::new(metrics::noop::NoopMeterProvider::new())
        }
    }
}

/// Creates a named [`Meter`] via the currently configured global [`MeterProvider`].
///
/// This is a more convenient way of expressing `global::meter_provider().meter(name)`.
///
/// **NOTE:** The returned meter stays bound to the provider that was
/// registered when it was created.
pub fn meter(name: &'static str) -> Meter {
    meter_provider().meter(name)
}

/// Creates a [`Meter`] with the given instrumentation scope.
///
/// # Example
///
/// ```
/// use telemetry::global::meter_with_scope;
/// use telemetry::{InstrumentationScope, KeyValue};
///
/// let scope = InstrumentationScope::builder("io.example")
///     .with_version("0.17")
///     .with_schema_url("https://example.com/schemas/1.2.0")
///     .with_attributes(vec![KeyValue::new("key", "value")])
///     .build();
///
/// let meter = meter_with_scope(scope);
/// ```
pub fn meter_with_scope(scope: InstrumentationScope) -> Meter {
    meter_provider().meter_with_scope(scope)
}
