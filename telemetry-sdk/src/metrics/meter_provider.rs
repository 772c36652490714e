use core::fmt;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use telemetry::{
    diag_debug, diag_error, diag_info, diag_warn,
    metrics::{noop::NoopMeter, Meter, MeterProvider},
    InstrumentationScope,
};

use crate::{error::SdkResult, scope_cache::ScopeCache, Resource};

use super::{
    diagnostics::MetricDiagnostics, exporter::PushMetricExporter, meter::SdkMeter,
    pipeline::Pipelines, reader::MetricReader, view::View, PeriodicReader,
};

/// Handles the creation and coordination of [Meter]s.
///
/// All `Meter`s created by a `MeterProvider` will be associated with the same
/// [Resource], have the same [View]s applied to them, and have their produced
/// metric telemetry passed to the configured [MetricReader]s. This is a
/// clonable handle to the MeterProvider implementation itself, and cloning it
/// will create a new reference, not a new instance of a MeterProvider. Dropping
/// the last reference to it will trigger shutdown of the provider. Shutdown can
/// also be triggered manually by calling the `shutdown` method.
///
/// Readers and views may also be added after the provider is built.
///
/// [Meter]: telemetry::metrics::Meter
#[derive(Clone, Debug)]
pub struct SdkMeterProvider {
    inner: Arc<SdkMeterProviderInner>,
}

#[derive(Debug)]
struct SdkMeterProviderInner {
    pipes: Arc<Pipelines>,
    meters: ScopeCache<Arc<SdkMeter>>,
    shutdown_invoked: AtomicBool,
}

impl Default for SdkMeterProvider {
    fn default() -> Self {
        SdkMeterProvider::builder().build()
    }
}

impl SdkMeterProvider {
    /// Return default [MeterProviderBuilder]
    pub fn builder() -> MeterProviderBuilder {
        MeterProviderBuilder::default()
    }

    /// Attaches `reader` to the provider. Instruments that already exist are
    /// bound to it, so its first collection includes them.
    ///
    /// Ignored with a warning once the provider is shut down.
    pub fn add_reader<T: MetricReader>(&self, reader: T) {
        if self.inner.shutdown_invoked.load(Ordering::Relaxed) {
            diag_warn!(
                name: "MeterProvider.AddReaderAfterShutdown",
                message = "reader is ignored, the provider is shut down"
            );
            return;
        }
        self.inner.pipes.add_reader(Box::new(reader));
    }

    /// Exports through `exporter` with a [PeriodicReader] configured from the
    /// environment.
    pub fn add_periodic_exporter<T: PushMetricExporter>(&self, exporter: T) {
        self.add_reader(PeriodicReader::builder(exporter).build());
    }

    /// Adds a [View]. It applies to instruments created from now on.
    pub fn add_view<T: View>(&self, view: T) {
        self.inner.pipes.add_view(Arc::new(view));
    }

    /// Counters of measurements and attributes the SDK dropped or coerced.
    pub fn diagnostics(&self) -> Arc<MetricDiagnostics> {
        self.inner.pipes.diagnostics()
    }

    /// Flushes all pending telemetry.
    ///
    /// There is no guaranteed that all telemetry be flushed or all resources have
    /// been released on error. Returns `Ok(())` once the provider is shut down.
    ///
    /// # Examples
    ///
    /// ```
    /// use telemetry::global;
    /// use telemetry_sdk::metrics::SdkMeterProvider;
    ///
    /// fn init_metrics() -> SdkMeterProvider {
    ///     // Setup metric pipelines with readers + views, default has no
    ///     // readers so nothing is exported.
    ///     let provider = SdkMeterProvider::default();
    ///
    ///     // Set provider to be used as global meter provider
    ///     let _ = global::set_meter_provider(provider.clone());
    ///
    ///     provider
    /// }
    ///
    /// fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     let provider = init_metrics();
    ///
    ///     // create instruments + record measurements
    ///
    ///     // force all instruments to flush
    ///     provider.force_flush()?;
    ///
    ///     // record more measurements..
    ///
    ///     // shutdown ensures any cleanup required by the provider is done,
    ///     // and also invokes shutdown on the readers.
    ///     provider.shutdown()?;
    ///
    ///     Ok(())
    /// }
    /// ```
    pub fn force_flush(&self) -> SdkResult {
        self.inner.force_flush()
    }

    /// Shuts down the meter provider flushing all pending telemetry and releasing
    /// any held computational resources.
    ///
    /// The first call shuts the readers down in the order they were added.
    /// Subsequent calls do nothing and return `Ok(())`.
    ///
    /// Measurements made by instruments from meters this MeterProvider created will
    /// not be exported after Shutdown is called.
    ///
    /// There is no guaranteed that all telemetry be flushed or all resources have
    /// been released on error.
    pub fn shutdown(&self) -> SdkResult {
        diag_info!(
            name: "MeterProvider.Shutdown",
            message = "User initiated shutdown of MeterProvider."
        );
        self.inner.shutdown()
    }
}

impl SdkMeterProviderInner {
    fn force_flush(&self) -> SdkResult {
        if self.shutdown_invoked.load(Ordering::Relaxed) {
            return Ok(());
        }
        self.pipes.force_flush()
    }

    fn shutdown(&self) -> SdkResult {
        if self.shutdown_invoked.swap(true, Ordering::SeqCst) {
            // If the previous value was true, shutdown was already invoked.
            diag_debug!(name: "MeterProvider.AlreadyShutdown");
            return Ok(());
        }
        self.pipes.shutdown()
    }
}

impl Drop for SdkMeterProviderInner {
    fn drop(&mut self) {
        // If user has already shutdown the provider manually by calling
        // shutdown(), then we don't need to call shutdown again.
        if self.shutdown_invoked.load(Ordering::Relaxed) {
            diag_debug!(
                name: "MeterProvider.Drop.AlreadyShutdown",
                message = "MeterProvider was already shut down; drop will not attempt shutdown again."
            );
        } else {
            diag_info!(
                name: "MeterProvider.Drop",
                message = "Last reference of MeterProvider dropped, initiating shutdown."
            );
            if let Err(err) = self.shutdown() {
                diag_error!(
                    name: "MeterProvider.Drop.ShutdownFailed",
                    message = "Shutdown attempt failed during drop of MeterProvider.",
                    reason = err.to_string()
                );
            } else {
                diag_info!(name: "MeterProvider.Drop.ShutdownCompleted");
            }
        }
    }
}

impl MeterProvider for SdkMeterProvider {
    fn meter_with_scope(&self, scope: InstrumentationScope) -> Meter {
        if self.inner.shutdown_invoked.load(Ordering::Relaxed) {
            diag_debug!(
                name: "MeterProvider.NoOpMeterReturned",
                meter_name = scope.name()
            );
            return Meter::new(Arc::new(NoopMeter::new()));
        }

        if scope.name().is_empty() {
            diag_info!(
                name: "MeterNameEmpty",
                message = "Meter name is empty; consider providing a meaningful name. Meter will function normally and the provided name will be used as-is."
            );
        };

        let pipes = &self.inner.pipes;
        let meter = self.inner.meters.get_or_insert_with(scope, |scope| {
            diag_debug!(
                name: "MeterProvider.NewMeterCreated",
                meter_name = scope.name()
            );
            Arc::new(SdkMeter::new(scope.clone(), Arc::clone(pipes)))
        });
        Meter::new(meter)
    }
}

/// Configuration options for a [MeterProvider].
#[derive(Default)]
pub struct MeterProviderBuilder {
    resource: Option<Resource>,
    readers: Vec<Box<dyn MetricReader>>,
    views: Vec<Arc<dyn View>>,
}

impl MeterProviderBuilder {
    /// Associates a [Resource] with a [MeterProvider].
    ///
    /// This [Resource] represents the entity producing telemetry and is associated
    /// with all [Meter]s the [MeterProvider] will create.
    ///
    /// By default, if this option is not used, the default [Resource] will be used.
    ///
    /// [Meter]: telemetry::metrics::Meter
    pub fn with_resource(mut self, resource: Resource) -> Self {
        self.resource = Some(resource);
        self
    }

    /// Associates a [MetricReader] with a [MeterProvider].
    /// [`MeterProviderBuilder::with_periodic_exporter()`] can be used to add a PeriodicReader which is
    /// the most common use case.
    ///
    /// A [MeterProvider] will export no metrics without [MetricReader]
    /// added.
    pub fn with_reader<T: MetricReader>(mut self, reader: T) -> Self {
        self.readers.push(Box::new(reader));
        self
    }

    /// Adds a [`PushMetricExporter`] to the [`MeterProvider`] and configures it
    /// to export metrics at **fixed** intervals (60 seconds) using a
    /// [`PeriodicReader`].
    ///
    /// To customize the export interval, set the
    /// **"OTEL_METRIC_EXPORT_INTERVAL"** environment variable (in
    /// milliseconds).
    ///
    /// Most users should use this method to attach an exporter. Advanced users
    /// who need finer control over the export process can use
    /// [`crate::metrics::PeriodicReaderBuilder`] to configure a custom reader and attach it
    /// using [`MeterProviderBuilder::with_reader()`].
    pub fn with_periodic_exporter<T>(self, exporter: T) -> Self
    where
        T: PushMetricExporter,
    {
        self.with_reader(PeriodicReader::builder(exporter).build())
    }

    /// Associates a [View] with a [MeterProvider].
    ///
    /// [View]s are appended to existing ones in a [MeterProvider] if this option is
    /// used multiple times, and are evaluated in that order.
    ///
    /// By default, if this option is not used, the [MeterProvider] will use the
    /// default view.
    pub fn with_view<T: View>(mut self, view: T) -> Self {
        self.views.push(Arc::new(view));
        self
    }

    /// Construct a new [MeterProvider] with this configuration.
    pub fn build(self) -> SdkMeterProvider {
        diag_debug!(
            name: "MeterProvider.Building",
            builder = format!("{:?}", &self)
        );

        let pipes = Pipelines::new(self.resource.unwrap_or_else(|| Resource::builder().build()));
        for view in self.views {
            pipes.add_view(view);
        }
        for reader in self.readers {
            pipes.add_reader(reader);
        }

        let meter_provider = SdkMeterProvider {
            inner: Arc::new(SdkMeterProviderInner {
                pipes: Arc::new(pipes),
                meters: ScopeCache::new(),
                shutdown_invoked: AtomicBool::new(false),
            }),
        };

        diag_info!(name: "MeterProvider.Built");
        meter_provider
    }
}

impl fmt::Debug for MeterProviderBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MeterProviderBuilder")
            .field("resource", &self.resource)
            .field("readers", &self.readers)
            .field("views", &self.views.len())
            .finish()
    }
}
