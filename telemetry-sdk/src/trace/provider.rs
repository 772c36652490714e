//! # Trace Provider SDK
//!
//! The `SdkTracerProvider` handles the creation and management of [`SdkTracer`]
//! instances and coordinates span processing. Tracers are cached per
//! instrumentation scope, and processors can be added after the provider is
//! built.
//!
//! ## Lifecycle
//!
//! - **Creation**: Use [`SdkTracerProvider::builder()`] to configure
//!   processors and the resource.
//! - **Usage**: Obtain tracers with
//!   [`TracerProvider::tracer`](telemetry::trace::TracerProvider::tracer).
//! - **Shutdown**: Call [`SdkTracerProvider::shutdown()`], or drop the last
//!   clone, to flush and stop every processor.
use crate::error::{combine_results, SdkResult};
use crate::scope_cache::ScopeCache;
use crate::trace::{
    BatchSpanProcessor, IdGenerator, RandomIdGenerator, SdkTracer, SimpleSpanProcessor, Span,
    SpanData, SpanExporter, SpanProcessor,
};
use crate::Resource;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use telemetry::{diag_debug, diag_error, diag_info, diag_warn, InstrumentationScope};

/// State shared by a provider and every tracer it issued.
#[derive(Debug)]
pub(crate) struct TracerProviderState {
    processors: RwLock<Vec<Box<dyn SpanProcessor>>>,
    resource: Resource,
    id_generator: Box<dyn IdGenerator>,
    is_shutdown: AtomicBool,
}

impl TracerProviderState {
    pub(crate) fn is_shutdown(&self) -> bool {
        self.is_shutdown.load(Ordering::Relaxed)
    }

    pub(crate) fn id_generator(&self) -> &dyn IdGenerator {
        self.id_generator.as_ref()
    }

    pub(crate) fn on_start(&self, span: &mut Span) {
        if let Ok(processors) = self.processors.read() {
            for processor in processors.iter() {
                processor.on_start(span);
            }
        }
    }

    /// Hands a finished span to every processor, in registration order.
    pub(crate) fn on_end(&self, span: SpanData) {
        if self.is_shutdown() {
            return;
        }
        let Ok(processors) = self.processors.read() else {
            return;
        };
        if let Some((last, rest)) = processors.split_last() {
            for processor in rest {
                processor.on_end(span.clone());
            }
            last.on_end(span);
        }
    }

    fn add_processor(&self, mut processor: Box<dyn SpanProcessor>) {
        if self.is_shutdown() {
            diag_warn!(
                name: "TracerProvider.AddProcessorAfterShutdown",
                message = "span processor is ignored, the provider is shut down"
            );
            return;
        }
        processor.set_resource(&self.resource);
        match self.processors.write() {
            Ok(mut processors) => processors.push(processor),
            Err(_) => diag_error!(name: "TracerProvider.AddProcessorFailed"),
        }
    }

    fn force_flush(&self) -> SdkResult {
        if self.is_shutdown() {
            return Ok(());
        }
        let processors = self.processors.read()?;
        combine_results(processors.iter().map(|p| p.force_flush()).collect())
    }

    /// Shuts every processor down once. Later calls return `Ok(())`.
    fn shutdown(&self) -> SdkResult {
        if self
            .is_shutdown
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            diag_debug!(name: "TracerProvider.AlreadyShutdown");
            return Ok(());
        }
        let processors = self.processors.read()?;
        let mut results = Vec::with_capacity(processors.len());
        for processor in processors.iter() {
            let result = processor.shutdown();
            if let Err(err) = &result {
                diag_debug!(
                    name: "TracerProvider.ShutdownError",
                    error = err.to_string()
                );
            }
            results.push(result);
        }
        combine_results(results)
    }
}

#[derive(Debug)]
struct TracerProviderInner {
    state: Arc<TracerProviderState>,
    tracers: ScopeCache<SdkTracer>,
}

impl Drop for TracerProviderInner {
    fn drop(&mut self) {
        if self.state.is_shutdown() {
            diag_debug!(
                name: "TracerProvider.Drop.AlreadyShutdown",
                message = "TracerProvider was already shut down; drop will not attempt shutdown again."
            );
        } else if let Err(err) = self.state.shutdown() {
            diag_error!(
                name: "TracerProvider.Drop.ShutdownFailed",
                reason = err.to_string()
            );
        }
    }
}

/// Creator and registry of named [`SdkTracer`] instances.
///
/// `SdkTracerProvider` is a container holding pointers to `SpanProcessor` and other components.
/// Cloning a `SdkTracerProvider` instance and dropping it will not stop span processing. To stop span processing, users
/// must either call the `shutdown` method explicitly or allow the last reference to the `SdkTracerProvider`
/// to be dropped. When the last reference is dropped, the shutdown process will be automatically triggered
/// to ensure proper cleanup.
///
/// # Examples
///
/// ```
/// use telemetry::global;
/// use telemetry::trace::{Tracer, TracerProvider};
/// use telemetry_sdk::trace::SdkTracerProvider;
/// # use telemetry_sdk::error::SdkResult;
/// # use telemetry_sdk::trace::{SpanData, SpanExporter};
/// # #[derive(Debug, Default)]
/// # struct ConsoleExporter;
/// # impl SpanExporter for ConsoleExporter {
/// #     async fn export(&self, batch: Vec<SpanData>) -> SdkResult {
/// #         println!("exporting {} spans", batch.len());
/// #         Ok(())
/// #     }
/// # }

/// let provider = SdkTracerProvider::builder()
///     .with_simple_exporter(ConsoleExporter::default())
///     .build();
/// global::set_tracer_provider(provider.clone());
///
/// let tracer = provider.tracer("my_app");
/// drop(tracer.start("work"));
///
/// provider.shutdown().unwrap();
/// ```
#[derive(Clone, Debug)]
pub struct SdkTracerProvider {
    inner: Arc<TracerProviderInner>,
}

impl Default for SdkTracerProvider {
    fn default() -> Self {
        SdkTracerProvider::builder().build()
    }
}

impl SdkTracerProvider {
    /// Create a new [`SdkTracerProvider`] builder.
    pub fn builder() -> TracerProviderBuilder {
        TracerProviderBuilder::default()
    }

    /// Appends `processor`. Spans ending from now on reach it.
    ///
    /// Ignored with a warning once the provider is shut down.
    pub fn add_processor<T: SpanProcessor + 'static>(&self, processor: T) {
        self.inner.state.add_processor(Box::new(processor));
    }

    /// Appends a [`SimpleSpanProcessor`] exporting through `exporter`.
    pub fn add_simple_exporter<T: SpanExporter + 'static>(&self, exporter: T) {
        self.add_processor(SimpleSpanProcessor::new(exporter));
    }

    /// Appends a [`BatchSpanProcessor`] configured from the environment.
    pub fn add_batch_exporter<T: SpanExporter + 'static>(&self, exporter: T) {
        self.add_processor(BatchSpanProcessor::builder(exporter).build());
    }

    /// The resource attached to every exported span.
    pub fn resource(&self) -> &Resource {
        &self.inner.state.resource
    }

    /// Force flush all remaining spans in span processors and return results.
    ///
    /// Returns `Ok(())` once the provider is shut down.
    pub fn force_flush(&self) -> SdkResult {
        self.inner.state.force_flush()
    }

    /// Shuts down the current `SdkTracerProvider`, shutting its processors
    /// down in registration order.
    ///
    /// Later calls return `Ok(())` without doing anything. Tracers keep
    /// working but their spans no longer record.
    pub fn shutdown(&self) -> SdkResult {
        diag_info!(
            name: "TracerProvider.Shutdown",
            message = "User initiated shutdown of TracerProvider."
        );
        self.inner.state.shutdown()
    }
}

impl telemetry::trace::TracerProvider for SdkTracerProvider {
    /// This implementation of `TracerProvider` produces `Tracer` instances.
    type Tracer = SdkTracer;

    fn tracer_with_scope(&self, scope: InstrumentationScope) -> Self::Tracer {
        if scope.name().is_empty() {
            diag_info!(name: "TracerNameEmpty",  message = "Tracer name is empty; consider providing a meaningful name. Tracer will function normally and the provided name will be used as-is.");
        };
        let state = &self.inner.state;
        self.inner
            .tracers
            .get_or_insert_with(scope, |scope| SdkTracer::new(scope.clone(), Arc::clone(state)))
    }
}

/// Builder for provider attributes.
#[derive(Debug, Default)]
pub struct TracerProviderBuilder {
    processors: Vec<Box<dyn SpanProcessor>>,
    resource: Option<Resource>,
    id_generator: Option<Box<dyn IdGenerator>>,
}

impl TracerProviderBuilder {
    /// Adds a [SimpleSpanProcessor] with the configured exporter to the pipeline.
    ///
    /// The simple processor exports each span on the thread that ends it,
    /// which is mostly useful for tests and debugging.
    pub fn with_simple_exporter<T: SpanExporter + 'static>(self, exporter: T) -> Self {
        self.with_span_processor(SimpleSpanProcessor::new(exporter))
    }

    /// Adds a [BatchSpanProcessor] with the configured exporter to the pipeline.
    ///
    /// The batch settings come from the `OTEL_BSP_*` environment variables,
    /// build a [BatchSpanProcessor] yourself to configure them in code.
    pub fn with_batch_exporter<T: SpanExporter + 'static>(self, exporter: T) -> Self {
        self.with_span_processor(BatchSpanProcessor::builder(exporter).build())
    }

    /// Adds a custom [SpanProcessor] to the pipeline.
    ///
    /// Processors are invoked in the order they are added.
    pub fn with_span_processor<T: SpanProcessor + 'static>(mut self, processor: T) -> Self {
        self.processors.push(Box::new(processor));
        self
    }

    /// Specify the id generator to be used.
    pub fn with_id_generator<T: IdGenerator + 'static>(mut self, id_generator: T) -> Self {
        self.id_generator = Some(Box::new(id_generator));
        self
    }

    /// Associates a [Resource] with a [SdkTracerProvider].
    ///
    /// By default, if this option is not used, the default [Resource] will be used.
    pub fn with_resource(mut self, resource: Resource) -> Self {
        self.resource = Some(resource);
        self
    }

    /// Create a new provider from this configuration.
    pub fn build(self) -> SdkTracerProvider {
        let resource = self.resource.unwrap_or_default();
        let id_generator: Box<dyn IdGenerator> = match self.id_generator {
            Some(id_generator) => id_generator,
            None => Box::new(RandomIdGenerator::default()),
        };
        let mut processors = self.processors;
        for p in &mut processors {
            p.set_resource(&resource);
        }

        SdkTracerProvider {
            inner: Arc::new(TracerProviderInner {
                state: Arc::new(TracerProviderState {
                    processors: RwLock::new(processors),
                    resource,
                    id_generator,
                    is_shutdown: AtomicBool::new(false),
                }),
                tracers: ScopeCache::new(),
            }),
        }
    }
}
