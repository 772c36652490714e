//! Batch and simple processors for spans and logs, driven through the public
//! API with exporters defined here.
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant, SystemTime};

use telemetry::logs::{LogRecord, Logger, LoggerProvider};
use telemetry::trace::{Span as _, SpanContext, SpanId, SpanKind, Status, TraceId, Tracer, TracerProvider};
use telemetry::{InstrumentationScope, KeyValue};
use telemetry_sdk::error::{SdkError, SdkResult};
use telemetry_sdk::logs::{self, LogBatch, LogExporter, LogProcessor, SdkLogRecord, SdkLoggerProvider};
use telemetry_sdk::trace::{
    self, BatchSpanProcessor, SdkTracerProvider, SpanData, SpanExporter, SpanProcessor,
};

/// Blocks exports until opened.
#[derive(Debug, Default)]
struct Gate {
    open: Mutex<bool>,
    cond: Condvar,
}

impl Gate {
    fn wait(&self) {
        let mut open = self.open.lock().unwrap();
        while !*open {
            open = self.cond.wait(open).unwrap();
        }
    }

    fn open(&self) {
        *self.open.lock().unwrap() = true;
        self.cond.notify_all();
    }
}

#[derive(Debug, Clone)]
struct GatedSpanExporter {
    gate: Arc<Gate>,
    entered: mpsc::Sender<()>,
    names: Arc<Mutex<Vec<String>>>,
    shutdowns: Arc<AtomicUsize>,
}

impl GatedSpanExporter {
    fn new() -> (Self, mpsc::Receiver<()>) {
        let (entered, entered_rx) = mpsc::channel();
        (
            GatedSpanExporter {
                gate: Arc::new(Gate::default()),
                entered,
                names: Arc::default(),
                shutdowns: Arc::default(),
            },
            entered_rx,
        )
    }
}

impl SpanExporter for GatedSpanExporter {
    async fn export(&self, batch: Vec<SpanData>) -> SdkResult {
        let _ = self.entered.send(());
        self.gate.wait();
        self.names
            .lock()?
            .extend(batch.into_iter().map(|span| span.name.into_owned()));
        Ok(())
    }

    fn shutdown_with_timeout(&mut self, _timeout: Duration) -> SdkResult {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn span_data(name: &str) -> SpanData {
    SpanData {
        span_context: SpanContext::new(TraceId::from(1), SpanId::from(1), false),
        parent_span_id: SpanId::INVALID,
        span_kind: SpanKind::Internal,
        name: name.to_string().into(),
        start_time: SystemTime::now(),
        end_time: SystemTime::now(),
        attributes: Vec::new(),
        events: Vec::new(),
        status: Status::Unset,
        instrumentation_scope: InstrumentationScope::builder("processors").build(),
    }
}

#[test]
fn full_span_queue_drops_without_blocking() {
    let (exporter, entered) = GatedSpanExporter::new();
    let processor = BatchSpanProcessor::builder(exporter.clone())
        .with_batch_config(
            trace::BatchConfigBuilder::default()
                .with_max_queue_size(4)
                .with_max_export_batch_size(1)
                .with_scheduled_delay(Duration::from_secs(3600))
                .build(),
        )
        .build();

    // the worker takes the first span and blocks inside the exporter
    processor.on_end(span_data("first"));
    entered
        .recv_timeout(Duration::from_secs(5))
        .expect("worker reached the exporter");

    let started = Instant::now();
    for i in 0..7 {
        processor.on_end(span_data(&format!("queued-{i}")));
    }
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(processor.dropped_count(), 3);

    exporter.gate.open();
    processor.shutdown().unwrap();
    let names = exporter.names.lock().unwrap().clone();
    assert_eq!(
        names,
        vec!["first", "queued-0", "queued-1", "queued-2", "queued-3"]
    );
}

#[test]
fn zero_timeout_span_flush_reports_timeout_and_keeps_spans() {
    let (exporter, _entered) = GatedSpanExporter::new();
    let processor = BatchSpanProcessor::builder(exporter.clone())
        .with_batch_config(
            trace::BatchConfigBuilder::default()
                .with_scheduled_delay(Duration::from_secs(3600))
                .build(),
        )
        .build();
    for i in 0..3 {
        processor.on_end(span_data(&format!("span-{i}")));
    }

    assert!(matches!(
        processor.force_flush_with_timeout(Duration::ZERO),
        Err(SdkError::Timeout(_))
    ));

    exporter.gate.open();
    processor.shutdown().unwrap();
    assert_eq!(exporter.names.lock().unwrap().len(), 3);
}

#[test]
fn tracer_provider_shutdown_twice_reaches_exporter_once() {
    let (exporter, _entered) = GatedSpanExporter::new();
    exporter.gate.open();
    let provider = SdkTracerProvider::builder()
        .with_batch_exporter(exporter.clone())
        .build();

    let tracer = provider.tracer("processors");
    let mut span = tracer.start("request");
    span.set_attribute(KeyValue::new("http.route", "/"));
    span.end();

    assert!(provider.shutdown().is_ok());
    assert!(provider.shutdown().is_ok());
    assert_eq!(exporter.shutdowns.load(Ordering::SeqCst), 1);
    assert_eq!(*exporter.names.lock().unwrap(), vec!["request"]);

    // nothing reaches the exporter after shutdown
    tracer.start("late").end();
    drop(provider);
    assert_eq!(exporter.names.lock().unwrap().len(), 1);
    assert_eq!(exporter.shutdowns.load(Ordering::SeqCst), 1);
}

#[derive(Debug, Clone, Default)]
struct CollectingLogExporter {
    bodies: Arc<Mutex<Vec<String>>>,
    batches: Arc<AtomicUsize>,
    shutdowns: Arc<AtomicUsize>,
}

impl LogExporter for CollectingLogExporter {
    async fn export(&self, batch: LogBatch<'_>) -> SdkResult {
        self.batches.fetch_add(1, Ordering::SeqCst);
        let mut bodies = self.bodies.lock()?;
        for (record, _scope) in batch.iter() {
            bodies.push(format!("{:?}", record.body()));
        }
        Ok(())
    }

    fn shutdown_with_timeout(&mut self, _timeout: Duration) -> SdkResult {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[test]
fn batch_log_processor_exports_in_order_and_in_batches() {
    let exporter = CollectingLogExporter::default();
    let provider = SdkLoggerProvider::builder()
        .with_log_processor(
            logs::BatchLogProcessor::builder(exporter.clone())
                .with_batch_config(
                    logs::BatchConfigBuilder::default()
                        .with_max_export_batch_size(4)
                        .with_scheduled_delay(Duration::from_secs(3600))
                        .build(),
                )
                .build(),
        )
        .build();
    let logger = provider.logger("processors");
    for i in 0..10 {
        let mut record = logger.create_log_record();
        record.set_body(format!("line {i}").into());
        logger.emit(record);
    }

    provider.force_flush().unwrap();
    let bodies = exporter.bodies.lock().unwrap().clone();
    assert_eq!(bodies.len(), 10);
    assert!(bodies[0].contains("line 0"));
    assert!(bodies[9].contains("line 9"));
    assert!(exporter.batches.load(Ordering::SeqCst) >= 3);

    assert!(provider.shutdown().is_ok());
    assert!(provider.shutdown().is_ok());
    assert_eq!(exporter.shutdowns.load(Ordering::SeqCst), 1);
}

#[test]
fn simple_log_processor_exports_on_emit() {
    let exporter = CollectingLogExporter::default();
    let processor = logs::SimpleLogProcessor::new(exporter.clone());
    let scope = InstrumentationScope::builder("processors").build();

    let mut record = SdkLogRecord::default();
    record.set_body("inline".into());
    processor.emit(&mut record, &scope);
    assert_eq!(exporter.batches.load(Ordering::SeqCst), 1);

    processor.shutdown().unwrap();
    processor.emit(&mut record, &scope);
    assert_eq!(exporter.batches.load(Ordering::SeqCst), 1);
    assert!(processor.shutdown().is_ok());
    assert_eq!(exporter.shutdowns.load(Ordering::SeqCst), 1);
}
