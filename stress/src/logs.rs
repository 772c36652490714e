/*
    Emits log records through a `BatchLogProcessor` whose exporter discards
    them. Producers never block: once the queue is full the records are
    dropped and counted.
*/

use lazy_static::lazy_static;
use telemetry::logs::{LogRecord, Logger, LoggerProvider as _, Severity};
use telemetry_sdk::error::SdkResult;
use telemetry_sdk::logs::{LogBatch, LogExporter, SdkLogger, SdkLoggerProvider};

mod throughput;

#[derive(Debug)]
struct NoopExporter;

impl LogExporter for NoopExporter {
    async fn export(&self, _batch: LogBatch<'_>) -> SdkResult {
        Ok(())
    }
}

lazy_static! {
    static ref PROVIDER: SdkLoggerProvider = SdkLoggerProvider::builder()
        .with_batch_exporter(NoopExporter)
        .build();
    static ref LOGGER: SdkLogger = PROVIDER.logger("stress");
}

fn main() {
    throughput::test_throughput(test_log);
}

fn test_log() {
    let mut record = LOGGER.create_log_record();
    record.set_event_name("checkout.failed");
    record.set_severity_number(Severity::Error);
    record.set_severity_text("ERROR");
    record.add_attribute("book_id", "12345");
    record.add_attribute("book_title", "Rust Programming Adventures");
    record.set_body("Unable to process checkout.".into());
    LOGGER.emit(record);
}
