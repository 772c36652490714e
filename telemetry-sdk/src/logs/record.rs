#[cfg(feature = "trace")]
use telemetry::trace::{SpanContext, SpanId, TraceId};
use telemetry::{
    logs::{AnyValue, Severity},
    Key,
};
use std::{borrow::Cow, time::SystemTime};

/// A log record as the SDK carries it to exporters.
///
/// Records are created by [`SdkLogger::create_log_record`], filled in through
/// the [`LogRecord`] trait and handed to every processor on emit.
///
/// [`SdkLogger::create_log_record`]: telemetry::logs::Logger::create_log_record
/// [`LogRecord`]: telemetry::logs::LogRecord
#[derive(Debug, Clone, Default, PartialEq)]
#[non_exhaustive]
pub struct SdkLogRecord {
    pub(crate) event_name: Option<&'static str>,
    pub(crate) target: Option<Cow<'static, str>>,
    pub(crate) timestamp: Option<SystemTime>,
    pub(crate) observed_timestamp: Option<SystemTime>,
    #[cfg(feature = "trace")]
    pub(crate) trace_context: Option<TraceContext>,
    pub(crate) severity_text: Option<&'static str>,
    pub(crate) severity_number: Option<Severity>,
    pub(crate) body: Option<AnyValue>,
    pub(crate) attributes: Vec<(Key, AnyValue)>,
}

impl telemetry::logs::LogRecord for SdkLogRecord {
    fn set_event_name(&mut self, name: &'static str) {
        self.event_name = Some(name);
    }

    // Exporters may use the target in place of the scope name.
    fn set_target<T>(&mut self, target: T)
    where
        T: Into<Cow<'static, str>>,
    {
        self.target = Some(target.into());
    }

    fn set_timestamp(&mut self, timestamp: SystemTime) {
        self.timestamp = Some(timestamp);
    }

    fn set_observed_timestamp(&mut self, timestamp: SystemTime) {
        self.observed_timestamp = Some(timestamp);
    }

    fn set_severity_text(&mut self, severity_text: &'static str) {
        self.severity_text = Some(severity_text);
    }

    fn set_severity_number(&mut self, severity_number: Severity) {
        self.severity_number = Some(severity_number);
    }

    fn set_body(&mut self, body: AnyValue) {
        self.body = Some(body);
    }

    fn add_attribute<K, V>(&mut self, key: K, value: V)
    where
        K: Into<Key>,
        V: Into<AnyValue>,
    {
        self.attributes.push((key.into(), value.into()));
    }

    #[cfg(feature = "trace")]
    fn set_trace_context(&mut self, trace_id: TraceId, span_id: SpanId) {
        self.trace_context = Some(TraceContext { trace_id, span_id });
    }
}

impl SdkLogRecord {
    /// Returns the event name
    #[inline]
    pub fn event_name(&self) -> Option<&'static str> {
        self.event_name
    }

    /// Returns the target
    #[inline]
    pub fn target(&self) -> Option<&Cow<'static, str>> {
        self.target.as_ref()
    }

    /// Returns the timestamp
    #[inline]
    pub fn timestamp(&self) -> Option<SystemTime> {
        self.timestamp
    }

    /// Returns the observed timestamp
    #[inline]
    pub fn observed_timestamp(&self) -> Option<SystemTime> {
        self.observed_timestamp
    }

    /// Returns the trace context
    #[cfg(feature = "trace")]
    #[inline]
    pub fn trace_context(&self) -> Option<&TraceContext> {
        self.trace_context.as_ref()
    }

    /// Returns the severity text
    #[inline]
    pub fn severity_text(&self) -> Option<&'static str> {
        self.severity_text
    }

    /// Returns the severity number
    #[inline]
    pub fn severity_number(&self) -> Option<Severity> {
        self.severity_number
    }

    /// Returns the body
    #[inline]
    pub fn body(&self) -> Option<&AnyValue> {
        self.body.as_ref()
    }

    /// Provides an iterator over the attributes, in insertion order.
    #[inline]
    pub fn attributes_iter(&self) -> impl Iterator<Item = &(Key, AnyValue)> {
        self.attributes.iter()
    }

    /// Returns the number of attributes in the `LogRecord`.
    #[inline]
    pub fn attributes_len(&self) -> usize {
        self.attributes.len()
    }

    /// Checks if the `LogRecord` contains the specified attribute.
    pub fn attributes_contains(&self, key: &Key, value: &AnyValue) -> bool {
        self.attributes
            .iter()
            .any(|(k, v)| k == key && v == value)
    }
}

/// TraceContext stores the trace context for logs that have an associated
/// span.
#[cfg(feature = "trace")]
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub struct TraceContext {
    /// Trace id
    pub trace_id: TraceId,
    /// Span Id
    pub span_id: SpanId,
}

#[cfg(feature = "trace")]
impl From<&SpanContext> for TraceContext {
    fn from(span_context: &SpanContext) -> Self {
        TraceContext {
            trace_id: span_context.trace_id(),
            span_id: span_context.span_id(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use telemetry::logs::LogRecord;

    #[test]
    fn test_set_fields() {
        let mut log_record = SdkLogRecord::default();
        let now = SystemTime::now();
        log_record.set_event_name("checkout");
        log_record.set_target("app::orders");
        log_record.set_timestamp(now);
        log_record.set_observed_timestamp(now);
        log_record.set_severity_text("ERROR");
        log_record.set_severity_number(Severity::Error);
        log_record.set_body(AnyValue::String("Test body".into()));

        assert_eq!(log_record.event_name(), Some("checkout"));
        assert_eq!(log_record.target().map(|t| t.as_ref()), Some("app::orders"));
        assert_eq!(log_record.timestamp(), Some(now));
        assert_eq!(log_record.observed_timestamp(), Some(now));
        assert_eq!(log_record.severity_text(), Some("ERROR"));
        assert_eq!(log_record.severity_number(), Some(Severity::Error));
        assert_eq!(
            log_record.body(),
            Some(&AnyValue::String("Test body".into()))
        );
    }

    #[test]
    fn test_attributes_keep_insertion_order() {
        let mut log_record = SdkLogRecord::default();
        log_record.add_attributes(vec![("key1", "value1"), ("key2", "value2")]);
        let mut map = HashMap::new();
        map.insert(Key::new("nested"), AnyValue::Int(1));
        log_record.add_attribute("map", AnyValue::Map(Box::new(map)));

        let keys: Vec<&str> = log_record
            .attributes_iter()
            .map(|(k, _)| k.as_str())
            .collect();
        assert_eq!(keys, vec!["key1", "key2", "map"]);
        assert_eq!(log_record.attributes_len(), 3);
        assert!(log_record.attributes_contains(&Key::new("key1"), &AnyValue::from("value1")));
        assert!(!log_record.attributes_contains(&Key::new("key1"), &AnyValue::from("value2")));
    }

    #[cfg(feature = "trace")]
    #[test]
    fn test_set_trace_context() {
        let mut log_record = SdkLogRecord::default();
        let context = SpanContext::new(TraceId::from(42), SpanId::from(7), false);
        log_record.set_trace_context(context.trace_id(), context.span_id());

        assert_eq!(
            log_record.trace_context(),
            Some(&TraceContext::from(&context))
        );
    }
}
