use regex::Regex;
use telemetry::diag_warn;

use super::{
    error::{MetricError, MetricResult},
    instrument::{Instrument, Stream},
};

fn empty_view(_inst: &Instrument) -> Option<Stream> {
    None
}

/// Used to customize the metrics that are output by the SDK.
///
/// Here are some examples when a [View] might be needed:
///
/// * Customize which Instruments are to be processed/ignored. For example, an
///   instrumented library can provide both temperature and humidity, but the
///   application developer might only want temperature.
/// * Customize the aggregation - if the default aggregation associated with the
///   [Instrument] does not meet the needs of the user. For example, an HTTP client
///   library might expose HTTP client request duration as Histogram by default,
///   but the application developer might only want the total count of outgoing
///   requests.
/// * Customize which attribute(s) are to be reported on metrics. For example,
///   an HTTP server library might expose HTTP verb (e.g. GET, POST) and HTTP
///   status code (e.g. 200, 301, 404). The application developer might only care
///   about HTTP status code (e.g. reporting the total count of HTTP requests for
///   each HTTP status code).
///
/// Every registered view is asked about every instrument created after its
/// registration, and each match adds one stream.
///
/// # Example Custom View
///
/// View is implemented for all `Fn(&Instrument) -> Option<Stream>`.
///
/// ```
/// use telemetry_sdk::metrics::{Instrument, SdkMeterProvider, Stream};
///
/// // return streams for the given instrument
/// let my_view = |i: &Instrument| {
///   // return Some(Stream) or
///   None
/// };
///
/// let provider = SdkMeterProvider::builder().with_view(my_view).build();
/// # drop(provider)
/// ```
pub trait View: Send + Sync + 'static {
    /// Defines how data should be collected for certain instruments.
    ///
    /// Return [Stream] to use for matching [Instrument]s,
    /// otherwise if there is no match, return `None`.
    fn match_inst(&self, inst: &Instrument) -> Option<Stream>;
}

impl<T> View for T
where
    T: Fn(&Instrument) -> Option<Stream> + Send + Sync + 'static,
{
    fn match_inst(&self, inst: &Instrument) -> Option<Stream> {
        self(inst)
    }
}

impl View for Box<dyn View> {
    fn match_inst(&self, inst: &Instrument) -> Option<Stream> {
        (**self).match_inst(inst)
    }
}

/// Case-insensitive name matcher. `*` matches any run of characters and `?`
/// exactly one.
enum NamePattern {
    Any,
    Exact(String),
    Wildcard(Regex),
}

impl NamePattern {
    fn new(pattern: &str) -> MetricResult<Self> {
        if pattern.is_empty() {
            return Ok(NamePattern::Any);
        }
        if !pattern.contains(['*', '?']) {
            return Ok(NamePattern::Exact(pattern.to_owned()));
        }

        let mut regex = String::with_capacity(pattern.len() + 2);
        regex.push('^');
        let mut literal = String::new();
        for c in pattern.to_lowercase().chars() {
            match c {
                '*' | '?' => {
                    regex.push_str(&regex::escape(&literal));
                    literal.clear();
                    regex.push_str(if c == '*' { ".*" } else { "." });
                }
                c => literal.push(c),
            }
        }
        regex.push_str(&regex::escape(&literal));
        regex.push('$');

        Regex::new(&regex)
            .map(NamePattern::Wildcard)
            .map_err(|e| MetricError::Config(format!("invalid view name pattern: {e}")))
    }

    fn is_wildcard(&self) -> bool {
        matches!(self, NamePattern::Wildcard(_))
    }

    fn matches(&self, name: &str) -> bool {
        match self {
            NamePattern::Any => true,
            NamePattern::Exact(exact) => exact.eq_ignore_ascii_case(name),
            NamePattern::Wildcard(re) => re.is_match(&name.to_lowercase()),
        }
    }
}

/// Creates a [View] that applies the [Stream] mask for all instruments that
/// match criteria.
///
/// The returned [View] will only apply the mask if all non-empty fields of
/// criteria match the corresponding [Instrument] passed to the view. If all
/// fields of the criteria are their default values, a view that matches no
/// instruments is returned. If you need to match an empty-value field, create a
/// [View] directly.
///
/// The [Instrument::name] field of criteria supports wildcard pattern matching.
/// The wildcard `*` is recognized as matching zero or more characters, and `?`
/// is recognized as matching exactly one character. For example, a pattern of
/// `*` will match all instrument names. The same applies to the name of the
/// criteria's scope.
///
/// The [Stream] mask only applies updates for non-empty fields. By default, the
/// [Instrument] the [View] matches against will be use for the name,
/// description, and unit of the returned [Stream] and no `aggregation` or
/// attribute filters are set. All non-empty fields of mask are used instead of
/// the default. If you need to set a an empty value in the returned stream
/// fields, create a custom [View] directly.
///
/// A view that cannot be used (a wildcard name combined with a rename, or an
/// invalid aggregation) is logged and replaced by one that matches nothing.
///
/// # Example
///
/// ```
/// use telemetry_sdk::metrics::{new_view, Aggregation, Instrument, Stream};
///
/// let criteria = Instrument::new().name("counter_*");
/// let mask = Stream::builder()
///     .with_aggregation(Aggregation::Sum)
///     .build()
///     .unwrap();
///
/// let view = new_view(criteria, mask);
/// # drop(view);
/// ```
pub fn new_view(criteria: Instrument, mask: Stream) -> MetricResult<Box<dyn View>> {
    if criteria.is_empty() {
        diag_warn!(
            name: "View.EmptyCriteria",
            message = "no criteria provided, dropping view"
        );
        return Ok(Box::new(empty_view));
    }

    let name = NamePattern::new(&criteria.name)?;
    if name.is_wildcard() && mask.name.is_some() {
        diag_warn!(
            name: "View.WildcardRename",
            message = "name replacement for multiple instruments, dropping view",
            criteria = criteria.name.to_string()
        );
        return Ok(Box::new(empty_view));
    }

    if let Some(aggregation) = &mask.aggregation {
        if let Err(err) = aggregation.validate() {
            diag_warn!(
                name: "View.InvalidAggregation",
                message = "invalid aggregation, dropping view",
                error = err.to_string()
            );
            return Ok(Box::new(empty_view));
        }
    }

    let scope_name = NamePattern::new(criteria.scope.name())?;
    let match_fn = move |i: &Instrument| {
        name.matches(&i.name)
            && scope_name.matches(i.scope.name())
            && criteria.matches_description(i)
            && criteria.matches_kind(i)
            && criteria.matches_unit(i)
    };

    Ok(Box::new(move |i: &Instrument| -> Option<Stream> {
        if !match_fn(i) {
            return None;
        }
        Some(Stream {
            name: Some(mask.name.clone().unwrap_or_else(|| i.name.clone())),
            description: Some(
                mask.description
                    .clone()
                    .unwrap_or_else(|| i.description.clone()),
            ),
            unit: Some(mask.unit.clone().unwrap_or_else(|| i.unit.clone())),
            aggregation: mask.aggregation.clone(),
            allowed_attribute_keys: mask.allowed_attribute_keys.clone(),
            denied_attribute_keys: mask.denied_attribute_keys.clone(),
            cardinality_limit: mask.cardinality_limit,
        })
    }))
}

#[cfg(test)]
mod tests {
    use telemetry::InstrumentationScope;

    use super::*;
    use crate::metrics::{Aggregation, InstrumentKind};

    fn inst(name: &'static str) -> Instrument {
        Instrument::new()
            .name(name)
            .kind(InstrumentKind::Counter)
            .scope(InstrumentationScope::builder("my.library").build())
    }

    #[test]
    fn wildcard_names() {
        let view = new_view(Instrument::new().name("http.*.dur?tion"), Stream::default()).unwrap();
        assert!(view.match_inst(&inst("http.server.duration")).is_some());
        assert!(view.match_inst(&inst("HTTP.client.DURATION")).is_some());
        assert!(view.match_inst(&inst("http.server.durations")).is_none());
        assert!(view.match_inst(&inst("rpc.server.duration")).is_none());
    }

    #[test]
    fn regex_metacharacters_in_names_are_literal() {
        let view = new_view(Instrument::new().name("a.b*"), Stream::default()).unwrap();
        assert!(view.match_inst(&inst("a.bc")).is_some());
        assert!(view.match_inst(&inst("axbc")).is_none());
    }

    #[test]
    fn exact_names_are_case_insensitive() {
        let view = new_view(Instrument::new().name("Requests"), Stream::default()).unwrap();
        let stream = view.match_inst(&inst("requests")).unwrap();
        assert_eq!(stream.name(), Some("requests"));
        assert!(view.match_inst(&inst("requests2")).is_none());
    }

    #[test]
    fn scope_kind_and_unit_criteria() {
        let criteria = Instrument::new()
            .kind(InstrumentKind::Counter)
            .unit("ms")
            .scope(InstrumentationScope::builder("my.*").build());
        let view = new_view(criteria, Stream::default()).unwrap();

        assert!(view.match_inst(&inst("a").unit("ms")).is_some());
        assert!(view.match_inst(&inst("a").unit("s")).is_none());
        assert!(view
            .match_inst(&inst("a").unit("ms").kind(InstrumentKind::Gauge))
            .is_none());
        assert!(view
            .match_inst(
                &inst("a")
                    .unit("ms")
                    .scope(InstrumentationScope::builder("other").build())
            )
            .is_none());
    }

    #[test]
    fn mask_overrides_instrument_fields() {
        let mask = Stream::builder()
            .with_name("renamed")
            .with_aggregation(Aggregation::LastValue)
            .build()
            .unwrap();
        let view = new_view(Instrument::new().name("requests"), mask).unwrap();
        let stream = view
            .match_inst(&inst("requests").description("handled requests"))
            .unwrap();
        assert_eq!(stream.name(), Some("renamed"));
        assert_eq!(stream.description.as_deref(), Some("handled requests"));
        assert_eq!(stream.aggregation(), Some(&Aggregation::LastValue));
    }

    #[test]
    fn unusable_views_match_nothing() {
        let empty = new_view(Instrument::new(), Stream::default()).unwrap();
        assert!(empty.match_inst(&inst("requests")).is_none());

        let rename = Stream::builder().with_name("renamed").build().unwrap();
        let wildcard_rename = new_view(Instrument::new().name("req*"), rename).unwrap();
        assert!(wildcard_rename.match_inst(&inst("requests")).is_none());

        // Stream fields are crate-visible so an invalid aggregation can get
        // past the builder here.
        let invalid = Stream {
            aggregation: Some(Aggregation::ExplicitBucketHistogram {
                boundaries: vec![2.0, 1.0],
                record_min_max: false,
            }),
            ..Default::default()
        };
        let invalid_view = new_view(Instrument::new().name("requests"), invalid).unwrap();
        assert!(invalid_view.match_inst(&inst("requests")).is_none());
    }
}
