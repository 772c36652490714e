//! Representations of entities producing telemetry.
//!
//! A [Resource] is an immutable set of attributes describing the process
//! that produces telemetry. Every exported batch carries the resource of the
//! provider that produced it.
//!
//! [`Resource::builder`] starts from what the environment says:
//!
//! - `OTEL_RESOURCE_ATTRIBUTES`: `key1=value1,key2=value2` pairs. Entries
//!   without `=` are skipped.
//! - `OTEL_SERVICE_NAME`: the `service.name` attribute. It wins over a
//!   `service.name` given in `OTEL_RESOURCE_ATTRIBUTES`; without either the
//!   service is called `unknown_service`.
use std::borrow::Cow;
use std::collections::{hash_map, HashMap};
use std::env;
use std::sync::Arc;

use telemetry::{Key, KeyValue, Value};

const OTEL_RESOURCE_ATTRIBUTES: &str = "OTEL_RESOURCE_ATTRIBUTES";
const OTEL_SERVICE_NAME: &str = "OTEL_SERVICE_NAME";

/// The attribute key naming the logical service.
pub const SERVICE_NAME: &str = "service.name";

#[derive(Debug, Clone, PartialEq)]
struct ResourceInner {
    attrs: HashMap<Key, Value>,
    schema_url: Option<Cow<'static, str>>,
}

/// An immutable representation of the entity producing telemetry as attributes.
///
/// Cloning is cheap; clones share the attribute map.
#[derive(Clone, Debug, PartialEq)]
pub struct Resource {
    inner: Arc<ResourceInner>,
}

impl Default for Resource {
    fn default() -> Self {
        Resource::builder().build()
    }
}

impl Resource {
    /// Creates a [ResourceBuilder] seeded from `OTEL_RESOURCE_ATTRIBUTES` and
    /// `OTEL_SERVICE_NAME`.
    ///
    /// Use [Resource::builder_empty] to start without any attributes.
    pub fn builder() -> ResourceBuilder {
        ResourceBuilder {
            resource: Resource::from_env(),
        }
    }

    /// Creates a [ResourceBuilder] without any attributes.
    pub fn builder_empty() -> ResourceBuilder {
        ResourceBuilder {
            resource: Resource::empty(),
        }
    }

    pub(crate) fn empty() -> Self {
        Resource {
            inner: Arc::new(ResourceInner {
                attrs: HashMap::new(),
                schema_url: None,
            }),
        }
    }

    fn from_env() -> Self {
        let mut attrs: HashMap<Key, Value> = match env::var(OTEL_RESOURCE_ATTRIBUTES) {
            Ok(s) if !s.is_empty() => parse_attributes(&s)
                .map(|kv| (kv.key, kv.value))
                .collect(),
            _ => HashMap::new(),
        };

        let service_name = env::var(OTEL_SERVICE_NAME)
            .ok()
            .filter(|s| !s.is_empty())
            .map(Value::from)
            .or_else(|| attrs.get(SERVICE_NAME).cloned())
            .unwrap_or_else(|| "unknown_service".into());
        attrs.insert(Key::from_static_str(SERVICE_NAME), service_name);

        Resource {
            inner: Arc::new(ResourceInner {
                attrs,
                schema_url: None,
            }),
        }
    }

    /// Keys of `other` win over keys of `self`. A schema URL survives only if
    /// the two sides do not disagree on it.
    fn merge(&self, other: &Resource) -> Self {
        if self.is_empty() && self.inner.schema_url.is_none() {
            return other.clone();
        }
        let mut attrs = self.inner.attrs.clone();
        for (k, v) in other.inner.attrs.iter() {
            attrs.insert(k.clone(), v.clone());
        }
        let schema_url = match (&self.inner.schema_url, &other.inner.schema_url) {
            (Some(a), Some(b)) if a == b => Some(a.clone()),
            (Some(_), Some(_)) => None,
            (None, Some(url)) | (Some(url), None) => Some(url.clone()),
            (None, None) => None,
        };
        Resource {
            inner: Arc::new(ResourceInner { attrs, schema_url }),
        }
    }

    /// Returns the schema URL of the resource, if any.
    pub fn schema_url(&self) -> Option<&str> {
        self.inner.schema_url.as_deref()
    }

    /// Returns the number of attributes for this resource
    pub fn len(&self) -> usize {
        self.inner.attrs.len()
    }

    /// Returns `true` if the resource contains no attributes.
    pub fn is_empty(&self) -> bool {
        self.inner.attrs.is_empty()
    }

    /// Gets an iterator over the attributes of this resource.
    pub fn iter(&self) -> Iter<'_> {
        Iter(self.inner.attrs.iter())
    }

    /// Retrieve the value from resource associate with given key.
    pub fn get(&self, key: &Key) -> Option<Value> {
        self.inner.attrs.get(key).cloned()
    }
}

fn parse_attributes(s: &str) -> impl Iterator<Item = KeyValue> + '_ {
    s.split_terminator(',').filter_map(|entry| {
        let (key, value) = entry.split_once('=')?;
        let key = key.trim();
        if key.is_empty() {
            return None;
        }
        Some(KeyValue::new(key.to_owned(), value.trim().to_owned()))
    })
}

/// An iterator over the entries of a `Resource`.
#[derive(Debug)]
pub struct Iter<'a>(hash_map::Iter<'a, Key, Value>);

impl<'a> Iterator for Iter<'a> {
    type Item = (&'a Key, &'a Value);

    fn next(&mut self) -> Option<Self::Item> {
        self.0.next()
    }
}

impl<'a> IntoIterator for &'a Resource {
    type Item = (&'a Key, &'a Value);
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        Iter(self.inner.attrs.iter())
    }
}

/// Builder for [Resource]
#[derive(Debug)]
pub struct ResourceBuilder {
    resource: Resource,
}

impl ResourceBuilder {
    /// Add a [KeyValue] to the resource.
    pub fn with_attribute(self, kv: KeyValue) -> Self {
        self.with_attributes([kv])
    }

    /// Add multiple [KeyValue]s to the resource. Later values replace earlier
    /// ones with the same key.
    pub fn with_attributes<T: IntoIterator<Item = KeyValue>>(mut self, kvs: T) -> Self {
        let mut attrs = HashMap::new();
        for kv in kvs {
            attrs.insert(kv.key, kv.value);
        }
        let added = Resource {
            inner: Arc::new(ResourceInner {
                attrs,
                schema_url: None,
            }),
        };
        self.resource = self.resource.merge(&added);
        self
    }

    /// Add `service.name` resource attribute.
    pub fn with_service_name(self, name: impl Into<Value>) -> Self {
        self.with_attribute(KeyValue::new(SERVICE_NAME, name.into()))
    }

    /// Set the schema URL of the resource. An empty URL is ignored.
    pub fn with_schema_url(mut self, schema_url: impl Into<Cow<'static, str>>) -> Self {
        let schema_url = schema_url.into();
        if !schema_url.is_empty() {
            Arc::make_mut(&mut self.resource.inner).schema_url = Some(schema_url);
        }
        self
    }

    /// Create a [Resource] with the options provided to the [ResourceBuilder].
    pub fn build(self) -> Resource {
        self.resource
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn reads_attributes_and_service_name_from_env() {
        temp_env::with_vars(
            [
                (
                    OTEL_RESOURCE_ATTRIBUTES,
                    Some("key=value, k = v , a= x, a=z,malformed,service.name=from-attrs"),
                ),
                (OTEL_SERVICE_NAME, Some("checkout")),
            ],
            || {
                let resource = Resource::builder().build();
                assert_eq!(resource.get(&Key::new("key")), Some(Value::from("value")));
                assert_eq!(resource.get(&Key::new("k")), Some(Value::from("v")));
                assert_eq!(resource.get(&Key::new("a")), Some(Value::from("z")));
                assert_eq!(
                    resource.get(&Key::new(SERVICE_NAME)),
                    Some(Value::from("checkout"))
                );
                assert_eq!(resource.len(), 4);
            },
        );
    }

    #[rstest]
    #[case(None, None, "unknown_service")]
    #[case(Some("service.name=from-attrs"), None, "from-attrs")]
    #[case(Some("service.name=from-attrs"), Some(""), "from-attrs")]
    #[case(None, Some("from-env"), "from-env")]
    fn service_name_precedence(
        #[case] attributes: Option<&str>,
        #[case] service_name: Option<&str>,
        #[case] expected: &'static str,
    ) {
        temp_env::with_vars(
            [
                (OTEL_RESOURCE_ATTRIBUTES, attributes),
                (OTEL_SERVICE_NAME, service_name),
            ],
            || {
                let resource = Resource::builder().build();
                assert_eq!(
                    resource.get(&Key::new(SERVICE_NAME)),
                    Some(Value::from(expected))
                );
            },
        );
    }

    #[test]
    fn builder_attributes_override_env() {
        temp_env::with_var(OTEL_SERVICE_NAME, Some("from-env"), || {
            let resource = Resource::builder()
                .with_service_name("explicit")
                .with_attribute(KeyValue::new("host", "a"))
                .with_schema_url("https://example.com/schema")
                .build();
            assert_eq!(
                resource.get(&Key::new(SERVICE_NAME)),
                Some(Value::from("explicit"))
            );
            assert_eq!(resource.get(&Key::new("host")), Some(Value::from("a")));
            assert_eq!(resource.schema_url(), Some("https://example.com/schema"));
        });
    }

    #[test]
    fn empty_builder_has_no_attributes() {
        let resource = Resource::builder_empty().with_schema_url("").build();
        assert!(resource.is_empty());
        assert_eq!(resource.schema_url(), None);
    }
}
