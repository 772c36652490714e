use std::borrow::{Borrow, Cow};
use std::sync::Arc;
use std::fmt;
use std::hash::{self, Hash};

/// The key part of attribute [`KeyValue`] pairs.
///
/// Keys are compared and hashed by their string content, regardless of
/// whether they are backed by a static string, an owned buffer or a shared
/// `Arc<str>`.
#[non_exhaustive]
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Key(SharedStr);

impl Key {
    /// Create a new `Key`.
    ///
    /// # Examples
    ///
    /// ```
    /// use telemetry::Key;
    /// use std::sync::Arc;
    ///
    /// let key1 = Key::new("my_static_str");
    /// let key2 = Key::new(String::from("my_owned_string"));
    /// let key3 = Key::new(Arc::from("my_ref_counted_str"));
    /// ```
    pub fn new(value: impl Into<Key>) -> Self {
        value.into()
    }

    /// Create a new const `Key`.
    pub const fn from_static_str(value: &'static str) -> Self {
        Key(SharedStr::Static(value))
    }

    /// Returns a reference to the underlying key name
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Create a `KeyValue` pair for `bool` values.
    pub fn bool<T: Into<bool>>(self, value: T) -> KeyValue {
        KeyValue::new(self, Value::Bool(value.into()))
    }

    /// Create a `KeyValue` pair for `i64` values.
    pub fn i64(self, value: i64) -> KeyValue {
        KeyValue::new(self, Value::I64(value))
    }

    /// Create a `KeyValue` pair for `f64` values.
    pub fn f64(self, value: f64) -> KeyValue {
        KeyValue::new(self, Value::F64(value))
    }

    /// Create a `KeyValue` pair for string-like values.
    pub fn string(self, value: impl Into<StringValue>) -> KeyValue {
        KeyValue::new(self, Value::String(value.into()))
    }
}

impl From<&'static str> for Key {
    fn from(key_str: &'static str) -> Self {
        Key(SharedStr::Static(key_str))
    }
}

impl From<String> for Key {
    fn from(string: String) -> Self {
        Key(SharedStr::Owned(string.into_boxed_str()))
    }
}

impl From<Arc<str>> for Key {
    fn from(string: Arc<str>) -> Self {
        Key(SharedStr::RefCounted(string))
    }
}

impl From<Cow<'static, str>> for Key {
    fn from(string: Cow<'static, str>) -> Self {
        match string {
            Cow::Borrowed(s) => Key(SharedStr::Static(s)),
            Cow::Owned(s) => Key(SharedStr::Owned(s.into_boxed_str())),
        }
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(fmt)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.write_str(self.as_str())
    }
}

impl From<Key> for String {
    fn from(key: Key) -> Self {
        key.as_str().to_owned()
    }
}

impl Borrow<str> for Key {
    fn borrow(&self) -> &str {
        self.0.as_str()
    }
}

impl AsRef<str> for Key {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

#[derive(Clone, Debug)]
enum SharedStr {
    Owned(Box<str>),
    Static(&'static str),
    RefCounted(Arc<str>),
}

impl SharedStr {
    fn as_str(&self) -> &str {
        match self {
            SharedStr::Owned(s) => s,
            SharedStr::Static(s) => s,
            SharedStr::RefCounted(s) => s,
        }
    }
}

impl PartialEq for SharedStr {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for SharedStr {}

impl PartialOrd for SharedStr {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SharedStr {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.as_str().cmp(other.as_str())
    }
}

impl hash::Hash for SharedStr {
    fn hash<H: hash::Hasher>(&self, state: &mut H) {
        self.as_str().hash(state)
    }
}

/// A [`Value::Array`] containing homogeneous values.
#[non_exhaustive]
#[derive(Clone, Debug, PartialEq)]
pub enum Array {
    /// Array of bools
    Bool(Vec<bool>),
    /// Array of integers
    I64(Vec<i64>),
    /// Array of floats
    F64(Vec<f64>),
    /// Array of strings
    String(Vec<StringValue>),
}

impl fmt::Display for Array {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn join<T: fmt::Display>(items: &[T], quote: bool, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
            fmt.write_str("[")?;
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    fmt.write_str(",")?;
                }
                if quote {
                    write!(fmt, "\"{item}\"")?;
                } else {
                    write!(fmt, "{item}")?;
                }
            }
            fmt.write_str("]")
        }

        match self {
            Array::Bool(values) => join(values, false, fmt),
            Array::I64(values) => join(values, false, fmt),
            Array::F64(values) => join(values, false, fmt),
            Array::String(values) => join(values, true, fmt),
        }
    }
}

macro_rules! into_array {
    ($(($t:ty, $val:expr),)+) => {
        $(
            impl From<$t> for Array {
                fn from(t: $t) -> Self {
                    $val(t)
                }
            }
        )+
    }
}

into_array!(
    (Vec<bool>, Array::Bool),
    (Vec<i64>, Array::I64),
    (Vec<f64>, Array::F64),
    (Vec<StringValue>, Array::String),
);

/// The value part of attribute [`KeyValue`] pairs.
///
/// `Value` implements `Eq` and `Hash` so attribute sets can key aggregation
/// maps. Floats are hashed by their bit pattern with `-0.0` folded onto `0.0`;
/// NaN never equals itself, so callers keying maps on values must screen NaN
/// out first.
#[non_exhaustive]
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// bool values
    Bool(bool),
    /// i64 values
    I64(i64),
    /// f64 values
    F64(f64),
    /// String values
    String(StringValue),
    /// Array of homogeneous values
    Array(Array),
}

impl Eq for Value {}

fn hash_f64<H: hash::Hasher>(v: f64, state: &mut H) {
    let bits = if v == 0.0 { 0u64 } else { v.to_bits() };
    bits.hash(state)
}

impl hash::Hash for Value {
    fn hash<H: hash::Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Bool(b) => b.hash(state),
            Value::I64(i) => i.hash(state),
            Value::F64(f) => hash_f64(*f, state),
            Value::String(s) => s.hash(state),
            Value::Array(array) => match array {
                Array::Bool(values) => values.hash(state),
                Array::I64(values) => values.hash(state),
                Array::F64(values) => values.iter().for_each(|f| hash_f64(*f, state)),
                Array::String(values) => values.hash(state),
            },
        }
    }
}

impl Value {
    /// String representation of the `Value`
    ///
    /// This will allocate iff the underlying value is not a `String`.
    pub fn as_str(&self) -> Cow<'_, str> {
        match self {
            Value::String(v) => Cow::Borrowed(v.as_str()),
            other => Cow::Owned(other.to_string()),
        }
    }
}

/// Wrapper for string-like values
#[non_exhaustive]
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StringValue(SharedStr);

impl fmt::Debug for StringValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl fmt::Display for StringValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AsRef<str> for StringValue {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl StringValue {
    /// Returns a string slice to this value
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<StringValue> for String {
    fn from(s: StringValue) -> Self {
        match s.0 {
            SharedStr::Owned(s) => s.into_string(),
            SharedStr::Static(s) => s.to_owned(),
            SharedStr::RefCounted(s) => s.to_string(),
        }
    }
}

impl From<&'static str> for StringValue {
    fn from(s: &'static str) -> Self {
        StringValue(SharedStr::Static(s))
    }
}

impl From<String> for StringValue {
    fn from(s: String) -> Self {
        StringValue(SharedStr::Owned(s.into_boxed_str()))
    }
}

impl From<Arc<str>> for StringValue {
    fn from(s: Arc<str>) -> Self {
        StringValue(SharedStr::RefCounted(s))
    }
}

impl From<Cow<'static, str>> for StringValue {
    fn from(s: Cow<'static, str>) -> Self {
        match s {
            Cow::Owned(s) => StringValue(SharedStr::Owned(s.into_boxed_str())),
            Cow::Borrowed(s) => StringValue(SharedStr::Static(s)),
        }
    }
}

macro_rules! from_values {
    ($(($t:ty, $val:expr);)+) => {
        $(
            impl From<$t> for Value {
                fn from(t: $t) -> Self {
                    $val(t.into())
                }
            }
        )+
    }
}

from_values!(
    (bool, Value::Bool);
    (i64, Value::I64);
    (i32, Value::I64);
    (u32, Value::I64);
    (f64, Value::F64);
    (StringValue, Value::String);
    (&'static str, Value::String);
    (String, Value::String);
    (Arc<str>, Value::String);
    (Cow<'static, str>, Value::String);
    (Array, Value::Array);
);

impl fmt::Display for Value {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(v) => v.fmt(fmt),
            Value::I64(v) => v.fmt(fmt),
            Value::F64(v) => v.fmt(fmt),
            Value::String(v) => fmt.write_str(v.as_str()),
            Value::Array(v) => v.fmt(fmt),
        }
    }
}

/// A key-value pair describing an attribute.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub struct KeyValue {
    /// The attribute name
    pub key: Key,

    /// The attribute value
    pub value: Value,
}

impl KeyValue {
    /// Create a new `KeyValue` pair.
    pub fn new<K, V>(key: K, value: V) -> Self
    where
        K: Into<Key>,
        V: Into<Value>,
    {
        KeyValue {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Information about the library or crate providing instrumentation.
///
/// Providers use the scope as the cache key for the handles they issue.
/// Only `name`, `version` and `schema_url` take part in equality and hashing;
/// an empty version or schema URL is the same as an absent one. Attributes
/// are carried along for exporters but never distinguish two scopes.
#[derive(Debug, Default, Clone)]
#[non_exhaustive]
pub struct InstrumentationScope {
    name: Cow<'static, str>,
    version: Option<Cow<'static, str>>,
    schema_url: Option<Cow<'static, str>>,
    attributes: Vec<KeyValue>,
}

impl PartialEq for InstrumentationScope {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.version == other.version
            && self.schema_url == other.schema_url
    }
}

impl Eq for InstrumentationScope {}

impl hash::Hash for InstrumentationScope {
    fn hash<H: hash::Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.version.hash(state);
        self.schema_url.hash(state);
    }
}

impl InstrumentationScope {
    /// Create a new builder to create an [`InstrumentationScope`]
    pub fn builder<T: Into<Cow<'static, str>>>(name: T) -> InstrumentationScopeBuilder {
        InstrumentationScopeBuilder {
            name: name.into(),
            version: None,
            schema_url: None,
            attributes: None,
        }
    }

    /// Returns the instrumentation library name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the instrumentation library version.
    #[inline]
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Returns the schema URL used by this library.
    #[inline]
    pub fn schema_url(&self) -> Option<&str> {
        self.schema_url.as_deref()
    }

    /// Returns the instrumentation library attributes.
    #[inline]
    pub fn attributes(&self) -> impl Iterator<Item = &KeyValue> {
        self.attributes.iter()
    }
}

/// Configuration options for [`InstrumentationScope`].
///
/// # Examples
///
/// ```
/// use telemetry::{InstrumentationScope, KeyValue};
///
/// let scope = InstrumentationScope::builder("checkout")
///     .with_version("1.4.0")
///     .with_schema_url("https://example.com/schemas/1.23.0")
///     .with_attributes([KeyValue::new("team", "payments")])
///     .build();
/// assert_eq!(scope.version(), Some("1.4.0"));
/// ```
#[derive(Debug)]
pub struct InstrumentationScopeBuilder {
    name: Cow<'static, str>,
    version: Option<Cow<'static, str>>,
    schema_url: Option<Cow<'static, str>>,
    attributes: Option<Vec<KeyValue>>,
}

fn non_empty(value: Cow<'static, str>) -> Option<Cow<'static, str>> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

impl InstrumentationScopeBuilder {
    /// Configure the version for the instrumentation scope. An empty version
    /// is treated as no version.
    pub fn with_version(mut self, version: impl Into<Cow<'static, str>>) -> Self {
        self.version = non_empty(version.into());
        self
    }

    /// Configure the Schema URL for the instrumentation scope. An empty URL
    /// is treated as no URL.
    pub fn with_schema_url(mut self, schema_url: impl Into<Cow<'static, str>>) -> Self {
        self.schema_url = non_empty(schema_url.into());
        self
    }

    /// Configure the attributes for the instrumentation scope
    pub fn with_attributes<I>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = KeyValue>,
    {
        self.attributes = Some(attributes.into_iter().collect());
        self
    }

    /// Create a new [`InstrumentationScope`] from this configuration
    pub fn build(self) -> InstrumentationScope {
        InstrumentationScope {
            name: self.name,
            version: self.version,
            schema_url: self.schema_url,
            attributes: self.attributes.unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    use super::*;

    fn hash_of<T: Hash>(value: &T) -> u64 {
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn key_backing_storage_does_not_matter() {
        let a = Key::new("service");
        let b = Key::new(String::from("service"));
        let c = Key::new(Arc::<str>::from("service"));
        assert_eq!(a, b);
        assert_eq!(b, c);
        assert_eq!(hash_of(&a), hash_of(&c));
    }

    #[test]
    fn signed_zero_hashes_alike() {
        let pos = KeyValue::new("v", 0.0);
        let neg = KeyValue::new("v", -0.0);
        assert_eq!(pos, neg);
        assert_eq!(hash_of(&pos), hash_of(&neg));
    }

    #[test]
    fn float_arrays_hash_by_value() {
        let a: Value = Array::F64(vec![1.5, 0.0]).into();
        let b: Value = Array::F64(vec![1.5, -0.0]).into();
        let c: Value = Array::F64(vec![2.5, 0.0]).into();
        assert_eq!(hash_of(&a), hash_of(&b));
        assert_ne!(hash_of(&a), hash_of(&c));
    }

    #[test]
    fn scope_identity_ignores_attributes() {
        let plain = InstrumentationScope::builder("lib").with_version("1").build();
        let tagged = InstrumentationScope::builder("lib")
            .with_version("1")
            .with_attributes([KeyValue::new("k", "v")])
            .build();
        assert_eq!(plain, tagged);
        assert_eq!(hash_of(&plain), hash_of(&tagged));
    }

    #[test]
    fn empty_version_equals_absent_version() {
        let absent = InstrumentationScope::builder("lib").build();
        let empty = InstrumentationScope::builder("lib")
            .with_version("")
            .with_schema_url("")
            .build();
        assert_eq!(absent, empty);
        assert_ne!(
            absent,
            InstrumentationScope::builder("lib").with_schema_url("s").build()
        );
    }

    #[test]
    fn array_display() {
        let strings: Value = Array::String(vec!["a".into(), "b".into()]).into();
        assert_eq!(strings.as_str(), "[\"a\",\"b\"]");
        let ints: Value = Array::I64(vec![1, 2, 3]).into();
        assert_eq!(ints.to_string(), "[1,2,3]");
    }
}
