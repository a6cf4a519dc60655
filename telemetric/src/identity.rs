use std::{collections::BTreeMap, fmt};

use telemetric_util::ConfigError;

/// A sorted set of key/value tags.
///
/// Each key appears at most once; setting a key that already exists replaces its value.  Tags are
/// kept sorted by key so that two tag sets with the same contents always compare and hash equally,
/// regardless of the order they were built in.
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct Tags(BTreeMap<String, String>);

impl Tags {
    /// Creates an empty set of tags.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a set of tags from key/value pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self(pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }

    /// Sets a tag, replacing any existing value for the same key.
    pub fn insert<K: Into<String>, V: Into<String>>(&mut self, key: K, value: V) {
        self.0.insert(key.into(), value.into());
    }

    /// Gets the value of a tag.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Whether or not a tag with the given key exists.
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Number of tags.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether or not there are no tags.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over the tags in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Combines these tags with `overrides`, which take precedence on conflicting keys.
    pub fn merged(&self, overrides: &Tags) -> Tags {
        let mut merged = self.clone();
        for (k, v) in overrides.iter() {
            merged.insert(k, v);
        }
        merged
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.0.keys().any(String::is_empty) {
            return Err(ConfigError::EmptyIdentityField("tag key"));
        }
        Ok(())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Tags {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::from_pairs(iter)
    }
}

impl fmt::Display for Tags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (k, v) in self.iter() {
            if !first {
                f.write_str(",")?;
            }
            write!(f, "{}={}", k, v)?;
            first = false;
        }
        Ok(())
    }
}

/// The identity of a metric: the context it belongs to, its name and its tags.
///
/// Identities are compared structurally.  Two registrations with equal identities always resolve
/// to the same instrument.
#[derive(Clone, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct MetricIdentity {
    context: String,
    name: String,
    tags: Tags,
}

impl MetricIdentity {
    /// Creates a new `MetricIdentity`.
    ///
    /// The context, the name and every tag key must be non-empty.
    pub fn new<C, N>(context: C, name: N, tags: Tags) -> Result<Self, ConfigError>
    where
        C: Into<String>,
        N: Into<String>,
    {
        let context = context.into();
        let name = name.into();
        if context.is_empty() {
            return Err(ConfigError::EmptyIdentityField("context"));
        }
        if name.is_empty() {
            return Err(ConfigError::EmptyIdentityField("name"));
        }
        tags.validate()?;

        Ok(Self { context, name, tags })
    }

    /// Creates an identity from parts that were already validated.
    pub(crate) fn from_validated(context: &str, name: &str, tags: Tags) -> Self {
        Self { context: context.to_owned(), name: name.to_owned(), tags }
    }

    /// Context the metric belongs to.
    pub fn context(&self) -> &str {
        &self.context
    }

    /// Name of the metric.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Tags of the metric.
    pub fn tags(&self) -> &Tags {
        &self.tags
    }
}

impl fmt::Display for MetricIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.tags.is_empty() {
            write!(f, "{}.{}", self.context, self.name)
        } else {
            write!(f, "{}.{}[{}]", self.context, self.name, self.tags)
        }
    }
}
