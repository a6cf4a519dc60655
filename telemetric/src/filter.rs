use std::{fmt, sync::Arc};

use aho_corasick::{AhoCorasick, AhoCorasickBuilder, AhoCorasickKind};
use telemetric_util::{ConfigError, MetricKind, MetricKindMask};

use crate::MetricIdentity;

/// A custom predicate over metrics, applied after every other criteria of a [`MetricsFilter`].
pub trait MetricPredicate: Send + Sync {
    /// Whether or not the metric should be included.
    fn matches(&self, kind: MetricKind, identity: &MetricIdentity) -> bool;
}

impl<F> MetricPredicate for F
where
    F: Fn(MetricKind, &MetricIdentity) -> bool + Send + Sync,
{
    fn matches(&self, kind: MetricKind, identity: &MetricIdentity) -> bool {
        (self)(kind, identity)
    }
}

/// Selects which metrics are included when reading data out of a registry.
///
/// An empty filter matches everything.  Each criteria narrows the selection further: a metric is
/// only included when it matches all of them.
///
/// Name patterns are matched as substrings, so a pattern of `"http"` matches both
/// `http_requests` and `outbound_http_errors`.
#[derive(Clone, Default)]
pub struct MetricsFilter {
    kinds: MetricKindMask,
    context: Option<String>,
    patterns: Vec<String>,
    automaton: Option<AhoCorasick>,
    tag_keys: Vec<String>,
    tags: Vec<(String, String)>,
    predicate: Option<Arc<dyn MetricPredicate>>,
}

impl MetricsFilter {
    /// Creates a filter that matches everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Only includes metrics of the given kinds.
    pub fn with_kinds(mut self, kinds: MetricKindMask) -> Self {
        self.kinds = kinds;
        self
    }

    /// Only includes metrics in the given context.
    pub fn with_context<C: Into<String>>(mut self, context: C) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Only includes metrics whose name contains at least one of `patterns`.
    ///
    /// Returns an error if the patterns could not be compiled.
    pub fn with_name_patterns<I, P>(mut self, patterns: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        self.patterns.extend(patterns.into_iter().map(Into::into));
        if self.patterns.is_empty() {
            return Ok(self);
        }

        let automaton = AhoCorasickBuilder::new()
            .kind(Some(AhoCorasickKind::DFA))
            .build(&self.patterns)
            .map_err(|e| ConfigError::InvalidFilter(e.to_string()))?;
        self.automaton = Some(automaton);
        Ok(self)
    }

    /// Only includes metrics that carry a tag with the given key.
    pub fn with_tag_key<K: Into<String>>(mut self, key: K) -> Self {
        self.tag_keys.push(key.into());
        self
    }

    /// Only includes metrics that carry the given tag.
    pub fn with_tag<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.tags.push((key.into(), value.into()));
        self
    }

    /// Only includes metrics accepted by `predicate`.
    pub fn with_predicate<P: MetricPredicate + 'static>(mut self, predicate: P) -> Self {
        self.predicate = Some(Arc::new(predicate));
        self
    }

    /// Whether or not metrics of `kind` may be included.
    pub fn matches_kind(&self, kind: MetricKind) -> bool {
        self.kinds.matches(kind)
    }

    /// Whether or not metrics in `context` may be included.
    pub fn matches_context(&self, context: &str) -> bool {
        self.context.as_deref().map_or(true, |c| c == context)
    }

    /// Whether or not the given metric is included.
    pub fn matches(&self, kind: MetricKind, identity: &MetricIdentity) -> bool {
        if !self.matches_kind(kind) || !self.matches_context(identity.context()) {
            return false;
        }

        if let Some(automaton) = &self.automaton {
            if !automaton.is_match(identity.name()) {
                return false;
            }
        }

        let tags = identity.tags();
        if !self.tag_keys.iter().all(|key| tags.contains_key(key)) {
            return false;
        }
        if !self.tags.iter().all(|(key, value)| tags.get(key) == Some(value.as_str())) {
            return false;
        }

        self.predicate.as_ref().map_or(true, |p| p.matches(kind, identity))
    }
}

impl fmt::Debug for MetricsFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricsFilter")
            .field("kinds", &self.kinds)
            .field("context", &self.context)
            .field("patterns", &self.patterns)
            .field("tag_keys", &self.tag_keys)
            .field("tags", &self.tags)
            .field("predicate", &self.predicate.is_some())
            .finish()
    }
}
