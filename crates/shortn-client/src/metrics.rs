use dashmap::DashMap;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::warn;

/// Lookups that found a URL.
pub const FOUND: &str = "cassandra-found";
/// Lookups whose code had no URL.
pub const NOT_FOUND: &str = "cassandra-not-found";
/// Backend failures, labelled by reason.
pub const ERRORS: &str = "cassandra-errors";

/// Receives store outcome events.
///
/// Every method defaults to a no-op so implementations only override what
/// they care about.
pub trait StoreMetrics: Send + Sync {
    fn inc_found(&self) {}

    fn inc_not_found(&self) {}

    /// Counts one failed backend call. `reason` is one of
    /// `invalid-request`, `unavailable`, `timeout` or `os-error`.
    fn inc_error(&self, _reason: &str) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl StoreMetrics for NoopMetrics {}

/// A value in a [`Counters`] snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum CounterValue {
    Int(u64),
    Map(BTreeMap<String, u64>),
}

/// Process-wide named counters, published as one JSON document.
///
/// Plain counters are addressed by name. Labelled counters group several
/// values under one name, one per label.
#[derive(Debug, Default)]
pub struct Counters {
    ints: DashMap<String, AtomicU64>,
    labelled: DashMap<(String, String), AtomicU64>,
}

impl Counters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, name: &str, delta: u64) {
        if let Some(counter) = self.ints.get(name) {
            counter.fetch_add(delta, Ordering::Relaxed);
            return;
        }
        self.ints
            .entry(name.to_owned())
            .or_default()
            .fetch_add(delta, Ordering::Relaxed);
    }

    pub fn add_labelled(&self, name: &str, label: &str, delta: u64) {
        self.labelled
            .entry((name.to_owned(), label.to_owned()))
            .or_default()
            .fetch_add(delta, Ordering::Relaxed);
    }

    pub fn get(&self, name: &str) -> u64 {
        self.ints
            .get(name)
            .map_or(0, |counter| counter.load(Ordering::Relaxed))
    }

    pub fn get_labelled(&self, name: &str, label: &str) -> u64 {
        self.labelled
            .get(&(name.to_owned(), label.to_owned()))
            .map_or(0, |counter| counter.load(Ordering::Relaxed))
    }

    /// Current value of every counter, keyed by name.
    ///
    /// A name used both as a plain and as a labelled counter publishes its
    /// plain value and logs a warning; the labelled values stay readable
    /// through [`get_labelled`](Self::get_labelled).
    pub fn snapshot(&self) -> BTreeMap<String, CounterValue> {
        let mut snapshot: BTreeMap<String, CounterValue> = self
            .ints
            .iter()
            .map(|entry| {
                let value = entry.value().load(Ordering::Relaxed);
                (entry.key().clone(), CounterValue::Int(value))
            })
            .collect();

        for entry in self.labelled.iter() {
            let (name, label) = entry.key();
            let value = entry.value().load(Ordering::Relaxed);
            let slot = snapshot
                .entry(name.clone())
                .or_insert_with(|| CounterValue::Map(BTreeMap::new()));
            match slot {
                CounterValue::Map(labels) => {
                    labels.insert(label.clone(), value);
                }
                CounterValue::Int(_) => {
                    warn!(
                        counter = %name,
                        label = %label,
                        "Counter is both plain and labelled, leaving labelled value out"
                    );
                }
            }
        }
        snapshot
    }
}

impl StoreMetrics for Counters {
    fn inc_found(&self) {
        self.add(FOUND, 1);
    }

    fn inc_not_found(&self) {
        self.add(NOT_FOUND, 1);
    }

    fn inc_error(&self, reason: &str) {
        self.add_labelled(ERRORS, reason, 1);
    }
}
