//! Keyed grouping of samples and measurements
//!
//! Groups are returned as a `BTreeMap` so iteration is deterministic, but no
//! caller relies on that order for report output; rows are sorted explicitly
//! by the aggregator.

use crate::sample::Sample;
use std::collections::BTreeMap;

/// Partition `items` by `key`, keeping the input order inside each group
pub fn group_by<T, K, I, F>(items: I, mut key: F) -> BTreeMap<K, Vec<T>>
where
    I: IntoIterator<Item = T>,
    K: Ord,
    F: FnMut(&T) -> K,
{
    let mut groups: BTreeMap<K, Vec<T>> = BTreeMap::new();
    for item in items {
        groups.entry(key(&item)).or_default().push(item);
    }
    groups
}

fn session_key<'a>(sample: &&'a Sample) -> &'a str {
    &sample.session_id
}

/// Partition samples by session identifier
pub fn group_sessions<'a, I>(samples: I) -> BTreeMap<&'a str, Vec<&'a Sample>>
where
    I: IntoIterator<Item = &'a Sample>,
{
    group_by(samples, session_key)
}
