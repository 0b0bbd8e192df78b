// -*- coding: utf-8 -*-
// ------------------------------------------------------------------------------------------------
// Copyright © 2021, object-graphs authors.
// Licensed under either of Apache License, Version 2.0, or MIT license, at your option.
// Please see the LICENSE-APACHE or LICENSE-MIT files in this distribution for license details.
// ------------------------------------------------------------------------------------------------

use std::hash::Hash;

use fxhash::FxHashMap;

/// Frequency distribution maintains the frequency of T values.  The state graph records one for
/// reclaimed-node counts and one for live-node counts, so that a driver can report how a run's
/// garbage collection behaved.
#[derive(Clone, Debug, Default)]
pub struct FrequencyDistribution<T>
where
    T: Eq + Hash,
{
    values: FxHashMap<T, usize>,
    total: usize,
}

impl<T: Eq + Hash> FrequencyDistribution<T> {
    pub fn record(&mut self, value: T) {
        *self.values.entry(value).or_default() += 1;
        self.total += 1;
    }

    // The number of recorded values.
    pub fn count(&self) -> usize {
        self.total
    }

    // The number of unique recorded values.
    pub fn unique(&self) -> usize {
        self.values.len()
    }
}

impl<T: Eq + Hash + Ord + Copy> FrequencyDistribution<T> {
    /// The largest recorded value, if any values have been recorded.
    pub fn max(&self) -> Option<T> {
        self.values.keys().copied().max()
    }
}

impl<T> std::ops::AddAssign<&Self> for FrequencyDistribution<T>
where
    T: Eq + Hash + Clone,
{
    fn add_assign(&mut self, rhs: &Self) {
        for (value, count) in &rhs.values {
            *self.values.entry(value.clone()).or_default() += count;
        }
        self.total += rhs.total;
    }
}
