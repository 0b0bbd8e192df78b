// -*- coding: utf-8 -*-
// ------------------------------------------------------------------------------------------------
// Copyright © 2021, object-graphs authors.
// Licensed under either of Apache License, Version 2.0, or MIT license, at your option.
// Please see the LICENSE-APACHE or LICENSE-MIT files in this distribution for license details.
// ------------------------------------------------------------------------------------------------

//! A finite map with a mirror-maintained inverse.
//!
//! The matching and union algorithms need O(1) lookup in both directions: "which state node did
//! this pattern node match?" and "is this state node already claimed?".  During union
//! construction a target can be the image of several sources (one per component pattern), so the
//! inverse is a value _list_; asking for a unique inverse fails loudly when the inverse is not a
//! singleton.
//!
//! The map is generic over source and target so that the same structure serves node-to-node
//! correspondences and the name-to-node reference maps built during pattern construction.

use std::hash::Hash;

use fxhash::FxHashMap;
use smallvec::SmallVec;
use thiserror::Error;

/// Errors raised by inverse lookups.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum BijectionError {
    #[error("the inverse image is not a singleton")]
    NonUniqueImage,
}

/// A finite map from `S` to `T` whose inverse is maintained in lockstep with every update.
#[derive(Clone)]
pub struct Bijection<S, T> {
    forward: FxHashMap<S, T>,
    inverse: FxHashMap<T, SmallVec<[S; 1]>>,
}

impl<S, T> Bijection<S, T>
where
    S: Copy + Eq + Hash,
    T: Copy + Eq + Hash,
{
    pub fn new() -> Bijection<S, T> {
        Bijection {
            forward: FxHashMap::default(),
            inverse: FxHashMap::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    /// Returns the image of a source, if it has been mapped.
    pub fn get(&self, source: S) -> Option<T> {
        self.forward.get(&source).copied()
    }

    pub fn contains(&self, source: S) -> bool {
        self.forward.contains_key(&source)
    }

    /// Maps `source` to `target`.  If `source` was already mapped, the old entry is removed from
    /// the inverse first, so the two directions never disagree.
    pub fn insert(&mut self, source: S, target: T) {
        if let Some(old) = self.forward.insert(source, target) {
            if let Some(sources) = self.inverse.get_mut(&old) {
                sources.retain(|s| *s != source);
                if sources.is_empty() {
                    self.inverse.remove(&old);
                }
            }
        }
        self.inverse.entry(target).or_default().push(source);
    }

    /// Returns whether any source maps to this target.
    pub fn has_image(&self, target: T) -> bool {
        self.inverse.contains_key(&target)
    }

    /// Returns all of the sources mapping to a target (empty when the target is not an image).
    pub fn sources(&self, target: T) -> &[S] {
        self.inverse
            .get(&target)
            .map(|sources| sources.as_slice())
            .unwrap_or(&[])
    }

    /// Returns the unique source mapping to a target; fails when the inverse is absent or shared.
    pub fn unique_source(&self, target: T) -> Result<S, BijectionError> {
        match self.sources(target) {
            [source] => Ok(*source),
            _ => Err(BijectionError::NonUniqueImage),
        }
    }

    /// Iterates over the `(source, target)` pairs of this map.
    pub fn iter(&self) -> impl Iterator<Item = (S, T)> + '_ {
        self.forward.iter().map(|(s, t)| (*s, *t))
    }

    /// Iterates over the distinct targets of this map.
    pub fn images(&self) -> impl Iterator<Item = T> + '_ {
        self.inverse.keys().copied()
    }

    /// Rewrites every entry whose target is `old` to point at `new` instead.  Pattern
    /// construction uses this to collapse a forward-reference placeholder onto its definition.
    pub fn replace_image(&mut self, old: T, new: T) {
        if let Some(sources) = self.inverse.remove(&old) {
            for source in &sources {
                self.forward.insert(*source, new);
            }
            self.inverse.entry(new).or_default().extend(sources);
        }
    }
}

impl<S, T> Default for Bijection<S, T>
where
    S: Copy + Eq + Hash,
    T: Copy + Eq + Hash,
{
    fn default() -> Bijection<S, T> {
        Bijection::new()
    }
}
