// -*- coding: utf-8 -*-
// ------------------------------------------------------------------------------------------------
// Copyright © 2021, object-graphs authors.
// Licensed under either of Apache License, Version 2.0, or MIT license, at your option.
// Please see the LICENSE-APACHE or LICENSE-MIT files in this distribution for license details.
// ------------------------------------------------------------------------------------------------

use object_graphs::arena::Arena;
use object_graphs::arena::HandleSet;
use object_graphs::arena::SupplementalArena;

#[test]
fn can_allocate_in_arena() {
    let mut arena = Arena::new();
    let hello1 = arena.add("hello".to_string());
    let hello2 = arena.add("hello".to_string());
    let there = arena.add("there".to_string());
    // Instances are not deduplicated: same content, distinct handles.
    assert_ne!(hello1, hello2);
    assert_ne!(hello1, there);
    assert_eq!(arena.get(hello1), arena.get(hello2));
    assert_ne!(arena.get(hello1), arena.get(there));
    assert_eq!(arena.len(), 3);
}

#[test]
fn can_iterate_arena_handles() {
    let mut arena = Arena::new();
    let a = arena.add(1u32);
    let b = arena.add(2u32);
    let c = arena.add(3u32);
    let handles: Vec<_> = arena.iter_handles().collect();
    assert_eq!(handles, vec![a, b, c]);
}

#[test]
fn can_store_supplemental_data() {
    let mut arena = Arena::<u32>::new();
    let h1 = arena.add(1);
    let h2 = arena.add(2);
    let h3 = arena.add(3);
    let mut supplemental = SupplementalArena::<u32, String>::new();
    assert_eq!(supplemental.get(h1), None);
    assert_eq!(supplemental.get(h2), None);
    supplemental.set(h2, "hiya".to_string());
    assert_eq!(supplemental.get(h2).map(String::as_str), Some("hiya"));
    assert_eq!(supplemental.get(h3), None);
    // Entries can be removed again, which is what GC retention relies on.
    assert_eq!(supplemental.remove(h2), Some("hiya".to_string()));
    assert_eq!(supplemental.get(h2), None);
}

#[test]
fn supplemental_index_creates_defaults() {
    let mut arena = Arena::<u32>::new();
    let h1 = arena.add(1);
    let mut supplemental = SupplementalArena::<u32, String>::new();
    supplemental[h1].push_str("hello");
    assert_eq!(supplemental.get(h1).map(String::as_str), Some("hello"));
}

#[test]
fn can_manipulate_handle_sets() {
    let mut arena = Arena::<u32>::new();
    let h1 = arena.add(1);
    let h2 = arena.add(2);
    let h3 = arena.add(3);
    let mut set = HandleSet::new();
    assert!(set.is_empty());
    set.add(h1);
    set.add(h3);
    assert!(set.contains(h1));
    assert!(!set.contains(h2));
    assert!(set.contains(h3));
    assert_eq!(set.len(), 2);
    let members: Vec<_> = set.iter().collect();
    assert_eq!(members, vec![h1, h3]);
    set.remove(h3);
    assert!(!set.contains(h3));
    assert_eq!(set.len(), 1);
}
