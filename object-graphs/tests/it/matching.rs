// -*- coding: utf-8 -*-
// ------------------------------------------------------------------------------------------------
// Copyright © 2021, object-graphs authors.
// Licensed under either of Apache License, Version 2.0, or MIT license, at your option.
// Please see the LICENSE-APACHE or LICENSE-MIT files in this distribution for license details.
// ------------------------------------------------------------------------------------------------

use anyhow::Result;
use object_graphs::arena::Handle;
use object_graphs::interp::Interp;
use object_graphs::lattice::attr_type;
use object_graphs::lattice::Cla;
use object_graphs::lattice::ClassRegistry;
use object_graphs::lattice::Ty;
use object_graphs::matching::conjoin;
use object_graphs::matching::disjoin;
use object_graphs::matching::match_graphs;
use object_graphs::matching::union_graphs;
use object_graphs::matching::MatchError;
use object_graphs::pattern::build_pattern_graph;
use object_graphs::pattern::Pattern;
use object_graphs::pattern::PatternGraph;

fn subtype_match(
    registry: &ClassRegistry,
    pattern: &PatternGraph,
    subject: &PatternGraph,
) -> Result<object_graphs::pattern::NodeMap, MatchError> {
    match_graphs(pattern, subject, |actual, required| {
        registry.subtype(actual, required)
    })
}

struct Fixture {
    a: Handle<Cla>,
    b: Handle<Cla>,
    x: Handle<object_graphs::graph::Label>,
    y: Handle<object_graphs::graph::Label>,
}

// A with attributes x, y of the top class; B extends A with z.
fn fixture(interp: &mut Interp) -> Result<Fixture> {
    let top = interp.classes.no_type();
    let a = interp.new_class("A", &[], &[("x", attr_type(top)), ("y", attr_type(top))])?;
    let b = interp.new_class("B", &[a], &[("z", attr_type(top))])?;
    Ok(Fixture {
        a,
        b,
        x: interp.label("x"),
        y: interp.label("y"),
    })
}

#[test]
fn matching_ignores_extra_subject_structure() -> Result<()> {
    let mut interp = Interp::new();
    let fx = fixture(&mut interp)?;
    let z = interp.label("z");
    // The pattern demands only x; the subject also has y and z, and a more specific class.
    let pattern = Pattern::Class(fx.a, vec![(fx.x, Pattern::Class(fx.a, vec![]))]);
    let subject = Pattern::Class(
        fx.b,
        vec![
            (fx.x, Pattern::Class(fx.b, vec![])),
            (fx.y, Pattern::Class(fx.a, vec![])),
            (z, Pattern::Class(fx.a, vec![])),
        ],
    );
    let (pattern, _) = build_pattern_graph(&mut interp.arena, &pattern)?;
    let (subject, _) = build_pattern_graph(&mut interp.arena, &subject)?;
    let mapping = subtype_match(&interp.classes, &pattern, &subject)?;
    assert_eq!(mapping.len(), 2);
    assert_eq!(mapping.get(pattern.root()), Some(subject.root()));
    Ok(())
}

#[test]
fn matching_fails_on_a_missing_label() -> Result<()> {
    let mut interp = Interp::new();
    let fx = fixture(&mut interp)?;
    let pattern = Pattern::Class(fx.a, vec![(fx.y, Pattern::Class(fx.a, vec![]))]);
    let subject = Pattern::Class(fx.a, vec![(fx.x, Pattern::Class(fx.a, vec![]))]);
    let (pattern, _) = build_pattern_graph(&mut interp.arena, &pattern)?;
    let (subject, _) = build_pattern_graph(&mut interp.arena, &subject)?;
    assert_eq!(
        subtype_match(&interp.classes, &pattern, &subject).err(),
        Some(MatchError::Mismatch)
    );
    Ok(())
}

#[test]
fn matching_fails_on_a_supertype_subject() -> Result<()> {
    let mut interp = Interp::new();
    let fx = fixture(&mut interp)?;
    // The pattern demands a B; an A subject is not specific enough.
    let pattern = Pattern::Class(fx.b, vec![]);
    let subject = Pattern::Class(fx.a, vec![]);
    let (pattern, _) = build_pattern_graph(&mut interp.arena, &pattern)?;
    let (subject, _) = build_pattern_graph(&mut interp.arena, &subject)?;
    assert_eq!(
        subtype_match(&interp.classes, &pattern, &subject).err(),
        Some(MatchError::Mismatch)
    );
    Ok(())
}

#[test]
fn shared_pattern_nodes_demand_shared_subject_nodes() -> Result<()> {
    let mut interp = Interp::new();
    let fx = fixture(&mut interp)?;
    let n = interp.label("n");
    // x and y lead to the same pattern node...
    let shared = Pattern::Class(
        fx.a,
        vec![
            (fx.x, Pattern::labeled(n, Pattern::Class(fx.a, vec![]))),
            (fx.y, Pattern::Ref(n)),
        ],
    );
    // ...but to two distinct subject nodes.
    let distinct = Pattern::Class(
        fx.a,
        vec![
            (fx.x, Pattern::Class(fx.a, vec![])),
            (fx.y, Pattern::Class(fx.a, vec![])),
        ],
    );
    let (shared, _) = build_pattern_graph(&mut interp.arena, &shared)?;
    let (distinct, _) = build_pattern_graph(&mut interp.arena, &distinct)?;
    assert_eq!(
        subtype_match(&interp.classes, &shared, &distinct).err(),
        Some(MatchError::Mismatch)
    );
    // The other way round fails too: two pattern nodes may not claim one subject node.
    assert_eq!(
        subtype_match(&interp.classes, &distinct, &shared).err(),
        Some(MatchError::Mismatch)
    );
    // And a shared subject satisfies a shared pattern.
    assert!(subtype_match(&interp.classes, &shared, &shared).is_ok());
    Ok(())
}

#[test]
fn union_identifies_same_label_children() -> Result<()> {
    let mut interp = Interp::new();
    let fx = fixture(&mut interp)?;
    let p1 = Pattern::Class(fx.a, vec![(fx.x, Pattern::Class(fx.a, vec![]))]);
    let p2 = Pattern::Class(fx.b, vec![(fx.x, Pattern::Class(fx.b, vec![]))]);
    let (p1, _) = build_pattern_graph(&mut interp.arena, &p1)?;
    let (p2, _) = build_pattern_graph(&mut interp.arena, &p2)?;
    let (union, maps) = union_graphs(&mut interp.arena, &[&p1.layout, &p2.layout])?;
    // Two union nodes: the shared root and the shared x child.
    assert_eq!(union.node_count(), 2);
    let root = union.root();
    assert_eq!(maps[0].get(p1.root()), Some(root));
    assert_eq!(maps[1].get(p2.root()), Some(root));
    let child = union.target(root, fx.x).expect("x edge exists");
    let c1 = p1.layout.target(p1.root(), fx.x).expect("edge");
    assert_eq!(maps[0].get(c1), Some(child));
    Ok(())
}

#[test]
fn union_rejects_contradictory_sharing() -> Result<()> {
    let mut interp = Interp::new();
    let fx = fixture(&mut interp)?;
    let n = interp.label("n");
    // P1 identifies its x and y children; P2 keeps them distinct.  Unioning forces P2's two
    // distinct nodes onto one union node, which would break injectivity.
    let shares = Pattern::Class(
        fx.a,
        vec![
            (fx.x, Pattern::labeled(n, Pattern::Class(fx.a, vec![]))),
            (fx.y, Pattern::Ref(n)),
        ],
    );
    let distinct = Pattern::Class(
        fx.a,
        vec![
            (fx.x, Pattern::Class(fx.a, vec![])),
            (fx.y, Pattern::Class(fx.a, vec![])),
        ],
    );
    let (shares, _) = build_pattern_graph(&mut interp.arena, &shares)?;
    let (distinct, _) = build_pattern_graph(&mut interp.arena, &distinct)?;
    assert_eq!(
        union_graphs(&mut interp.arena, &[&shares.layout, &distinct.layout]).err(),
        Some(MatchError::NoUnion)
    );
    Ok(())
}

#[test]
fn union_accepts_consistent_sharing() -> Result<()> {
    let mut interp = Interp::new();
    let fx = fixture(&mut interp)?;
    let n = interp.label("n");
    let m = interp.label("m");
    let p1 = Pattern::Class(
        fx.a,
        vec![
            (fx.x, Pattern::labeled(n, Pattern::Class(fx.a, vec![]))),
            (fx.y, Pattern::Ref(n)),
        ],
    );
    let p2 = Pattern::Class(
        fx.a,
        vec![
            (fx.x, Pattern::labeled(m, Pattern::Class(fx.b, vec![]))),
            (fx.y, Pattern::Ref(m)),
        ],
    );
    let (p1, _) = build_pattern_graph(&mut interp.arena, &p1)?;
    let (p2, _) = build_pattern_graph(&mut interp.arena, &p2)?;
    let (union, _) = union_graphs(&mut interp.arena, &[&p1.layout, &p2.layout])?;
    // Root plus the one shared child.
    assert_eq!(union.node_count(), 2);
    let child_by_x = union.target(union.root(), fx.x);
    let child_by_y = union.target(union.root(), fx.y);
    assert_eq!(child_by_x, child_by_y);
    Ok(())
}

#[test]
fn conjoin_reconciles_types_downward() -> Result<()> {
    let mut interp = Interp::new();
    let fx = fixture(&mut interp)?;
    let p1 = Pattern::Class(fx.a, vec![(fx.x, Pattern::Class(fx.a, vec![]))]);
    let p2 = Pattern::Class(fx.b, vec![(fx.x, Pattern::Class(fx.b, vec![]))]);
    let (p1, _) = build_pattern_graph(&mut interp.arena, &p1)?;
    let (p2, _) = build_pattern_graph(&mut interp.arena, &p2)?;
    let (union, _maps) = {
        let (arena, classes) = (&mut interp.arena, &mut interp.classes);
        conjoin(arena, classes, &[&p1, &p2])?
    };
    // A ∧ B at the root: the infimum is structurally B (B already carries all of A).
    let root_ty = union.ty(union.root()).expect("root is typed");
    let root_cla = root_ty.as_class().expect("class type");
    assert!(interp.classes.cla_le(root_cla, fx.a));
    assert!(interp.classes.cla_le(root_cla, fx.b));
    assert!(interp.classes.cla_eq(root_cla, fx.b));
    Ok(())
}

#[test]
fn conjoin_rejects_incompatible_value_types() -> Result<()> {
    let mut interp = Interp::new();
    let int = interp.classes.int_type();
    let str_ = interp.classes.str_type();
    let top = interp.classes.no_type();
    let a = interp.new_class("A", &[], &[("x", attr_type(top))])?;
    let x = interp.label("x");
    let p1 = Pattern::Class(a, vec![(x, Pattern::Class(int, vec![]))]);
    let p2 = Pattern::Class(a, vec![(x, Pattern::Class(str_, vec![]))]);
    let (p1, _) = build_pattern_graph(&mut interp.arena, &p1)?;
    let (p2, _) = build_pattern_graph(&mut interp.arena, &p2)?;
    let result = {
        let (arena, classes) = (&mut interp.arena, &mut interp.classes);
        conjoin(arena, classes, &[&p1, &p2])
    };
    assert!(matches!(result, Err(MatchError::NoConj)));
    Ok(())
}

#[test]
fn disjoin_keeps_only_common_structure() -> Result<()> {
    let mut interp = Interp::new();
    let fx = fixture(&mut interp)?;
    let z = interp.label("z");
    // x is common; y and z are each private to one alternative.
    let p1 = Pattern::Class(
        fx.a,
        vec![
            (fx.x, Pattern::Class(fx.a, vec![])),
            (fx.y, Pattern::Class(fx.a, vec![])),
        ],
    );
    let p2 = Pattern::Class(
        fx.b,
        vec![
            (fx.x, Pattern::Class(fx.b, vec![])),
            (z, Pattern::Class(fx.b, vec![])),
        ],
    );
    let (p1, _) = build_pattern_graph(&mut interp.arena, &p1)?;
    let (p2, _) = build_pattern_graph(&mut interp.arena, &p2)?;
    let (maps, types) = {
        let (arena, classes) = (&mut interp.arena, &mut interp.classes);
        disjoin(arena, classes, &[&p1, &p2])?
    };
    // The co-domain has a node for the root and for x, but none for y or z.
    let y1 = p1.layout.target(p1.root(), fx.y).expect("edge");
    assert_eq!(maps[0].get(y1), None);
    let z2 = p2.layout.target(p2.root(), z).expect("edge");
    assert_eq!(maps[1].get(z2), None);
    // The root's disjoined type is A ∨ B, which is structurally A.
    let root = maps[0].get(p1.root()).expect("root is mapped");
    let root_cla = types
        .get(&root)
        .and_then(Ty::as_class)
        .expect("class type");
    assert!(interp.classes.cla_eq(root_cla, fx.a));
    Ok(())
}
