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
use object_graphs::lattice::lazy_type;
use object_graphs::lattice::Cla;
use object_graphs::lattice::LatticeError;
use object_graphs::lattice::Ty;
use object_graphs::lattice::Value;
use object_graphs::lattice::ValueSet;

// The A/B/C/D diamond: B and C extend A, D extends both.
fn diamond(interp: &mut Interp) -> Result<[Handle<Cla>; 4]> {
    let int = interp.classes.int_type();
    let str_ = interp.classes.str_type();
    let a = interp.new_class(
        "A",
        &[],
        &[("a1", attr_type(int)), ("a2", attr_type(str_))],
    )?;
    let b = interp.new_class(
        "B",
        &[a],
        &[("b1", attr_type(int)), ("b2", attr_type(str_))],
    )?;
    let c = interp.new_class(
        "C",
        &[a],
        &[("c1", attr_type(int)), ("c2", attr_type(str_))],
    )?;
    let d = interp.new_class(
        "D",
        &[b, c],
        &[("d1", attr_type(int)), ("d2", attr_type(str_))],
    )?;
    Ok([a, b, c, d])
}

#[test]
fn subtype_is_reflexive_and_transitive() -> Result<()> {
    let mut interp = Interp::new();
    let [a, b, _, d] = diamond(&mut interp)?;
    for cla in [a, b, d] {
        assert!(interp.classes.cla_le(cla, cla));
    }
    assert!(interp.classes.cla_le(d, b));
    assert!(interp.classes.cla_le(b, a));
    assert!(interp.classes.cla_le(d, a));
    assert!(!interp.classes.cla_le(a, d));
    Ok(())
}

#[test]
fn anonymous_intersection_sits_below_its_parts() -> Result<()> {
    let mut interp = Interp::new();
    let [a, b, c, d] = diamond(&mut interp)?;
    let e = interp.classes.inter(&[b, c])?;
    assert!(interp.classes.cla_le(e, a));
    assert!(interp.classes.cla_le(e, b));
    assert!(interp.classes.cla_le(e, c));
    // D carries every ancestor of E, but E is not a D.
    assert!(interp.classes.cla_le(d, e));
    assert!(!interp.classes.cla_le(e, d));
    // The intersection collects the attributes of both parts.
    let b1 = interp.label("b1");
    let c1 = interp.label("c1");
    let a1 = interp.label("a1");
    assert!(interp.classes[e].has_attr(b1));
    assert!(interp.classes[e].has_attr(c1));
    assert!(interp.classes[e].has_attr(a1));
    Ok(())
}

#[test]
fn anonymous_union_sits_above_its_parts() -> Result<()> {
    let mut interp = Interp::new();
    let [a, b, c, _] = diamond(&mut interp)?;
    let f = interp.classes.union(&[b, c]);
    assert!(interp.classes.cla_le(b, f));
    assert!(interp.classes.cla_le(c, f));
    // B and C have only A's ancestors and attributes in common, so the union is structurally A.
    assert!(interp.classes.cla_le(f, a));
    assert!(interp.classes.cla_le(a, f));
    assert!(interp.classes.cla_eq(a, f));
    let a1 = interp.label("a1");
    let b1 = interp.label("b1");
    assert!(interp.classes[f].has_attr(a1));
    assert!(!interp.classes[f].has_attr(b1));
    Ok(())
}

#[test]
fn classes_render_with_their_ancestry() -> Result<()> {
    let mut interp = Interp::new();
    let [_, b, _, _] = diamond(&mut interp)?;
    let rendered = b.display(&interp.classes, &interp.arena).to_string();
    assert_eq!(rendered, "class B <: A B");
    Ok(())
}

#[test]
fn everything_is_below_the_top_class() -> Result<()> {
    let mut interp = Interp::new();
    let [a, _, _, d] = diamond(&mut interp)?;
    let top = interp.classes.no_type();
    assert!(interp.classes.cla_le(a, top));
    assert!(interp.classes.cla_le(d, top));
    assert!(interp.classes.cla_le(interp.classes.int_type(), top));
    Ok(())
}

#[test]
fn null_is_below_everything() -> Result<()> {
    let mut interp = Interp::new();
    let [a, _, _, _] = diamond(&mut interp)?;
    let null = Ty::Class(interp.classes.null_type());
    assert!(interp.classes.subtype(&null, &Ty::Class(a)));
    assert!(interp
        .classes
        .subtype(&null, &Ty::Class(interp.classes.int_type())));
    let ones = Ty::Values(ValueSet::singleton(interp.int(1)));
    assert!(interp.classes.subtype(&null, &ones));
    Ok(())
}

#[test]
fn duplicate_tags_are_rejected() -> Result<()> {
    let mut interp = Interp::new();
    interp.new_class("A", &[], &[])?;
    assert_eq!(
        interp.new_class("A", &[], &[]),
        Err(LatticeError::DuplicateClass)
    );
    Ok(())
}

#[test]
fn conflicting_inherited_attributes_are_rejected() -> Result<()> {
    let mut interp = Interp::new();
    let int = interp.classes.int_type();
    let str_ = interp.classes.str_type();
    let a = interp.new_class("A", &[], &[("x", attr_type(int))])?;
    let b = interp.new_class("B", &[], &[("x", attr_type(str_))])?;
    assert_eq!(
        interp.classes.inter(&[a, b]),
        Err(LatticeError::AttrTypeConflict)
    );
    Ok(())
}

#[test]
fn lazy_attributes_resolve_through_the_registry() -> Result<()> {
    let mut interp = Interp::new();
    let int = interp.classes.int_type();
    let t_tag = interp.label("T");
    let t = interp.new_class(
        "T",
        &[],
        &[
            ("e", attr_type(int)),
            ("l", lazy_type(t_tag)),
            ("r", lazy_type(t_tag)),
        ],
    )?;
    interp.classes.resolve_lazy(t)?;
    let l = interp.label("l");
    let resolved = interp.classes[t].attr(l).and_then(|attr| attr.left());
    assert_eq!(resolved, Some(t));
    Ok(())
}

#[test]
fn unresolved_lazy_tags_are_an_error() -> Result<()> {
    let mut interp = Interp::new();
    let missing = interp.label("Missing");
    let t = interp.new_class("T", &[], &[("x", lazy_type(missing))])?;
    assert_eq!(
        interp.classes.resolve_lazy(t),
        Err(LatticeError::UndefinedClass)
    );
    Ok(())
}

fn int_set(interp: &Interp, values: impl IntoIterator<Item = i64>) -> ValueSet {
    ValueSet::new(values.into_iter().map(|i| interp.int(i)).collect::<Vec<Value>>())
}

#[test]
fn value_sets_refine_by_subset() {
    let interp = Interp::new();
    let small = Ty::Values(int_set(&interp, [1, 2]));
    let digits = Ty::Values(int_set(&interp, 0..10));
    let with_ten = Ty::Values(int_set(&interp, [1, 2, 10]));
    assert!(interp.classes.subtype(&small, &digits));
    assert!(!interp.classes.subtype(&with_ten, &digits));
    // A value set is below its base primitive class.
    let int = Ty::Class(interp.classes.int_type());
    assert!(interp.classes.subtype(&digits, &int));
    // But not below an unrelated primitive class.
    let str_ = Ty::Class(interp.classes.str_type());
    assert!(!interp.classes.subtype(&digits, &str_));
}

#[test]
fn min_type_picks_the_lower_type() -> Result<()> {
    let mut interp = Interp::new();
    let [a, b, _, _] = diamond(&mut interp)?;
    let lower = interp.classes.min_type(&Ty::Class(a), &Ty::Class(b))?;
    assert!(interp.classes.ty_eq(&lower, &Ty::Class(b)));
    let int = Ty::Class(interp.classes.int_type());
    let str_ = Ty::Class(interp.classes.str_type());
    assert_eq!(
        interp.classes.min_type(&int, &str_).err(),
        Some(LatticeError::MinType)
    );
    Ok(())
}

#[test]
fn ty_inf_unions_value_sets() -> Result<()> {
    let mut interp = Interp::new();
    let ones = Ty::Values(int_set(&interp, [1]));
    let twos = Ty::Values(int_set(&interp, [2]));
    let int = Ty::Class(interp.classes.int_type());
    let inf = interp.classes.ty_inf(&[ones, twos, int])?;
    match inf {
        Ty::Values(vs) => assert_eq!(vs, int_set(&interp, [1, 2])),
        Ty::Class(_) => panic!("expected a value set"),
    }
    Ok(())
}

#[test]
fn ty_sup_intersects_value_sets() -> Result<()> {
    let mut interp = Interp::new();
    let some = Ty::Values(int_set(&interp, [1, 2, 3]));
    let others = Ty::Values(int_set(&interp, [2, 3, 4]));
    let sup = interp.classes.ty_sup(&[some, others])?;
    match sup {
        Ty::Values(vs) => assert_eq!(vs, int_set(&interp, [2, 3])),
        Ty::Class(_) => panic!("expected a value set"),
    }
    Ok(())
}

#[test]
fn ty_inf_of_classes_is_their_intersection() -> Result<()> {
    let mut interp = Interp::new();
    let [_, b, c, d] = diamond(&mut interp)?;
    let inf = interp
        .classes
        .ty_inf(&[Ty::Class(b), Ty::Class(c)])?;
    let e = inf.as_class().expect("expected a class");
    assert!(interp.classes.cla_le(d, e));
    assert!(interp.classes.cla_le(e, b));
    assert!(interp.classes.cla_le(e, c));
    Ok(())
}

#[test]
fn reset_restores_a_pristine_registry() -> Result<()> {
    let mut interp = Interp::new();
    interp.new_class("A", &[], &[])?;
    assert!(interp.new_class("A", &[], &[]).is_err());
    interp.reset();
    // The tag is free again after a reset.
    assert!(interp.new_class("A", &[], &[]).is_ok());
    Ok(())
}
