// -*- coding: utf-8 -*-
// ------------------------------------------------------------------------------------------------
// Copyright © 2021, object-graphs authors.
// Licensed under either of Apache License, Version 2.0, or MIT license, at your option.
// Please see the LICENSE-APACHE or LICENSE-MIT files in this distribution for license details.
// ------------------------------------------------------------------------------------------------

use object_graphs::arena::Handle;
use object_graphs::eval::EvalError;
use object_graphs::graph::Node;
use object_graphs::interp::Interp;
use object_graphs::lattice::Payload;
use object_graphs::lattice::Value;
use object_graphs::state::StateGraph;

struct Rig {
    interp: Interp,
    state: StateGraph,
}

impl Rig {
    fn new() -> Rig {
        let mut interp = Interp::new();
        let state = StateGraph::new(&mut interp.arena, &interp.classes);
        Rig { interp, state }
    }

    fn int(&mut self, value: i64) -> Handle<Node> {
        let value = self.interp.int(value);
        self.state
            .add_value(&mut self.interp.arena, &self.interp.classes, value)
    }

    fn string(&mut self, content: &str) -> Handle<Node> {
        let value = self.interp.string(content);
        self.state
            .add_value(&mut self.interp.arena, &self.interp.classes, value)
    }

    fn boolean(&mut self, value: bool) -> Handle<Node> {
        let value = self.interp.boolean(value);
        self.state
            .add_value(&mut self.interp.arena, &self.interp.classes, value)
    }

    fn invoke(&mut self, name: &str, args: &[Handle<Node>]) -> Result<Value, EvalError> {
        let name = self.interp.label(name);
        let node = self.interp.ops.invoke(
            &mut self.interp.arena,
            &self.interp.classes,
            &mut self.state,
            name,
            args,
        )?;
        Ok(self.state.value(node).expect("operators produce values"))
    }
}

#[test]
fn integer_arithmetic() {
    let mut rig = Rig::new();
    let seven = rig.int(7);
    let three = rig.int(3);
    assert_eq!(rig.invoke("add", &[seven, three]).unwrap().payload, Payload::Int(10));
    assert_eq!(rig.invoke("sub", &[seven, three]).unwrap().payload, Payload::Int(4));
    assert_eq!(rig.invoke("mul", &[seven, three]).unwrap().payload, Payload::Int(21));
    let minus_seven = rig.int(-7);
    assert_eq!(rig.invoke("neg", &[seven]).unwrap().payload, Payload::Int(-7));
    assert_eq!(rig.invoke("neg", &[minus_seven]).unwrap().payload, Payload::Int(7));
}

#[test]
fn division_and_modulus_floor() {
    let mut rig = Rig::new();
    let cases: &[(i64, i64, i64, i64)] = &[
        (7, 2, 3, 1),
        (-7, 2, -4, 1),
        (7, -2, -4, -1),
        (-7, -2, 3, -1),
        (210, 120, 1, 90),
    ];
    for &(x, y, quotient, remainder) in cases {
        let xn = rig.int(x);
        let yn = rig.int(y);
        assert_eq!(
            rig.invoke("div", &[xn, yn]).unwrap().payload,
            Payload::Int(quotient),
            "{} div {}",
            x,
            y
        );
        assert_eq!(
            rig.invoke("mod", &[xn, yn]).unwrap().payload,
            Payload::Int(remainder),
            "{} mod {}",
            x,
            y
        );
    }
}

#[test]
fn division_by_zero_is_a_dynamic_error() {
    let mut rig = Rig::new();
    let one = rig.int(1);
    let zero = rig.int(0);
    assert_eq!(
        rig.invoke("div", &[one, zero]),
        Err(EvalError::DivisionByZero)
    );
    assert_eq!(
        rig.invoke("mod", &[one, zero]),
        Err(EvalError::DivisionByZero)
    );
}

#[test]
fn string_operators() {
    let mut rig = Rig::new();
    let apple = rig.string("apple");
    let banana = rig.string("Banana");
    let cat = rig.invoke("cat", &[apple, banana]).unwrap();
    assert!(matches!(cat.payload, Payload::Str(_)));
    let rendered = cat.display(&rig.interp.arena).to_string();
    assert_eq!(rendered, "appleBanana");
    let lower = rig.invoke("lower", &[banana]).unwrap();
    assert_eq!(lower.display(&rig.interp.arena).to_string(), "banana");
    let upper = rig.invoke("upper", &[banana]).unwrap();
    assert_eq!(upper.display(&rig.interp.arena).to_string(), "BANANA");
}

#[test]
fn comparisons() {
    let mut rig = Rig::new();
    let two = rig.int(2);
    let three = rig.int(3);
    assert_eq!(rig.invoke("ilt", &[two, three]).unwrap().payload, Payload::Bool(true));
    assert_eq!(rig.invoke("ige", &[two, three]).unwrap().payload, Payload::Bool(false));
    assert_eq!(rig.invoke("ieq", &[two, two]).unwrap().payload, Payload::Bool(true));
    assert_eq!(rig.invoke("ine", &[two, two]).unwrap().payload, Payload::Bool(false));
    let apple = rig.string("apple");
    let banana = rig.string("banana");
    assert_eq!(rig.invoke("slt", &[apple, banana]).unwrap().payload, Payload::Bool(true));
    assert_eq!(rig.invoke("seq", &[apple, apple]).unwrap().payload, Payload::Bool(true));
    assert_eq!(rig.invoke("sge", &[apple, banana]).unwrap().payload, Payload::Bool(false));
}

#[test]
fn boolean_not() {
    let mut rig = Rig::new();
    let yes = rig.boolean(true);
    assert_eq!(rig.invoke("not", &[yes]).unwrap().payload, Payload::Bool(false));
}

#[test]
fn wrong_arity_is_rejected() {
    let mut rig = Rig::new();
    let one = rig.int(1);
    assert_eq!(rig.invoke("add", &[one]), Err(EvalError::OpArity));
    let missing = rig.interp.label("frobnicate");
    assert!(!rig.interp.ops.is_op(missing));
}
