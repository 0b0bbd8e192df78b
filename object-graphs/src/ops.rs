// -*- coding: utf-8 -*-
// ------------------------------------------------------------------------------------------------
// Copyright © 2021, object-graphs authors.
// Licensed under either of Apache License, Version 2.0, or MIT license, at your option.
// Please see the LICENSE-APACHE or LICENSE-MIT files in this distribution for license details.
// ------------------------------------------------------------------------------------------------

//! The table of primitive operators.
//!
//! Operators are a static registry keyed by interned label; each entry is an immutable
//! [`OpDef`][]: the parameter types the checker enforces, the result type, and the function the
//! evaluator invokes.  Every operator reads primitive values off its argument nodes and
//! allocates a fresh primitive node for its result.  Three fixed result classes (INT, STR, BOOL)
//! cover the whole built-in set; there are no user-defined operators.
//!
//! `div` and `mod` are floor division and modulus: the quotient rounds toward negative infinity
//! and the remainder's sign follows the divisor.
//!
//! [`OpDef`]: struct.OpDef.html

use fxhash::FxHashMap;
use smallvec::SmallVec;

use crate::arena::Handle;
use crate::eval::EvalError;
use crate::graph::GraphArena;
use crate::graph::Label;
use crate::graph::Node;
use crate::lattice::Cla;
use crate::lattice::ClassRegistry;
use crate::lattice::Payload;
use crate::lattice::Value;
use crate::state::StateGraph;

/// The implementation of an operator: reads values off the argument nodes, allocates the result
/// node.
pub type OpFn = fn(
    &mut GraphArena,
    &ClassRegistry,
    &mut StateGraph,
    &[Handle<Node>],
) -> Result<Handle<Node>, EvalError>;

/// One operator: its name, parameter types, result type, and implementation.
pub struct OpDef {
    pub name: Handle<Label>,
    pub par_types: SmallVec<[Handle<Cla>; 2]>,
    pub res_type: Handle<Cla>,
    pub f: OpFn,
}

/// The operator registry of one interpreter instance.
pub struct OpTable {
    ops: FxHashMap<Handle<Label>, OpDef>,
}

impl OpTable {
    pub fn new(arena: &mut GraphArena, registry: &ClassRegistry) -> OpTable {
        let int = registry.int_type();
        let str_ = registry.str_type();
        let bool_ = registry.bool_type();
        let mut table = OpTable {
            ops: FxHashMap::default(),
        };
        let mut add = |arena: &mut GraphArena, name: &str, pars: &[Handle<Cla>], res, f| {
            let name = arena.add_label(name);
            table.ops.insert(
                name,
                OpDef {
                    name,
                    par_types: pars.iter().copied().collect(),
                    res_type: res,
                    f,
                },
            );
        };
        add(arena, "add", &[int, int], int, op_add as OpFn);
        add(arena, "sub", &[int, int], int, op_sub);
        add(arena, "mul", &[int, int], int, op_mul);
        add(arena, "div", &[int, int], int, op_div);
        add(arena, "mod", &[int, int], int, op_mod);
        add(arena, "neg", &[int], int, op_neg);
        add(arena, "not", &[bool_], bool_, op_not);
        add(arena, "cat", &[str_, str_], str_, op_cat);
        add(arena, "lower", &[str_], str_, op_lower);
        add(arena, "upper", &[str_], str_, op_upper);
        add(arena, "ieq", &[int, int], bool_, op_ieq);
        add(arena, "ine", &[int, int], bool_, op_ine);
        add(arena, "ilt", &[int, int], bool_, op_ilt);
        add(arena, "ile", &[int, int], bool_, op_ile);
        add(arena, "igt", &[int, int], bool_, op_igt);
        add(arena, "ige", &[int, int], bool_, op_ige);
        add(arena, "seq", &[str_, str_], bool_, op_seq);
        add(arena, "sne", &[str_, str_], bool_, op_sne);
        add(arena, "slt", &[str_, str_], bool_, op_slt);
        add(arena, "sle", &[str_, str_], bool_, op_sle);
        add(arena, "sgt", &[str_, str_], bool_, op_sgt);
        add(arena, "sge", &[str_, str_], bool_, op_sge);
        table
    }

    pub fn is_op(&self, name: Handle<Label>) -> bool {
        self.ops.contains_key(&name)
    }

    pub fn get(&self, name: Handle<Label>) -> Option<&OpDef> {
        self.ops.get(&name)
    }

    pub fn invoke(
        &self,
        arena: &mut GraphArena,
        registry: &ClassRegistry,
        state: &mut StateGraph,
        name: Handle<Label>,
        args: &[Handle<Node>],
    ) -> Result<Handle<Node>, EvalError> {
        let def = self.ops.get(&name).ok_or(EvalError::UnknownOp)?;
        (def.f)(arena, registry, state, args)
    }
}

//-------------------------------------------------------------------------------------------------
// Implementations

fn value_of(state: &StateGraph, node: Handle<Node>) -> Result<Value, EvalError> {
    state.value(node).ok_or(EvalError::MissingValue)
}

fn int_of(value: Value) -> Result<i64, EvalError> {
    match value.payload {
        Payload::Int(i) => Ok(i),
        _ => Err(EvalError::MissingValue),
    }
}

fn bool_of(value: Value) -> Result<bool, EvalError> {
    match value.payload {
        Payload::Bool(b) => Ok(b),
        _ => Err(EvalError::MissingValue),
    }
}

fn str_of<'a>(arena: &'a GraphArena, value: Value) -> Result<&'a str, EvalError> {
    match value.payload {
        Payload::Str(s) => Ok(&arena[s]),
        _ => Err(EvalError::MissingValue),
    }
}

fn unary_arg(args: &[Handle<Node>]) -> Result<Handle<Node>, EvalError> {
    match args {
        [x] => Ok(*x),
        _ => Err(EvalError::OpArity),
    }
}

fn binary_args(args: &[Handle<Node>]) -> Result<(Handle<Node>, Handle<Node>), EvalError> {
    match args {
        [x, y] => Ok((*x, *y)),
        _ => Err(EvalError::OpArity),
    }
}

// Floor division: the quotient rounds toward negative infinity.
fn floor_div(x: i64, y: i64) -> Result<i64, EvalError> {
    if y == 0 {
        return Err(EvalError::DivisionByZero);
    }
    let q = x / y;
    let r = x % y;
    Ok(if r != 0 && (r < 0) != (y < 0) { q - 1 } else { q })
}

// Floor modulus: the remainder's sign follows the divisor.
fn floor_mod(x: i64, y: i64) -> Result<i64, EvalError> {
    if y == 0 {
        return Err(EvalError::DivisionByZero);
    }
    let r = x % y;
    Ok(if r != 0 && (r < 0) != (y < 0) { r + y } else { r })
}

fn int_binary(
    arena: &mut GraphArena,
    registry: &ClassRegistry,
    state: &mut StateGraph,
    args: &[Handle<Node>],
    f: impl Fn(i64, i64) -> Result<i64, EvalError>,
) -> Result<Handle<Node>, EvalError> {
    let (x, y) = binary_args(args)?;
    let x = int_of(value_of(state, x)?)?;
    let y = int_of(value_of(state, y)?)?;
    let result = registry.int_value(f(x, y)?);
    Ok(state.add_value(arena, registry, result))
}

fn int_compare(
    arena: &mut GraphArena,
    registry: &ClassRegistry,
    state: &mut StateGraph,
    args: &[Handle<Node>],
    f: impl Fn(i64, i64) -> bool,
) -> Result<Handle<Node>, EvalError> {
    let (x, y) = binary_args(args)?;
    let x = int_of(value_of(state, x)?)?;
    let y = int_of(value_of(state, y)?)?;
    let result = registry.bool_value(f(x, y));
    Ok(state.add_value(arena, registry, result))
}

fn str_compare(
    arena: &mut GraphArena,
    registry: &ClassRegistry,
    state: &mut StateGraph,
    args: &[Handle<Node>],
    f: impl Fn(&str, &str) -> bool,
) -> Result<Handle<Node>, EvalError> {
    let (x, y) = binary_args(args)?;
    let x = value_of(state, x)?;
    let y = value_of(state, y)?;
    let result = registry.bool_value(f(str_of(arena, x)?, str_of(arena, y)?));
    Ok(state.add_value(arena, registry, result))
}

fn str_unary(
    arena: &mut GraphArena,
    registry: &ClassRegistry,
    state: &mut StateGraph,
    args: &[Handle<Node>],
    f: impl Fn(&str) -> String,
) -> Result<Handle<Node>, EvalError> {
    let x = value_of(state, unary_arg(args)?)?;
    let result = f(str_of(arena, x)?);
    let result = registry.str_value(arena.add_text(&result));
    Ok(state.add_value(arena, registry, result))
}

fn op_add(
    arena: &mut GraphArena,
    registry: &ClassRegistry,
    state: &mut StateGraph,
    args: &[Handle<Node>],
) -> Result<Handle<Node>, EvalError> {
    int_binary(arena, registry, state, args, |x, y| Ok(x.wrapping_add(y)))
}

fn op_sub(
    arena: &mut GraphArena,
    registry: &ClassRegistry,
    state: &mut StateGraph,
    args: &[Handle<Node>],
) -> Result<Handle<Node>, EvalError> {
    int_binary(arena, registry, state, args, |x, y| Ok(x.wrapping_sub(y)))
}

fn op_mul(
    arena: &mut GraphArena,
    registry: &ClassRegistry,
    state: &mut StateGraph,
    args: &[Handle<Node>],
) -> Result<Handle<Node>, EvalError> {
    int_binary(arena, registry, state, args, |x, y| Ok(x.wrapping_mul(y)))
}

fn op_div(
    arena: &mut GraphArena,
    registry: &ClassRegistry,
    state: &mut StateGraph,
    args: &[Handle<Node>],
) -> Result<Handle<Node>, EvalError> {
    int_binary(arena, registry, state, args, floor_div)
}

fn op_mod(
    arena: &mut GraphArena,
    registry: &ClassRegistry,
    state: &mut StateGraph,
    args: &[Handle<Node>],
) -> Result<Handle<Node>, EvalError> {
    int_binary(arena, registry, state, args, floor_mod)
}

fn op_neg(
    arena: &mut GraphArena,
    registry: &ClassRegistry,
    state: &mut StateGraph,
    args: &[Handle<Node>],
) -> Result<Handle<Node>, EvalError> {
    let x = int_of(value_of(state, unary_arg(args)?)?)?;
    let result = registry.int_value(x.wrapping_neg());
    Ok(state.add_value(arena, registry, result))
}

fn op_not(
    arena: &mut GraphArena,
    registry: &ClassRegistry,
    state: &mut StateGraph,
    args: &[Handle<Node>],
) -> Result<Handle<Node>, EvalError> {
    let x = bool_of(value_of(state, unary_arg(args)?)?)?;
    let result = registry.bool_value(!x);
    Ok(state.add_value(arena, registry, result))
}

fn op_cat(
    arena: &mut GraphArena,
    registry: &ClassRegistry,
    state: &mut StateGraph,
    args: &[Handle<Node>],
) -> Result<Handle<Node>, EvalError> {
    let (x, y) = binary_args(args)?;
    let x = value_of(state, x)?;
    let y = value_of(state, y)?;
    let result = format!("{}{}", str_of(arena, x)?, str_of(arena, y)?);
    let result = registry.str_value(arena.add_text(&result));
    Ok(state.add_value(arena, registry, result))
}

fn op_lower(
    arena: &mut GraphArena,
    registry: &ClassRegistry,
    state: &mut StateGraph,
    args: &[Handle<Node>],
) -> Result<Handle<Node>, EvalError> {
    str_unary(arena, registry, state, args, |s| s.to_lowercase())
}

fn op_upper(
    arena: &mut GraphArena,
    registry: &ClassRegistry,
    state: &mut StateGraph,
    args: &[Handle<Node>],
) -> Result<Handle<Node>, EvalError> {
    str_unary(arena, registry, state, args, |s| s.to_uppercase())
}

fn op_ieq(
    arena: &mut GraphArena,
    registry: &ClassRegistry,
    state: &mut StateGraph,
    args: &[Handle<Node>],
) -> Result<Handle<Node>, EvalError> {
    int_compare(arena, registry, state, args, |x, y| x == y)
}

fn op_ine(
    arena: &mut GraphArena,
    registry: &ClassRegistry,
    state: &mut StateGraph,
    args: &[Handle<Node>],
) -> Result<Handle<Node>, EvalError> {
    int_compare(arena, registry, state, args, |x, y| x != y)
}

fn op_ilt(
    arena: &mut GraphArena,
    registry: &ClassRegistry,
    state: &mut StateGraph,
    args: &[Handle<Node>],
) -> Result<Handle<Node>, EvalError> {
    int_compare(arena, registry, state, args, |x, y| x < y)
}

fn op_ile(
    arena: &mut GraphArena,
    registry: &ClassRegistry,
    state: &mut StateGraph,
    args: &[Handle<Node>],
) -> Result<Handle<Node>, EvalError> {
    int_compare(arena, registry, state, args, |x, y| x <= y)
}

fn op_igt(
    arena: &mut GraphArena,
    registry: &ClassRegistry,
    state: &mut StateGraph,
    args: &[Handle<Node>],
) -> Result<Handle<Node>, EvalError> {
    int_compare(arena, registry, state, args, |x, y| x > y)
}

fn op_ige(
    arena: &mut GraphArena,
    registry: &ClassRegistry,
    state: &mut StateGraph,
    args: &[Handle<Node>],
) -> Result<Handle<Node>, EvalError> {
    int_compare(arena, registry, state, args, |x, y| x >= y)
}

fn op_seq(
    arena: &mut GraphArena,
    registry: &ClassRegistry,
    state: &mut StateGraph,
    args: &[Handle<Node>],
) -> Result<Handle<Node>, EvalError> {
    str_compare(arena, registry, state, args, |x, y| x == y)
}

fn op_sne(
    arena: &mut GraphArena,
    registry: &ClassRegistry,
    state: &mut StateGraph,
    args: &[Handle<Node>],
) -> Result<Handle<Node>, EvalError> {
    str_compare(arena, registry, state, args, |x, y| x != y)
}

fn op_slt(
    arena: &mut GraphArena,
    registry: &ClassRegistry,
    state: &mut StateGraph,
    args: &[Handle<Node>],
) -> Result<Handle<Node>, EvalError> {
    str_compare(arena, registry, state, args, |x, y| x < y)
}

fn op_sle(
    arena: &mut GraphArena,
    registry: &ClassRegistry,
    state: &mut StateGraph,
    args: &[Handle<Node>],
) -> Result<Handle<Node>, EvalError> {
    str_compare(arena, registry, state, args, |x, y| x <= y)
}

fn op_sgt(
    arena: &mut GraphArena,
    registry: &ClassRegistry,
    state: &mut StateGraph,
    args: &[Handle<Node>],
) -> Result<Handle<Node>, EvalError> {
    str_compare(arena, registry, state, args, |x, y| x > y)
}

fn op_sge(
    arena: &mut GraphArena,
    registry: &ClassRegistry,
    state: &mut StateGraph,
    args: &[Handle<Node>],
) -> Result<Handle<Node>, EvalError> {
    str_compare(arena, registry, state, args, |x, y| x >= y)
}
