// -*- coding: utf-8 -*-
// ------------------------------------------------------------------------------------------------
// Copyright © 2021, object-graphs authors.
// Licensed under either of Apache License, Version 2.0, or MIT license, at your option.
// Please see the LICENSE-APACHE or LICENSE-MIT files in this distribution for license details.
// ------------------------------------------------------------------------------------------------

//! The evaluator: small-step execution of statements and expressions against the state graph.
//!
//! Expression evaluation returns a node in the state graph — literals and operator results
//! allocate fresh primitive nodes, variable and attribute references resolve to existing ones,
//! and `new` allocates an object sub-tree with `null`-typed attribute children.  Statements
//! transform the state graph in place, running a reachability pass after anything that can
//! orphan nodes.
//!
//! Match execution is where the graph algorithms come in: the scrutinee's subgraph is frozen as
//! a pattern view ([`StateGraph::extract`][]), and each case attempts its prebuilt matcher in
//! order.  A single pattern matches directly; a conjunction requires every component to match
//! the same extracted view, each contributing its own reference bindings; a disjunction tries
//! its alternatives in order and resolves reference names through the intersection co-domain —
//! a name with no counterpart in the matched alternative is simply left unbound.  The first case
//! that matches runs its body in a fresh scope frame holding the reference bindings; if no case
//! matches, the statement is a no-op.
//!
//! [`StateGraph::extract`]: ../state/struct.StateGraph.html#method.extract

use fxhash::FxHashMap;
use thiserror::Error;

use crate::arena::Handle;
use crate::ast::Expr;
use crate::ast::Program;
use crate::ast::Stmt;
use crate::graph::GraphArena;
use crate::graph::Label;
use crate::graph::Node;
use crate::lattice::ClassRegistry;
use crate::lattice::Payload;
use crate::matching::match_graphs;
use crate::ops::OpTable;
use crate::pattern::Case;
use crate::pattern::CaseExtra;
use crate::pattern::NodeMap;
use crate::pattern::PatternGraph;
use crate::state::StateError;
use crate::state::StateGraph;

/// Dynamic errors.  After type checking, only `DivisionByZero` (and `State` errors caused by a
/// disjunction reference left unbound) can actually occur; the rest guard internal invariants.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum EvalError {
    #[error(transparent)]
    State(#[from] StateError),
    #[error("division by zero")]
    DivisionByZero,
    #[error("match statement executed before type checking")]
    MissingExtras,
    #[error("expected a primitive value")]
    MissingValue,
    #[error("unknown operator")]
    UnknownOp,
    #[error("operator applied to the wrong number of arguments")]
    OpArity,
    #[error("the left side of an assignment must be a variable or attribute")]
    LeftExpr,
}

/// The machine executing one program: it borrows the interpreter's identity space and collects
/// the lines produced by `print`.
pub struct Machine<'a> {
    pub arena: &'a mut GraphArena,
    pub registry: &'a ClassRegistry,
    pub ops: &'a OpTable,
    output: Vec<String>,
}

impl<'a> Machine<'a> {
    pub fn new(
        arena: &'a mut GraphArena,
        registry: &'a ClassRegistry,
        ops: &'a OpTable,
    ) -> Machine<'a> {
        Machine {
            arena,
            registry,
            ops,
            output: Vec::new(),
        }
    }

    /// The lines printed so far.
    pub fn output(&self) -> &[String] {
        &self.output
    }

    pub fn take_output(&mut self) -> Vec<String> {
        std::mem::take(&mut self.output)
    }

    pub fn run_program(
        &mut self,
        program: &Program,
        state: &mut StateGraph,
    ) -> Result<(), EvalError> {
        self.exec_stmt(&program.block, state)
    }

    //---------------------------------------------------------------------------------------------
    // Statements

    pub fn exec_stmt(&mut self, stmt: &Stmt, state: &mut StateGraph) -> Result<(), EvalError> {
        match stmt {
            Stmt::Print(args) => {
                let mut rendered = Vec::with_capacity(args.len());
                for arg in args {
                    let node = self.eval_expr(arg, state)?;
                    rendered.push(self.render(state, node));
                }
                self.output.push(rendered.join(", "));
                Ok(())
            }
            Stmt::Assign(lhs, rhs) => {
                let (node, label) = self.eval_lexpr(lhs, state)?;
                let target = self.eval_expr(rhs, state)?;
                state.swing(node, label, target);
                state.gc();
                Ok(())
            }
            Stmt::If(cond, then_stmt, else_stmt) => {
                let node = self.eval_expr(cond, state)?;
                if self.truth(state, node)? {
                    self.exec_stmt(then_stmt, state)
                } else {
                    self.exec_stmt(else_stmt, state)
                }
            }
            Stmt::While(cond, body) => {
                loop {
                    let node = self.eval_expr(cond, state)?;
                    if !self.truth(state, node)? {
                        break;
                    }
                    self.exec_stmt(body, state)?;
                }
                state.gc();
                Ok(())
            }
            Stmt::Block(stmts) => {
                for stmt in stmts {
                    self.exec_stmt(stmt, state)?;
                }
                state.gc();
                Ok(())
            }
            Stmt::VarDecl(name, _) => {
                state.push_scope(self.arena);
                let null_type = self.registry.null_type();
                let node = state.add_object(self.arena, self.registry, null_type);
                state.swing(state.root(), *name, node);
                state.gc();
                Ok(())
            }
            Stmt::VarEnd(_) => Ok(state.pop_scope()?),
            Stmt::Match(expr, cases) => self.exec_match(expr, cases, state),
        }
    }

    //---------------------------------------------------------------------------------------------
    // Expressions

    pub fn eval_expr(&mut self, expr: &Expr, state: &mut StateGraph) -> Result<Handle<Node>, EvalError> {
        match expr {
            Expr::Value(value) => Ok(state.add_value(self.arena, self.registry, *value)),
            Expr::Var(name) => Ok(state.find_var(*name)?),
            Expr::Attr(base, name) => {
                let node = self.eval_expr(base, state)?;
                Ok(state.find_attr(node, *name)?)
            }
            Expr::Op(name, args) => {
                let mut nodes = Vec::with_capacity(args.len());
                for arg in args {
                    nodes.push(self.eval_expr(arg, state)?);
                }
                self.ops
                    .invoke(self.arena, self.registry, state, *name, &nodes)
            }
            Expr::New(cla) => Ok(state.add_object(self.arena, self.registry, *cla)),
            Expr::And(left, right) => {
                let node = self.eval_expr(left, state)?;
                if !self.truth(state, node)? {
                    return Ok(node);
                }
                self.eval_expr(right, state)
            }
            Expr::Or(left, right) => {
                let node = self.eval_expr(left, state)?;
                if self.truth(state, node)? {
                    return Ok(node);
                }
                self.eval_expr(right, state)
            }
        }
    }

    fn eval_lexpr(
        &mut self,
        expr: &Expr,
        state: &mut StateGraph,
    ) -> Result<(Handle<Node>, Handle<Label>), EvalError> {
        match expr {
            Expr::Var(name) => Ok(state.find_lvar(*name)?),
            Expr::Attr(base, name) => {
                let node = self.eval_expr(base, state)?;
                Ok(state.find_lattr(node, *name)?)
            }
            _ => Err(EvalError::LeftExpr),
        }
    }

    fn truth(&self, state: &StateGraph, node: Handle<Node>) -> Result<bool, EvalError> {
        match state.value(node).map(|value| value.payload) {
            Some(Payload::Bool(b)) => Ok(b),
            _ => Err(EvalError::MissingValue),
        }
    }

    //---------------------------------------------------------------------------------------------
    // Match execution

    fn exec_match(
        &mut self,
        expr: &Expr,
        cases: &[Case],
        state: &mut StateGraph,
    ) -> Result<(), EvalError> {
        let scrutinee = self.eval_expr(expr, state)?;
        let extracted = state.extract(scrutinee);
        for case in cases {
            let extra = case.extra();
            let extra = extra.as_ref().ok_or(EvalError::MissingExtras)?;
            let bindings = match self.match_case(&extracted, extra) {
                Some(bindings) => bindings,
                None => continue,
            };
            copious_debugging!("match: case succeeded with {} bindings", bindings.len());
            state.push_scope(self.arena);
            let frame = state.root();
            for (name, node) in bindings {
                state.swing(frame, name, node);
            }
            self.exec_stmt(&case.body, state)?;
            state.pop_scope()?;
            return Ok(());
        }
        Ok(())
    }

    // Attempts one case against the extracted scrutinee view.  Returns the reference bindings on
    // success; a failed match is a case-skip, never an error.
    fn match_case(
        &self,
        extracted: &PatternGraph,
        extra: &CaseExtra,
    ) -> Option<Vec<(Handle<Label>, Handle<Node>)>> {
        match extra {
            CaseExtra::One { pattern, refs } => {
                let mapping = self.try_match(extracted, pattern)?;
                Some(
                    refs.iter()
                        .filter_map(|(name, node)| mapping.get(node).map(|q| (name, q)))
                        .collect(),
                )
            }
            CaseExtra::Conj {
                patterns,
                maps: _,
                refs,
            } => {
                // Every component must match the same extracted view; the state may alias nodes
                // that the union graph keeps distinct, so the components are matched
                // individually and each contributes its own reference bindings.
                let mut mappings = Vec::with_capacity(patterns.len());
                for pattern in patterns {
                    mappings.push(self.try_match(extracted, pattern)?);
                }
                let mut bound: FxHashMap<Handle<Label>, Handle<Node>> = FxHashMap::default();
                for (mapping, component_refs) in mappings.iter().zip(refs) {
                    for (name, node) in component_refs.iter() {
                        if let Some(subject) = mapping.get(node) {
                            bound.insert(name, subject);
                        }
                    }
                }
                Some(bound.into_iter().collect())
            }
            CaseExtra::Disj { alts, maps, refs } => {
                for (chosen, alt) in alts.iter().enumerate() {
                    let mapping = match self.try_match(extracted, alt) {
                        Some(mapping) => mapping,
                        None => continue,
                    };
                    let chosen_map = match maps.get(chosen) {
                        Some(map) => map,
                        None => continue,
                    };
                    let mut bound: FxHashMap<Handle<Label>, Handle<Node>> = FxHashMap::default();
                    for (map, component_refs) in maps.iter().zip(refs) {
                        for (name, node) in component_refs.iter() {
                            let shared = match map.get(node) {
                                Some(shared) => shared,
                                // The name has no counterpart in the co-domain; leave it
                                // unbound.
                                None => continue,
                            };
                            let mut candidates: Vec<Handle<Node>> = chosen_map
                                .sources(shared)
                                .iter()
                                .copied()
                                .filter(|source| mapping.contains(*source))
                                .collect();
                            candidates.sort();
                            if let Some(source) = candidates.first() {
                                if let Some(subject) = mapping.get(*source) {
                                    bound.insert(name, subject);
                                }
                            }
                        }
                    }
                    return Some(bound.into_iter().collect());
                }
                None
            }
        }
    }

    fn try_match(&self, extracted: &PatternGraph, pattern: &PatternGraph) -> Option<NodeMap> {
        let registry = self.registry;
        match_graphs(pattern, extracted, |actual, required| {
            registry.subtype(actual, required)
        })
        .ok()
    }

    //---------------------------------------------------------------------------------------------
    // Rendering

    /// Renders a node the way `print` shows it: `null` for null, the literal value for a
    /// primitive, `tag@(id)` for an object.
    pub fn render(&self, state: &StateGraph, node: Handle<Node>) -> String {
        let cla = match state.node_class(node) {
            Some(cla) => cla,
            None => return "null".to_string(),
        };
        if cla == self.registry.null_type() {
            return "null".to_string();
        }
        if self.registry.is_value_type(cla) {
            return match state.value(node) {
                Some(value) => value.display(self.arena).to_string(),
                None => "null".to_string(),
            };
        }
        match self.registry[cla].tag() {
            Some(tag) => format!("{}@({})", &self.arena[tag], node.as_u32()),
            None => format!("*@({})", node.as_u32()),
        }
    }
}
