// -*- coding: utf-8 -*-
// ------------------------------------------------------------------------------------------------
// Copyright © 2021, object-graphs authors.
// Licensed under either of Apache License, Version 2.0, or MIT license, at your option.
// Please see the LICENSE-APACHE or LICENSE-MIT files in this distribution for license details.
// ------------------------------------------------------------------------------------------------

//! One interpreter instance: the identity space a program is checked and executed in.
//!
//! An [`Interp`][] owns the graph arena (labels, string values, the node factory), the class
//! registry, and the operator table.  Nothing here is process-global: two interpreters never
//! share state, and [`Interp::reset`][] restores a pristine instance between programs.
//!
//! [`Interp`]: struct.Interp.html
//! [`Interp::reset`]: struct.Interp.html#method.reset

use thiserror::Error;

use crate::arena::Handle;
use crate::ast::Program;
use crate::check::CheckError;
use crate::check::Checker;
use crate::eval::EvalError;
use crate::eval::Machine;
use crate::graph::GraphArena;
use crate::graph::Label;
use crate::graph::Text;
use crate::lattice::AttrType;
use crate::lattice::Cla;
use crate::lattice::ClassRegistry;
use crate::lattice::LatticeError;
use crate::lattice::Value;
use crate::ops::OpTable;
use crate::state::StateGraph;

/// Everything a top-level driver can see go wrong: a static checking error or a dynamic
/// evaluation error.  The two taxonomies stay separate; this sum only carries one of them up.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum ProgramError {
    #[error(transparent)]
    Check(#[from] CheckError),
    #[error(transparent)]
    Eval(#[from] EvalError),
}

/// The result of evaluating a program: the final state graph and the lines it printed.
pub struct Run {
    pub state: StateGraph,
    pub output: Vec<String>,
}

/// One interpreter instance.
pub struct Interp {
    pub arena: GraphArena,
    pub classes: ClassRegistry,
    pub ops: OpTable,
}

impl Interp {
    pub fn new() -> Interp {
        let mut arena = GraphArena::new();
        let classes = ClassRegistry::new(&mut arena);
        let ops = OpTable::new(&mut arena, &classes);
        Interp {
            arena,
            classes,
            ops,
        }
    }

    /// Restores the pristine state: an empty user class table, fresh distinguished classes, and
    /// a restarted node factory.  Call between programs.
    pub fn reset(&mut self) {
        *self = Interp::new();
    }

    //---------------------------------------------------------------------------------------------
    // Convenience constructors

    pub fn label<S: AsRef<str> + ?Sized>(&mut self, name: &S) -> Handle<Label> {
        self.arena.add_label(name)
    }

    pub fn text<S: AsRef<str> + ?Sized>(&mut self, content: &S) -> Handle<Text> {
        self.arena.add_text(content)
    }

    pub fn int(&self, value: i64) -> Value {
        self.classes.int_value(value)
    }

    pub fn boolean(&self, value: bool) -> Value {
        self.classes.bool_value(value)
    }

    pub fn string<S: AsRef<str> + ?Sized>(&mut self, content: &S) -> Value {
        let text = self.arena.add_text(content);
        self.classes.str_value(text)
    }

    /// Registers a named class, interning its tag and attribute labels.
    pub fn new_class(
        &mut self,
        tag: &str,
        supers: &[Handle<Cla>],
        attrs: &[(&str, AttrType)],
    ) -> Result<Handle<Cla>, LatticeError> {
        let tag = self.arena.add_label(tag);
        let attrs: Vec<_> = attrs
            .iter()
            .map(|(name, ty)| (self.arena.add_label(name), *ty))
            .collect();
        self.classes.add_class(&self.arena, tag, supers, attrs)
    }

    //---------------------------------------------------------------------------------------------
    // Running programs

    /// Type-checks a program, annotating every match case with the prebuilt pattern graphs the
    /// evaluator consumes.
    pub fn check(&mut self, program: &Program) -> Result<(), CheckError> {
        let mut checker = Checker {
            arena: &mut self.arena,
            registry: &mut self.classes,
            ops: &self.ops,
        };
        checker.check_program(program)
    }

    /// Executes a checked program against a fresh state graph.
    pub fn eval(&mut self, program: &Program) -> Result<Run, EvalError> {
        let mut state = StateGraph::new(&mut self.arena, &self.classes);
        let mut machine = Machine::new(&mut self.arena, &self.classes, &self.ops);
        machine.run_program(program, &mut state)?;
        let output = machine.take_output();
        Ok(Run { state, output })
    }

    /// Checks and then executes a program.
    pub fn run(&mut self, program: &Program) -> Result<Run, ProgramError> {
        self.check(program)?;
        Ok(self.eval(program)?)
    }
}

impl Default for Interp {
    fn default() -> Interp {
        Interp::new()
    }
}
