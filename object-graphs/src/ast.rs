// -*- coding: utf-8 -*-
// ------------------------------------------------------------------------------------------------
// Copyright © 2021, object-graphs authors.
// Licensed under either of Apache License, Version 2.0, or MIT license, at your option.
// Please see the LICENSE-APACHE or LICENSE-MIT files in this distribution for license details.
// ------------------------------------------------------------------------------------------------

//! The abstract syntax of the object language, except pattern matching (see the [`pattern`][]
//! module for patterns and cases).
//!
//! Programs arrive pre-built from an external front end; nothing here parses.  Statements and
//! expressions are tagged variants that the type checker and evaluator dispatch on directly.
//!
//! [`pattern`]: ../pattern/index.html

use crate::arena::Handle;
use crate::graph::Label;
use crate::lattice::Cla;
use crate::lattice::Value;
use crate::pattern::Case;

/// An expression.
#[derive(Clone)]
pub enum Expr {
    /// A literal primitive value.
    Value(Value),
    /// A variable reference.
    Var(Handle<Label>),
    /// An attribute access on the value of a sub-expression.
    Attr(Box<Expr>, Handle<Label>),
    /// A built-in operator application.
    Op(Handle<Label>, Vec<Expr>),
    /// Instantiation of a class.
    New(Handle<Cla>),
    /// Short-circuiting boolean conjunction.
    And(Box<Expr>, Box<Expr>),
    /// Short-circuiting boolean disjunction.
    Or(Box<Expr>, Box<Expr>),
}

impl Expr {
    pub fn attr(self, label: Handle<Label>) -> Expr {
        Expr::Attr(Box::new(self), label)
    }

    pub fn and(self, right: Expr) -> Expr {
        Expr::And(Box::new(self), Box::new(right))
    }

    pub fn or(self, right: Expr) -> Expr {
        Expr::Or(Box::new(self), Box::new(right))
    }
}

/// A statement.
pub enum Stmt {
    /// Render each argument and emit them as one line, joined by `", "`.
    Print(Vec<Expr>),
    /// Assign the value of the right expression to the location named by the left one, which
    /// must be a variable or attribute expression.
    Assign(Expr, Expr),
    If(Expr, Box<Stmt>, Box<Stmt>),
    While(Expr, Box<Stmt>),
    Block(Vec<Stmt>),
    /// Open a scope frame holding one variable of the given class, initially `null`.
    VarDecl(Handle<Label>, Handle<Cla>),
    /// Close the scope frame of the named variable, which must be the innermost one.
    VarEnd(Handle<Label>),
    /// Match the scrutinee against each case in order; the first case whose matcher succeeds
    /// runs with its reference names in scope.  A match with no succeeding case is a no-op.
    Match(Expr, Vec<Case>),
}

impl Stmt {
    pub fn if_else(cond: Expr, then_stmt: Stmt, else_stmt: Stmt) -> Stmt {
        Stmt::If(cond, Box::new(then_stmt), Box::new(else_stmt))
    }

    pub fn while_loop(cond: Expr, body: Stmt) -> Stmt {
        Stmt::While(cond, Box::new(body))
    }
}

/// A program: one top-level block.
pub struct Program {
    pub block: Stmt,
}
