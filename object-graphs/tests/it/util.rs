// -*- coding: utf-8 -*-
// ------------------------------------------------------------------------------------------------
// Copyright © 2021, object-graphs authors.
// Licensed under either of Apache License, Version 2.0, or MIT license, at your option.
// Please see the LICENSE-APACHE or LICENSE-MIT files in this distribution for license details.
// ------------------------------------------------------------------------------------------------

//! Shorthand constructors for building test programs.

use object_graphs::arena::Handle;
use object_graphs::ast::Expr;
use object_graphs::ast::Stmt;
use object_graphs::graph::Label;
use object_graphs::lattice::Cla;
use object_graphs::lattice::Value;

pub fn var(name: Handle<Label>) -> Expr {
    Expr::Var(name)
}

pub fn lit(value: Value) -> Expr {
    Expr::Value(value)
}

pub fn new(cla: Handle<Cla>) -> Expr {
    Expr::New(cla)
}

pub fn op(name: Handle<Label>, args: Vec<Expr>) -> Expr {
    Expr::Op(name, args)
}

pub fn print(args: Vec<Expr>) -> Stmt {
    Stmt::Print(args)
}

pub fn assign(lhs: Expr, rhs: Expr) -> Stmt {
    Stmt::Assign(lhs, rhs)
}

pub fn block(stmts: Vec<Stmt>) -> Stmt {
    Stmt::Block(stmts)
}

pub fn decl(name: Handle<Label>, cla: Handle<Cla>) -> Stmt {
    Stmt::VarDecl(name, cla)
}

pub fn end(name: Handle<Label>) -> Stmt {
    Stmt::VarEnd(name)
}
