// -*- coding: utf-8 -*-
// ------------------------------------------------------------------------------------------------
// Copyright © 2021, object-graphs authors.
// Licensed under either of Apache License, Version 2.0, or MIT license, at your option.
// Please see the LICENSE-APACHE or LICENSE-MIT files in this distribution for license details.
// ------------------------------------------------------------------------------------------------

//! The static type checker.
//!
//! The checker walks a program with a lexical environment — an explicit stack of frames, one per
//! variable declaration, so that `var end` can insist on closing exactly the innermost
//! declaration and every block can insist on ending in the scope it began.
//!
//! Checking a match case does the heavy lifting: the case's patterns are compiled to pattern
//! graphs, each graph is checked as an assertion about a runtime subgraph (every child's type
//! must be a subtype of its parent's declared attribute type), conjunctions and disjunctions are
//! reconciled through graph union and intersection, and each reference name's type is refined to
//! the reconciled type of its node.  Everything the evaluator needs to execute the case — the
//! prebuilt graphs, the component bijections, the reference maps — is stored on the case's
//! extras slot, so match execution never re-derives static information.

use fxhash::FxHashMap;
use thiserror::Error;

use crate::arena::Handle;
use crate::arena::HandleSet;
use crate::ast::Expr;
use crate::ast::Program;
use crate::ast::Stmt;
use crate::graph::GraphArena;
use crate::graph::Label;
use crate::graph::Node;
use crate::lattice::ClassRegistry;
use crate::lattice::LatticeError;
use crate::lattice::Ty;
use crate::matching::conjoin;
use crate::matching::disjoin;
use crate::matching::MatchError;
use crate::ops::OpTable;
use crate::pattern::build_pattern_graph;
use crate::pattern::Case;
use crate::pattern::CaseExtra;
use crate::pattern::Junc;
use crate::pattern::Pattern;
use crate::pattern::PatternError;
use crate::pattern::PatternGraph;
use crate::pattern::RefMap;

/// Errors reported by the type checker.  These are all static: a well-checked program never
/// raises them at runtime.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum CheckError {
    #[error("a pattern node has no type annotation")]
    NodeType,
    #[error("a pattern node's type does not fit its parent's attribute type")]
    NodeSubtype,
    #[error("the scrutinee and pattern types are incompatible")]
    IncompatibleTypes,
    #[error("the variable is not defined")]
    UndefVar,
    #[error("attribute access on a non-object type")]
    ParentObject,
    #[error("the class has no such attribute")]
    Attr,
    #[error("unknown operator")]
    Op,
    #[error("wrong number of operator arguments")]
    OpArgLen,
    #[error("wrong operator argument type")]
    OpArgType,
    #[error("var end does not close the innermost declaration")]
    VarEnd,
    #[error("the left side of an assignment must be a variable or attribute")]
    LeftExpr,
    #[error("expected a class")]
    Class,
    #[error("the assigned type is not a subtype of the target's type")]
    AssignType,
    #[error("a condition must be boolean")]
    CondType,
    #[error("a block must end in the scope it began")]
    Scope,
    #[error("unprintable argument")]
    PrintArgType,
    #[error("boolean operators require boolean operands")]
    BoolType,
    #[error(transparent)]
    Lattice(#[from] LatticeError),
    #[error(transparent)]
    Pattern(#[from] PatternError),
    #[error(transparent)]
    Match(#[from] MatchError),
}

//-------------------------------------------------------------------------------------------------
// The lexical environment

/// A stack of frames mapping variable names to their declared types.  Each variable declaration
/// pushes its own frame, which is what makes the `var end` discipline enforceable.
pub struct Env {
    frames: Vec<FxHashMap<Handle<Label>, Ty>>,
}

impl Env {
    pub fn new() -> Env {
        Env {
            frames: vec![FxHashMap::default()],
        }
    }

    pub fn get(&self, name: Handle<Label>) -> Option<&Ty> {
        self.frames.iter().rev().find_map(|frame| frame.get(&name))
    }

    pub fn contains(&self, name: Handle<Label>) -> bool {
        self.get(name).is_some()
    }

    pub fn push(&mut self, frame: FxHashMap<Handle<Label>, Ty>) {
        self.frames.push(frame);
    }

    pub fn push_single(&mut self, name: Handle<Label>, ty: Ty) {
        let mut frame = FxHashMap::default();
        frame.insert(name, ty);
        self.frames.push(frame);
    }

    pub fn pop(&mut self) {
        self.frames.pop();
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Whether the innermost frame holds exactly this one variable.
    pub fn top_is_exactly(&self, name: Handle<Label>) -> bool {
        match self.frames.last() {
            Some(frame) => frame.len() == 1 && frame.contains_key(&name),
            None => false,
        }
    }
}

impl Default for Env {
    fn default() -> Env {
        Env::new()
    }
}

//-------------------------------------------------------------------------------------------------
// The checker

/// The checker borrows the interpreter's identity space: the graph arena (pattern construction
/// mints nodes), the class registry (reconciliation mints anonymous classes), and the operator
/// table.
pub struct Checker<'a> {
    pub arena: &'a mut GraphArena,
    pub registry: &'a mut ClassRegistry,
    pub ops: &'a OpTable,
}

impl<'a> Checker<'a> {
    pub fn check_program(&mut self, program: &Program) -> Result<(), CheckError> {
        let mut env = Env::new();
        self.check_stmt(&program.block, &mut env)
    }

    pub fn check_stmt(&mut self, stmt: &Stmt, env: &mut Env) -> Result<(), CheckError> {
        match stmt {
            Stmt::Print(args) => {
                for arg in args {
                    self.check_expr(arg, env)?;
                }
                Ok(())
            }
            Stmt::Assign(lhs, rhs) => self.check_assign(lhs, rhs, env),
            Stmt::If(cond, then_stmt, else_stmt) => {
                self.check_cond(cond, env)?;
                self.check_stmt(then_stmt, env)?;
                self.check_stmt(else_stmt, env)
            }
            Stmt::While(cond, body) => {
                self.check_cond(cond, env)?;
                self.check_stmt(body, env)
            }
            Stmt::Block(stmts) => self.check_block(stmts, env),
            Stmt::Match(expr, cases) => self.check_match(expr, cases, env),
            // Declarations are meaningful only directly inside a block.
            Stmt::VarDecl(_, _) | Stmt::VarEnd(_) => Err(CheckError::Scope),
        }
    }

    fn check_block(&mut self, stmts: &[Stmt], env: &mut Env) -> Result<(), CheckError> {
        let base = env.depth();
        for stmt in stmts {
            match stmt {
                Stmt::VarDecl(name, cla) => env.push_single(*name, Ty::Class(*cla)),
                Stmt::VarEnd(name) => {
                    if env.depth() == base || !env.top_is_exactly(*name) {
                        return Err(CheckError::VarEnd);
                    }
                    env.pop();
                }
                _ => self.check_stmt(stmt, env)?,
            }
        }
        if env.depth() != base {
            return Err(CheckError::Scope);
        }
        Ok(())
    }

    fn check_assign(&mut self, lhs: &Expr, rhs: &Expr, env: &mut Env) -> Result<(), CheckError> {
        if !matches!(lhs, Expr::Var(_) | Expr::Attr(_, _)) {
            return Err(CheckError::LeftExpr);
        }
        let target = self.check_expr(lhs, env)?;
        let source = self.check_expr(rhs, env)?;
        if !self.registry.subtype(&source, &target) {
            return Err(CheckError::AssignType);
        }
        Ok(())
    }

    fn check_cond(&mut self, cond: &Expr, env: &mut Env) -> Result<(), CheckError> {
        let ty = self.check_expr(cond, env)?;
        match ty {
            Ty::Class(cla) if cla == self.registry.bool_type() => Ok(()),
            _ => Err(CheckError::CondType),
        }
    }

    //---------------------------------------------------------------------------------------------
    // Expressions

    pub fn check_expr(&mut self, expr: &Expr, env: &mut Env) -> Result<Ty, CheckError> {
        match expr {
            Expr::Value(value) => Ok(Ty::Class(value.cla)),
            Expr::Var(name) => env.get(*name).cloned().ok_or(CheckError::UndefVar),
            Expr::Attr(base, name) => {
                let ty = self.check_expr(base, env)?;
                let cla = match ty {
                    Ty::Class(cla) => cla,
                    Ty::Values(_) => return Err(CheckError::ParentObject),
                };
                match self.registry[cla].attr(*name) {
                    Some(attr) => attr.left().map(Ty::Class).ok_or(CheckError::Attr),
                    None => Err(CheckError::Attr),
                }
            }
            Expr::Op(name, args) => {
                let def = self.ops.get(*name).ok_or(CheckError::Op)?;
                let par_types = def.par_types.clone();
                let res_type = def.res_type;
                if args.len() != par_types.len() {
                    return Err(CheckError::OpArgLen);
                }
                for (arg, par) in args.iter().zip(par_types) {
                    let ty = self.check_expr(arg, env)?;
                    if !self.registry.ty_eq(&ty, &Ty::Class(par)) {
                        return Err(CheckError::OpArgType);
                    }
                }
                Ok(Ty::Class(res_type))
            }
            Expr::New(cla) => Ok(Ty::Class(*cla)),
            Expr::And(left, right) | Expr::Or(left, right) => {
                let bool_type = self.registry.bool_type();
                for operand in [left, right] {
                    let ty = self.check_expr(operand, env)?;
                    if !matches!(ty, Ty::Class(cla) if cla == bool_type) {
                        return Err(CheckError::BoolType);
                    }
                }
                Ok(Ty::Class(bool_type))
            }
        }
    }

    //---------------------------------------------------------------------------------------------
    // Patterns and cases

    fn check_match(
        &mut self,
        expr: &Expr,
        cases: &[Case],
        env: &mut Env,
    ) -> Result<(), CheckError> {
        let scrutinee = self.check_expr(expr, env)?;
        for case in cases {
            let pattern_ty = self.check_case(case, env)?;
            if !self.registry.subtype(&scrutinee, &pattern_ty)
                && !self.registry.subtype(&pattern_ty, &scrutinee)
            {
                return Err(CheckError::IncompatibleTypes);
            }
        }
        Ok(())
    }

    fn check_case(&mut self, case: &Case, env: &mut Env) -> Result<Ty, CheckError> {
        let (root_ty, refs_env) = match &case.junc {
            Junc::One(pattern) => {
                let checked = self.check_pattern(pattern)?;
                let refs_env: FxHashMap<Handle<Label>, Ty> =
                    checked.ref_types.iter().cloned().collect();
                let root_ty = checked.root_ty.clone();
                case.set_extra(CaseExtra::One {
                    pattern: checked.graph,
                    refs: checked.refs,
                });
                (root_ty, refs_env)
            }
            Junc::Conj(patterns) => self.check_conj(case, patterns)?,
            Junc::Disj(patterns) => self.check_disj(case, patterns)?,
        };
        env.push(refs_env);
        let result = self.check_stmt(&case.body, env);
        env.pop();
        result?;
        Ok(root_ty)
    }

    /// Checks a conjunction: union the component graphs, reconcile each union node's type as the
    /// infimum of the types identified there, and refine every reference name to the reconciled
    /// type of its node.  Each component's root type must be compatible with the conjoined root
    /// type.
    fn check_conj(
        &mut self,
        case: &Case,
        patterns: &[Pattern],
    ) -> Result<(Ty, FxHashMap<Handle<Label>, Ty>), CheckError> {
        let mut parts = Vec::with_capacity(patterns.len());
        for pattern in patterns {
            parts.push(self.check_pattern(pattern)?);
        }
        let graphs: Vec<&PatternGraph> = parts.iter().map(|part| &part.graph).collect();
        let (union, maps) = conjoin(self.arena, self.registry, &graphs)?;
        let mut refs_env = FxHashMap::default();
        for (part, map) in parts.iter().zip(&maps) {
            for (name, ty) in &part.ref_types {
                let node = part.refs.get(*name).ok_or(CheckError::NodeType)?;
                let union_node = map.get(node).ok_or(CheckError::NodeType)?;
                let union_ty = union.ty(union_node).ok_or(CheckError::NodeType)?;
                refs_env.insert(*name, self.registry.min_type(ty, union_ty)?);
            }
        }
        let (first_part, first_map) = match (parts.first(), maps.first()) {
            (Some(part), Some(map)) => (part, map),
            _ => return Err(CheckError::NodeType),
        };
        let root_node = first_map
            .get(first_part.graph.root())
            .ok_or(CheckError::NodeType)?;
        let root_ty = union.ty(root_node).ok_or(CheckError::NodeType)?.clone();
        for part in &parts {
            self.registry.min_type(&part.root_ty, &root_ty)?;
        }
        let mut graphs = Vec::with_capacity(parts.len());
        let mut refs = Vec::with_capacity(parts.len());
        for part in parts {
            graphs.push(part.graph);
            refs.push(part.refs);
        }
        case.set_extra(CaseExtra::Conj {
            patterns: graphs,
            maps,
            refs,
        });
        Ok((root_ty, refs_env))
    }

    /// Checks a disjunction: intersect the component graphs and give each reference name the
    /// supremum of the types gathered at its node in the co-domain.  A reference whose node has
    /// no image in the co-domain is left out of the case environment — it is only meaningful
    /// within its own alternative.
    fn check_disj(
        &mut self,
        case: &Case,
        patterns: &[Pattern],
    ) -> Result<(Ty, FxHashMap<Handle<Label>, Ty>), CheckError> {
        let mut parts = Vec::with_capacity(patterns.len());
        for pattern in patterns {
            parts.push(self.check_pattern(pattern)?);
        }
        let graphs: Vec<&PatternGraph> = parts.iter().map(|part| &part.graph).collect();
        let (maps, types) = disjoin(self.arena, self.registry, &graphs)?;
        let mut refs_env = FxHashMap::default();
        for (part, map) in parts.iter().zip(&maps) {
            for (name, _) in &part.ref_types {
                let node = part.refs.get(*name).ok_or(CheckError::NodeType)?;
                if let Some(shared) = map.get(node) {
                    if let Some(ty) = types.get(&shared) {
                        refs_env.insert(*name, ty.clone());
                    }
                }
            }
        }
        let (first_part, first_map) = match (parts.first(), maps.first()) {
            (Some(part), Some(map)) => (part, map),
            _ => return Err(CheckError::NodeType),
        };
        let root_node = first_map
            .get(first_part.graph.root())
            .ok_or(CheckError::NodeType)?;
        let root_ty = types.get(&root_node).ok_or(CheckError::NodeType)?.clone();
        let mut alts = Vec::with_capacity(parts.len());
        let mut refs = Vec::with_capacity(parts.len());
        for part in parts {
            alts.push(part.graph);
            refs.push(part.refs);
        }
        case.set_extra(CaseExtra::Disj { alts, maps, refs });
        Ok((root_ty, refs_env))
    }

    fn check_pattern(&mut self, pattern: &Pattern) -> Result<CheckedPattern, CheckError> {
        let (graph, refs) = build_pattern_graph(self.arena, pattern)?;
        let root_ty = self.check_graph(&graph)?;
        let mut ref_types = Vec::new();
        for (name, node) in refs.iter() {
            let ty = graph.ty(node).cloned().ok_or(CheckError::NodeType)?;
            ref_types.push((name, ty));
        }
        Ok(CheckedPattern {
            root_ty,
            ref_types,
            graph,
            refs,
        })
    }

    /// Checks a pattern graph as an assertion about a runtime subgraph: every node must carry a
    /// type, and every child's type must fit the parent's declared attribute type (`null` fits
    /// anything).  A visited set breaks cycles.
    fn check_graph(&self, graph: &PatternGraph) -> Result<Ty, CheckError> {
        let mut visited = HandleSet::new();
        self.check_node(graph, graph.root(), &mut visited)
    }

    fn check_node(
        &self,
        graph: &PatternGraph,
        node: Handle<Node>,
        visited: &mut HandleSet<Node>,
    ) -> Result<Ty, CheckError> {
        let ty = graph.ty(node).cloned().ok_or(CheckError::NodeType)?;
        if visited.contains(node) {
            return Ok(ty);
        }
        visited.add(node);
        for edge in graph.layout.edges(node) {
            let child_ty = self.check_node(graph, edge.target, visited)?;
            let fits = match self.registry.class_of_attr(&ty, edge.label) {
                Some(attr_cla) => self.registry.subtype(&child_ty, &Ty::Class(attr_cla)),
                None => matches!(child_ty, Ty::Class(cla) if cla == self.registry.null_type()),
            };
            if !fits {
                return Err(CheckError::NodeSubtype);
            }
        }
        Ok(ty)
    }
}

struct CheckedPattern {
    root_ty: Ty,
    ref_types: Vec<(Handle<Label>, Ty)>,
    graph: PatternGraph,
    refs: RefMap,
}
