// -*- coding: utf-8 -*-
// ------------------------------------------------------------------------------------------------
// Copyright © 2021, object-graphs authors.
// Licensed under either of Apache License, Version 2.0, or MIT license, at your option.
// Please see the LICENSE-APACHE or LICENSE-MIT files in this distribution for license details.
// ------------------------------------------------------------------------------------------------

//! Patterns, cases, and the construction of pattern graphs.
//!
//! A pattern describes the shape a runtime object graph must have: a [`Pattern::Class`][] node
//! demands an instance of (a subtype of) a class with particular attribute sub-patterns, a
//! [`Pattern::Values`][] leaf demands one of finitely many primitive values, and
//! [`Pattern::Labeled`][]/[`Pattern::Ref`][] give a node a name and refer back to it.  Because a
//! reference may occur _before_ the node it names, construction uses placeholder nodes: a
//! `Ref` to an unknown name installs a transient node, and when the `Labeled` definition is
//! finally seen the placeholder is _unified_ with it — every incoming edge and every
//! reference-map entry is rewritten onto the defining node.  This is what lets a pattern tie
//! structural cycles.
//!
//! The result of construction is a [`PatternGraph`][]: a rooted layout graph whose nodes are
//! annotated with classes or value sets, plus a reference map from names to nodes.  Matching a
//! pattern graph against a state graph is the [`matching`][] module's job.
//!
//! [`Pattern::Class`]: enum.Pattern.html
//! [`Pattern::Labeled`]: enum.Pattern.html
//! [`Pattern::Ref`]: enum.Pattern.html
//! [`Pattern::Values`]: enum.Pattern.html
//! [`PatternGraph`]: struct.PatternGraph.html
//! [`matching`]: ../matching/index.html

use std::cell::Ref;
use std::cell::RefCell;

use fxhash::FxHashMap;
use smallvec::SmallVec;
use thiserror::Error;

use crate::arena::Handle;
use crate::arena::HandleSet;
use crate::ast::Stmt;
use crate::bijection::Bijection;
use crate::graph::Edge;
use crate::graph::GraphArena;
use crate::graph::Label;
use crate::graph::LayoutGraph;
use crate::graph::Node;
use crate::lattice::Cla;
use crate::lattice::Ty;
use crate::lattice::ValueSet;

/// Errors that can occur while constructing a pattern graph.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum PatternError {
    #[error("a pattern reference name is defined twice")]
    RedefRef,
    #[error("a pattern reference name is never defined")]
    UndefRef,
}

//-------------------------------------------------------------------------------------------------
// The pattern AST

/// A pattern surface form.
#[derive(Clone)]
pub enum Pattern {
    /// A node of (a subtype of) the given class, with the given attribute sub-patterns.  The
    /// state may have more attributes than the pattern demands.
    Class(Handle<Cla>, Vec<(Handle<Label>, Pattern)>),
    /// Names the node constructed for the base pattern.  The name becomes a binding visible in
    /// the case body, and may be referenced elsewhere in the same pattern.
    Labeled(Handle<Label>, Box<Pattern>),
    /// A use of a name bound by a `Labeled` pattern — before or after this occurrence.
    Ref(Handle<Label>),
    /// A leaf demanding one of finitely many primitive values.
    Values(ValueSet),
}

impl Pattern {
    pub fn labeled(name: Handle<Label>, base: Pattern) -> Pattern {
        Pattern::Labeled(name, Box::new(base))
    }
}

/// A case's matcher: a single pattern, a conjunction, or a disjunction.
pub enum Junc {
    One(Pattern),
    Conj(Vec<Pattern>),
    Disj(Vec<Pattern>),
}

/// One case of a match statement.  The `extra` slot is populated by the type checker with the
/// prebuilt pattern graphs the evaluator consumes; it is interior-mutable because cases live
/// inside a shared program tree.
pub struct Case {
    pub junc: Junc,
    pub body: Stmt,
    extra: RefCell<Option<CaseExtra>>,
}

impl Case {
    pub fn new(junc: Junc, body: Stmt) -> Case {
        Case {
            junc,
            body,
            extra: RefCell::new(None),
        }
    }

    /// Stores the checker's prebuilt matching data, replacing any previous value.
    pub fn set_extra(&self, extra: CaseExtra) {
        *self.extra.borrow_mut() = Some(extra);
    }

    /// Borrows the checker's prebuilt matching data, if the case has been checked.
    pub fn extra(&self) -> Ref<'_, Option<CaseExtra>> {
        self.extra.borrow()
    }
}

/// A correspondence between the nodes of two layout graphs.
pub type NodeMap = Bijection<Handle<Node>, Handle<Node>>;

/// The map from reference names to the pattern nodes they label.
pub type RefMap = Bijection<Handle<Label>, Handle<Node>>;

/// What the checker stores on a case for the evaluator.
pub enum CaseExtra {
    /// A single pattern: its graph and reference map.
    One { pattern: PatternGraph, refs: RefMap },
    /// A conjunction: the component graphs (each matched against the extracted view at
    /// runtime — the state may alias nodes that the union keeps distinct, so the union graph
    /// serves type reconciliation only), the per-component bijections into the union, and the
    /// per-component reference maps.
    Conj {
        patterns: Vec<PatternGraph>,
        maps: Vec<NodeMap>,
        refs: Vec<RefMap>,
    },
    /// A disjunction: the alternative graphs (tried in order at runtime), the per-component
    /// bijections into the intersection co-domain, and the per-component reference maps.
    Disj {
        alts: Vec<PatternGraph>,
        maps: Vec<NodeMap>,
        refs: Vec<RefMap>,
    },
}

//-------------------------------------------------------------------------------------------------
// Pattern graphs

/// A rooted layout graph whose nodes carry type annotations — a class or a value set.  Pattern
/// graphs are produced two ways: from pattern syntax by [`build_pattern_graph`][], and from a
/// runtime object by [`StateGraph::extract`][], which is what makes the two matchable.
///
/// [`StateGraph::extract`]: ../state/struct.StateGraph.html#method.extract
/// [`build_pattern_graph`]: fn.build_pattern_graph.html
pub struct PatternGraph {
    pub layout: LayoutGraph,
    pub types: FxHashMap<Handle<Node>, Ty>,
}

impl PatternGraph {
    pub fn root(&self) -> Handle<Node> {
        self.layout.root()
    }

    pub fn ty(&self, node: Handle<Node>) -> Option<&Ty> {
        self.types.get(&node)
    }
}

//-------------------------------------------------------------------------------------------------
// Construction

struct Builder {
    nodes: HandleSet<Node>,
    edges: FxHashMap<Handle<Node>, SmallVec<[Edge; 8]>>,
    types: FxHashMap<Handle<Node>, Ty>,
    refs: RefMap,
}

impl Builder {
    fn parse(&mut self, arena: &mut GraphArena, pattern: &Pattern) -> Result<Handle<Node>, PatternError> {
        match pattern {
            Pattern::Class(cla, attrs) => {
                let node = arena.new_node();
                self.nodes.add(node);
                self.types.insert(node, Ty::Class(*cla));
                for (label, sub) in attrs {
                    let target = self.parse(arena, sub)?;
                    self.edges.entry(node).or_default().push(Edge {
                        label: *label,
                        target,
                    });
                }
                Ok(node)
            }
            Pattern::Labeled(name, base) => {
                let node = self.parse(arena, base)?;
                if let Some(placeholder) = self.refs.get(*name) {
                    if self.nodes.contains(placeholder) {
                        return Err(PatternError::RedefRef);
                    }
                    // Unify: collapse the placeholder onto the defining node, rewriting every
                    // incoming edge and every reference-map entry.
                    for edges in self.edges.values_mut() {
                        for edge in edges.iter_mut() {
                            if edge.target == placeholder {
                                edge.target = node;
                            }
                        }
                    }
                    self.refs.replace_image(placeholder, node);
                }
                self.refs.insert(*name, node);
                Ok(node)
            }
            Pattern::Ref(name) => match self.refs.get(*name) {
                Some(node) => Ok(node),
                None => {
                    let placeholder = arena.new_node();
                    self.refs.insert(*name, placeholder);
                    Ok(placeholder)
                }
            },
            Pattern::Values(values) => {
                let node = arena.new_node();
                self.nodes.add(node);
                self.types.insert(node, Ty::Values(values.clone()));
                Ok(node)
            }
        }
    }
}

/// Constructs the pattern graph and reference map for a pattern.  Fails `RedefRef` when a name is
/// defined twice, and `UndefRef` when a referenced name is never defined.
pub fn build_pattern_graph(
    arena: &mut GraphArena,
    pattern: &Pattern,
) -> Result<(PatternGraph, RefMap), PatternError> {
    let mut builder = Builder {
        nodes: HandleSet::new(),
        edges: FxHashMap::default(),
        types: FxHashMap::default(),
        refs: RefMap::new(),
    };
    let root = builder.parse(arena, pattern)?;
    for (_, node) in builder.refs.iter() {
        if !builder.nodes.contains(node) {
            return Err(PatternError::UndefRef);
        }
    }
    let layout = LayoutGraph::from_parts(builder.nodes, builder.edges, root);
    Ok((
        PatternGraph {
            layout,
            types: builder.types,
        },
        builder.refs,
    ))
}
