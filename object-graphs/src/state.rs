// -*- coding: utf-8 -*-
// ------------------------------------------------------------------------------------------------
// Copyright © 2021, object-graphs authors.
// Licensed under either of Apache License, Version 2.0, or MIT license, at your option.
// Please see the LICENSE-APACHE or LICENSE-MIT files in this distribution for license details.
// ------------------------------------------------------------------------------------------------

//! The state graph: the evolving graph of live objects a program executes against.
//!
//! A state graph is a layout graph annotated with each node's dynamic class and, for
//! primitive-typed nodes, its value.  Its root is always the innermost _scope frame_: a node
//! whose outgoing labels are variable names, plus the distinguished `$` edge pointing at the
//! enclosing frame.  Declaring a variable pushes a fresh frame; ending one pops it; looking a
//! variable up walks the `$` chain outward.
//!
//! Invariant: for every edge `(p, l) → q`, either `l` is an attribute of `p`'s class (and `q`'s
//! class is a subtype of the declared attribute type — the type checker's job to ensure) or `l`
//! is a frame's variable or scope link.
//!
//! After any statement that may orphan nodes — a scope pop, an assignment, a loop ending — a
//! reachability pass from the root reclaims everything unreachable.  GC never affects results,
//! only liveness; the graph records simple statistics about each pass.

use fxhash::FxHashMap;
use thiserror::Error;

use crate::arena::Handle;
use crate::arena::SupplementalArena;
use crate::graph::GraphArena;
use crate::graph::Label;
use crate::graph::LayoutGraph;
use crate::graph::Node;
use crate::lattice::Cla;
use crate::lattice::ClassRegistry;
use crate::lattice::Ty;
use crate::lattice::Value;
use crate::lattice::ValueSet;
use crate::pattern::PatternGraph;
use crate::stats::FrequencyDistribution;

/// Errors that can occur while manipulating a state graph.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum StateError {
    #[error("there is no enclosing scope to pop")]
    NoScope,
    #[error("the variable is not defined in any enclosing scope")]
    UndefVar,
    #[error("the object has no such attribute")]
    UndefAttr,
}

/// Statistics about a state graph's garbage collection, for drivers that want to report them.
#[derive(Clone, Debug, Default)]
pub struct GraphStats {
    pub gc_runs: usize,
    /// How many nodes each collection reclaimed.
    pub reclaimed: FrequencyDistribution<usize>,
    /// How many nodes were live after each collection.
    pub live: FrequencyDistribution<usize>,
}

/// The runtime state: a rooted layout graph, each node's dynamic class, and each primitive
/// node's value.  The root is the innermost scope frame.
pub struct StateGraph {
    layout: LayoutGraph,
    types: SupplementalArena<Node, Handle<Cla>>,
    values: SupplementalArena<Node, Value>,
    scope_label: Handle<Label>,
    null_type: Handle<Cla>,
    stats: GraphStats,
}

impl StateGraph {
    /// Creates a state graph containing a single empty scope frame.
    pub fn new(arena: &mut GraphArena, registry: &ClassRegistry) -> StateGraph {
        let root = arena.new_node();
        let mut types = SupplementalArena::new();
        types.set(root, registry.null_type());
        StateGraph {
            layout: LayoutGraph::new(root),
            types,
            values: SupplementalArena::new(),
            scope_label: arena.scope_label(),
            null_type: registry.null_type(),
            stats: GraphStats::default(),
        }
    }

    #[inline(always)]
    pub fn layout(&self) -> &LayoutGraph {
        &self.layout
    }

    /// The innermost scope frame.
    #[inline(always)]
    pub fn root(&self) -> Handle<Node> {
        self.layout.root()
    }

    /// The dynamic class of a node.
    pub fn node_class(&self, node: Handle<Node>) -> Option<Handle<Cla>> {
        self.types.get(node).copied()
    }

    /// The value of a primitive-typed node.
    pub fn value(&self, node: Handle<Node>) -> Option<Value> {
        self.values.get(node).copied()
    }

    pub fn stats(&self) -> &GraphStats {
        &self.stats
    }

    //---------------------------------------------------------------------------------------------
    // Allocation

    /// Instantiates a class: a fresh node of that class with one fresh `null`-typed child per
    /// declared attribute.
    pub fn add_object(
        &mut self,
        arena: &mut GraphArena,
        registry: &ClassRegistry,
        cla: Handle<Cla>,
    ) -> Handle<Node> {
        let labels = registry[cla].attr_labels();
        let (node, children) = self.layout.add_object(arena, &labels);
        self.types.set(node, cla);
        for child in children {
            self.types.set(child, self.null_type);
        }
        node
    }

    /// Adds a fresh primitive node carrying the given value.
    pub fn add_value(
        &mut self,
        arena: &mut GraphArena,
        registry: &ClassRegistry,
        value: Value,
    ) -> Handle<Node> {
        let node = self.add_object(arena, registry, value.cla);
        self.values.set(node, value);
        node
    }

    //---------------------------------------------------------------------------------------------
    // Scopes and lookup

    /// Opens a fresh scope frame enclosing the current one.
    pub fn push_scope(&mut self, arena: &mut GraphArena) {
        let frame = arena.new_node();
        self.layout.add_node(frame);
        self.types.set(frame, self.null_type);
        self.layout.swing(frame, self.scope_label, self.layout.root());
        self.layout.set_root(frame);
    }

    /// Closes the innermost scope frame and reclaims whatever it kept alive.
    pub fn pop_scope(&mut self) -> Result<(), StateError> {
        let outer = self
            .layout
            .target(self.layout.root(), self.scope_label)
            .ok_or(StateError::NoScope)?;
        self.layout.set_root(outer);
        self.gc();
        Ok(())
    }

    /// Finds the frame defining a variable, walking `$` links outward from the innermost frame.
    /// Returns the `(frame, label)` edge site.
    pub fn find_lvar(
        &self,
        label: Handle<Label>,
    ) -> Result<(Handle<Node>, Handle<Label>), StateError> {
        let mut frame = self.layout.root();
        loop {
            if self.layout.has_label(frame, label) {
                return Ok((frame, label));
            }
            match self.layout.target(frame, self.scope_label) {
                Some(outer) => frame = outer,
                None => return Err(StateError::UndefVar),
            }
        }
    }

    /// Finds the node a variable is currently bound to.
    pub fn find_var(&self, label: Handle<Label>) -> Result<Handle<Node>, StateError> {
        let (frame, label) = self.find_lvar(label)?;
        self.layout.target(frame, label).ok_or(StateError::UndefVar)
    }

    /// Finds the `(object, label)` edge site of an attribute.
    pub fn find_lattr(
        &self,
        node: Handle<Node>,
        label: Handle<Label>,
    ) -> Result<(Handle<Node>, Handle<Label>), StateError> {
        if !self.layout.contains(node) {
            return Err(StateError::UndefVar);
        }
        if !self.layout.has_label(node, label) {
            return Err(StateError::UndefAttr);
        }
        Ok((node, label))
    }

    /// Finds the node an attribute currently points at.
    pub fn find_attr(
        &self,
        node: Handle<Node>,
        label: Handle<Label>,
    ) -> Result<Handle<Node>, StateError> {
        let (node, label) = self.find_lattr(node, label)?;
        self.layout.target(node, label).ok_or(StateError::UndefAttr)
    }

    /// Assigns or overwrites the target of the edge `(node, label)`.
    pub fn swing(&mut self, node: Handle<Node>, label: Handle<Label>, target: Handle<Node>) {
        self.layout.swing(node, label, target);
    }

    //---------------------------------------------------------------------------------------------
    // Reachability

    /// Reclaims every node unreachable from the root, dropping its annotations.
    pub fn gc(&mut self) {
        let before = self.layout.node_count();
        self.layout = self.layout.gc();
        let layout = &self.layout;
        let dead: Vec<Handle<Node>> = self
            .types
            .iter()
            .map(|(node, _)| node)
            .filter(|node| !layout.contains(*node))
            .collect();
        for node in dead {
            self.types.remove(node);
            self.values.remove(node);
        }
        let after = self.layout.node_count();
        self.stats.gc_runs += 1;
        self.stats.reclaimed.record(before - after);
        self.stats.live.record(after);
        copious_debugging!("gc: {} nodes reclaimed, {} live", before - after, after);
    }

    /// Freezes the subgraph rooted at a node as a pattern-graph view: primitive nodes become
    /// singleton value sets, every other node keeps its dynamic class.  This is the subject side
    /// of match execution.
    pub fn extract(&self, node: Handle<Node>) -> PatternGraph {
        let layout = self.layout.extracted(node);
        let mut types = FxHashMap::default();
        for member in layout.iter_nodes() {
            if let Some(value) = self.values.get(member) {
                types.insert(member, Ty::Values(ValueSet::singleton(*value)));
            } else if let Some(cla) = self.types.get(member) {
                types.insert(member, Ty::Class(*cla));
            }
        }
        PatternGraph { layout, types }
    }
}
