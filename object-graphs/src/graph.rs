// -*- coding: utf-8 -*-
// ------------------------------------------------------------------------------------------------
// Copyright © 2021, object-graphs authors.
// Licensed under either of Apache License, Version 2.0, or MIT license, at your option.
// Please see the LICENSE-APACHE or LICENSE-MIT files in this distribution for license details.
// ------------------------------------------------------------------------------------------------

//! Defines the labeled graph kernel that object states and patterns are both built from.
//!
//! Everything in this system — every live object, every primitive value, every scope frame, every
//! pattern placeholder — is a [`Node`][]: an opaque identity with no payload, minted by the
//! monotonically increasing factory inside a [`GraphArena`][].  Structure lives entirely in
//! [`LayoutGraph`s][`LayoutGraph`]: a rooted directed graph whose edges are keyed by
//! [`Label`][], with at most one outgoing edge per `(node, label)` pair.
//!
//! A layout graph says nothing about types or values.  A state graph annotates a layout graph
//! with dynamic classes and primitive values (see the [`state`][] module); a pattern graph
//! annotates one with required classes or value sets (see the [`pattern`][] module).  Keeping the
//! layout representation shared is what lets the matching algorithms traverse a pattern and a
//! state in lockstep.
//!
//! Nodes that become unreachable from the root — after a scope is popped, an edge is swung away,
//! or a loop terminates — are dropped by [`LayoutGraph::gc`][], a breadth-first reachability pass.
//! The node _identities_ are never reused; only the structure referring to them is rebuilt.
//!
//! [`GraphArena`]: struct.GraphArena.html
//! [`Label`]: struct.Label.html
//! [`LayoutGraph`]: struct.LayoutGraph.html
//! [`LayoutGraph::gc`]: struct.LayoutGraph.html#method.gc
//! [`Node`]: enum.Node.html
//! [`pattern`]: ../pattern/index.html
//! [`state`]: ../state/index.html

use std::collections::VecDeque;
use std::fmt::Display;
use std::num::NonZeroU32;
use std::ops::Index;

use fxhash::FxHashMap;
use itertools::Itertools;
use smallvec::SmallVec;

use crate::arena::Arena;
use crate::arena::Handle;
use crate::arena::HandleSet;

//-------------------------------------------------------------------------------------------------
// Labels

/// A name appearing on an edge: an attribute, a variable, a scope-frame link, or a pattern
/// reference name.  Operator names and class tags are interned here too, so that every name in
/// the system is a cheap, comparable handle.
///
/// We deduplicate `Label` instances in a [`GraphArena`][] — there are never two labels with the
/// same content, so you can compare _handles_ using simple equality without dereferencing them.
///
/// [`GraphArena`]: struct.GraphArena.html
pub struct Label {
    content: String,
}

impl Label {
    pub fn as_str(&self) -> &str {
        &self.content
    }
}

/// Arbitrary string content appearing as a primitive _value_ in a program.  Interned separately
/// from labels so that values stay `Copy` while identifiers keep their own namespace.
pub struct Text {
    content: String,
}

impl Text {
    pub fn as_str(&self) -> &str {
        &self.content
    }
}

//-------------------------------------------------------------------------------------------------
// Nodes and the graph arena

/// A node in a layout graph: a pure identity.  You cannot construct one of these; you can only
/// mint fresh handles to them via [`GraphArena::new_node`][].
///
/// [`GraphArena::new_node`]: struct.GraphArena.html#method.new_node
pub enum Node {}

/// The identity space of an interpreter instance: interned labels, interned string values, and
/// the node factory.  Every layout graph in a run — the state graph and all of its pattern
/// graphs — mints its nodes from the same arena, which is what allows a match bijection to carry
/// nodes from one graph into another.
pub struct GraphArena {
    labels: Arena<Label>,
    label_handles: FxHashMap<String, Handle<Label>>,
    texts: Arena<Text>,
    text_handles: FxHashMap<String, Handle<Text>>,
    scope_label: Handle<Label>,
    next_node: u32,
}

impl GraphArena {
    pub fn new() -> GraphArena {
        let mut labels = Arena::new();
        let mut label_handles = FxHashMap::default();
        let scope_label = labels.add(Label {
            content: "$".to_string(),
        });
        label_handles.insert("$".to_string(), scope_label);
        GraphArena {
            labels,
            label_handles,
            texts: Arena::new(),
            text_handles: FxHashMap::default(),
            scope_label,
            next_node: 1,
        }
    }

    /// Adds a label to the arena, ensuring that there's only ever one copy of a particular label.
    pub fn add_label<S: AsRef<str> + ?Sized>(&mut self, label: &S) -> Handle<Label> {
        let label = label.as_ref();
        if let Some(handle) = self.label_handles.get(label) {
            return *handle;
        }
        let handle = self.labels.add(Label {
            content: label.to_string(),
        });
        self.label_handles.insert(label.to_string(), handle);
        handle
    }

    /// Adds an interned string value to the arena, ensuring that there's only ever one copy of a
    /// particular string.
    pub fn add_text<S: AsRef<str> + ?Sized>(&mut self, text: &S) -> Handle<Text> {
        let text = text.as_ref();
        if let Some(handle) = self.text_handles.get(text) {
            return *handle;
        }
        let handle = self.texts.add(Text {
            content: text.to_string(),
        });
        self.text_handles.insert(text.to_string(), handle);
        handle
    }

    /// The distinguished label `$` that chains scope frames outward.
    #[inline(always)]
    pub fn scope_label(&self) -> Handle<Label> {
        self.scope_label
    }

    /// Mints a fresh node identity.  Identities are monotonically increasing and never reused.
    pub fn new_node(&mut self) -> Handle<Node> {
        let index = self.next_node;
        self.next_node += 1;
        Handle::new(unsafe { NonZeroU32::new_unchecked(index) })
    }

    /// Returns the number of nodes that have been minted so far.
    pub fn nodes_minted(&self) -> u32 {
        self.next_node - 1
    }
}

impl Default for GraphArena {
    fn default() -> GraphArena {
        GraphArena::new()
    }
}

impl Index<Handle<Label>> for GraphArena {
    type Output = str;
    #[inline(always)]
    fn index(&self, handle: Handle<Label>) -> &str {
        self.labels.get(handle).as_str()
    }
}

impl Index<Handle<Text>> for GraphArena {
    type Output = str;
    #[inline(always)]
    fn index(&self, handle: Handle<Text>) -> &str {
        self.texts.get(handle).as_str()
    }
}

#[doc(hidden)]
pub struct DisplayLabel<'a> {
    wrapped: Handle<Label>,
    arena: &'a GraphArena,
}

impl<'a> Display for DisplayLabel<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", &self.arena[self.wrapped])
    }
}

impl Handle<Label> {
    pub fn display(self, arena: &GraphArena) -> impl Display + '_ {
        DisplayLabel {
            wrapped: self,
            arena,
        }
    }
}

//-------------------------------------------------------------------------------------------------
// Layout graphs

/// A labeled edge between two nodes.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Edge {
    pub label: Handle<Label>,
    pub target: Handle<Node>,
}

/// A rooted directed graph with labeled edges: at most one outgoing edge per `(node, label)`
/// pair.  Each layout graph owns its structure (which nodes are members, and which edges connect
/// them), while the node identities themselves are shared across all graphs of one
/// [`GraphArena`][].
///
/// Invariant: every member node is reachable from the root, except transiently while a graph is
/// under construction; [`gc`][] repairs any violation.
///
/// [`GraphArena`]: struct.GraphArena.html
/// [`gc`]: #method.gc
#[derive(Clone)]
pub struct LayoutGraph {
    nodes: HandleSet<Node>,
    edges: FxHashMap<Handle<Node>, SmallVec<[Edge; 8]>>,
    root: Handle<Node>,
}

impl LayoutGraph {
    /// Creates a layout graph containing just the given root, with no edges.
    pub fn new(root: Handle<Node>) -> LayoutGraph {
        let mut nodes = HandleSet::new();
        nodes.add(root);
        LayoutGraph {
            nodes,
            edges: FxHashMap::default(),
            root,
        }
    }

    pub(crate) fn from_parts(
        nodes: HandleSet<Node>,
        edges: FxHashMap<Handle<Node>, SmallVec<[Edge; 8]>>,
        root: Handle<Node>,
    ) -> LayoutGraph {
        LayoutGraph { nodes, edges, root }
    }

    #[inline(always)]
    pub fn root(&self) -> Handle<Node> {
        self.root
    }

    pub(crate) fn set_root(&mut self, root: Handle<Node>) {
        self.root = root;
    }

    /// Returns whether a node is a member of this graph.
    pub fn contains(&self, node: Handle<Node>) -> bool {
        self.nodes.contains(node)
    }

    /// Adds a (freshly minted) node to this graph, with no edges yet.
    pub fn add_node(&mut self, node: Handle<Node>) {
        self.nodes.add(node);
    }

    /// Returns the number of member nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Returns an iterator over the member nodes of this graph.
    pub fn iter_nodes(&self) -> impl Iterator<Item = Handle<Node>> + '_ {
        self.nodes.iter()
    }

    /// Returns the outgoing edges of a node, in the order they were first added.
    pub fn edges(&self, node: Handle<Node>) -> &[Edge] {
        self.edges.get(&node).map(|es| es.as_slice()).unwrap_or(&[])
    }

    /// Returns an iterator over the outgoing labels of a node.
    pub fn labels(&self, node: Handle<Node>) -> impl Iterator<Item = Handle<Label>> + '_ {
        self.edges(node).iter().map(|edge| edge.label)
    }

    /// Returns whether a node has an outgoing edge with the given label.
    pub fn has_label(&self, node: Handle<Node>, label: Handle<Label>) -> bool {
        self.edges(node).iter().any(|edge| edge.label == label)
    }

    /// Returns the target of the edge leaving `node` with `label`, if there is one.
    pub fn target(&self, node: Handle<Node>, label: Handle<Label>) -> Option<Handle<Node>> {
        self.edges(node)
            .iter()
            .find(|edge| edge.label == label)
            .map(|edge| edge.target)
    }

    /// Assigns or overwrites the target of the edge `(node, label)`.  Both endpoints must already
    /// be members of this graph.
    pub fn swing(&mut self, node: Handle<Node>, label: Handle<Label>, target: Handle<Node>) {
        let edges = self.edges.entry(node).or_default();
        match edges.iter_mut().find(|edge| edge.label == label) {
            Some(edge) => edge.target = target,
            None => edges.push(Edge { label, target }),
        }
    }

    /// Creates a fresh node with one fresh `(label → child)` edge per given attribute label, and
    /// adds all of them to this graph.  Returns the new node and its children, in attribute
    /// order.
    pub fn add_object(
        &mut self,
        arena: &mut GraphArena,
        attrs: &[Handle<Label>],
    ) -> (Handle<Node>, SmallVec<[Handle<Node>; 8]>) {
        let node = arena.new_node();
        self.nodes.add(node);
        let mut children = SmallVec::new();
        for label in attrs {
            let child = arena.new_node();
            self.nodes.add(child);
            self.swing(node, *label, child);
            children.push(child);
        }
        (node, children)
    }

    /// Returns the subgraph reachable from the given node, rooted there.  This is what freezes a
    /// pattern view of a runtime object.
    pub fn extracted(&self, root: Handle<Node>) -> LayoutGraph {
        let mut nodes = HandleSet::new();
        let mut edges = FxHashMap::default();
        let mut queue = VecDeque::new();
        queue.push_back(root);
        while let Some(node) = queue.pop_front() {
            if nodes.contains(node) {
                continue;
            }
            nodes.add(node);
            let outgoing: SmallVec<[Edge; 8]> = self.edges(node).iter().copied().collect();
            for edge in &outgoing {
                queue.push_back(edge.target);
            }
            edges.insert(node, outgoing);
        }
        LayoutGraph { nodes, edges, root }
    }

    /// Breadth-first reachability from the root: drops all unreachable nodes and their edges.
    /// The result is identical up to the reachable subgraph rooted at the root.
    pub fn gc(&self) -> LayoutGraph {
        self.extracted(self.root)
    }

    pub fn display<'a>(&'a self, arena: &'a GraphArena) -> impl Display + 'a {
        DisplayLayoutGraph {
            wrapped: self,
            arena,
        }
    }
}

#[doc(hidden)]
pub struct DisplayLayoutGraph<'a> {
    wrapped: &'a LayoutGraph,
    arena: &'a GraphArena,
}

impl<'a> Display for DisplayLayoutGraph<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let graph = self.wrapped;
        writeln!(f, "layout graph rooted at ({})", graph.root().as_u32())?;
        for node in graph.iter_nodes().sorted() {
            write!(f, "  ({})", node.as_u32())?;
            let mut edges = graph.edges(node).to_vec();
            edges.sort_by_key(|edge| self.arena[edge.label].to_string());
            for edge in edges {
                write!(
                    f,
                    " {} -> ({})",
                    edge.label.display(self.arena),
                    edge.target.as_u32()
                )?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
