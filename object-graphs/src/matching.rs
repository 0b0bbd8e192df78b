// -*- coding: utf-8 -*-
// ------------------------------------------------------------------------------------------------
// Copyright © 2021, object-graphs authors.
// Licensed under either of Apache License, Version 2.0, or MIT license, at your option.
// Please see the LICENSE-APACHE or LICENSE-MIT files in this distribution for license details.
// ------------------------------------------------------------------------------------------------

//! The structural graph algorithms: matching, union, and intersection.
//!
//! All three traverse two or more layout graphs in lockstep from their roots and build
//! correspondences between their nodes.
//!
//! [`match_graphs`][] constructs a subtype-aware homomorphism from a pattern graph into a subject
//! graph: a partial bijection under which every pattern edge has a same-labeled subject edge, and
//! every subject node's type is at most the pattern node's required type.  The subject may have
//! more structure than the pattern demands.  Visited pairs short-circuit, which is what lets a
//! cyclic pattern terminate.
//!
//! [`union_graphs`][] computes the union of several pattern graphs — the greatest lower bound of
//! their shapes, used for pattern _conjunction_.  Roots are identified, and recursively, nodes
//! reached from identified nodes by the same label are identified; contradictory identifications
//! fail `NoUnion`.  The synthesised union graph is returned along with one bijection per
//! component mapping its nodes into the union.
//!
//! [`intersect_graphs`][] computes the intersection — the least upper bound of the shapes, used
//! for pattern _disjunction_.  Only labels present in every component are followed, so the
//! co-domain represents what the alternatives have in common; a co-domain node may be the image
//! of several nodes of one component.
//!
//! [`conjoin`][] and [`disjoin`][] pair the two constructions with the type lattice: the type at
//! each union node is the infimum of the types identified there, and the type at each
//! intersection node is their supremum.
//!
//! [`conjoin`]: fn.conjoin.html
//! [`disjoin`]: fn.disjoin.html
//! [`intersect_graphs`]: fn.intersect_graphs.html
//! [`match_graphs`]: fn.match_graphs.html
//! [`union_graphs`]: fn.union_graphs.html

use fxhash::FxHashMap;
use itertools::izip;
use smallvec::SmallVec;
use thiserror::Error;

use crate::arena::Handle;
use crate::arena::HandleSet;
use crate::bijection::BijectionError;
use crate::graph::Edge;
use crate::graph::GraphArena;
use crate::graph::Label;
use crate::graph::LayoutGraph;
use crate::graph::Node;
use crate::lattice::ClassRegistry;
use crate::lattice::LatticeError;
use crate::lattice::Ty;
use crate::pattern::NodeMap;
use crate::pattern::PatternGraph;

/// Errors raised by the graph algorithms.  `Mismatch` is internal to match execution — a failed
/// case is skipped, never reported; the others surface at type-check time.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum MatchError {
    #[error("the pattern does not match the subject")]
    Mismatch,
    #[error("the patterns make contradictory identifications")]
    NoUnion,
    #[error("the conjoined types are incompatible")]
    NoConj,
    #[error(transparent)]
    NonUniqueImage(#[from] BijectionError),
    #[error(transparent)]
    Lattice(#[from] LatticeError),
}

//-------------------------------------------------------------------------------------------------
// Matching

/// Constructs a partial bijection from the pattern's nodes to the subject's nodes, by DFS from
/// the pattern root matched against the subject root.  For each pair `(p, q)`:
///
///  1. if `p` is already mapped, it must be mapped to `q`;
///  2. otherwise the subject type at `q` must satisfy `le(subject type, pattern type)`;
///  3. `q` must not already be claimed by another pattern node;
///  4. every label leaving `p` must also leave `q`, and the targets must match in turn.
///
/// Labels leaving `q` but not `p` are ignored: the subject may have more structure than the
/// pattern demands.
pub fn match_graphs<F>(
    pattern: &PatternGraph,
    subject: &PatternGraph,
    le: F,
) -> Result<NodeMap, MatchError>
where
    F: Fn(&Ty, &Ty) -> bool,
{
    let mut mapping = NodeMap::new();
    let mut stack = vec![(pattern.root(), subject.root())];
    while let Some((p, q)) = stack.pop() {
        if let Some(mapped) = mapping.get(p) {
            if mapped != q {
                return Err(MatchError::Mismatch);
            }
            continue;
        }
        let required = pattern.ty(p).ok_or(MatchError::Mismatch)?;
        let actual = subject.ty(q).ok_or(MatchError::Mismatch)?;
        if !le(actual, required) {
            copious_debugging!(
                "match: type of ({}) does not satisfy ({})",
                q.as_u32(),
                p.as_u32()
            );
            return Err(MatchError::Mismatch);
        }
        if mapping.has_image(q) {
            return Err(MatchError::Mismatch);
        }
        mapping.insert(p, q);
        for edge in pattern.layout.edges(p) {
            let target = subject
                .layout
                .target(q, edge.label)
                .ok_or(MatchError::Mismatch)?;
            stack.push((edge.target, target));
        }
    }
    Ok(mapping)
}

//-------------------------------------------------------------------------------------------------
// Union

struct UnionBuilder<'a> {
    graphs: &'a [&'a LayoutGraph],
    maps: Vec<NodeMap>,
    nodes: HandleSet<Node>,
    edges: FxHashMap<Handle<Node>, SmallVec<[Edge; 8]>>,
}

impl<'a> UnionBuilder<'a> {
    // One step of the union construction: `tuple` holds the current node of each component (None
    // where the component has no node at this position), `indices` the components that do.
    // Returns the union node the tuple is identified onto.
    fn visit(
        &mut self,
        arena: &mut GraphArena,
        indices: &[usize],
        tuple: &[Option<Handle<Node>>],
    ) -> Result<Handle<Node>, MatchError> {
        let mut known: SmallVec<[Handle<Node>; 4]> = SmallVec::new();
        let mut unknown: SmallVec<[usize; 4]> = SmallVec::new();
        for &i in indices {
            let p = match tuple[i] {
                Some(p) => p,
                None => continue,
            };
            match self.maps[i].get(p) {
                Some(d) => {
                    if !known.contains(&d) {
                        known.push(d);
                    }
                }
                None => unknown.push(i),
            }
        }
        if known.len() > 1 {
            return Err(MatchError::NoUnion);
        }
        if unknown.is_empty() {
            // Every component has already identified this tuple; nothing further to do.  The
            // single known image exists because `indices` is never empty.
            return known.first().copied().ok_or(MatchError::NoUnion);
        }
        let union_node = match known.first() {
            Some(&d) => {
                // A component may not claim a union node that another of its own nodes already
                // occupies: the per-component maps stay injective.
                for &c in &unknown {
                    if self.maps[c].has_image(d) {
                        return Err(MatchError::NoUnion);
                    }
                }
                d
            }
            None => {
                let d = arena.new_node();
                self.nodes.add(d);
                d
            }
        };
        for &c in &unknown {
            if let Some(p) = tuple[c] {
                self.maps[c].insert(p, union_node);
            }
        }
        // Recurse on every label present in any component of the tuple.
        let mut labels: SmallVec<[Handle<Label>; 8]> = SmallVec::new();
        for &i in indices {
            if let Some(p) = tuple[i] {
                for edge in self.graphs[i].edges(p) {
                    if !labels.contains(&edge.label) {
                        labels.push(edge.label);
                    }
                }
            }
        }
        for label in labels {
            let mut child_indices: SmallVec<[usize; 4]> = SmallVec::new();
            let mut child_tuple: Vec<Option<Handle<Node>>> = vec![None; self.graphs.len()];
            for &i in indices {
                if let Some(p) = tuple[i] {
                    if let Some(q) = self.graphs[i].target(p, label) {
                        child_indices.push(i);
                        child_tuple[i] = Some(q);
                    }
                }
            }
            let child = self.visit(arena, &child_indices, &child_tuple)?;
            let edges = self.edges.entry(union_node).or_default();
            match edges.iter_mut().find(|edge| edge.label == label) {
                Some(edge) => edge.target = child,
                None => edges.push(Edge {
                    label,
                    target: child,
                }),
            }
        }
        Ok(union_node)
    }
}

/// Computes the union of several layout graphs: a synthesised graph in which all of the roots are
/// identified and, recursively, nodes reached from identified nodes by the same label are
/// identified.  Returns the union graph and one bijection per component mapping its nodes into
/// the union.  Contradictory identifications fail `NoUnion`.
pub fn union_graphs(
    arena: &mut GraphArena,
    graphs: &[&LayoutGraph],
) -> Result<(LayoutGraph, Vec<NodeMap>), MatchError> {
    let mut builder = UnionBuilder {
        graphs,
        maps: graphs.iter().map(|_| NodeMap::new()).collect(),
        nodes: HandleSet::new(),
        edges: FxHashMap::default(),
    };
    if graphs.is_empty() {
        let root = arena.new_node();
        builder.nodes.add(root);
        return Ok((
            LayoutGraph::from_parts(builder.nodes, builder.edges, root),
            builder.maps,
        ));
    }
    let indices: Vec<usize> = (0..graphs.len()).collect();
    let roots: Vec<Option<Handle<Node>>> = graphs.iter().map(|g| Some(g.root())).collect();
    let root = builder.visit(arena, &indices, &roots)?;
    Ok((
        LayoutGraph::from_parts(builder.nodes, builder.edges, root),
        builder.maps,
    ))
}

//-------------------------------------------------------------------------------------------------
// Intersection

fn intersect_visit(
    arena: &mut GraphArena,
    graphs: &[&LayoutGraph],
    maps: &mut [NodeMap],
    tuple: &[Handle<Node>],
) {
    let images: SmallVec<[Handle<Node>; 4]> = tuple
        .iter()
        .zip(maps.iter())
        .filter_map(|(p, f)| f.get(*p))
        .collect();
    let shared = match images.first() {
        Some(&c) => c,
        None => arena.new_node(),
    };
    for (f, p) in maps.iter_mut().zip(tuple) {
        f.insert(*p, shared);
    }
    if images.len() == tuple.len() {
        // Every component was already identified here; recursing again would not terminate on
        // cyclic patterns.
        return;
    }
    // Recurse on the labels present in every component.
    let first = match tuple.first() {
        Some(&p) => p,
        None => return,
    };
    let labels: SmallVec<[Handle<Label>; 8]> = graphs[0]
        .edges(first)
        .iter()
        .map(|edge| edge.label)
        .filter(|label| {
            izip!(graphs, tuple)
                .skip(1)
                .all(|(g, p)| g.has_label(*p, *label))
        })
        .collect();
    for label in labels {
        let children: Option<Vec<Handle<Node>>> = izip!(graphs, tuple)
            .map(|(g, p)| g.target(*p, label))
            .collect();
        if let Some(children) = children {
            intersect_visit(arena, graphs, maps, &children);
        }
    }
}

/// Computes the intersection of several layout graphs: a fresh co-domain in which a node stands
/// for "simultaneously" one node from every component, connected only by labels present in all of
/// them.  Returns one bijection per component mapping its nodes into the co-domain.  Unlike
/// union, intersection never fails structurally.
pub fn intersect_graphs(arena: &mut GraphArena, graphs: &[&LayoutGraph]) -> Vec<NodeMap> {
    let mut maps: Vec<NodeMap> = graphs.iter().map(|_| NodeMap::new()).collect();
    if graphs.is_empty() {
        return maps;
    }
    let roots: Vec<Handle<Node>> = graphs.iter().map(|g| g.root()).collect();
    intersect_visit(arena, graphs, &mut maps, &roots);
    maps
}

//-------------------------------------------------------------------------------------------------
// Conjunction and disjunction

/// Unions several pattern graphs and reconciles the types identified at each union node with
/// [`ty_inf`][]: a conjunction requires a common subtype at every node, so incompatible types
/// fail `NoConj`.  Returns the reconciled union pattern graph (the checker reads reference
/// types off it) and the per-component bijections into it.
///
/// [`ty_inf`]: ../lattice/struct.ClassRegistry.html#method.ty_inf
pub fn conjoin(
    arena: &mut GraphArena,
    registry: &mut ClassRegistry,
    patterns: &[&PatternGraph],
) -> Result<(PatternGraph, Vec<NodeMap>), MatchError> {
    let layouts: Vec<&LayoutGraph> = patterns.iter().map(|pg| &pg.layout).collect();
    let (layout, maps) = union_graphs(arena, &layouts)?;
    let mut types = FxHashMap::default();
    for union_node in layout.iter_nodes() {
        let mut ts: Vec<Ty> = Vec::new();
        for (map, pg) in izip!(&maps, patterns) {
            if map.has_image(union_node) {
                let source = map.unique_source(union_node)?;
                // Placeholders never survive construction, so every source is typed.
                if let Some(ty) = pg.ty(source) {
                    ts.push(ty.clone());
                }
            }
        }
        if !registry.exists_ty_le_all(&ts) {
            return Err(MatchError::NoConj);
        }
        types.insert(union_node, registry.ty_inf(&ts)?);
    }
    Ok((PatternGraph { layout, types }, maps))
}

/// Intersects several pattern graphs and reconciles the types gathered at each co-domain node
/// with [`ty_sup`][]: a disjunction only promises what every alternative provides.  Returns the
/// per-component bijections into the co-domain and the reconciled type of each co-domain node.
///
/// [`ty_sup`]: ../lattice/struct.ClassRegistry.html#method.ty_sup
pub fn disjoin(
    arena: &mut GraphArena,
    registry: &mut ClassRegistry,
    patterns: &[&PatternGraph],
) -> Result<(Vec<NodeMap>, FxHashMap<Handle<Node>, Ty>), MatchError> {
    let layouts: Vec<&LayoutGraph> = patterns.iter().map(|pg| &pg.layout).collect();
    let maps = intersect_graphs(arena, &layouts);
    let mut shared_nodes: Vec<Handle<Node>> = maps.iter().flat_map(|f| f.images()).collect();
    shared_nodes.sort();
    shared_nodes.dedup();
    let mut types = FxHashMap::default();
    for shared in shared_nodes {
        let mut ts: Vec<Ty> = Vec::new();
        for (map, pg) in izip!(&maps, patterns) {
            for source in map.sources(shared) {
                if let Some(ty) = pg.ty(*source) {
                    ts.push(ty.clone());
                }
            }
        }
        types.insert(shared, registry.ty_sup(&ts)?);
    }
    Ok((maps, types))
}
