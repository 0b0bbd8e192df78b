// -*- coding: utf-8 -*-
// ------------------------------------------------------------------------------------------------
// Copyright © 2021, object-graphs authors.
// Licensed under either of Apache License, Version 2.0, or MIT license, at your option.
// Please see the LICENSE-APACHE or LICENSE-MIT files in this distribution for license details.
// ------------------------------------------------------------------------------------------------

//! The type lattice: classes, value sets, and the subtyping rules connecting them.
//!
//! A [`Cla`][] is a nominal type: an optional [`Tag`][] (absent means _anonymous_), the
//! transitive closure of its supertypes' tags, and a closed attribute schema.  The subtype
//! relation is containment of ancestor-tag sets, so that a class with _more_ ancestors sits
//! _lower_ in the lattice.  Anonymous classes give the lattice its meets and joins:
//! [`inter`][`ClassRegistry::inter`] builds the greatest lower bound of a set of classes (union
//! of ancestors, union of attributes), and [`union`][`ClassRegistry::union`] builds the least
//! upper bound (intersection of ancestors, intersection of attributes).
//!
//! Below the primitive classes sit [`ValueSet`s][`ValueSet`]: finite sets of values acting as
//! refinement types.  A value set is a subtype of another iff it is a subset, and a subtype of a
//! class iff every member is an instance of that class.  The lattice operations extend
//! accordingly: [`ty_inf`][`ClassRegistry::ty_inf`] unions value sets (a _disjunction_ of allowed
//! values is the weakest requirement satisfying every conjunct), and
//! [`ty_sup`][`ClassRegistry::ty_sup`] intersects them.
//!
//! All classes live in a [`ClassRegistry`][], which is owned by a single interpreter instance —
//! there is no process-global class table.
//!
//! [`Cla`]: struct.Cla.html
//! [`ClassRegistry`]: struct.ClassRegistry.html
//! [`ClassRegistry::inter`]: struct.ClassRegistry.html#method.inter
//! [`ClassRegistry::union`]: struct.ClassRegistry.html#method.union
//! [`ClassRegistry::ty_inf`]: struct.ClassRegistry.html#method.ty_inf
//! [`ClassRegistry::ty_sup`]: struct.ClassRegistry.html#method.ty_sup
//! [`Tag`]: type.Tag.html
//! [`ValueSet`]: struct.ValueSet.html

use std::fmt::Display;
use std::ops::Index;

use controlled_option::ControlledOption;
use either::Either;
use fxhash::FxHashMap;
use smallvec::SmallVec;
use thiserror::Error;

use crate::arena::Arena;
use crate::arena::Handle;
use crate::graph::GraphArena;
use crate::graph::Label;
use crate::graph::Text;

/// Errors that can occur while building or combining classes.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum LatticeError {
    #[error("a class with this tag already exists")]
    DuplicateClass,
    #[error("no class with this tag exists")]
    UndefinedClass,
    #[error("inherited attributes have conflicting types")]
    AttrTypeConflict,
    #[error("the types have no minimum")]
    MinType,
}

//-------------------------------------------------------------------------------------------------
// Classes

/// The symbolic identity of a named class.  Tags are interned labels; a tag whose text starts
/// with `*` is anonymous by convention and does not participate in its own ancestor set.
pub type Tag = Handle<Label>;

/// The declared type of an attribute: either a resolved class, or a lazy tag reference that is
/// dereferenced by [`ClassRegistry::resolve_lazy`][] once the class body is complete.  The lazy
/// form is what lets a class refer to itself (or a later class) in its own attribute schema.
///
/// [`ClassRegistry::resolve_lazy`]: struct.ClassRegistry.html#method.resolve_lazy
pub type AttrType = Either<Handle<Cla>, Tag>;

/// A resolved attribute declaration.
pub fn attr_type(cla: Handle<Cla>) -> AttrType {
    Either::Left(cla)
}

/// A lazy attribute declaration, dereferenced once the tag it names has been registered.
pub fn lazy_type(tag: Tag) -> AttrType {
    Either::Right(tag)
}

/// A class: an optional tag, the transitive ancestor-tag set, and a closed attribute schema.
pub struct Cla {
    tag: ControlledOption<Tag>,
    // Whether `tag` is present and not anonymous-by-convention; only named classes compare by
    // tag.
    named: bool,
    // Sorted; includes the class's own tag iff it is named.
    tags: SmallVec<[Tag; 8]>,
    // Insertion-ordered: declared attributes first, then inherited ones.
    attrs: SmallVec<[(Handle<Label>, AttrType); 8]>,
}

impl Cla {
    /// Returns the tag this class was created with, if any.
    pub fn tag(&self) -> Option<Tag> {
        self.tag.into_option()
    }

    pub fn is_named(&self) -> bool {
        self.named
    }

    /// The transitive ancestor-tag set, sorted.
    pub fn ancestors(&self) -> &[Tag] {
        &self.tags
    }

    /// The attribute schema, declared attributes first.
    pub fn attrs(&self) -> &[(Handle<Label>, AttrType)] {
        &self.attrs
    }

    /// Looks up the declared type of an attribute.
    pub fn attr(&self, label: Handle<Label>) -> Option<AttrType> {
        self.attrs
            .iter()
            .find(|(la, _)| *la == label)
            .map(|(_, ty)| *ty)
    }

    pub fn has_attr(&self, label: Handle<Label>) -> bool {
        self.attr(label).is_some()
    }

    /// The attribute labels, in schema order.
    pub fn attr_labels(&self) -> SmallVec<[Handle<Label>; 8]> {
        self.attrs.iter().map(|(la, _)| *la).collect()
    }

    fn has_all_ancestors(&self, other: &[Tag]) -> bool {
        // Both slices are sorted.
        let mut mine = self.tags.iter();
        for tag in other {
            loop {
                match mine.next() {
                    Some(t) if t == tag => break,
                    Some(t) if t < tag => continue,
                    _ => return false,
                }
            }
        }
        true
    }
}

//-------------------------------------------------------------------------------------------------
// Values and value sets

/// The payload of a primitive value.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Payload {
    Int(i64),
    Str(Handle<Text>),
    Bool(bool),
}

/// A primitive value: a primitive class paired with a payload.  String payloads are interned in
/// the graph arena, so values are `Copy` and compare cheaply.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Value {
    pub cla: Handle<Cla>,
    pub payload: Payload,
}

impl Value {
    pub fn display<'a>(&'a self, arena: &'a GraphArena) -> impl Display + 'a {
        DisplayValue {
            wrapped: self,
            arena,
        }
    }
}

#[doc(hidden)]
pub struct DisplayValue<'a> {
    wrapped: &'a Value,
    arena: &'a GraphArena,
}

impl<'a> Display for DisplayValue<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self.wrapped.payload {
            Payload::Int(i) => write!(f, "{}", i),
            Payload::Str(s) => write!(f, "{}", &self.arena[s]),
            // Booleans print capitalized in program output.
            Payload::Bool(true) => write!(f, "True"),
            Payload::Bool(false) => write!(f, "False"),
        }
    }
}

/// A finite set of primitive values, acting as a refinement type below its base primitive class.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct ValueSet {
    // Sorted and deduplicated, so that equality and subset tests are cheap merges.
    values: SmallVec<[Value; 4]>,
}

impl ValueSet {
    pub fn new(values: impl IntoIterator<Item = Value>) -> ValueSet {
        let mut values: SmallVec<[Value; 4]> = values.into_iter().collect();
        values.sort();
        values.dedup();
        ValueSet { values }
    }

    pub fn singleton(value: Value) -> ValueSet {
        ValueSet {
            values: smallvec::smallvec![value],
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = Value> + '_ {
        self.values.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn contains(&self, value: Value) -> bool {
        self.values.binary_search(&value).is_ok()
    }

    pub fn is_subset(&self, other: &ValueSet) -> bool {
        self.values.iter().all(|v| other.contains(*v))
    }

    pub fn union(&self, other: &ValueSet) -> ValueSet {
        ValueSet::new(self.iter().chain(other.iter()))
    }

    pub fn intersection(&self, other: &ValueSet) -> ValueSet {
        ValueSet::new(self.iter().filter(|v| other.contains(*v)))
    }
}

//-------------------------------------------------------------------------------------------------
// Types

/// The annotation domain of pattern nodes and the codomain of the type checker: either a class,
/// or a value-set refinement.
#[derive(Clone, Debug)]
pub enum Ty {
    Class(Handle<Cla>),
    Values(ValueSet),
}

impl Ty {
    pub fn as_class(&self) -> Option<Handle<Cla>> {
        match self {
            Ty::Class(cla) => Some(*cla),
            Ty::Values(_) => None,
        }
    }
}

//-------------------------------------------------------------------------------------------------
// The class registry

/// All of the classes of one interpreter instance: the named-class table, the distinguished
/// classes, and every anonymous class created by a lattice operation.  A class is referenced by
/// `Handle<Cla>`; comparing classes goes through the registry, because equality is structural
/// (shared tag or equal ancestor sets), not handle identity.
pub struct ClassRegistry {
    classes: Arena<Cla>,
    class_for_tag: FxHashMap<Tag, Handle<Cla>>,
    no_type: Handle<Cla>,
    null_type: Handle<Cla>,
    int_type: Handle<Cla>,
    str_type: Handle<Cla>,
    bool_type: Handle<Cla>,
}

fn add_builtin(
    arena: &mut GraphArena,
    classes: &mut Arena<Cla>,
    class_for_tag: &mut FxHashMap<Tag, Handle<Cla>>,
    name: &str,
) -> Handle<Cla> {
    let tag = arena.add_label(name);
    let named = !name.starts_with('*');
    let mut tags = SmallVec::new();
    if named {
        tags.push(tag);
    }
    let handle = classes.add(Cla {
        tag: ControlledOption::some(tag),
        named,
        tags,
        attrs: SmallVec::new(),
    });
    class_for_tag.insert(tag, handle);
    handle
}

impl ClassRegistry {
    /// Creates a registry containing only the distinguished classes.
    pub fn new(arena: &mut GraphArena) -> ClassRegistry {
        let mut classes = Arena::new();
        let mut class_for_tag = FxHashMap::default();
        let no_type = add_builtin(arena, &mut classes, &mut class_for_tag, "*TOP");
        let null_type = add_builtin(arena, &mut classes, &mut class_for_tag, "NULL");
        let int_type = add_builtin(arena, &mut classes, &mut class_for_tag, "INT");
        let str_type = add_builtin(arena, &mut classes, &mut class_for_tag, "STR");
        let bool_type = add_builtin(arena, &mut classes, &mut class_for_tag, "BOOL");
        ClassRegistry {
            classes,
            class_for_tag,
            no_type,
            null_type,
            int_type,
            str_type,
            bool_type,
        }
    }

    /// The universal supertype: no ancestors, no attributes.
    #[inline(always)]
    pub fn no_type(&self) -> Handle<Cla> {
        self.no_type
    }

    /// The type of `null`, a subtype of everything.
    #[inline(always)]
    pub fn null_type(&self) -> Handle<Cla> {
        self.null_type
    }

    #[inline(always)]
    pub fn int_type(&self) -> Handle<Cla> {
        self.int_type
    }

    #[inline(always)]
    pub fn str_type(&self) -> Handle<Cla> {
        self.str_type
    }

    #[inline(always)]
    pub fn bool_type(&self) -> Handle<Cla> {
        self.bool_type
    }

    pub fn int_value(&self, value: i64) -> Value {
        Value {
            cla: self.int_type,
            payload: Payload::Int(value),
        }
    }

    pub fn str_value(&self, text: Handle<Text>) -> Value {
        Value {
            cla: self.str_type,
            payload: Payload::Str(text),
        }
    }

    pub fn bool_value(&self, value: bool) -> Value {
        Value {
            cla: self.bool_type,
            payload: Payload::Bool(value),
        }
    }

    /// Adds a named class.  `supers` contributes ancestor tags and inherited attributes; an
    /// inherited attribute that clashes with a declared one must agree on its type.
    pub fn add_class(
        &mut self,
        arena: &GraphArena,
        tag: Tag,
        supers: &[Handle<Cla>],
        attrs: Vec<(Handle<Label>, AttrType)>,
    ) -> Result<Handle<Cla>, LatticeError> {
        self.add_class_raw(Some((tag, !arena[tag].starts_with('*'))), supers, attrs, &[])
    }

    fn add_class_raw(
        &mut self,
        tag: Option<(Tag, bool)>,
        supers: &[Handle<Cla>],
        attrs: Vec<(Handle<Label>, AttrType)>,
        base_tags: &[Tag],
    ) -> Result<Handle<Cla>, LatticeError> {
        if let Some((tag, _)) = tag {
            if self.class_for_tag.contains_key(&tag) {
                return Err(LatticeError::DuplicateClass);
            }
        }
        let named = tag.map(|(_, named)| named).unwrap_or(false);
        let mut tags: SmallVec<[Tag; 8]> = base_tags.iter().copied().collect();
        if named {
            if let Some((tag, _)) = tag {
                tags.push(tag);
            }
        }
        let mut all_attrs: SmallVec<[(Handle<Label>, AttrType); 8]> = attrs.into_iter().collect();
        for su in supers {
            let su = self.classes.get(*su);
            tags.extend(su.tags.iter().copied());
            for (la, ty) in &su.attrs {
                match all_attrs.iter().find(|(la2, _)| la2 == la) {
                    Some((_, ty2)) => {
                        if !self.attr_type_eq(*ty2, *ty) {
                            return Err(LatticeError::AttrTypeConflict);
                        }
                    }
                    None => all_attrs.push((*la, *ty)),
                }
            }
        }
        tags.sort();
        tags.dedup();
        let handle = self.classes.add(Cla {
            tag: tag
                .map(|(tag, _)| ControlledOption::some(tag))
                .unwrap_or_else(ControlledOption::none),
            named,
            tags,
            attrs: all_attrs,
        });
        if let Some((tag, _)) = tag {
            self.class_for_tag.insert(tag, handle);
        }
        Ok(handle)
    }

    /// Looks up a named class by tag.
    pub fn get(&self, tag: Tag) -> Result<Handle<Cla>, LatticeError> {
        self.class_for_tag
            .get(&tag)
            .copied()
            .ok_or(LatticeError::UndefinedClass)
    }

    /// Dereferences this class's lazy attribute types through the named-class table.  Call this
    /// once the tags a class refers to have all been registered; returns the class handle for
    /// chaining.
    pub fn resolve_lazy(&mut self, cla: Handle<Cla>) -> Result<Handle<Cla>, LatticeError> {
        let lazy: Vec<(usize, Tag)> = self
            .classes
            .get(cla)
            .attrs
            .iter()
            .enumerate()
            .filter_map(|(i, (_, ty))| ty.right().map(|tag| (i, tag)))
            .collect();
        for (i, tag) in lazy {
            let resolved = self.get(tag)?;
            self.classes.get_mut(cla).attrs[i].1 = Either::Left(resolved);
        }
        Ok(cla)
    }

    /// The greatest lower bound of a set of classes: an anonymous class whose ancestors are the
    /// union of the inputs' ancestors and whose attributes are the union of their attributes.
    /// Attribute clashes with differing types fail `AttrTypeConflict`.
    pub fn inter(&mut self, clas: &[Handle<Cla>]) -> Result<Handle<Cla>, LatticeError> {
        self.add_class_raw(None, clas, Vec::new(), &[])
    }

    /// The least upper bound of a set of classes: an anonymous class whose ancestors are the
    /// intersection of the inputs' ancestors and whose attributes are the `(label, type)` pairs
    /// common to all of them.
    pub fn union(&mut self, clas: &[Handle<Cla>]) -> Handle<Cla> {
        let (first, rest) = match clas.split_first() {
            Some(split) => split,
            None => return self.no_type,
        };
        let tags: SmallVec<[Tag; 8]> = self
            .classes
            .get(*first)
            .tags
            .iter()
            .copied()
            .filter(|tag| {
                rest.iter()
                    .all(|c| self.classes.get(*c).tags.contains(tag))
            })
            .collect();
        let attrs: Vec<(Handle<Label>, AttrType)> = self
            .classes
            .get(*first)
            .attrs
            .iter()
            .copied()
            .filter(|(la, ty)| {
                rest.iter().all(|c| match self.classes.get(*c).attr(*la) {
                    Some(ty2) => self.attr_type_eq(*ty, ty2),
                    None => false,
                })
            })
            .collect();
        match self.add_class_raw(None, &[], attrs, &tags) {
            Ok(handle) => handle,
            // Unreachable: no tag and no supers means no conflicts are possible.
            Err(_) => self.no_type,
        }
    }

    fn attr_type_eq(&self, x: AttrType, y: AttrType) -> bool {
        match (x, y) {
            (Either::Left(a), Either::Left(b)) => self.cla_eq(a, b),
            (Either::Right(a), Either::Right(b)) => a == b,
            _ => false,
        }
    }

    //---------------------------------------------------------------------------------------------
    // Subtyping

    /// Structural class equality: identical handles, a shared (non-anonymous) tag, or equal
    /// ancestor sets.
    pub fn cla_eq(&self, x: Handle<Cla>, y: Handle<Cla>) -> bool {
        if x == y {
            return true;
        }
        let (cx, cy) = (self.classes.get(x), self.classes.get(y));
        if cx.named && cx.tag() == cy.tag() {
            return true;
        }
        cx.tags == cy.tags
    }

    /// The class subtype relation: identical handles, a shared (non-anonymous) tag, or ancestor
    /// containment — `x` is a subtype of `y` iff `x` carries every ancestor of `y`.
    pub fn cla_le(&self, x: Handle<Cla>, y: Handle<Cla>) -> bool {
        if x == y {
            return true;
        }
        let (cx, cy) = (self.classes.get(x), self.classes.get(y));
        if cx.named && cx.tag() == cy.tag() {
            return true;
        }
        cx.has_all_ancestors(&cy.tags)
    }

    pub fn is_value_type(&self, cla: Handle<Cla>) -> bool {
        self.cla_eq(cla, self.int_type)
            || self.cla_eq(cla, self.str_type)
            || self.cla_eq(cla, self.bool_type)
    }

    /// The full subtype relation over classes and value sets.  `NULL` is a subtype of
    /// everything; a value set is a subtype of another iff it is a subset, and of a class iff
    /// every member value is an instance of it.
    pub fn subtype(&self, x: &Ty, y: &Ty) -> bool {
        if let Ty::Class(cla) = x {
            if *cla == self.null_type {
                return true;
            }
        }
        match (x, y) {
            (Ty::Class(a), Ty::Class(b)) => self.cla_le(*a, *b),
            (Ty::Values(u), Ty::Values(v)) => u.is_subset(v),
            (Ty::Values(u), Ty::Class(b)) => u.iter().all(|v| self.cla_eq(v.cla, *b)),
            _ => false,
        }
    }

    pub fn ty_eq(&self, x: &Ty, y: &Ty) -> bool {
        match (x, y) {
            (Ty::Class(a), Ty::Class(b)) => self.cla_eq(*a, *b),
            (Ty::Values(u), Ty::Values(v)) => u == v,
            _ => false,
        }
    }

    /// Whichever of the two types is a subtype of the other; fails `MinType` when neither is.
    pub fn min_type(&self, x: &Ty, y: &Ty) -> Result<Ty, LatticeError> {
        if self.subtype(x, y) {
            Ok(x.clone())
        } else if self.subtype(y, x) {
            Ok(y.clone())
        } else {
            Err(LatticeError::MinType)
        }
    }

    /// The base class of a type: the class itself, or the common class of a value set's members
    /// (`None` for a heterogeneous or empty set).
    pub fn class_of(&self, ty: &Ty) -> Option<Handle<Cla>> {
        match ty {
            Ty::Class(cla) => Some(*cla),
            Ty::Values(vs) => {
                let mut values = vs.iter();
                let first = values.next()?.cla;
                if values.all(|v| self.cla_eq(v.cla, first)) {
                    Some(first)
                } else {
                    None
                }
            }
        }
    }

    /// The declared class of an attribute reached from a type: `None` when the type is a value
    /// set, the attribute is missing, or its declaration is still lazy.
    pub fn class_of_attr(&self, ty: &Ty, label: Handle<Label>) -> Option<Handle<Cla>> {
        match ty {
            Ty::Class(cla) => self.classes.get(*cla).attr(label)?.left(),
            Ty::Values(_) => None,
        }
    }

    /// Whether a set of types can have a common subtype at all: every member must have a base
    /// class, and if any base class is a value type they must all share it.
    pub fn exists_ty_le_all(&self, ts: &[Ty]) -> bool {
        let clas: Vec<Handle<Cla>> = match ts.iter().map(|t| self.class_of(t)).collect() {
            Some(clas) => clas,
            None => return false,
        };
        if clas.iter().any(|c| self.is_value_type(*c)) {
            clas.iter().all(|c| self.cla_eq(*c, clas[0]))
        } else {
            true
        }
    }

    /// The infimum of a set of types.  Over value types the result is the union of the value
    /// sets present (or the shared primitive class when there are none); otherwise it is the
    /// anonymous intersection class.
    pub fn ty_inf(&mut self, ts: &[Ty]) -> Result<Ty, LatticeError> {
        let clas: Vec<Handle<Cla>> = ts
            .iter()
            .map(|t| self.class_of(t))
            .collect::<Option<_>>()
            .ok_or(LatticeError::MinType)?;
        if clas.iter().any(|c| self.is_value_type(*c)) {
            let mut vss = ts.iter().filter_map(|t| match t {
                Ty::Values(vs) => Some(vs),
                Ty::Class(_) => None,
            });
            match vss.next() {
                Some(first) => Ok(Ty::Values(vss.fold(first.clone(), |acc, vs| acc.union(vs)))),
                None => Ok(Ty::Class(clas[0])),
            }
        } else {
            Ok(Ty::Class(self.inter(&clas)?))
        }
    }

    /// The supremum of a set of types.  Over value types the result is the intersection of the
    /// value sets present (or the shared primitive class when there are none); otherwise it is
    /// the anonymous union class.
    pub fn ty_sup(&mut self, ts: &[Ty]) -> Result<Ty, LatticeError> {
        let clas: Vec<Handle<Cla>> = ts
            .iter()
            .map(|t| self.class_of(t))
            .collect::<Option<_>>()
            .ok_or(LatticeError::MinType)?;
        if clas.iter().any(|c| self.is_value_type(*c)) {
            let mut vss = ts.iter().filter_map(|t| match t {
                Ty::Values(vs) => Some(vs),
                Ty::Class(_) => None,
            });
            match vss.next() {
                Some(first) => Ok(Ty::Values(
                    vss.fold(first.clone(), |acc, vs| acc.intersection(vs)),
                )),
                None => Ok(Ty::Class(clas[0])),
            }
        } else {
            Ok(Ty::Class(self.union(&clas)))
        }
    }
}

impl Index<Handle<Cla>> for ClassRegistry {
    type Output = Cla;
    #[inline(always)]
    fn index(&self, handle: Handle<Cla>) -> &Cla {
        self.classes.get(handle)
    }
}

#[doc(hidden)]
pub struct DisplayCla<'a> {
    wrapped: Handle<Cla>,
    registry: &'a ClassRegistry,
    arena: &'a GraphArena,
}

impl<'a> Display for DisplayCla<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let cla = &self.registry[self.wrapped];
        match cla.tag() {
            Some(tag) => write!(f, "class {}", tag.display(self.arena))?,
            None => write!(f, "class *")?,
        }
        write!(f, " <:")?;
        for tag in cla.ancestors() {
            write!(f, " {}", tag.display(self.arena))?;
        }
        Ok(())
    }
}

impl Handle<Cla> {
    pub fn display<'a>(
        self,
        registry: &'a ClassRegistry,
        arena: &'a GraphArena,
    ) -> impl Display + 'a {
        DisplayCla {
            wrapped: self,
            registry,
            arena,
        }
    }
}
