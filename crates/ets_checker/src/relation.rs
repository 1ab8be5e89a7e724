//! Type relations: assignability and identity.
//!
//! The relation is a small piece of shared state: the flags of the check in
//! progress, the truth value of the last check, and the expression node the
//! boxing helpers record conversions on.

use crate::checker::Checker;
use crate::types::{ObjectFlags, TypeKind};
use ets_ast::types::{NodeId, TypeId};
use rustc_hash::FxHashSet;
use tracing::trace;

/// Bound on alias unfolding when comparing function types for identity.
const MAX_IDENTITY_DEPTH: u32 = 32;

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TypeRelationFlags: u32 {
        const NONE                      = 0;
        const WIDENING                  = 1 << 0;
        const NARROWING                 = 1 << 1;
        /// Primitives relate only to themselves; only the boxing or unboxing step is checked.
        const ONLY_CHECK_BOXING_UNBOXING = 1 << 2;
        const NO_THROW                  = 1 << 3;
        const NO_CHECK_TRAILING_LAMBDA  = 1 << 4;
        const NO_BOXING                 = 1 << 5;
        const NO_UNBOXING               = 1 << 6;

        /// Relation used for assignments, returns and arguments.
        const ASSIGNMENT = Self::WIDENING.bits();
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TypeRelation {
    pub flags: TypeRelationFlags,
    /// Result of the last check.
    pub result: bool,
    /// Expression whose conversion is being checked.
    pub node: Option<NodeId>,
}

impl Default for TypeRelation {
    fn default() -> Self {
        Self {
            flags: TypeRelationFlags::ASSIGNMENT,
            result: false,
            node: None,
        }
    }
}

impl Checker {
    // ========================================================================
    // Scoped relation state
    // ========================================================================

    /// Run `f` with the relation flags replaced by `flags`.
    pub(crate) fn with_relation_flags<R>(&mut self, flags: TypeRelationFlags, f: impl FnOnce(&mut Self) -> R) -> R {
        let saved = self.relation.flags;
        self.relation.flags = flags;
        let result = f(self);
        self.relation.flags = saved;
        result
    }

    /// Run `f` with conversions recorded on `node`.
    pub(crate) fn with_relation_node<R>(&mut self, node: Option<NodeId>, f: impl FnOnce(&mut Self) -> R) -> R {
        let saved = self.relation.node;
        self.relation.node = node;
        let result = f(self);
        self.relation.node = saved;
        result
    }

    // ========================================================================
    // Assignability
    // ========================================================================

    /// Check whether `source` is assignable to `target` under the current
    /// relation flags. The result is also left in `relation.result`.
    pub fn is_assignable_to(&mut self, source: TypeId, target: TypeId) -> bool {
        let result = self.is_assignable_to_inner(source, target);
        self.relation.result = result;
        result
    }

    fn is_assignable_to_inner(&mut self, source: TypeId, target: TypeId) -> bool {
        if source == target {
            return true;
        }

        // Aliases unfold to their target; a re-entered pair is a cycle
        // through the alias and does not relate.
        let source_alias = self.alias_target(source);
        let target_alias = self.alias_target(target);
        if source_alias.is_some() || target_alias.is_some() {
            if !self.alias_unfolding.insert((source, target)) {
                return false;
            }
            let result = self.is_assignable_to_inner(source_alias.unwrap_or(source), target_alias.unwrap_or(target));
            self.alias_unfolding.remove(&(source, target));
            return result;
        }

        // Conversions are only recorded on uncached checks.
        if self.relation.node.is_some() {
            return self.is_assignable_to_worker(source, target);
        }

        let key = (source, target, self.relation.flags);
        if let Some(&cached) = self.relation_cache.get(&key) {
            return cached;
        }
        // Optimistically assume related to handle recursive types.
        self.relation_cache.insert(key, true);
        let result = self.is_assignable_to_worker(source, target);
        self.relation_cache.insert(key, result);
        result
    }

    fn is_assignable_to_worker(&mut self, source: TypeId, target: TypeId) -> bool {
        let source_kind = self.types.kind(source).clone();
        let target_kind = self.types.kind(target).clone();
        trace!(source = %source, target = %target, "is_assignable_to");

        match (&source_kind, &target_kind) {
            (TypeKind::Error, _) | (_, TypeKind::Error) | (TypeKind::Never, _) => return true,
            (TypeKind::Union { types }, _) => {
                return types.iter().all(|t| self.is_assignable_to_inner(*t, target));
            }
            (_, TypeKind::Union { types }) => {
                // An exact arm wins over one reached through a conversion.
                if types.contains(&source) {
                    return true;
                }
                return types.iter().any(|t| self.is_assignable_to_inner(source, *t));
            }
            _ => {}
        }

        match (&source_kind, &target_kind) {
            // ---- nullish and void ----
            (TypeKind::Null, _) | (TypeKind::Undefined, _) => {
                if matches!(
                    (&source_kind, &target_kind),
                    (TypeKind::Undefined, TypeKind::Void)
                ) {
                    return true;
                }
                !self.options.strict_null_checks && !self.types.is_primitive(target) && !matches!(target_kind, TypeKind::Void)
            }
            (TypeKind::Void, TypeKind::Undefined) => true,
            (TypeKind::Void, _) | (_, TypeKind::Void) => false,

            // ---- primitives ----
            (TypeKind::Primitive(_), TypeKind::Primitive(_)) => self.check_unboxed_type_widenable(source, target),
            (TypeKind::Primitive(_), _) => {
                if self.relation.flags.contains(TypeRelationFlags::NO_BOXING) {
                    return false;
                }
                self.check_boxed_source_type_assignable(source, target)
            }
            (_, TypeKind::Primitive(_)) => {
                if self.relation.flags.contains(TypeRelationFlags::NO_UNBOXING) {
                    return false;
                }
                self.check_unboxed_source_type_with_widening_assignable(source, target)
            }

            // ---- type parameters ----
            (TypeKind::NonNullish { base }, _) => {
                if *base == target {
                    return true;
                }
                let constraint = self.types.constraint_of(*base).unwrap_or(self.types.default_constraint);
                let apparent = self.types.get_non_nullish_type(constraint);
                self.is_assignable_to_inner(apparent, target)
            }
            (TypeKind::TypeParameter { constraint, .. }, _) => {
                if matches!(target_kind, TypeKind::TypeParameter { .. } | TypeKind::NonNullish { .. }) {
                    return false;
                }
                self.is_assignable_to_inner(*constraint, target)
            }
            (TypeKind::PartialTypeParameter { .. }, _) => false,
            (_, TypeKind::TypeParameter { .. }) | (_, TypeKind::NonNullish { .. }) | (_, TypeKind::PartialTypeParameter { .. }) => false,

            // ---- nominal ----
            (_, TypeKind::Object(target_obj)) if target_obj.flags.contains(ObjectFlags::GLOBAL) => {
                // Every non-nullish reference is an Object.
                !matches!(source_kind, TypeKind::Null | TypeKind::Undefined)
            }
            (TypeKind::Object(_), TypeKind::Object(_)) => self.is_derived_from(source, target),
            (TypeKind::Function(_), TypeKind::Object(target_obj)) => target_obj.flags.contains(ObjectFlags::FUNCTIONAL),
            (TypeKind::Function(source_sig), TypeKind::Function(target_sig)) => {
                if source_sig.params.len() > target_sig.params.len() {
                    return false;
                }
                for (s, t) in source_sig.params.iter().zip(target_sig.params.iter()) {
                    // Parameters are contravariant.
                    if !self.is_assignable_to_inner(t.ty, s.ty) {
                        return false;
                    }
                }
                if matches!(self.types.kind(target_sig.return_type), TypeKind::Void) {
                    return true;
                }
                self.is_assignable_to_inner(source_sig.return_type, target_sig.return_type)
            }
            (TypeKind::Array { element: s }, TypeKind::Array { element: t }) => self.is_identical(*s, *t),
            (TypeKind::Tuple { elements: s }, TypeKind::Tuple { elements: t }) => {
                s.len() == t.len() && s.iter().zip(t.iter()).all(|(a, b)| self.is_identical(*a, *b))
            }
            _ => false,
        }
    }

    /// Walk the super class and interface chain of `source` looking for `target`.
    pub(crate) fn is_derived_from(&self, source: TypeId, target: TypeId) -> bool {
        let mut visited = FxHashSet::default();
        let mut worklist = vec![source];
        while let Some(current) = worklist.pop() {
            if current == target {
                return true;
            }
            if !visited.insert(current) {
                continue;
            }
            if let Some(obj) = self.types.object(current) {
                worklist.extend(obj.super_class);
                worklist.extend(obj.interfaces.iter().copied());
            }
        }
        false
    }

    fn alias_target(&self, ty: TypeId) -> Option<TypeId> {
        match self.types.kind(ty) {
            TypeKind::TypeAlias { target, .. } => Some(target.unwrap_or(self.types.error_type)),
            _ => None,
        }
    }

    /// Subtyping without primitive conversions.
    pub fn is_supertype_of(&mut self, super_type: TypeId, sub_type: TypeId) -> bool {
        self.with_relation_flags(TypeRelationFlags::NO_BOXING | TypeRelationFlags::NO_UNBOXING, |this| {
            this.is_assignable_to(sub_type, super_type)
        })
    }

    /// Identity: equal ids, or structurally equal function and alias types.
    pub fn is_identical(&self, source: TypeId, target: TypeId) -> bool {
        self.is_identical_inner(source, target, 0)
    }

    fn is_identical_inner(&self, source: TypeId, target: TypeId, depth: u32) -> bool {
        if source == target {
            return true;
        }
        if depth > MAX_IDENTITY_DEPTH {
            return false;
        }
        let depth = depth + 1;
        match (self.types.kind(source), self.types.kind(target)) {
            (TypeKind::TypeAlias { target: Some(s), .. }, _) => self.is_identical_inner(*s, target, depth),
            (_, TypeKind::TypeAlias { target: Some(t), .. }) => self.is_identical_inner(source, *t, depth),
            (TypeKind::Function(s), TypeKind::Function(t)) => {
                s.params.len() == t.params.len()
                    && s.params
                        .iter()
                        .zip(t.params.iter())
                        .all(|(a, b)| self.is_identical_inner(a.ty, b.ty, depth))
                    && self.is_identical_inner(s.return_type, t.return_type, depth)
            }
            _ => false,
        }
    }
}
