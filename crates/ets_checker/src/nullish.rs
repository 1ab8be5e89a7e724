//! Nullish algebra.
//!
//! Predicates and rewrites over null/undefined in unions, type parameters
//! and their non-nullish and partial wrappers. Every query is built on one
//! recursive matcher; nullish queries stop at a non-nullish wrapper, whose
//! type parameter can never hold null or undefined.

use crate::types::{TypeKind, TypeTable};
use ets_ast::types::TypeId;
use rustc_hash::FxHashSet;

impl TypeTable {
    // ========================================================================
    // Matcher
    // ========================================================================

    /// Whether `predicate` holds for `ty` or any type reachable from it
    /// through union constituents and type parameter constraints. Traversal
    /// only continues past a type for which `guard` holds.
    pub fn matches_type(
        &self,
        ty: TypeId,
        predicate: &dyn Fn(&TypeKind) -> bool,
        guard: &dyn Fn(&TypeKind) -> bool,
    ) -> bool {
        let mut visited = FxHashSet::default();
        self.matches_inner(ty, predicate, guard, &mut visited)
    }

    fn matches_inner(
        &self,
        ty: TypeId,
        predicate: &dyn Fn(&TypeKind) -> bool,
        guard: &dyn Fn(&TypeKind) -> bool,
        visited: &mut FxHashSet<TypeId>,
    ) -> bool {
        let kind = self.kind(ty);
        if predicate(kind) {
            return true;
        }
        if !guard(kind) {
            return false;
        }
        match kind {
            TypeKind::Union { types } => types
                .iter()
                .any(|t| self.matches_inner(*t, predicate, guard, visited)),
            TypeKind::TypeParameter { constraint, .. } => {
                // Constraints may name each other.
                visited.insert(ty) && self.matches_inner(*constraint, predicate, guard, visited)
            }
            TypeKind::NonNullish { base } | TypeKind::PartialTypeParameter { base } => {
                match self.constraint_of(*base) {
                    Some(constraint) => visited.insert(ty) && self.matches_inner(constraint, predicate, guard, visited),
                    None => false,
                }
            }
            _ => false,
        }
    }

    // ========================================================================
    // Predicates
    // ========================================================================

    fn matches_nullish(&self, ty: TypeId, predicate: &dyn Fn(&TypeKind) -> bool) -> bool {
        self.matches_type(ty, predicate, &|k| !matches!(k, TypeKind::NonNullish { .. }))
    }

    pub fn possibly_null(&self, ty: TypeId) -> bool {
        self.matches_nullish(ty, &|k| matches!(k, TypeKind::Null))
    }

    pub fn possibly_undefined(&self, ty: TypeId) -> bool {
        self.matches_nullish(ty, &|k| matches!(k, TypeKind::Undefined))
    }

    pub fn possibly_nullish(&self, ty: TypeId) -> bool {
        self.matches_nullish(ty, &|k| matches!(k, TypeKind::Null | TypeKind::Undefined))
    }

    /// True only when every reachable leaf is null or undefined.
    pub fn definitely_nullish(&self, ty: TypeId) -> bool {
        !self.matches_nullish(ty, &|k| {
            !matches!(
                k,
                TypeKind::TypeParameter { .. } | TypeKind::Union { .. } | TypeKind::Null | TypeKind::Undefined
            )
        })
    }

    pub fn definitely_not_nullish(&self, ty: TypeId) -> bool {
        !self.possibly_nullish(ty)
    }

    // ========================================================================
    // Rewrites
    // ========================================================================

    /// `ty` without `null`.
    ///
    /// A bare type parameter is returned unchanged even when its constraint
    /// admits null: narrowing one by `!== null` is not sound.
    pub fn remove_null_type(&mut self, ty: TypeId) -> TypeId {
        self.remove_constituent(ty, |k| matches!(k, TypeKind::Null), |k| matches!(k, TypeKind::Undefined))
    }

    /// `ty` without `undefined`. Same type parameter caveat as
    /// [`TypeTable::remove_null_type`].
    pub fn remove_undefined_type(&mut self, ty: TypeId) -> TypeId {
        self.remove_constituent(ty, |k| matches!(k, TypeKind::Undefined), |k| matches!(k, TypeKind::Null))
    }

    fn remove_constituent(
        &mut self,
        ty: TypeId,
        removed: fn(&TypeKind) -> bool,
        kept: fn(&TypeKind) -> bool,
    ) -> TypeId {
        if self.definitely_not_nullish(ty) || kept(self.kind(ty)) {
            return ty;
        }
        if removed(self.kind(ty)) {
            return self.never_type;
        }
        match self.kind(ty) {
            TypeKind::Union { types } => {
                let types = types.clone();
                let stripped = types
                    .into_iter()
                    .map(|t| self.remove_constituent(t, removed, kept))
                    .collect();
                self.create_union_type(stripped)
            }
            // Type parameters and their partial wrappers.
            _ => ty,
        }
    }

    /// Split `ty` into its nullish part and its non-nullish part.
    pub fn remove_nullish_types(&mut self, ty: TypeId) -> (TypeId, TypeId) {
        if self.definitely_not_nullish(ty) {
            return (self.never_type, ty);
        }
        match self.kind(ty) {
            TypeKind::TypeParameter { .. } => (self.nullish_type, self.create_non_nullish_type(ty)),
            TypeKind::Null | TypeKind::Undefined => (ty, self.never_type),
            TypeKind::Union { types } => {
                let types = types.clone();
                let mut nullish = Vec::new();
                let mut not_nullish = Vec::new();
                for t in types {
                    if matches!(self.kind(t), TypeKind::Null | TypeKind::Undefined) {
                        nullish.push(t);
                    } else {
                        not_nullish.push(self.get_non_nullish_type(t));
                    }
                }
                (self.create_union_type(nullish), self.create_union_type(not_nullish))
            }
            _ => {
                let non_nullish = self.get_non_nullish_type(ty);
                (self.nullish_type, non_nullish)
            }
        }
    }

    /// `ty` with null and undefined excluded.
    pub fn get_non_nullish_type(&mut self, ty: TypeId) -> TypeId {
        if self.definitely_not_nullish(ty) {
            return ty;
        }
        match self.kind(ty) {
            TypeKind::TypeParameter { .. } => self.create_non_nullish_type(ty),
            TypeKind::PartialTypeParameter { base } => *base,
            TypeKind::Null | TypeKind::Undefined => self.never_type,
            TypeKind::Union { types } => {
                let types = types.clone();
                let stripped = types.into_iter().map(|t| self.get_non_nullish_type(t)).collect();
                self.create_union_type(stripped)
            }
            _ => ty,
        }
    }

    /// Narrow `actual` by a comparison against the nullish value of type
    /// `tested`. Returns the type on the equal branch and on the unequal
    /// branch. Without strict equality `null == undefined`, so both are
    /// removed together.
    pub fn check_test_nullish_condition(&mut self, tested: TypeId, actual: TypeId, strict: bool) -> (TypeId, TypeId) {
        if !strict {
            return self.remove_nullish_types(actual);
        }
        match self.kind(tested) {
            TypeKind::Null => (self.null_type, self.remove_null_type(actual)),
            TypeKind::Undefined => (self.undefined_type, self.remove_undefined_type(actual)),
            _ => (self.nullish_type, self.get_non_nullish_type(actual)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PrimitiveKind;
    use ets_ast::types::NodeId;

    fn type_param_with(table: &mut TypeTable, constraint: TypeId) -> TypeId {
        let param = table.create_type_parameter("T", NodeId(0));
        table.set_constraint(param, constraint);
        param
    }

    #[test]
    fn test_primitives_are_not_nullish() {
        let table = TypeTable::new();
        for kind in PrimitiveKind::ALL {
            let ty = table.primitive(kind);
            assert!(table.definitely_not_nullish(ty));
            assert!(!table.possibly_nullish(ty));
        }
    }

    #[test]
    fn test_union_nullish_queries() {
        let mut table = TypeTable::new();
        let int = table.primitive(PrimitiveKind::Int);
        let nullable = table.create_union_type(vec![int, table.null_type]);
        assert!(table.possibly_null(nullable));
        assert!(!table.possibly_undefined(nullable));
        assert!(!table.definitely_nullish(nullable));
        assert!(table.definitely_nullish(table.nullish_type));
    }

    #[test]
    fn test_type_parameter_nullishness_follows_constraint() {
        let mut table = TypeTable::new();
        let unconstrained = table.create_type_parameter("T", NodeId(0));
        assert!(table.possibly_nullish(unconstrained));

        let object = table.object_type;
        let constrained = type_param_with(&mut table, object);
        assert!(table.definitely_not_nullish(constrained));
    }

    #[test]
    fn test_non_nullish_wrapper_stops_traversal() {
        let mut table = TypeTable::new();
        let param = table.create_type_parameter("T", NodeId(0));
        let wrapped = table.create_non_nullish_type(param);
        assert!(table.definitely_not_nullish(wrapped));
        assert!(!table.definitely_nullish(wrapped));
    }

    #[test]
    fn test_cyclic_constraints_terminate() {
        let mut table = TypeTable::new();
        let t = table.create_type_parameter("T", NodeId(0));
        let u = table.create_type_parameter("U", NodeId(1));
        table.set_constraint(t, u);
        table.set_constraint(u, t);
        assert!(!table.possibly_null(t));
    }

    #[test]
    fn test_remove_null_collapses_to_remaining_arm() {
        let mut table = TypeTable::new();
        let int = table.primitive(PrimitiveKind::Int);
        let nullable = table.create_union_type(vec![int, table.null_type]);
        assert_eq!(table.remove_null_type(nullable), int);
        assert_eq!(table.remove_null_type(table.null_type), table.never_type);
        assert_eq!(table.remove_null_type(table.undefined_type), table.undefined_type);
    }

    #[test]
    fn test_remove_undefined_keeps_null() {
        let mut table = TypeTable::new();
        let string = table.string_type;
        let all = table.create_union_type(vec![string, table.null_type, table.undefined_type]);
        let expected = table.create_union_type(vec![string, table.null_type]);
        assert_eq!(table.remove_undefined_type(all), expected);
    }

    #[test]
    fn test_remove_null_leaves_type_parameter() {
        let mut table = TypeTable::new();
        let param = table.create_type_parameter("T", NodeId(0));
        assert_eq!(table.remove_null_type(param), param);
    }

    #[test]
    fn test_remove_nullish_types_splits_union() {
        let mut table = TypeTable::new();
        let int = table.primitive(PrimitiveKind::Int);
        let ty = table.create_union_type(vec![int, table.null_type, table.undefined_type]);
        let (nullish, rest) = table.remove_nullish_types(ty);
        assert_eq!(nullish, table.nullish_type);
        assert_eq!(rest, int);
    }

    #[test]
    fn test_remove_nullish_types_wraps_type_parameter() {
        let mut table = TypeTable::new();
        let param = table.create_type_parameter("T", NodeId(0));
        let (nullish, rest) = table.remove_nullish_types(param);
        assert_eq!(nullish, table.nullish_type);
        assert!(matches!(table.kind(rest), TypeKind::NonNullish { base } if *base == param));
    }

    #[test]
    fn test_get_non_nullish_unwraps_partial() {
        let mut table = TypeTable::new();
        let param = table.create_type_parameter("T", NodeId(0));
        let partial = table.create_partial_type_parameter(param);
        assert_eq!(table.get_non_nullish_type(partial), param);
        assert_eq!(table.get_non_nullish_type(table.nullish_type), table.never_type);
    }

    fn sample_types(table: &mut TypeTable) -> Vec<TypeId> {
        let int = table.primitive(PrimitiveKind::Int);
        let string = table.string_type;
        let (null, undefined) = (table.null_type, table.undefined_type);
        let param = table.create_type_parameter("T", NodeId(0));
        let partial = table.create_partial_type_parameter(param);
        vec![
            int,
            null,
            undefined,
            table.nullish_type,
            table.create_union_type(vec![int, null]),
            table.create_union_type(vec![string, undefined]),
            table.create_union_type(vec![int, string, null, undefined]),
            table.create_union_type(vec![param, null]),
            param,
            partial,
        ]
    }

    #[test]
    fn test_remove_null_and_undefined_are_idempotent() {
        let mut table = TypeTable::new();
        for ty in sample_types(&mut table) {
            let once = table.remove_null_type(ty);
            assert_eq!(table.remove_null_type(once), once);
            let once = table.remove_undefined_type(ty);
            assert_eq!(table.remove_undefined_type(once), once);
        }
    }

    #[test]
    fn test_non_nullish_part_matches_get_non_nullish_type() {
        let mut table = TypeTable::new();
        for ty in sample_types(&mut table) {
            let (_, rest) = table.remove_nullish_types(ty);
            assert_eq!(rest, table.get_non_nullish_type(ty));
        }
    }

    #[test]
    fn test_nullish_condition_strict_and_loose() {
        let mut table = TypeTable::new();
        let int = table.primitive(PrimitiveKind::Int);
        let ty = table.create_union_type(vec![int, table.null_type, table.undefined_type]);
        let without_null = table.create_union_type(vec![int, table.undefined_type]);

        let null = table.null_type;
        assert_eq!(table.check_test_nullish_condition(null, ty, true), (null, without_null));
        assert_eq!(table.check_test_nullish_condition(null, ty, false), (table.nullish_type, int));
    }
}
