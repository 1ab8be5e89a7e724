//! Boxing and unboxing conversions.
//!
//! The relation-aware helpers run inside an assignability check and record
//! the conversion they applied on `relation.node`, where code generation
//! picks it up.

use crate::checker::Checker;
use crate::relation::TypeRelationFlags;
use crate::types::{PrimitiveKind, TypeKind, TypeTable};
use ets_ast::types::{BoxingUnboxingFlags, NodeId, TypeId};
use tracing::trace;

impl TypeTable {
    /// Box a primitive; anything else is returned unchanged.
    pub fn maybe_box_type(&self, ty: TypeId) -> TypeId {
        match self.primitive_kind(ty) {
            Some(kind) => self.boxed(kind),
            None => ty,
        }
    }

    /// Unbox a builtin box; anything else is returned unchanged.
    pub fn maybe_unbox_type(&self, ty: TypeId) -> TypeId {
        match self.boxed_kind(ty) {
            Some(kind) => self.primitive(kind),
            None => ty,
        }
    }
}

/// Conversion tag boxing a value of `kind`.
pub fn boxing_flag(kind: PrimitiveKind) -> BoxingUnboxingFlags {
    match kind {
        PrimitiveKind::Boolean => BoxingUnboxingFlags::BOX_TO_BOOLEAN,
        PrimitiveKind::Byte => BoxingUnboxingFlags::BOX_TO_BYTE,
        PrimitiveKind::Char => BoxingUnboxingFlags::BOX_TO_CHAR,
        PrimitiveKind::Short => BoxingUnboxingFlags::BOX_TO_SHORT,
        PrimitiveKind::Int => BoxingUnboxingFlags::BOX_TO_INT,
        PrimitiveKind::Long => BoxingUnboxingFlags::BOX_TO_LONG,
        PrimitiveKind::Float => BoxingUnboxingFlags::BOX_TO_FLOAT,
        PrimitiveKind::Double => BoxingUnboxingFlags::BOX_TO_DOUBLE,
    }
}

/// Conversion tag unboxing to a value of `kind`.
pub fn unboxing_flag(kind: PrimitiveKind) -> BoxingUnboxingFlags {
    match kind {
        PrimitiveKind::Boolean => BoxingUnboxingFlags::UNBOX_TO_BOOLEAN,
        PrimitiveKind::Byte => BoxingUnboxingFlags::UNBOX_TO_BYTE,
        PrimitiveKind::Char => BoxingUnboxingFlags::UNBOX_TO_CHAR,
        PrimitiveKind::Short => BoxingUnboxingFlags::UNBOX_TO_SHORT,
        PrimitiveKind::Int => BoxingUnboxingFlags::UNBOX_TO_INT,
        PrimitiveKind::Long => BoxingUnboxingFlags::UNBOX_TO_LONG,
        PrimitiveKind::Float => BoxingUnboxingFlags::UNBOX_TO_FLOAT,
        PrimitiveKind::Double => BoxingUnboxingFlags::UNBOX_TO_DOUBLE,
    }
}

impl Checker {
    // ========================================================================
    // Conversion tags
    // ========================================================================

    fn conversion_kind(&self, ty: TypeId) -> PrimitiveKind {
        match self.types.primitive_kind(ty).or_else(|| self.types.boxed_kind(ty)) {
            Some(kind) => kind,
            None => unreachable!("no primitive kind behind {}", self.type_to_string(ty)),
        }
    }

    /// Tag for boxing into `ty`, a primitive or its box.
    pub fn get_boxing_flag(&self, ty: TypeId) -> BoxingUnboxingFlags {
        boxing_flag(self.conversion_kind(ty))
    }

    /// Tag for unboxing into `ty`, a primitive or its box.
    pub fn get_unboxing_flag(&self, ty: TypeId) -> BoxingUnboxingFlags {
        unboxing_flag(self.conversion_kind(ty))
    }

    /// Record the conversion into `ty` on `node`: boxing when `ty` is a
    /// builtin box, unboxing when it is a primitive. Any other type carries
    /// no conversion.
    pub fn add_boxing_unboxing_flags_to_node(&mut self, node: NodeId, ty: TypeId) {
        let flags = match self.types.kind(ty) {
            TypeKind::Object(obj) if obj.boxed_kind.is_some() => self.get_boxing_flag(ty),
            TypeKind::Primitive(_) => self.get_unboxing_flag(ty),
            _ => return,
        };
        trace!(?node, ?flags, "conversion");
        self.ast.add_boxing_unboxing_flags(node, flags);
    }

    /// Box the checked type of `expr` if it is primitive, recording the conversion.
    pub fn maybe_box_expression(&mut self, expr: NodeId) -> Option<TypeId> {
        let ty = self.ast.ts_type(expr)?;
        let boxed = self.types.maybe_box_type(ty);
        if boxed != ty {
            self.add_boxing_unboxing_flags_to_node(expr, boxed);
        }
        Some(boxed)
    }

    /// Unbox the checked type of `expr` if it is a box, recording the conversion.
    pub fn maybe_unbox_expression(&mut self, expr: NodeId) -> Option<TypeId> {
        let ty = self.ast.ts_type(expr)?;
        let primitive = self.types.maybe_unbox_type(ty);
        if primitive != ty {
            self.add_boxing_unboxing_flags_to_node(expr, primitive);
        }
        Some(primitive)
    }

    /// Record the conversion into `into` on the node under relation.
    fn record_conversion(&mut self, into: TypeId) {
        if let Some(node) = self.relation.node {
            self.add_boxing_unboxing_flags_to_node(node, into);
        }
    }

    // ========================================================================
    // Relation-aware conversions
    // ========================================================================

    /// The primitive behind `ty`: `ty` itself when primitive, the unboxed
    /// primitive when a builtin box, otherwise `None`.
    pub fn maybe_unbox_in_relation(&self, ty: TypeId) -> Option<TypeId> {
        if self.types.is_primitive(ty) {
            return Some(ty);
        }
        self.types.boxed_kind(ty).map(|kind| self.types.primitive(kind))
    }

    /// The box of `ty`: `ty` itself when already a builtin box, the box of
    /// its kind when primitive, otherwise `None`.
    pub fn maybe_box_in_relation(&self, ty: TypeId) -> Option<TypeId> {
        if self.types.boxed_kind(ty).is_some() {
            return Some(ty);
        }
        self.types.primitive_kind(ty).map(|kind| self.types.boxed(kind))
    }

    /// Primitive to primitive under the widening and narrowing flags.
    pub(crate) fn check_unboxed_type_widenable(&mut self, source: TypeId, target: TypeId) -> bool {
        let flags = self.relation.flags
            & (TypeRelationFlags::WIDENING | TypeRelationFlags::NARROWING | TypeRelationFlags::ONLY_CHECK_BOXING_UNBOXING);
        let result = self.with_relation_flags(flags, |this| {
            let (Some(s), Some(t)) = (this.types.primitive_kind(source), this.types.primitive_kind(target)) else {
                return false;
            };
            if s == t {
                return true;
            }
            let flags = this.relation.flags;
            if flags.contains(TypeRelationFlags::ONLY_CHECK_BOXING_UNBOXING) {
                return false;
            }
            (flags.contains(TypeRelationFlags::WIDENING) && s.widens_to(t))
                || (flags.contains(TypeRelationFlags::NARROWING) && s.is_numeric() && t.is_numeric())
        });
        self.relation.result = result;
        result
    }

    /// Box to box or primitive to primitive, comparing the unboxed kinds.
    pub fn check_unboxed_types_assignable(&mut self, source: TypeId, target: TypeId) -> bool {
        let (Some(unboxed_source), Some(unboxed_target)) =
            (self.maybe_unbox_in_relation(source), self.maybe_unbox_in_relation(target))
        else {
            self.relation.result = false;
            return false;
        };
        let flags = self.relation.flags | TypeRelationFlags::ONLY_CHECK_BOXING_UNBOXING;
        let result = self.with_relation_flags(flags, |this| {
            this.check_unboxed_type_widenable(unboxed_source, unboxed_target)
        });
        if result && unboxed_source != source {
            self.record_conversion(unboxed_source);
        }
        self.relation.result = result;
        result
    }

    /// A primitive source against a reference target: box the source, or
    /// widen it to the target's primitive kind and box that.
    pub(crate) fn check_boxed_source_type_assignable(&mut self, source: TypeId, target: TypeId) -> bool {
        let widening = self.relation.flags.contains(TypeRelationFlags::WIDENING);
        let flags = self.relation.flags | TypeRelationFlags::ONLY_CHECK_BOXING_UNBOXING;
        let result = self.with_relation_flags(flags, |this| {
            let Some(boxed_source) = this.maybe_box_in_relation(source) else {
                return false;
            };
            if this.is_assignable_to(boxed_source, target) {
                this.record_conversion(boxed_source);
                return true;
            }
            if !widening {
                return false;
            }
            let Some(unboxed_target) = this.types.boxed_kind(target).map(|k| this.types.primitive(k)) else {
                return false;
            };
            let widened = this.with_relation_flags(TypeRelationFlags::WIDENING, |this| {
                this.check_unboxed_type_widenable(source, unboxed_target)
            });
            if widened {
                this.record_conversion(target);
            }
            widened
        });
        self.relation.result = result;
        result
    }

    /// A boxed source against a primitive target: unbox, then widen.
    pub(crate) fn check_unboxed_source_type_with_widening_assignable(&mut self, source: TypeId, target: TypeId) -> bool {
        let Some(unboxed_source) = self.maybe_unbox_in_relation(source) else {
            self.relation.result = false;
            return false;
        };
        let result = self.with_relation_flags(self.relation.flags | TypeRelationFlags::WIDENING, |this| {
            this.check_unboxed_type_widenable(unboxed_source, target)
        });
        if result {
            self.record_conversion(unboxed_source);
        }
        self.relation.result = result;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_box_unbox_type_round_trip() {
        let table = TypeTable::new();
        for kind in PrimitiveKind::ALL {
            let boxed = table.boxed(kind);
            assert_eq!(table.maybe_box_type(table.maybe_unbox_type(boxed)), boxed);
        }
        assert_eq!(table.maybe_box_type(table.string_type), table.string_type);
        assert_eq!(table.maybe_unbox_type(table.null_type), table.null_type);
    }

    #[test]
    fn test_flags_are_distinct_per_kind() {
        let mut seen = BoxingUnboxingFlags::NONE;
        for kind in PrimitiveKind::ALL {
            let flag = boxing_flag(kind) | unboxing_flag(kind);
            assert!(!seen.intersects(flag));
            seen |= flag;
        }
        assert_eq!(seen, BoxingUnboxingFlags::BOXING_FLAG | BoxingUnboxingFlags::UNBOXING_FLAG);
    }
}
