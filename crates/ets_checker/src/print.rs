//! Type printing for diagnostics.

use crate::checker::Checker;
use crate::types::TypeKind;
use ets_ast::types::TypeId;

/// Maximum recursion depth for type stringification to prevent stack overflow.
const MAX_TYPE_TO_STRING_DEPTH: u32 = 20;

impl Checker {
    /// Get a string representation of a type.
    pub fn type_to_string(&self, type_id: TypeId) -> String {
        self.type_to_string_inner(type_id, 0)
    }

    fn type_to_string_inner(&self, type_id: TypeId, depth: u32) -> String {
        if depth > MAX_TYPE_TO_STRING_DEPTH {
            return "...".to_string();
        }
        let depth = depth + 1;
        match self.types.kind(type_id) {
            TypeKind::Primitive(kind) => kind.as_str().to_string(),
            TypeKind::Void => "void".to_string(),
            TypeKind::Null => "null".to_string(),
            TypeKind::Undefined => "undefined".to_string(),
            TypeKind::Never => "never".to_string(),
            TypeKind::Error => "*ERROR_TYPE*".to_string(),
            TypeKind::Object(obj) => obj.name.clone(),
            TypeKind::Array { element } => {
                let element_str = self.type_to_string_inner(*element, depth);
                if matches!(self.types.kind(*element), TypeKind::Union { .. } | TypeKind::Function(_)) {
                    format!("({})[]", element_str)
                } else {
                    format!("{}[]", element_str)
                }
            }
            TypeKind::Tuple { elements } => {
                let parts: Vec<String> = elements.iter().map(|e| self.type_to_string_inner(*e, depth)).collect();
                format!("[{}]", parts.join(", "))
            }
            TypeKind::Union { types } => types
                .iter()
                .map(|t| self.type_to_string_inner(*t, depth))
                .collect::<Vec<_>>()
                .join("|"),
            TypeKind::TypeParameter { name, .. } => name.clone(),
            TypeKind::NonNullish { base } => format!("NonNullable<{}>", self.type_to_string_inner(*base, depth)),
            TypeKind::PartialTypeParameter { base } => format!("Partial<{}>", self.type_to_string_inner(*base, depth)),
            TypeKind::Function(sig) => {
                let params: Vec<String> = sig
                    .params
                    .iter()
                    .map(|p| {
                        let opt = if p.optional { "?" } else { "" };
                        format!("{}{}: {}", p.name, opt, self.type_to_string_inner(p.ty, depth))
                    })
                    .collect();
                format!("({}) => {}", params.join(", "), self.type_to_string_inner(sig.return_type, depth))
            }
            TypeKind::Enum(e) => e.name.clone(),
            TypeKind::TypeAlias { name, .. } => name.clone(),
        }
    }
}
