//! The node arena.

use crate::node::{Node, NodeData, NodeKind};
use crate::types::*;
use ets_core::text::{TextPos, TextRange, TextSpan};
use ets_core::{InternedString, StringInterner};

/// Result of [`Ast::clone_subtree`]: the new root plus an old-to-new id
/// mapping, so side tables keyed by node (e.g. resolved references) can be
/// carried over to the copy.
#[derive(Debug, Clone)]
pub struct ClonedSubtree {
    pub root: NodeId,
    pub mapping: Vec<(NodeId, NodeId)>,
}

/// Owns every node of a compilation.
#[derive(Debug, Clone)]
pub struct Ast {
    nodes: Vec<Node>,
    interner: StringInterner,
    root: Option<NodeId>,
}

impl Ast {
    pub fn new(interner: StringInterner) -> Self {
        Self {
            nodes: Vec::new(),
            interner,
            root: None,
        }
    }

    /// Allocate a node and adopt its children.
    pub fn alloc(&mut self, kind: NodeKind, range: TextRange) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        let children = kind.children();
        self.nodes.push(Node {
            data: NodeData {
                range,
                ..NodeData::default()
            },
            kind,
        });
        for child in children {
            self.nodes[child.index()].data.parent = Some(id);
        }
        id
    }

    pub fn set_root(&mut self, root: NodeId) {
        self.root = Some(root);
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    /// Modules of the program, in declaration order.
    pub fn modules(&self) -> Vec<NodeId> {
        match self.root.map(|r| self.kind(r)) {
            Some(NodeKind::Program { modules }) => modules.clone(),
            _ => Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn interner(&self) -> &StringInterner {
        &self.interner
    }

    // ========================================================================
    // Node access
    // ========================================================================

    #[inline]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    #[inline]
    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    #[inline]
    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.index()].kind
    }

    #[inline]
    pub fn kind_mut(&mut self, id: NodeId) -> &mut NodeKind {
        &mut self.nodes[id.index()].kind
    }

    #[inline]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.index()].data.parent
    }

    pub fn set_parent(&mut self, id: NodeId, parent: NodeId) {
        self.nodes[id.index()].data.parent = Some(parent);
    }

    #[inline]
    pub fn start(&self, id: NodeId) -> TextPos {
        self.nodes[id.index()].data.range.pos
    }

    #[inline]
    pub fn span(&self, id: NodeId) -> TextSpan {
        self.nodes[id.index()].data.range.to_span()
    }

    #[inline]
    pub fn modifiers(&self, id: NodeId) -> ModifierFlags {
        self.nodes[id.index()].data.modifiers
    }

    pub fn add_modifiers(&mut self, id: NodeId, flags: ModifierFlags) {
        self.nodes[id.index()].data.modifiers |= flags;
    }

    #[inline]
    pub fn ts_type(&self, id: NodeId) -> Option<TypeId> {
        self.nodes[id.index()].data.ts_type
    }

    pub fn set_ts_type(&mut self, id: NodeId, ty: TypeId) {
        self.nodes[id.index()].data.ts_type = Some(ty);
    }

    pub fn clear_ts_type(&mut self, id: NodeId) {
        self.nodes[id.index()].data.ts_type = None;
    }

    #[inline]
    pub fn boxing_unboxing_flags(&self, id: NodeId) -> BoxingUnboxingFlags {
        self.nodes[id.index()].data.boxing_unboxing
    }

    pub fn add_boxing_unboxing_flags(&mut self, id: NodeId, flags: BoxingUnboxingFlags) {
        self.nodes[id.index()].data.boxing_unboxing |= flags;
    }

    pub fn clear_boxing_unboxing_flags(&mut self, id: NodeId) {
        self.nodes[id.index()].data.boxing_unboxing = BoxingUnboxingFlags::NONE;
    }

    // ========================================================================
    // Names
    // ========================================================================

    /// The interned name of an identifier node.
    ///
    /// Panics if `id` is not an identifier; callers only pass the `name`/`key`
    /// slots of declarations, which the parser always fills with identifiers.
    pub fn identifier_name(&self, id: NodeId) -> InternedString {
        match self.kind(id) {
            NodeKind::Identifier { name } => *name,
            other => unreachable!("expected Identifier, found {}", other.name()),
        }
    }

    pub fn identifier_text(&self, id: NodeId) -> &str {
        self.interner.resolve(self.identifier_name(id))
    }

    /// The name identifier of a named declaration, if it has one.
    pub fn declaration_name(&self, id: NodeId) -> Option<NodeId> {
        match self.kind(id) {
            NodeKind::ClassDefinition { name, .. } => Some(*name),
            NodeKind::ClassProperty { key, .. }
            | NodeKind::MethodDefinition { key, .. }
            | NodeKind::EnumMember { key, .. } => Some(*key),
            NodeKind::FunctionDeclaration { function } => self.declaration_name(*function),
            NodeKind::ScriptFunction { id, .. } => *id,
            NodeKind::Parameter { name, .. } | NodeKind::TypeParameter { name, .. } => Some(*name),
            NodeKind::VariableDeclarator { id, .. }
            | NodeKind::TypeAliasDeclaration { id, .. }
            | NodeKind::InterfaceDeclaration { id, .. }
            | NodeKind::EnumDeclaration { id, .. }
            | NodeKind::AnnotationDeclaration { id, .. } => Some(*id),
            NodeKind::AnnotationUsage { name, .. } => Some(*name),
            NodeKind::ImportSpecifier { local, .. } => Some(*local),
            NodeKind::Identifier { .. } => Some(id),
            _ => None,
        }
    }

    // ========================================================================
    // Traversal
    // ========================================================================

    /// Ancestors of `id`, nearest first, not including `id` itself.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), move |n| self.parent(*n))
    }

    /// `id` and all nodes below it, in pre-order.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(n) = stack.pop() {
            out.push(n);
            let mut children = self.kind(n).children();
            children.reverse();
            stack.extend(children);
        }
        out
    }

    /// Name of the module `id` belongs to.
    pub fn enclosing_module_name(&self, id: NodeId) -> Option<InternedString> {
        std::iter::once(id)
            .chain(self.ancestors(id))
            .find_map(|n| match self.kind(n) {
                NodeKind::Module { name, .. } => Some(*name),
                _ => None,
            })
    }

    /// Deep-copy the subtree rooted at `id` and attach the copy to
    /// `new_parent`. Checker annotations are not copied.
    pub fn clone_subtree(&mut self, id: NodeId, new_parent: NodeId) -> ClonedSubtree {
        let mut mapping = Vec::new();
        let root = self.clone_node(id, &mut mapping);
        self.set_parent(root, new_parent);
        ClonedSubtree { root, mapping }
    }

    fn clone_node(&mut self, id: NodeId, mapping: &mut Vec<(NodeId, NodeId)>) -> NodeId {
        let mut kind = self.kind(id).clone();
        let data = self.node(id).data.clone();
        // Children are cloned first, then adopted by `alloc`.
        kind.remap_children(|child| self.clone_node(child, mapping));
        let copy = self.alloc(kind, data.range);
        self.nodes[copy.index()].data.modifiers = data.modifiers;
        mapping.push((id, copy));
        copy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::AstBuilder;

    #[test]
    fn test_alloc_sets_parents() {
        let mut b = AstBuilder::new();
        let elem = b.int(1);
        let arr = b.array(vec![elem]);
        let ast = b.finish(vec![]);
        assert_eq!(ast.parent(elem), Some(arr));
        assert_eq!(ast.ancestors(elem).collect::<Vec<_>>(), vec![arr]);
    }

    #[test]
    fn test_clone_subtree_maps_every_node() {
        let mut b = AstBuilder::new();
        let int_ty = b.prim(PrimitiveTypeKind::Int);
        let null_ty = b.null_type();
        let union = b.union_type(vec![int_ty, null_ty]);
        let holder = b.ident("holder");
        let mut ast = b.finish(vec![]);

        let cloned = ast.clone_subtree(union, holder);
        assert_ne!(cloned.root, union);
        assert_eq!(ast.parent(cloned.root), Some(holder));
        assert_eq!(cloned.mapping.len(), 3);
        match ast.kind(cloned.root) {
            NodeKind::UnionType { types } => {
                assert_eq!(types.len(), 2);
                assert!(types.iter().all(|t| ast.parent(*t) == Some(cloned.root)));
                assert!(!types.contains(&int_ty));
            }
            other => panic!("unexpected {}", other.name()),
        }
    }

    #[test]
    fn test_descendants_preorder() {
        let mut b = AstBuilder::new();
        let one = b.int(1);
        let two = b.int(2);
        let sum = b.binary(BinaryOperator::Add, one, two);
        let ast = b.finish(vec![]);
        assert_eq!(ast.descendants(sum), vec![sum, one, two]);
    }
}
