//! Checker context and the resolution cycle guard.

use crate::checker::Checker;
use ets_ast::types::{NodeId, TypeId};
use ets_diagnostics::DiagnosticMessage;
use rustc_hash::FxHashMap;
use std::cell::RefCell;
use std::rc::Rc;
use tracing::debug;

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CheckerStatus: u32 {
        const NONE                         = 0;
        const IN_STATIC_CONTEXT            = 1 << 0;
        const IN_CLASS                     = 1 << 1;
        /// A lambda is being checked speculatively against a candidate type.
        const IN_LAMBDA_INFERENCE          = 1 << 2;
        const IN_EXTENSION_ACCESSOR_CHECK  = 1 << 3;
        const NO_OPTS                      = 1 << 4;
    }
}

/// The lexical context a declaration is checked in.
#[derive(Debug, Clone, Copy, Default)]
pub struct CheckerContext {
    pub containing_class: Option<TypeId>,
    /// Function type of the enclosing function or method.
    pub containing_signature: Option<TypeId>,
    pub status: CheckerStatus,
}

impl CheckerContext {
    pub fn has_status(&self, status: CheckerStatus) -> bool {
        self.status.contains(status)
    }
}

impl Checker {
    /// Run `f` with `context` installed; the previous context is restored
    /// when `f` returns.
    pub(crate) fn with_context<R>(&mut self, context: CheckerContext, f: impl FnOnce(&mut Self) -> R) -> R {
        let saved = std::mem::replace(&mut self.context, context);
        let result = f(self);
        self.context = saved;
        result
    }

    pub(crate) fn with_status<R>(&mut self, status: CheckerStatus, f: impl FnOnce(&mut Self) -> R) -> R {
        let context = CheckerContext {
            status: self.context.status | status,
            ..self.context
        };
        self.with_context(context, f)
    }

    /// Mark `key` as being resolved.
    ///
    /// Re-entering a key that is still on the stack reports `message`
    /// unless the entry is `recursive`, in which case the caller picks up
    /// the element type stored by the outer resolution.
    pub(crate) fn push_type_stack(
        &mut self,
        key: NodeId,
        message: &DiagnosticMessage,
        name: &str,
        recursive: bool,
    ) -> TypeStackElement {
        let element = TypeStackElement::enter(&self.type_stack, key, recursive);
        if element.has_type_error() {
            debug!(?key, name, "resolution cycle");
            self.error_at(key, message, &[name]);
        }
        element
    }
}

/// Declarations currently being resolved, with the type each one has
/// published for recursive references.
pub type TypeStack = Rc<RefCell<FxHashMap<NodeId, Option<TypeId>>>>;

/// Scoped membership in the [`TypeStack`].
///
/// A fresh element removes its key when dropped, so every exit path of the
/// resolution that created it leaves the stack as it found it.
#[derive(Debug)]
pub struct TypeStackElement {
    stack: TypeStack,
    key: NodeId,
    state: ElementState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ElementState {
    Fresh,
    /// The key was already on the stack and recursion is allowed.
    Reentered,
    /// The key was already on the stack: a cycle.
    Cycle,
}

impl TypeStackElement {
    fn enter(stack: &TypeStack, key: NodeId, recursive: bool) -> Self {
        let state = {
            let mut map = stack.borrow_mut();
            if map.contains_key(&key) {
                if recursive {
                    ElementState::Reentered
                } else {
                    ElementState::Cycle
                }
            } else {
                map.insert(key, None);
                ElementState::Fresh
            }
        };
        Self {
            stack: Rc::clone(stack),
            key,
            state,
        }
    }

    pub fn has_type_error(&self) -> bool {
        self.state == ElementState::Cycle
    }

    pub fn is_reentered(&self) -> bool {
        self.state == ElementState::Reentered
    }

    /// Publish the type recursive references resolve to.
    pub fn set_element_type(&self, ty: TypeId) {
        self.stack.borrow_mut().insert(self.key, Some(ty));
    }

    pub fn element_type(&self) -> Option<TypeId> {
        self.stack.borrow().get(&self.key).copied().flatten()
    }
}

impl Drop for TypeStackElement {
    fn drop(&mut self) {
        if self.state == ElementState::Fresh {
            self.stack.borrow_mut().remove(&self.key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stack() -> TypeStack {
        Rc::new(RefCell::new(FxHashMap::default()))
    }

    #[test]
    fn test_fresh_element_is_removed_on_drop() {
        let stack = stack();
        {
            let element = TypeStackElement::enter(&stack, NodeId(1), false);
            assert!(!element.has_type_error());
            assert!(stack.borrow().contains_key(&NodeId(1)));
        }
        assert!(stack.borrow().is_empty());
    }

    #[test]
    fn test_reentry_is_a_cycle() {
        let stack = stack();
        let outer = TypeStackElement::enter(&stack, NodeId(1), false);
        let inner = TypeStackElement::enter(&stack, NodeId(1), false);
        assert!(inner.has_type_error());
        drop(inner);
        // The inner element must not pop the outer entry.
        assert!(stack.borrow().contains_key(&NodeId(1)));
        drop(outer);
        assert!(stack.borrow().is_empty());
    }

    #[test]
    fn test_recursive_reentry_sees_element_type() {
        let stack = stack();
        let outer = TypeStackElement::enter(&stack, NodeId(7), true);
        outer.set_element_type(TypeId(42));
        let inner = TypeStackElement::enter(&stack, NodeId(7), true);
        assert!(inner.is_reentered());
        assert!(!inner.has_type_error());
        assert_eq!(inner.element_type(), Some(TypeId(42)));
    }
}
