//! The type checker.
//!
//! A `Checker` owns the tree, the binder's tables and the type arena for
//! one compilation. It resolves declaration types on demand, checks every
//! statement once, writes the resolved type and any boxing conversion onto
//! each checked node, and accumulates diagnostics without stopping at the
//! first one. The algorithms live in sibling modules as `impl Checker`
//! blocks.

use crate::context::{CheckerContext, TypeStack};
use crate::relation::{TypeRelation, TypeRelationFlags};
use crate::types::TypeTable;
use ets_ast::types::{NodeId, TypeId};
use ets_ast::Ast;
use ets_binder::{Binder, VariableId};
use ets_diagnostics::{Diagnostic, DiagnosticCollection, DiagnosticMessage};
use ets_options::CheckerOptions;
use rustc_hash::{FxHashMap, FxHashSet};
use std::cell::RefCell;
use std::rc::Rc;

/// The type checker resolves types and reports type errors.
pub struct Checker {
    pub(crate) ast: Ast,
    pub(crate) binder: Binder,
    /// The type table (type arena).
    pub(crate) types: TypeTable,
    pub(crate) options: CheckerOptions,
    pub(crate) diagnostics: DiagnosticCollection,
    /// The node each diagnostic was reported at, parallel to `diagnostics`.
    pub(crate) diagnostic_origins: Vec<Option<NodeId>>,
    pub(crate) context: CheckerContext,
    pub(crate) relation: TypeRelation,
    pub(crate) type_stack: TypeStack,
    /// Memoized assignability results keyed by relation flags.
    pub(crate) relation_cache: FxHashMap<(TypeId, TypeId, TypeRelationFlags), bool>,
    /// Alias targets currently being unfolded by the relation.
    pub(crate) alias_unfolding: FxHashSet<(TypeId, TypeId)>,
    /// Function bodies and annotation usages already checked.
    pub(crate) checked: FxHashSet<NodeId>,
    /// Narrowed variable types inside an `if` branch.
    pub(crate) smart_casts: FxHashMap<VariableId, TypeId>,
}

impl Checker {
    pub fn new(ast: Ast, mut binder: Binder, options: CheckerOptions) -> Self {
        let mut diagnostics = DiagnosticCollection::new();
        diagnostics.set_limit(options.max_errors);
        diagnostics.extend(binder.take_diagnostics());
        let diagnostic_origins = vec![None; diagnostics.len()];
        Self {
            ast,
            binder,
            types: TypeTable::new(),
            options,
            diagnostics,
            diagnostic_origins,
            context: CheckerContext::default(),
            relation: TypeRelation::default(),
            type_stack: Rc::new(RefCell::new(FxHashMap::default())),
            relation_cache: FxHashMap::default(),
            alias_unfolding: FxHashSet::default(),
            checked: FxHashSet::default(),
            smart_casts: FxHashMap::default(),
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn ast(&self) -> &Ast {
        &self.ast
    }

    pub fn binder(&self) -> &Binder {
        &self.binder
    }

    pub fn types(&self) -> &TypeTable {
        &self.types
    }

    pub fn types_mut(&mut self) -> &mut TypeTable {
        &mut self.types
    }

    pub fn options(&self) -> &CheckerOptions {
        &self.options
    }

    pub fn diagnostics(&self) -> &DiagnosticCollection {
        &self.diagnostics
    }

    pub fn take_diagnostics(&mut self) -> DiagnosticCollection {
        self.diagnostic_origins.clear();
        std::mem::take(&mut self.diagnostics)
    }

    /// The type the checker wrote onto `node`.
    pub fn node_type(&self, node: NodeId) -> Option<TypeId> {
        self.ast.ts_type(node)
    }

    /// The cached type of the variable declared by `decl`.
    pub fn declared_type(&self, decl: NodeId) -> Option<TypeId> {
        let var = self.binder.decl_var(decl)?;
        self.binder.variable(var).ts_type()
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    pub(crate) fn error_at(&mut self, node: NodeId, message: &DiagnosticMessage, args: &[&str]) {
        let mut diagnostic = Diagnostic::at(self.ast.span(node), message, args);
        if let Some(module) = self.ast.enclosing_module_name(node) {
            diagnostic = diagnostic.with_file(self.ast.interner().resolve(module));
        }
        let before = self.diagnostics.len();
        self.diagnostics.add(diagnostic);
        if self.diagnostics.len() > before {
            self.diagnostic_origins.push(Some(node));
        }
    }

    /// Source text of a declaration's name, or an empty string.
    pub(crate) fn declaration_name_text(&self, node: NodeId) -> String {
        self.ast
            .declaration_name(node)
            .map(|id| self.ast.identifier_text(id).to_string())
            .unwrap_or_default()
    }

    pub(crate) fn variable_name(&self, var: VariableId) -> String {
        self.ast.interner().resolve(self.binder.variable(var).name).to_string()
    }

    /// The variable behind an import, or `var` itself.
    pub(crate) fn resolve_import(&self, var: VariableId) -> VariableId {
        let mut current = var;
        let mut steps = 0;
        while let Some(target) = self.binder.import_target(current) {
            current = target;
            steps += 1;
            if steps > self.binder.variables().len() {
                break;
            }
        }
        current
    }
}
