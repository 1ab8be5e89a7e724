//! ets_diagnostics: Diagnostic messages and error reporting infrastructure.
//!
//! Defines the diagnostic messages reported by the ETS binder and checker.
//! Diagnostics are fire-and-continue: they are pushed into a
//! [`DiagnosticCollection`] and checking carries on with a fallback type.

use ets_core::text::TextSpan;
use std::fmt;

/// Diagnostic category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticCategory {
    Warning,
    Error,
}

impl fmt::Display for DiagnosticCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticCategory::Warning => write!(f, "warning"),
            DiagnosticCategory::Error => write!(f, "error"),
        }
    }
}

/// A diagnostic message template with a code and category.
#[derive(Debug, Clone)]
pub struct DiagnosticMessage {
    /// The diagnostic code.
    pub code: u32,
    /// The category of this diagnostic.
    pub category: DiagnosticCategory,
    /// The message template. May contain `{0}`, `{1}`, etc. placeholders.
    pub message: &'static str,
}

/// A realized diagnostic with location information and resolved message text.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    /// The module the diagnostic was reported in, if any.
    pub file: Option<String>,
    /// The source span of the offending node, if any.
    pub span: Option<TextSpan>,
    /// The formatted message.
    pub message_text: String,
    /// The diagnostic code.
    pub code: u32,
    /// The category.
    pub category: DiagnosticCategory,
}

impl Diagnostic {
    /// Create a new diagnostic without location info.
    pub fn new(message: &DiagnosticMessage, args: &[&str]) -> Self {
        Self {
            file: None,
            span: None,
            message_text: format_message(message.message, args),
            code: message.code,
            category: message.category,
        }
    }

    /// Create a new diagnostic anchored at a source span.
    pub fn at(span: TextSpan, message: &DiagnosticMessage, args: &[&str]) -> Self {
        Self {
            span: Some(span),
            ..Self::new(message, args)
        }
    }

    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }

    /// Whether this is an error diagnostic.
    pub fn is_error(&self) -> bool {
        self.category == DiagnosticCategory::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref file) = self.file {
            write!(f, "{}", file)?;
            if let Some(span) = self.span {
                write!(f, "({})", span.start)?;
            }
            write!(f, ": ")?;
        }
        write!(f, "{} ETS{}: {}", self.category, self.code, self.message_text)
    }
}

/// Format a diagnostic message template by replacing `{0}`, `{1}`, etc. with arguments.
pub fn format_message(template: &str, args: &[&str]) -> String {
    let mut result = template.to_string();
    for (i, arg) in args.iter().enumerate() {
        result = result.replace(&format!("{{{}}}", i), arg);
    }
    result
}

/// Diagnostics accumulated during a checking run.
///
/// An optional error limit models the only whole-run abort the checker
/// knows: once `is_full` is true, further errors are dropped and callers
/// stop visiting new statements.
#[derive(Debug, Clone, Default)]
pub struct DiagnosticCollection {
    diagnostics: Vec<Diagnostic>,
    error_limit: Option<usize>,
}

impl DiagnosticCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(limit: usize) -> Self {
        Self {
            diagnostics: Vec::new(),
            error_limit: Some(limit),
        }
    }

    pub fn set_limit(&mut self, limit: Option<usize>) {
        self.error_limit = limit;
    }

    pub fn add(&mut self, diagnostic: Diagnostic) {
        if diagnostic.is_error() && self.is_full() {
            return;
        }
        self.diagnostics.push(diagnostic);
    }

    /// Whether the error limit has been reached.
    pub fn is_full(&self) -> bool {
        match self.error_limit {
            Some(limit) => self.error_count() >= limit,
            None => false,
        }
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    pub fn error_count(&self) -> usize {
        self.diagnostics.iter().filter(|d| d.is_error()).count()
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    /// Keep only the diagnostics from `start` on for which `keep` holds.
    /// `keep` sees each diagnostic with its index before removal.
    pub fn retain_since(&mut self, start: usize, mut keep: impl FnMut(usize, &Diagnostic) -> bool) {
        let start = start.min(self.diagnostics.len());
        let tail = self.diagnostics.split_off(start);
        for (offset, diagnostic) in tail.into_iter().enumerate() {
            if keep(start + offset, &diagnostic) {
                self.diagnostics.push(diagnostic);
            }
        }
    }

    pub fn extend(&mut self, other: DiagnosticCollection) {
        for diagnostic in other.diagnostics {
            self.add(diagnostic);
        }
    }

    /// Sort diagnostics by file and position.
    pub fn sort(&mut self) {
        self.diagnostics.sort_by(|a, b| {
            a.file
                .cmp(&b.file)
                .then_with(|| a.span.map(|s| s.start).cmp(&b.span.map(|s| s.start)))
        });
    }
}

// ============================================================================
// Diagnostic Messages
// ============================================================================

pub mod messages {
    use super::*;

    macro_rules! diag {
        ($code:expr, Error, $msg:expr) => {
            DiagnosticMessage { code: $code, category: DiagnosticCategory::Error, message: $msg }
        };
        ($code:expr, Warning, $msg:expr) => {
            DiagnosticMessage { code: $code, category: DiagnosticCategory::Warning, message: $msg }
        };
    }

    // ========================================================================
    // Binder (1000-1099)
    // ========================================================================
    pub const UNRESOLVED_REFERENCE_0: DiagnosticMessage = diag!(1001, Error, "Unresolved reference {0}");
    pub const VARIABLE_0_HAS_ALREADY_BEEN_DECLARED: DiagnosticMessage = diag!(1002, Error, "Variable '{0}' has already been declared.");
    pub const CANNOT_FIND_MODULE_0: DiagnosticMessage = diag!(1003, Error, "Cannot find module '{0}'.");
    pub const MODULE_0_HAS_NO_EXPORTED_MEMBER_1: DiagnosticMessage = diag!(1004, Error, "Module '{0}' has no exported member '{1}'.");

    // ========================================================================
    // Declaration resolution (2000-2099)
    // ========================================================================
    pub const CIRCULAR_DEPENDENCY_ON_0: DiagnosticMessage = diag!(2001, Error, "Circular dependency detected for identifier: {0}");
    pub const TYPE_ALIAS_0_CIRCULARLY_REFERENCES_ITSELF: DiagnosticMessage = diag!(2002, Error, "Type alias '{0}' circularly references itself.");
    pub const CYCLIC_INHERITANCE_INVOLVING_0: DiagnosticMessage = diag!(2003, Error, "Cyclic inheritance involving {0}.");
    pub const _0_IS_NOT_A_TYPE: DiagnosticMessage = diag!(2004, Error, "'{0}' is not a type.");
    pub const _0_IS_NOT_A_VALUE: DiagnosticMessage = diag!(2005, Error, "'{0}' is a type and cannot be used as a value.");
    pub const CLASS_0_CANNOT_EXTEND_1: DiagnosticMessage = diag!(2006, Error, "Class '{0}' can only extend a class, not '{1}'.");
    pub const TYPE_ARGUMENTS_MISMATCH_0: DiagnosticMessage = diag!(2007, Error, "Wrong number of type arguments for '{0}'.");
    pub const VARIABLE_0_USED_BEFORE_INITIALIZATION: DiagnosticMessage = diag!(2008, Error, "Variable '{0}' must be declared with a type or an initializer.");

    // ========================================================================
    // Type relations and expressions (2100-2299)
    // ========================================================================
    pub const TYPE_0_CANNOT_BE_ASSIGNED_TO_TYPE_1: DiagnosticMessage = diag!(2101, Error, "Type '{0}' cannot be assigned to type '{1}'");
    pub const TYPE_0_IS_NOT_COMPATIBLE_WITH_TYPE_1_AT_INDEX_2: DiagnosticMessage = diag!(2102, Error, "Type '{0}' is not compatible with type '{1}' at index {2}");
    pub const EXPECTED_0_ARGUMENTS_GOT_1: DiagnosticMessage = diag!(2103, Error, "Expected {0} arguments, got {1}.");
    pub const TYPE_0_HAS_NO_CALL_SIGNATURES: DiagnosticMessage = diag!(2104, Error, "Type '{0}' has no call signatures.");
    pub const PROPERTY_0_DOES_NOT_EXIST_ON_TYPE_1: DiagnosticMessage = diag!(2105, Error, "Property '{0}' does not exist on type '{1}'");
    pub const BAD_OPERAND_TYPE_NON_NULLISH: DiagnosticMessage = diag!(2106, Error, "Bad operand type, the operand of the non-nullish expression is 'null' or 'undefined'.");
    pub const BAD_OPERAND_TYPE_FOR_OPERATOR_0: DiagnosticMessage = diag!(2107, Error, "Bad operand type for operator '{0}'.");
    pub const CANNOT_INFER_TYPE_OF_PARAMETER_0: DiagnosticMessage = diag!(2108, Error, "The type of parameter '{0}' cannot be inferred.");
    pub const RETURN_TYPE_0_NOT_COMPATIBLE_WITH_1: DiagnosticMessage = diag!(2109, Error, "Return type '{0}' is not compatible with the declared return type '{1}'.");
    pub const CANNOT_INSTANTIATE_0: DiagnosticMessage = diag!(2110, Error, "'{0}' cannot be instantiated.");
    pub const CANNOT_ACCESS_INSTANCE_MEMBER_0_STATICALLY: DiagnosticMessage = diag!(2111, Error, "'{0}' is an instance property and cannot be accessed from a static context.");

    // ========================================================================
    // Annotations (3000-3099)
    // ========================================================================
    pub const _0_IS_NOT_AN_ANNOTATION: DiagnosticMessage = diag!(3001, Error, "'{0}' is not an annotation.");
    pub const ANNOTATION_FIELD_0_NOT_DECLARED_IN_1: DiagnosticMessage = diag!(3002, Error, "The parameter '{0}' does not match any declared property in the annotation '{1}'.");
    pub const ANNOTATION_REQUIRED_FIELD_0_MISSING: DiagnosticMessage = diag!(3003, Error, "The required field '{0}' must be specified. Fields without default values cannot be omitted.");
    pub const ANNOTATION_0_REQUIRES_MULTIPLE_FIELDS: DiagnosticMessage = diag!(3004, Error, "Annotation '{0}' requires multiple fields to be specified.");
    pub const ILLEGAL_UNARY_OPERATOR: DiagnosticMessage = diag!(3005, Error, "Illegal unary operator.");
    pub const ANNOTATION_FIELD_VALUE_MUST_BE_CONSTANT: DiagnosticMessage = diag!(3006, Error, "Invalid value for annotation field, expected a constant literal.");
    pub const ANNOTATION_FIELD_0_HAS_INVALID_TYPE: DiagnosticMessage = diag!(3007, Error, "Invalid annotation field type for '{0}'. Only numeric, boolean, string, enum, or arrays of these types are permitted.");
    pub const AMBIENT_ANNOTATION_VALUE_MISMATCH: DiagnosticMessage = diag!(3008, Error, "The initial value does not match the expected value.");
    pub const AMBIENT_ANNOTATION_FIELD_0_TYPE_MISMATCH: DiagnosticMessage = diag!(3009, Error, "Field '{0}' has a type mismatch with the ambient annotation declaration.");
    pub const AMBIENT_ANNOTATION_FIELD_0_MISSING: DiagnosticMessage = diag!(3010, Error, "Field '{0}' is missing in the annotation declaration.");
    pub const INVALID_RETENTION_POLICY: DiagnosticMessage = diag!(3011, Error, "Invalid value for retention policy, expected 'SOURCE', 'BYTECODE' or 'RUNTIME'.");
    pub const SOURCE_RETENTION_ANNOTATION_0_MISPLACED: DiagnosticMessage = diag!(3012, Error, "Annotation '@{0}' with SOURCE retention can only be applied to declarations.");
    pub const RETENTION_ONLY_ON_ANNOTATION_DECLARATIONS: DiagnosticMessage = diag!(3013, Error, "Annotation '@Retention' can only be applied to annotation declarations.");
}
